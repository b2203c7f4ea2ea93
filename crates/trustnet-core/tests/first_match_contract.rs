//! Architectural Contract Test: First Match Wins
//!
//! This test verifies that registration order is the only resolution
//! rule for overlapping provider pools.
//!
//! Constraints verified:
//! - The earliest registered matching provider is authoritative
//! - Prefix specificity never overrides registration order
//! - The rule holds identically with a cold or warm result cache
//!
//! If this test fails, someone has added:
//! - Longest-prefix or most-specific-match resolution
//! - A resolution path that depends on cache state

mod common;

use common::*;
use trustnet_core::provider::{AddressPool, ProviderSpec};

#[test]
fn earliest_registration_beats_specificity() {
    let engine = engine();
    engine
        .add_provider(provider_with_range("broad", "10.0.0.0/8"))
        .unwrap();
    engine
        .add_provider(provider_with_range("narrow", "10.1.0.0/16"))
        .unwrap();

    // Both match; /16 is more specific but was registered later.
    assert_eq!(engine.lookup("10.1.2.3"), Some("broad".to_string()));
}

#[test]
fn reversed_registration_reverses_the_winner() {
    let engine = engine();
    engine
        .add_provider(provider_with_range("narrow", "10.1.0.0/16"))
        .unwrap();
    engine
        .add_provider(provider_with_range("broad", "10.0.0.0/8"))
        .unwrap();

    assert_eq!(engine.lookup("10.1.2.3"), Some("narrow".to_string()));
}

#[test]
fn shared_literal_resolves_to_earliest_of_three() {
    let engine = engine();
    for name in ["a", "b", "c"] {
        engine
            .add_provider(
                ProviderSpec::new(name)
                    .with_ipv4(AddressPool::new(vec!["198.51.100.1".to_string()], vec![])),
            )
            .unwrap();
    }

    assert_eq!(engine.lookup("198.51.100.1"), Some("a".to_string()));
}

#[test]
fn literal_in_one_provider_range_in_an_earlier_one() {
    let engine = engine();
    engine
        .add_provider(provider_with_range("ranged", "198.51.100.0/24"))
        .unwrap();
    engine
        .add_provider(
            ProviderSpec::new("literal")
                .with_ipv4(AddressPool::new(vec!["198.51.100.1".to_string()], vec![])),
        )
        .unwrap();

    // The earlier provider's range claims the address before the later
    // provider's exact literal is ever consulted.
    assert_eq!(engine.lookup("198.51.100.1"), Some("ranged".to_string()));
}

#[test]
fn deleting_the_winner_promotes_the_next_in_order() {
    let engine = engine();
    engine
        .add_provider(provider_with_range("first", "10.0.0.0/8"))
        .unwrap();
    engine
        .add_provider(provider_with_range("second", "10.1.0.0/16"))
        .unwrap();

    assert_eq!(engine.lookup("10.1.2.3"), Some("first".to_string()));
    assert!(engine.delete_provider("first"));
    assert_eq!(engine.lookup("10.1.2.3"), Some("second".to_string()));
}

#[test]
fn warm_cache_never_changes_the_answer() {
    let engine = engine();
    engine
        .add_provider(provider_with_range("broad", "10.0.0.0/8"))
        .unwrap();
    engine
        .add_provider(provider_with_range("narrow", "10.1.0.0/16"))
        .unwrap();

    let addresses = ["10.1.2.3", "10.200.0.1", "8.8.8.8", "not-an-address"];
    let cold: Vec<_> = addresses.iter().map(|a| engine.lookup(a)).collect();
    let warm: Vec<_> = addresses.iter().map(|a| engine.lookup(a)).collect();
    assert_eq!(cold, warm);
}
