//! # trustnet-core
//!
//! Core library for classifying IP addresses against a registered set of
//! trusted providers (crawlers, payment processors, CDNs, internal
//! networks), used to drive firewall allow-listing decisions.
//!
//! ## Architecture Overview
//!
//! - **ProviderStore**: Ordered registry of providers with admission
//!   validation and per-provider lifecycle metadata
//! - **TrustEngine**: Facade owning the store, both cache tiers, and the
//!   event feed; exposes lookup, reload fan-out, and the staleness sweep
//! - **ReloadTask**: Trait a provider's reload capability implements;
//!   concrete transports (HTTPS, DNS, bundled assets) live in their own
//!   crates
//! - **EventHub**: Typed lifecycle events with callback and stream
//!   subscriptions
//! - **RangeCache / ResultCache**: Bounded LRU tiers for parsed CIDR
//!   ranges and lookup outcomes
//!
//! ## Design Principles
//!
//! 1. **First match wins**: registration order is the only resolution
//!    rule for overlapping pools
//! 2. **Lookups never fail**: bad input and bad provider data degrade to
//!    "not trusted", never to an error or panic
//! 3. **Partial-failure isolation**: one provider's failing reload never
//!    blocks siblings from updating
//! 4. **No hidden globals**: one engine per application instance, passed
//!    by reference
//! 5. **No internal scheduling**: reloads and staleness sweeps run on
//!    the caller's cadence

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod provider;
pub mod store;

// Re-export core types for convenience
pub use config::TrustnetConfig;
pub use engine::{CacheStats, ReloadReport, SelfTestOutcome, TaskOutcome, TrustEngine};
pub use error::{Error, Result};
pub use events::{Event, EventHub, EventKind, ListenerId};
pub use provider::{
    AddressPool, PoolSet, PoolUpdate, ProviderInfo, ProviderSpec, ProviderState, ProviderStatus,
    ReloadTask,
};
pub use store::{ProviderStore, StoreLimits};
