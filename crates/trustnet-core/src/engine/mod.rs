//! Core trust engine
//!
//! The TrustEngine is responsible for:
//! - Admitting and removing providers via the ProviderStore
//! - Classifying addresses against the registered providers
//! - Fanning out provider reloads and tracking lifecycle state
//! - Sweeping for stale providers
//! - Emitting lifecycle events for external observers
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     hit      ┌───────────────┐
//! │ ResultCache  │◄────────────►│  lookup()     │
//! └──────────────┘              └───────────────┘
//!                                      │ miss
//!                     ┌────────────────┼────────────────┐
//!                     ▼                ▼                ▼
//!             ┌──────────────┐ ┌──────────────┐ ┌─────────────┐
//!             │ProviderStore │ │  RangeCache  │ │  EventHub   │
//!             │ (walk order) │ │ (parse CIDR) │ │  (notify)   │
//!             └──────────────┘ └──────────────┘ └─────────────┘
//! ```
//!
//! ## Lookup Flow
//!
//! 1. Consult the result cache; a hit (including a cached "no match")
//!    returns immediately
//! 2. Parse the address; unparseable input is logged and classified as
//!    not trusted — a lookup never fails
//! 3. Walk providers in registration order: literal scan first, then
//!    range containment through the range cache
//! 4. The earliest registered match is authoritative; overlaps are
//!    resolved by order, never by prefix specificity
//! 5. Write the outcome back into the result cache
//!
//! ## Ownership
//!
//! The engine is an explicitly owned object: construct one per
//! application instance and hand out references. There is no process
//! global. All methods take `&self`; the store, both caches, and the
//! metadata map are internally synchronized.

mod reload;

pub use reload::{ReloadReport, TaskOutcome};

use chrono::Utc;
use ipnet::IpNet;
use std::net::IpAddr;
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::{RangeCache, ResultCache};
use crate::config::TrustnetConfig;
use crate::error::{Error, Result};
use crate::events::{Event, EventHub};
use crate::provider::{ProviderInfo, ProviderSpec, ProviderState, ProviderStatus};
use crate::store::{ProviderEntry, ProviderStore, StoreLimits};

/// Entry counts for both cache tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Parsed ranges currently cached
    pub range_entries: usize,
    /// Lookup outcomes currently cached
    pub result_entries: usize,
}

/// Outcome of one self-check sample
#[derive(Debug, Clone)]
pub struct SelfTestOutcome {
    /// Provider that declared the sample
    pub provider: String,
    /// The sample address
    pub address: String,
    /// Provider the sample actually resolved to, if any
    pub matched: Option<String>,
    /// True when the sample resolved to its declaring provider
    pub ok: bool,
}

/// Core trust engine: provider registry, matcher, and reload coordinator
pub struct TrustEngine {
    store: ProviderStore,
    range_cache: Mutex<RangeCache>,
    result_cache: Mutex<ResultCache>,
    events: EventHub,
    result_cache_capacity: usize,
    staleness_threshold: RwLock<Duration>,
}

impl TrustEngine {
    /// Create an engine from a validated configuration
    pub fn new(config: TrustnetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: ProviderStore::new(StoreLimits {
                max_providers: config.max_providers,
                max_ips_per_provider: config.max_ips_per_provider,
            }),
            range_cache: Mutex::new(RangeCache::new(config.range_cache_capacity)?),
            result_cache: Mutex::new(ResultCache::new(
                config.result_cache_capacity,
                Duration::from_secs(config.result_ttl_secs),
            )?),
            events: EventHub::new(),
            result_cache_capacity: config.result_cache_capacity,
            staleness_threshold: RwLock::new(Duration::from_secs(
                config.staleness_threshold_secs,
            )),
        })
    }

    /// The engine's event feed
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Register a provider
    ///
    /// Admission rules live in the store; on a successful append the
    /// result cache is dropped, since a remembered "no match" may now be
    /// wrong. Duplicate or unnamed specs are silent no-ops.
    pub fn add_provider(&self, spec: ProviderSpec) -> Result<()> {
        if self.store.add(spec)? {
            self.result_cache.lock().unwrap().clear();
        }
        Ok(())
    }

    /// Remove a provider; returns false if it was not registered
    ///
    /// Both caches are dropped on removal: cached matches naming the
    /// provider, and cached negatives its absence would now change, must
    /// not survive.
    pub fn delete_provider(&self, name: &str) -> bool {
        let removed = self.store.remove(name);
        if removed {
            self.range_cache.lock().unwrap().clear();
            self.result_cache.lock().unwrap().clear();
        }
        removed
    }

    /// Whether a provider with this name is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.store.contains(name)
    }

    /// Registered provider names, in registration order
    pub fn provider_names(&self) -> Vec<String> {
        self.store.names()
    }

    /// Defensive copies of every registered provider's declared data
    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.store.providers()
    }

    /// Lifecycle metadata snapshot for one provider
    pub fn provider_status(&self, name: &str) -> Option<ProviderStatus> {
        self.store.status(name)
    }

    /// Classify an address: the earliest registered matching provider's
    /// name, or `None` when no provider claims it
    ///
    /// Never fails: unparseable input and per-provider evaluation faults
    /// are logged and classified as not trusted.
    pub fn lookup(&self, address: &str) -> Option<String> {
        if let Some(cached) = self.result_cache.lock().unwrap().get(address) {
            return cached;
        }

        let outcome = self.resolve(address);
        self.result_cache
            .lock()
            .unwrap()
            .set(address.to_string(), outcome.clone());
        outcome
    }

    /// Whether any registered provider claims this address
    pub fn is_trusted(&self, address: &str) -> bool {
        self.lookup(address).is_some()
    }

    /// Mark providers whose data has aged past the staleness threshold
    ///
    /// Caller-driven; the engine schedules nothing itself. Idempotent: a
    /// provider already stale is not re-reported, and a provider that
    /// has never completed a reload has no baseline and is skipped.
    /// Returns the names newly marked stale.
    pub fn check_staleness(&self) -> Vec<String> {
        let threshold = chrono::Duration::from_std(*self.staleness_threshold.read().unwrap())
            .unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut newly_stale = Vec::new();

        for name in self.store.names() {
            let Some(status) = self.store.status(&name) else {
                continue;
            };
            if status.state == ProviderState::Stale {
                continue;
            }
            let Some(last_updated) = status.last_updated else {
                continue;
            };
            let elapsed = now - last_updated;
            if elapsed > threshold {
                self.store.mark_stale(&name);
                warn!(provider = %name, stale_for_secs = elapsed.num_seconds(), "provider data is stale");
                self.events.emit(Event::ProviderStale {
                    provider: name.clone(),
                    last_updated,
                    stale_for: elapsed,
                    timestamp: now,
                });
                newly_stale.push(name);
            }
        }

        newly_stale
    }

    /// Replace the result-cache TTL, discarding every cached outcome
    pub fn set_result_ttl(&self, ttl: Duration) -> Result<()> {
        let fresh = ResultCache::new(self.result_cache_capacity, ttl)?;
        *self.result_cache.lock().unwrap() = fresh;
        Ok(())
    }

    /// Replace the staleness threshold
    pub fn set_staleness_threshold(&self, threshold: Duration) -> Result<()> {
        if threshold.is_zero() {
            return Err(Error::config("staleness threshold must be > 0"));
        }
        *self.staleness_threshold.write().unwrap() = threshold;
        Ok(())
    }

    /// Eagerly sweep expired outcomes from the result cache
    pub fn prune_results(&self) -> usize {
        self.result_cache.lock().unwrap().prune()
    }

    /// Entry counts for both cache tiers
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            range_entries: self.range_cache.lock().unwrap().len(),
            result_entries: self.result_cache.lock().unwrap().len(),
        }
    }

    /// Resolve every provider's declared self-check samples
    ///
    /// Diagnostics only: each sample goes through a normal lookup and is
    /// reported against its declaring provider. A sample claimed by an
    /// earlier registered provider reports `ok == false`.
    pub fn run_self_test(&self) -> Vec<SelfTestOutcome> {
        let mut outcomes = Vec::new();
        for entry in self.store.snapshot() {
            for address in entry.test_addresses() {
                let matched = self.lookup(address);
                let ok = matched.as_deref() == Some(entry.name());
                if !ok {
                    warn!(
                        provider = entry.name(),
                        address = %address,
                        matched = ?matched,
                        "self-check sample did not resolve to its provider"
                    );
                }
                outcomes.push(SelfTestOutcome {
                    provider: entry.name().to_string(),
                    address: address.clone(),
                    matched,
                    ok,
                });
            }
        }
        outcomes
    }

    pub(crate) fn store(&self) -> &ProviderStore {
        &self.store
    }

    pub(crate) fn clear_caches(&self) {
        self.range_cache.lock().unwrap().clear();
        self.result_cache.lock().unwrap().clear();
    }

    fn resolve(&self, address: &str) -> Option<String> {
        let ip: IpAddr = match address.parse() {
            Ok(ip) => ip,
            Err(e) => {
                warn!(address = %address, error = %e, "unparseable address, classifying as not trusted");
                return None;
            }
        };

        for entry in self.store.snapshot() {
            match self.provider_matches(&entry, &ip, address) {
                Ok(true) => {
                    debug!(address = %address, provider = entry.name(), "address matched");
                    return Some(entry.name().to_string());
                }
                Ok(false) => {}
                // One provider's bad data must not poison the walk.
                Err(e) => {
                    warn!(provider = entry.name(), error = %e, "provider evaluation failed, skipping");
                }
            }
        }

        None
    }

    fn provider_matches(&self, entry: &ProviderEntry, ip: &IpAddr, raw: &str) -> Result<bool> {
        let pools = entry.snapshot();
        let pool = match ip {
            IpAddr::V4(_) => &pools.ipv4,
            IpAddr::V6(_) => &pools.ipv6,
        };

        if pool.addresses.iter().any(|address| address == raw) {
            return Ok(true);
        }

        if pool.ranges.is_empty() {
            return Ok(false);
        }

        let mut ranges = self.range_cache.lock().unwrap();
        for cidr in &pool.ranges {
            let net = match ranges.get(cidr) {
                Some(net) => net,
                None => {
                    // Admission validates declared ranges, but reloaded
                    // data arrives unvalidated; a bad range fails this
                    // provider only.
                    let parsed: IpNet = cidr.parse().map_err(|e| {
                        Error::other(format!("invalid range '{}': {}", cidr, e))
                    })?;
                    ranges.set(cidr.clone(), parsed);
                    parsed
                }
            };
            if net.contains(ip) {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
