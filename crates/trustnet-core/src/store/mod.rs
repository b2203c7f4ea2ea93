//! Ordered provider store
//!
//! The store owns the registered providers and their lifecycle metadata.
//! Registration order is significant: the matching engine walks providers
//! in the order they were admitted, and the earliest match is
//! authoritative. Nothing but the store mutates membership.
//!
//! ## Admission
//!
//! `add` validates before appending: the provider table must have room,
//! the provider's combined address/range count must fit the per-provider
//! limit, and every declared CIDR string must parse for its address
//! family. A rejected provider leaves the store untouched. Registering a
//! duplicate name, or a spec with an empty name, is a silent no-op.
//!
//! ## Thread Safety
//!
//! Interior mutability with RwLock, allowing concurrent reads and
//! exclusive writes. Each provider's declared data sits in its own cell
//! behind an `Arc` snapshot, so readers never observe a half-replaced
//! pool set.

use ipnet::{Ipv4Net, Ipv6Net};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::error::{Error, Result};
use crate::provider::{
    PoolSet, PoolUpdate, ProviderInfo, ProviderSpec, ProviderState, ProviderStatus, ReloadTask,
};

/// Admission limits enforced by the store
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    /// Maximum number of registered providers
    pub max_providers: usize,
    /// Maximum combined address/range count per provider
    pub max_ips_per_provider: usize,
}

/// A registered provider: immutable identity plus a swappable data cell
pub struct ProviderEntry {
    name: String,
    test_addresses: Vec<String>,
    reload_tasks: Vec<Arc<dyn ReloadTask>>,
    data: RwLock<Arc<PoolSet>>,
}

impl ProviderEntry {
    fn new(spec: ProviderSpec) -> Self {
        Self {
            name: spec.name,
            test_addresses: spec.test_addresses,
            reload_tasks: spec.reload_tasks,
            data: RwLock::new(Arc::new(spec.pools)),
        }
    }

    /// Provider name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Self-check sample addresses
    pub fn test_addresses(&self) -> &[String] {
        &self.test_addresses
    }

    /// The provider's independent reload tasks; empty means no capability
    pub fn reload_tasks(&self) -> &[Arc<dyn ReloadTask>] {
        &self.reload_tasks
    }

    /// Consistent snapshot of the provider's current data
    pub fn snapshot(&self) -> Arc<PoolSet> {
        self.data.read().unwrap().clone()
    }

    /// Build the post-update pool set off to the side and swap it in
    pub(crate) fn apply(&self, update: PoolUpdate) {
        let mut guard = self.data.write().unwrap();
        let next = match update {
            PoolUpdate::Ipv4(pool) => PoolSet {
                ipv4: pool,
                ipv6: guard.ipv6.clone(),
            },
            PoolUpdate::Ipv6(pool) => PoolSet {
                ipv4: guard.ipv4.clone(),
                ipv6: pool,
            },
            PoolUpdate::Full(pools) => pools,
        };
        *guard = Arc::new(next);
    }
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("reload_tasks", &self.reload_tasks.len())
            .finish()
    }
}

/// Ordered collection of registered providers plus per-provider metadata
pub struct ProviderStore {
    limits: StoreLimits,
    entries: RwLock<Vec<Arc<ProviderEntry>>>,
    metadata: RwLock<HashMap<String, ProviderStatus>>,
}

impl ProviderStore {
    /// Create an empty store with the given admission limits
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            limits,
            entries: RwLock::new(Vec::new()),
            metadata: RwLock::new(HashMap::new()),
        }
    }

    /// Admit a provider
    ///
    /// Returns `Ok(true)` when the provider was appended, `Ok(false)`
    /// for the silent no-ops (empty name, duplicate name), and an error
    /// when validation rejects the spec. The store is unchanged unless
    /// `Ok(true)` is returned.
    pub fn add(&self, spec: ProviderSpec) -> Result<bool> {
        if spec.name.is_empty() {
            debug!("ignoring provider registration with empty name");
            return Ok(false);
        }

        let mut entries = self.entries.write().unwrap();
        if entries.iter().any(|entry| entry.name == spec.name) {
            debug!(provider = %spec.name, "provider already registered, ignoring");
            return Ok(false);
        }

        if entries.len() >= self.limits.max_providers {
            return Err(Error::ProviderLimit {
                count: entries.len(),
                limit: self.limits.max_providers,
            });
        }

        let declared = spec.pools.len();
        if declared > self.limits.max_ips_per_provider {
            return Err(Error::AddressLimit {
                provider: spec.name,
                count: declared,
                limit: self.limits.max_ips_per_provider,
            });
        }

        validate_ranges(&spec.name, &spec.pools)?;

        let name = spec.name.clone();
        entries.push(Arc::new(ProviderEntry::new(spec)));
        self.metadata
            .write()
            .unwrap()
            .insert(name, ProviderStatus::initial());
        Ok(true)
    }

    /// Remove a provider and its metadata; returns false if absent
    pub fn remove(&self, name: &str) -> bool {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|entry| entry.name != name);
        let removed = entries.len() != before;
        if removed {
            self.metadata.write().unwrap().remove(name);
        }
        removed
    }

    /// Whether a provider with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap()
            .iter()
            .any(|entry| entry.name == name)
    }

    /// Registered provider names, in registration order
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Ordered snapshot of the registered providers
    pub fn snapshot(&self) -> Vec<Arc<ProviderEntry>> {
        self.entries.read().unwrap().clone()
    }

    /// Defensive copies of every provider's declared data, in order
    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .map(|entry| ProviderInfo {
                name: entry.name.clone(),
                pools: (*entry.snapshot()).clone(),
                test_addresses: entry.test_addresses.clone(),
            })
            .collect()
    }

    /// Metadata snapshot for one provider
    pub fn status(&self, name: &str) -> Option<ProviderStatus> {
        self.metadata.read().unwrap().get(name).cloned()
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// True if no provider is registered
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    pub(crate) fn mark_loading(&self, name: &str) {
        self.update_status(name, |status| {
            status.state = ProviderState::Loading;
        });
    }

    pub(crate) fn mark_ready(&self, name: &str, timestamp: chrono::DateTime<chrono::Utc>) {
        self.update_status(name, |status| {
            status.state = ProviderState::Ready;
            status.last_updated = Some(timestamp);
            status.last_error = None;
        });
    }

    pub(crate) fn mark_error(&self, name: &str, message: String) {
        self.update_status(name, |status| {
            status.state = ProviderState::Error;
            status.last_error = Some(message);
        });
    }

    pub(crate) fn mark_stale(&self, name: &str) {
        self.update_status(name, |status| {
            status.state = ProviderState::Stale;
        });
    }

    fn update_status(&self, name: &str, apply: impl FnOnce(&mut ProviderStatus)) {
        let mut metadata = self.metadata.write().unwrap();
        match metadata.get_mut(name) {
            Some(status) => apply(status),
            // The provider was deleted while a transition was in flight.
            None => debug!(provider = name, "status update for unknown provider"),
        }
    }
}

fn validate_ranges(provider: &str, pools: &PoolSet) -> Result<()> {
    for range in &pools.ipv4.ranges {
        range.parse::<Ipv4Net>().map_err(|e| Error::InvalidRange {
            provider: provider.to_string(),
            family: "ipv4",
            range: range.clone(),
            reason: e.to_string(),
        })?;
    }
    for range in &pools.ipv6.ranges {
        range.parse::<Ipv6Net>().map_err(|e| Error::InvalidRange {
            provider: provider.to_string(),
            family: "ipv6",
            range: range.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
