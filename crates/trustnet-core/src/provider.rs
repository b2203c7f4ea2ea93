// # Provider Model
//
// Defines the data a registered provider declares (literal addresses and
// CIDR ranges, split by address family) and the reload capability a
// provider may expose to refresh that data.
//
// ## Reload contract
//
// A reload capability is a fixed sequence of independent tasks. Most
// sources are a single task; a source with separate IPv4 and IPv6 feeds
// contributes one task per feed. Each task performs its own I/O, applies
// whatever retry or timeout policy it wants, and returns a freshly built
// [`PoolUpdate`] — it never mutates shared state itself. The engine
// applies the update to the provider's live data with a single swap, so
// a concurrent lookup observes either the whole old pool set or the
// whole new one, never a torn mix.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// One address family's worth of declared data: literal addresses plus
/// CIDR ranges, both in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPool {
    /// Literal address strings, matched by exact equality
    #[serde(default)]
    pub addresses: Vec<String>,

    /// CIDR range strings, matched by containment
    #[serde(default)]
    pub ranges: Vec<String>,
}

impl AddressPool {
    /// Create a pool from address and range lists
    pub fn new(addresses: Vec<String>, ranges: Vec<String>) -> Self {
        Self { addresses, ranges }
    }

    /// Combined count of addresses and ranges
    pub fn len(&self) -> usize {
        self.addresses.len() + self.ranges.len()
    }

    /// True if the pool declares nothing
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.ranges.is_empty()
    }
}

/// Both address families of a provider's declared data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSet {
    /// IPv4 pool
    #[serde(default)]
    pub ipv4: AddressPool,

    /// IPv6 pool
    #[serde(default)]
    pub ipv6: AddressPool,
}

impl PoolSet {
    /// Combined count of addresses and ranges across both families
    pub fn len(&self) -> usize {
        self.ipv4.len() + self.ipv6.len()
    }

    /// True if neither family declares anything
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    /// Parse a pool-set document, the wire shape reload mechanisms fetch
    pub fn from_json_str(document: &str) -> Result<Self> {
        Ok(serde_json::from_str(document)?)
    }
}

/// Result of a reload task: a replacement for one family's pool, or for
/// the whole pool set.
#[derive(Debug, Clone)]
pub enum PoolUpdate {
    /// Replace the IPv4 pool, leaving IPv6 untouched
    Ipv4(AddressPool),
    /// Replace the IPv6 pool, leaving IPv4 untouched
    Ipv6(AddressPool),
    /// Replace both families at once
    Full(PoolSet),
}

/// Trait for a single independent reload operation
///
/// Implementations own their transport concerns entirely (HTTP, DNS,
/// bundled assets, retries, timeouts). The engine only awaits the task
/// to settlement and applies the returned update; it imposes no deadline
/// and no retry policy of its own.
#[async_trait]
pub trait ReloadTask: Send + Sync {
    /// Short label for logs and reload reports (e.g. "ipv4", "ipv6")
    fn label(&self) -> &str {
        "reload"
    }

    /// Perform the refresh and return the freshly built data
    async fn run(&self) -> Result<PoolUpdate>;
}

/// Registration input for a provider
///
/// Built in the usual chained style:
///
/// ```rust,no_run
/// use trustnet_core::provider::{AddressPool, ProviderSpec};
///
/// let spec = ProviderSpec::new("corp-network")
///     .with_ipv4(AddressPool::new(vec![], vec!["10.0.0.0/8".into()]))
///     .with_test_addresses(vec!["10.1.2.3".into()]);
/// ```
pub struct ProviderSpec {
    /// Unique provider name; the primary key
    pub name: String,

    /// Initial declared data
    pub pools: PoolSet,

    /// Sample addresses expected to resolve to this provider, used by
    /// the self-check routine only
    pub test_addresses: Vec<String>,

    /// Independent reload tasks; empty means the provider has no reload
    /// capability and keeps its initial data for its whole lifetime
    pub reload_tasks: Vec<Arc<dyn ReloadTask>>,
}

impl ProviderSpec {
    /// Create a spec with the given name and no data
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pools: PoolSet::default(),
            test_addresses: Vec::new(),
            reload_tasks: Vec::new(),
        }
    }

    /// Set the IPv4 pool
    pub fn with_ipv4(mut self, pool: AddressPool) -> Self {
        self.pools.ipv4 = pool;
        self
    }

    /// Set the IPv6 pool
    pub fn with_ipv6(mut self, pool: AddressPool) -> Self {
        self.pools.ipv6 = pool;
        self
    }

    /// Set both pools at once
    pub fn with_pools(mut self, pools: PoolSet) -> Self {
        self.pools = pools;
        self
    }

    /// Set the self-check sample addresses
    pub fn with_test_addresses(mut self, addresses: Vec<String>) -> Self {
        self.test_addresses = addresses;
        self
    }

    /// Append a single reload task
    pub fn with_reload(mut self, task: Arc<dyn ReloadTask>) -> Self {
        self.reload_tasks.push(task);
        self
    }

    /// Append a sequence of independent reload tasks
    pub fn with_reload_tasks(mut self, tasks: Vec<Arc<dyn ReloadTask>>) -> Self {
        self.reload_tasks.extend(tasks);
        self
    }
}

// Reload tasks are opaque; show their count rather than eliding the field.
impl std::fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("name", &self.name)
            .field("pools", &self.pools)
            .field("test_addresses", &self.test_addresses)
            .field("reload_tasks", &self.reload_tasks.len())
            .finish()
    }
}

/// Lifecycle state of a registered provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderState {
    /// Provider is usable; either freshly registered or reloaded
    Ready,
    /// A reload is in flight
    Loading,
    /// The most recent reload task failed
    Error,
    /// The provider's data has not been refreshed within the threshold
    Stale,
}

/// Lifecycle metadata tracked per provider, separate from the provider's
/// declared data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    /// Current lifecycle state
    pub state: ProviderState,

    /// Completion time of the last successful reload; `None` until the
    /// first success, and a provider with no baseline is never marked
    /// stale
    pub last_updated: Option<DateTime<Utc>>,

    /// Most recent reload failure, if any
    pub last_error: Option<String>,
}

impl ProviderStatus {
    pub(crate) fn initial() -> Self {
        Self {
            state: ProviderState::Ready,
            last_updated: None,
            last_error: None,
        }
    }
}

/// Defensive copy of a registered provider's declared data
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// Provider name
    pub name: String,
    /// Snapshot of the current pool set
    pub pools: PoolSet,
    /// Self-check sample addresses
    pub test_addresses: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_counts_cover_both_families() {
        let pools = PoolSet {
            ipv4: AddressPool::new(
                vec!["198.51.100.1".into()],
                vec!["10.0.0.0/8".into(), "192.0.2.0/24".into()],
            ),
            ipv6: AddressPool::new(vec![], vec!["2001:db8::/32".into()]),
        };
        assert_eq!(pools.ipv4.len(), 3);
        assert_eq!(pools.ipv6.len(), 1);
        assert_eq!(pools.len(), 4);
        assert!(!pools.is_empty());
        assert!(PoolSet::default().is_empty());
    }

    #[test]
    fn pool_set_document_parses_with_missing_fields() {
        let pools = PoolSet::from_json_str(
            r#"{ "ipv4": { "ranges": ["203.0.113.0/24"] } }"#,
        )
        .unwrap();
        assert_eq!(pools.ipv4.ranges, vec!["203.0.113.0/24".to_string()]);
        assert!(pools.ipv4.addresses.is_empty());
        assert!(pools.ipv6.is_empty());
    }

    #[test]
    fn pool_set_document_rejects_malformed_json() {
        assert!(PoolSet::from_json_str("{ not json").is_err());
    }

    #[test]
    fn spec_builder_accumulates_fields() {
        let spec = ProviderSpec::new("searchbot")
            .with_ipv4(AddressPool::new(vec!["192.0.2.1".into()], vec![]))
            .with_ipv6(AddressPool::new(vec![], vec!["2001:db8::/32".into()]))
            .with_test_addresses(vec!["192.0.2.1".into()]);
        assert_eq!(spec.name, "searchbot");
        assert_eq!(spec.pools.len(), 2);
        assert_eq!(spec.test_addresses.len(), 1);
        assert!(spec.reload_tasks.is_empty());
    }
}
