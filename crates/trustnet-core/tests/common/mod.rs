//! Shared fixtures for the contract tests
//!
//! Mock reload tasks with controllable outcomes, plus small builders for
//! engines and providers. Mirrors what concrete reload mechanisms look
//! like from the engine's side without any I/O.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use trustnet_core::provider::{AddressPool, PoolSet, PoolUpdate, ProviderSpec, ReloadTask};
use trustnet_core::{Error, Event, EventHub, EventKind, Result, TrustEngine, TrustnetConfig};

/// Reload task that always succeeds with a fixed pool set
pub struct StaticReloadTask {
    label: String,
    pools: PoolSet,
    calls: AtomicUsize,
}

impl StaticReloadTask {
    pub fn new(pools: PoolSet) -> Arc<Self> {
        Arc::new(Self {
            label: "ipv4".to_string(),
            pools,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn with_label(label: &str, pools: PoolSet) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            pools,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReloadTask for StaticReloadTask {
    fn label(&self) -> &str {
        &self.label
    }

    async fn run(&self) -> Result<PoolUpdate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PoolUpdate::Full(self.pools.clone()))
    }
}

/// Reload task that always fails with a fixed message
pub struct FailingReloadTask {
    message: String,
}

impl FailingReloadTask {
    pub fn new(message: &str) -> Arc<Self> {
        Arc::new(Self {
            message: message.to_string(),
        })
    }
}

#[async_trait]
impl ReloadTask for FailingReloadTask {
    async fn run(&self) -> Result<PoolUpdate> {
        Err(Error::provider("mock", self.message.clone()))
    }
}

/// Engine with default limits
pub fn engine() -> TrustEngine {
    TrustEngine::new(TrustnetConfig::default()).expect("engine construction succeeds")
}

/// Pool set declaring a single IPv4 range
pub fn v4_range(range: &str) -> PoolSet {
    PoolSet {
        ipv4: AddressPool::new(vec![], vec![range.to_string()]),
        ipv6: AddressPool::default(),
    }
}

/// Provider spec declaring a single IPv4 range and no reload capability
pub fn provider_with_range(name: &str, range: &str) -> ProviderSpec {
    ProviderSpec::new(name).with_pools(v4_range(range))
}

/// Collect every emitted event of one kind for later assertions
pub fn record_events(hub: &EventHub, kind: EventKind) -> Arc<Mutex<Vec<Event>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    hub.on(kind, move |event| sink.lock().unwrap().push(event.clone()));
    seen
}
