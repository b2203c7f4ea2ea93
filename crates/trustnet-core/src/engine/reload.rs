//! Reload fan-out
//!
//! `reload_all` runs every reload task of every capable provider
//! concurrently and waits for all of them to settle. One provider's
//! failure never aborts a sibling: each task's outcome lands in that
//! provider's metadata and in the returned report, and the call itself
//! always completes. Once every task has settled, both caches are
//! dropped unconditionally — even a partially failed fan-out may have
//! changed the shape of a provider's data.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::events::Event;
use crate::provider::PoolUpdate;
use crate::store::ProviderEntry;

use super::TrustEngine;

/// Settlement of a single reload task
#[derive(Debug)]
pub struct TaskOutcome {
    /// Provider the task belongs to
    pub provider: String,
    /// Task label (e.g. "ipv4", "ipv6")
    pub task: String,
    /// The task's settlement; failures are recorded, never re-raised
    pub result: Result<(), Error>,
}

/// Settlement of a whole reload fan-out
#[derive(Debug, Default)]
pub struct ReloadReport {
    /// One entry per task, in settlement order
    pub outcomes: Vec<TaskOutcome>,
}

impl ReloadReport {
    /// Number of tasks that completed successfully
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Number of tasks that failed
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    /// True when no task failed (an empty fan-out is fully successful)
    pub fn is_fully_successful(&self) -> bool {
        self.failed() == 0
    }

    /// The failed outcomes
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

type Settled = (String, String, Arc<ProviderEntry>, Result<PoolUpdate, Error>);

impl TrustEngine {
    /// Reload every provider that exposes a reload capability
    ///
    /// All tasks across all providers run concurrently; the call returns
    /// only after every task has settled. Providers without a capability
    /// are skipped. Never fails as a whole — per-task failures surface
    /// through metadata, events, and the returned report.
    pub async fn reload_all(&self) -> ReloadReport {
        let mut tasks: JoinSet<Settled> = JoinSet::new();
        // Task identities survive a panic only through this map.
        let mut slots: HashMap<tokio::task::Id, (String, String)> = HashMap::new();

        for entry in self.store().snapshot() {
            if entry.reload_tasks().is_empty() {
                debug!(provider = entry.name(), "no reload capability, skipping");
                continue;
            }

            let provider = entry.name().to_string();
            self.store().mark_loading(&provider);
            self.events().emit(Event::ReloadStarted {
                provider: provider.clone(),
            });

            for task in entry.reload_tasks() {
                let provider = provider.clone();
                let label = task.label().to_string();
                let task = Arc::clone(task);
                let entry = Arc::clone(&entry);
                let slot = (provider.clone(), label.clone());
                let handle = tasks.spawn(async move {
                    let result = task.run().await;
                    (provider, label, entry, result)
                });
                slots.insert(handle.id(), slot);
            }
        }

        let mut report = ReloadReport::default();
        while let Some(settled) = tasks.join_next().await {
            match settled {
                Ok((provider, label, entry, Ok(update))) => {
                    entry.apply(update);
                    let now = Utc::now();
                    self.store().mark_ready(&provider, now);
                    info!(provider = %provider, task = %label, "reload succeeded");
                    self.events().emit(Event::ReloadSucceeded {
                        provider: provider.clone(),
                        timestamp: now,
                    });
                    report.outcomes.push(TaskOutcome {
                        provider,
                        task: label,
                        result: Ok(()),
                    });
                }
                Ok((provider, label, _, Err(error))) => {
                    self.record_failure(&mut report, provider, label, error);
                }
                Err(join_error) => {
                    let (provider, label) = slots
                        .get(&join_error.id())
                        .cloned()
                        .unwrap_or_else(|| ("unknown".to_string(), "reload".to_string()));
                    let error = Error::reload(format!("task '{}' panicked", label));
                    self.record_failure(&mut report, provider, label, error);
                }
            }
        }

        // Even a partially failed fan-out may have reshaped provider
        // data; cached negatives and positives must not survive it.
        self.clear_caches();

        report
    }

    fn record_failure(
        &self,
        report: &mut ReloadReport,
        provider: String,
        label: String,
        error: Error,
    ) {
        let now = Utc::now();
        self.store().mark_error(&provider, error.to_string());
        warn!(provider = %provider, task = %label, error = %error, "reload failed");
        self.events().emit(Event::ReloadFailed {
            provider: provider.clone(),
            error: error.to_string(),
            timestamp: now,
        });
        report.outcomes.push(TaskOutcome {
            provider,
            task: label,
            result: Err(error),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrustnetConfig;
    use crate::provider::{AddressPool, PoolSet, ProviderSpec, ProviderState, ReloadTask};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedPoolTask {
        label: String,
        pools: PoolSet,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ReloadTask for FixedPoolTask {
        fn label(&self) -> &str {
            &self.label
        }

        async fn run(&self) -> crate::Result<PoolUpdate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PoolUpdate::Full(self.pools.clone()))
        }
    }

    struct FailingTask;

    #[async_trait]
    impl ReloadTask for FailingTask {
        async fn run(&self) -> crate::Result<PoolUpdate> {
            Err(Error::provider("http", "connection refused"))
        }
    }

    struct PanickingTask;

    #[async_trait]
    impl ReloadTask for PanickingTask {
        async fn run(&self) -> crate::Result<PoolUpdate> {
            panic!("task bug");
        }
    }

    fn engine() -> TrustEngine {
        TrustEngine::new(TrustnetConfig::default()).unwrap()
    }

    fn pool_set(range: &str) -> PoolSet {
        PoolSet {
            ipv4: AddressPool::new(vec![], vec![range.to_string()]),
            ipv6: AddressPool::default(),
        }
    }

    #[tokio::test]
    async fn reload_applies_fetched_data() {
        let engine = engine();
        let calls = Arc::new(AtomicUsize::new(0));
        engine
            .add_provider(ProviderSpec::new("feed").with_reload(Arc::new(FixedPoolTask {
                label: "ipv4".to_string(),
                pools: pool_set("203.0.113.0/24"),
                calls: calls.clone(),
            })))
            .unwrap();

        assert_eq!(engine.lookup("203.0.113.7"), None);

        let report = engine.reload_all().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.succeeded(), 1);
        assert!(report.is_fully_successful());

        // The pre-reload negative was invalidated by the cache clear.
        assert_eq!(engine.lookup("203.0.113.7"), Some("feed".to_string()));

        let status = engine.provider_status("feed").unwrap();
        assert_eq!(status.state, ProviderState::Ready);
        assert!(status.last_updated.is_some());
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn failure_is_recorded_without_aborting_the_call() {
        let engine = engine();
        engine
            .add_provider(ProviderSpec::new("broken").with_reload(Arc::new(FailingTask)))
            .unwrap();

        let report = engine.reload_all().await;
        assert_eq!(report.failed(), 1);
        assert!(!report.is_fully_successful());
        assert_eq!(report.failures().count(), 1);

        let status = engine.provider_status("broken").unwrap();
        assert_eq!(status.state, ProviderState::Error);
        assert!(status.last_error.as_deref().unwrap().contains("connection refused"));
        assert!(status.last_updated.is_none());
    }

    #[tokio::test]
    async fn panicking_task_is_contained() {
        let engine = engine();
        engine
            .add_provider(ProviderSpec::new("buggy").with_reload(Arc::new(PanickingTask)))
            .unwrap();
        engine
            .add_provider(ProviderSpec::new("healthy").with_reload(Arc::new(FixedPoolTask {
                label: "ipv4".to_string(),
                pools: pool_set("198.51.100.0/24"),
                calls: Arc::new(AtomicUsize::new(0)),
            })))
            .unwrap();

        let report = engine.reload_all().await;
        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 1);

        let failed = report.failures().next().unwrap();
        assert_eq!(failed.provider, "buggy");
        assert_eq!(
            engine.provider_status("buggy").unwrap().state,
            ProviderState::Error
        );
        assert_eq!(
            engine.provider_status("healthy").unwrap().state,
            ProviderState::Ready
        );
    }

    #[tokio::test]
    async fn providers_without_capability_are_skipped() {
        let engine = engine();
        engine
            .add_provider(
                ProviderSpec::new("static")
                    .with_ipv4(AddressPool::new(vec![], vec!["10.0.0.0/8".to_string()])),
            )
            .unwrap();

        let report = engine.reload_all().await;
        assert!(report.outcomes.is_empty());

        let status = engine.provider_status("static").unwrap();
        assert_eq!(status.state, ProviderState::Ready);
        assert!(status.last_updated.is_none());
    }

    #[tokio::test]
    async fn multi_task_provider_settles_every_task() {
        let engine = engine();
        let calls = Arc::new(AtomicUsize::new(0));
        engine
            .add_provider(ProviderSpec::new("dual").with_reload_tasks(vec![
                Arc::new(FixedPoolTask {
                    label: "ipv4".to_string(),
                    pools: pool_set("203.0.113.0/24"),
                    calls: calls.clone(),
                }) as Arc<dyn ReloadTask>,
                Arc::new(FailingTask),
            ]))
            .unwrap();

        let report = engine.reload_all().await;
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
