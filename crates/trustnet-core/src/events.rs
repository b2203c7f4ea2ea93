//! Lifecycle event feed
//!
//! The engine reports reload progress and staleness through typed events.
//! Observers can attach synchronous callbacks (`on`/`once`/`off`) or pull
//! events from an async stream (`subscribe`). Callbacks run at emission
//! time, outside the hub's locks; a panicking listener is contained and
//! logged without disturbing the emitter or other listeners.
//!
//! Events for the same provider are emitted in causal order. No ordering
//! is guaranteed between events for different providers.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::error;

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A provider's reload fan-out has begun
    ReloadStarted {
        /// Provider name
        provider: String,
    },

    /// One of a provider's reload tasks completed successfully
    ReloadSucceeded {
        /// Provider name
        provider: String,
        /// Completion time
        timestamp: DateTime<Utc>,
    },

    /// One of a provider's reload tasks failed
    ReloadFailed {
        /// Provider name
        provider: String,
        /// Failure description
        error: String,
        /// Failure time
        timestamp: DateTime<Utc>,
    },

    /// A provider's data aged past the staleness threshold
    ProviderStale {
        /// Provider name
        provider: String,
        /// Completion time of the provider's last successful reload
        last_updated: DateTime<Utc>,
        /// How long the provider has gone without a refresh
        stale_for: chrono::Duration,
        /// Sweep time
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// The event's kind, used for listener dispatch
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ReloadStarted { .. } => EventKind::ReloadStarted,
            Event::ReloadSucceeded { .. } => EventKind::ReloadSucceeded,
            Event::ReloadFailed { .. } => EventKind::ReloadFailed,
            Event::ProviderStale { .. } => EventKind::ProviderStale,
        }
    }

    /// The provider this event concerns
    pub fn provider(&self) -> &str {
        match self {
            Event::ReloadStarted { provider }
            | Event::ReloadSucceeded { provider, .. }
            | Event::ReloadFailed { provider, .. }
            | Event::ProviderStale { provider, .. } => provider,
        }
    }
}

/// Event kinds, one per [`Event`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ReloadStarted,
    ReloadSucceeded,
    ReloadFailed,
    ProviderStale,
}

/// Handle returned by [`EventHub::on`]/[`EventHub::once`], used to detach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

struct Subscription {
    id: u64,
    once: bool,
    callback: Callback,
}

/// Subscription hub for engine lifecycle events
#[derive(Default)]
pub struct EventHub {
    listeners: RwLock<HashMap<EventKind, Vec<Subscription>>>,
    streams: Mutex<Vec<mpsc::UnboundedSender<Event>>>,
    next_id: AtomicU64,
}

impl EventHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener for one event kind; fires on every emission
    pub fn on(
        &self,
        kind: EventKind,
        listener: impl Fn(&Event) + Send + Sync + 'static,
    ) -> ListenerId {
        self.attach(kind, false, Arc::new(listener))
    }

    /// Attach a listener that fires at most once, then detaches itself
    pub fn once(
        &self,
        kind: EventKind,
        listener: impl Fn(&Event) + Send + Sync + 'static,
    ) -> ListenerId {
        self.attach(kind, true, Arc::new(listener))
    }

    /// Detach a listener; returns false if it was already gone
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap();
        for subs in listeners.values_mut() {
            let before = subs.len();
            subs.retain(|s| s.id != id.0);
            if subs.len() != before {
                return true;
            }
        }
        false
    }

    /// Open an async stream carrying every subsequent event
    pub fn subscribe(&self) -> UnboundedReceiverStream<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push(tx);
        UnboundedReceiverStream::new(rx)
    }

    /// Deliver an event to every matching listener and open stream
    pub fn emit(&self, event: Event) {
        let callbacks: Vec<Callback> = {
            let mut listeners = self.listeners.write().unwrap();
            match listeners.get_mut(&event.kind()) {
                Some(subs) => {
                    let callbacks = subs.iter().map(|s| s.callback.clone()).collect();
                    subs.retain(|s| !s.once);
                    callbacks
                }
                None => Vec::new(),
            }
        };

        // Callbacks run outside the lock so they may re-enter the hub.
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                error!(event = ?event.kind(), "event listener panicked");
            }
        }

        let mut streams = self.streams.lock().unwrap();
        streams.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn attach(&self, kind: EventKind, once: bool, callback: Callback) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.listeners.write().unwrap();
        listeners.entry(kind).or_default().push(Subscription {
            id,
            once,
            callback,
        });
        ListenerId(id)
    }

    #[cfg(test)]
    fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap()
            .get(&kind)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}
