// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-pool event dispatcher.
//!
//! Publishers never block on a slow subscriber: dispatch jobs go through a
//! bounded channel drained by a small worker pool. When the pool is
//! saturated, non-critical events are dropped; critical events (see
//! [`brummer_core::Event::is_critical`]) are dispatched inline on the
//! publisher's own task instead of being lost.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use brummer_core::{Event, EventKind};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Opaque token returned by [`EventBus::subscribe`]; pass to [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

struct Registry {
    by_kind: std::collections::HashMap<EventKind, Vec<Subscription>>,
}

impl Registry {
    fn new() -> Self {
        Self { by_kind: std::collections::HashMap::new() }
    }

    fn snapshot(&self, kind: EventKind) -> Vec<Handler> {
        self.by_kind.get(&kind).map(|subs| subs.iter().map(|s| s.handler.clone()).collect()).unwrap_or_default()
    }
}

struct Inner {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
    job_tx: mpsc::Sender<Event>,
    dropped: AtomicU64,
}

/// The EventBus: a typed publish/subscribe hub shared by every component of
/// an instance (supervisor, log store, error parser, instance server).
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

/// Tunables for [`EventBus::new`].
#[derive(Debug, Clone, Copy)]
pub struct EventBusConfig {
    /// Capacity of the dispatch queue feeding the worker pool.
    pub queue_capacity: usize,
    /// Number of worker tasks draining the queue.
    pub worker_count: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self { queue_capacity: 1024, worker_count: ((cores as f64) * 2.5).ceil() as usize }
    }
}

pub struct EventBusHandle {
    workers: Vec<JoinHandle<()>>,
}

impl EventBus {
    /// Construct a bus and spawn its worker pool. Returns the bus plus a
    /// handle used to shut the pool down gracefully.
    pub fn new(config: EventBusConfig) -> (Self, EventBusHandle) {
        let (job_tx, job_rx) = mpsc::channel(config.queue_capacity.max(1));
        let inner = Arc::new(Inner {
            registry: RwLock::new(Registry::new()),
            next_id: AtomicU64::new(1),
            job_tx,
            dropped: AtomicU64::new(0),
        });

        let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));
        let mut workers = Vec::with_capacity(config.worker_count);
        for _ in 0..config.worker_count {
            let inner = inner.clone();
            let job_rx = job_rx.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = job_rx.lock().await;
                        rx.recv().await
                    };
                    match job {
                        Some(event) => dispatch(&inner, &event),
                        None => break,
                    }
                }
            }));
        }

        (Self { inner }, EventBusHandle { workers })
    }

    /// Register a handler for one event kind. Returns an id that can be
    /// passed to [`EventBus::unsubscribe`], including from inside the
    /// handler itself — dispatch snapshots the handler list before calling
    /// any of them, so unsubscribing never deadlocks on the registry lock.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .registry
            .write()
            .by_kind
            .entry(kind)
            .or_default()
            .push(Subscription { id, handler: Arc::new(handler) });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut registry = self.inner.registry.write();
        for subs in registry.by_kind.values_mut() {
            subs.retain(|s| s.id != id);
        }
    }

    /// Publish an event without blocking the caller.
    ///
    /// Tries to enqueue onto the worker pool. If the queue is full: critical
    /// events are dispatched inline on the calling task (never lost);
    /// everything else is dropped and counted.
    pub fn publish(&self, event: Event) {
        match self.inner.job_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                if event.is_critical() {
                    dispatch(&self.inner, &event);
                } else {
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(kind = ?event.kind(), "eventbus saturated, dropping non-critical event");
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("eventbus publish after shutdown");
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

fn dispatch(inner: &Inner, event: &Event) {
    let handlers = inner.registry.read().snapshot(event.kind());
    for handler in handlers {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| handler(event)));
        if result.is_err() {
            tracing::error!(kind = ?event.kind(), "eventbus handler panicked");
        }
    }
}

impl EventBusHandle {
    /// Stop accepting new dispatch jobs and wait for in-flight handlers to
    /// finish, up to `deadline`. Workers still running past the deadline are
    /// aborted rather than awaited indefinitely.
    pub async fn shutdown(self, deadline: std::time::Duration) {
        let join_all = async {
            for worker in self.workers {
                let _ = worker.await;
            }
        };
        if tokio::time::timeout(deadline, join_all).await.is_err() {
            tracing::warn!("eventbus worker pool did not drain within deadline");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brummer_core::ProcessId;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn sample_log_event() -> Event {
        Event::LogLine {
            process_id: ProcessId::new(),
            process_name: "dev".into(),
            content: "hello".into(),
            is_error: false,
            level: brummer_core::LogLevel::Info,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn publish_reaches_subscribed_handler() {
        let (bus, handle) = EventBus::new(EventBusConfig { queue_capacity: 8, worker_count: 2 });
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe(EventKind::LogLine, move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish(sample_log_event());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn unsubscribed_handler_stops_receiving() {
        let (bus, handle) = EventBus::new(EventBusConfig { queue_capacity: 8, worker_count: 1 });
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let id = bus.subscribe(EventKind::LogLine, move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        });
        bus.unsubscribe(id);
        bus.publish(sample_log_event());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn handler_can_unsubscribe_itself_without_deadlock() {
        let (bus, handle) = EventBus::new(EventBusConfig { queue_capacity: 8, worker_count: 1 });
        let bus2 = bus.clone();
        let id_cell: Arc<parking_lot::Mutex<Option<SubscriptionId>>> = Arc::new(parking_lot::Mutex::new(None));
        let id_cell2 = id_cell.clone();
        let id = bus.subscribe(EventKind::LogLine, move |_| {
            if let Some(id) = *id_cell2.lock() {
                bus2.unsubscribe(id);
            }
        });
        *id_cell.lock() = Some(id);
        bus.publish(sample_log_event());
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn panicking_handler_does_not_stop_worker() {
        let (bus, handle) = EventBus::new(EventBusConfig { queue_capacity: 8, worker_count: 1 });
        bus.subscribe(EventKind::LogLine, |_| panic!("boom"));
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe(EventKind::LogLine, move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish(sample_log_event());
        bus.publish(sample_log_event());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        handle.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn saturated_queue_dispatches_critical_events_inline() {
        let (bus, handle) = EventBus::new(EventBusConfig { queue_capacity: 1, worker_count: 0 });
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe(EventKind::ProcessExited, move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        });
        // Fill the only queue slot first (no worker is draining it).
        bus.publish(sample_log_event());
        let critical = Event::ProcessExited {
            process_id: ProcessId::new(),
            process_name: "dev".into(),
            termination: brummer_core::Termination::Exited(0),
            duration_ms: 1,
        };
        bus.publish(critical);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(bus.dropped_count(), 0);
        handle.shutdown(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn saturated_queue_drops_non_critical_events() {
        let (bus, handle) = EventBus::new(EventBusConfig { queue_capacity: 1, worker_count: 0 });
        bus.publish(sample_log_event());
        bus.publish(sample_log_event());
        assert_eq!(bus.dropped_count(), 1);
        handle.shutdown(Duration::from_millis(50)).await;
    }
}
