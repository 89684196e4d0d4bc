//! Per-user sequential dispatch
//!
//! Each user external id gets its own worker task fed by a bounded mpsc
//! queue, so one user's events are handled strictly in arrival order while
//! different users run in parallel. The routing table sits behind a
//! `std::sync::Mutex` that is never held across an `.await`.
//!
//! Idle workers retire after `worker_idle`. A retiring worker leaves the
//! routing table, closes its queue and drains what was already queued; a
//! send that lands on the closed queue gets its event back and is routed to
//! a fresh worker, which waits for the retiring one to finish first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use photosku_common::config::DispatcherConfig;
use photosku_common::db::ExternalId;
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, info, warn};

use super::ConversationEngine;
use crate::transport::{InboundEvent, Outbound};

#[derive(Debug, Clone, Copy)]
pub struct DispatcherSettings {
    pub queue_capacity: usize,
    pub worker_idle: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self::from(&DispatcherConfig::default())
    }
}

impl From<&DispatcherConfig> for DispatcherSettings {
    fn from(config: &DispatcherConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity.max(1),
            worker_idle: Duration::from_secs(config.worker_idle_secs),
        }
    }
}

struct WorkerSlot {
    generation: u64,
    sender: mpsc::Sender<InboundEvent>,
}

#[derive(Default)]
struct Registry {
    workers: HashMap<ExternalId, WorkerSlot>,
    /// Completion signal of a worker that is draining after retirement
    retiring: HashMap<ExternalId, (u64, oneshot::Receiver<()>)>,
    next_generation: u64,
    closed: bool,
}

struct Inner {
    engine: Arc<ConversationEngine>,
    outbound: Arc<dyn Outbound>,
    settings: DispatcherSettings,
    registry: Mutex<Registry>,
    active: AtomicUsize,
    worker_exited: Notify,
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn process(&self, event: InboundEvent) {
        let external_id = event.user.external_id;
        let replies = self.engine.handle(&event).await;

        for reply in replies {
            if let Err(e) = self.outbound.deliver(external_id, reply).await {
                warn!(external_id, error = %e, "Failed to deliver reply");
            }
        }
    }
}

/// Decrements the live worker count when a worker task ends
struct ActiveWorker(Arc<Inner>);

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
        self.0.worker_exited.notify_waiters();
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<ConversationEngine>,
        outbound: Arc<dyn Outbound>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                outbound,
                settings,
                registry: Mutex::new(Registry::default()),
                active: AtomicUsize::new(0),
                worker_exited: Notify::new(),
            }),
        }
    }

    /// Queue an event on its user's worker.
    ///
    /// Waits only for queue space, not for processing. Events arriving after
    /// [`Dispatcher::shutdown`] are dropped.
    pub async fn dispatch(&self, event: InboundEvent) {
        let external_id = event.user.external_id;
        let mut event = event;

        loop {
            let Some(sender) = self.sender_for(external_id) else {
                warn!(external_id, "Dispatcher is shut down, dropping event");
                return;
            };

            match sender.send(event).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    debug!(external_id, "Worker retired during send, rerouting");
                    event = returned;
                }
            }
        }
    }

    /// Number of live worker tasks
    pub fn active_workers(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Stop accepting events and wait up to `timeout` for every worker to
    /// finish its queue. Returns `false` on timeout.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let workers = {
            let mut registry = self.inner.registry();
            registry.closed = true;
            std::mem::take(&mut registry.workers)
        };
        info!("Draining {} dispatcher worker(s)", workers.len());
        drop(workers);

        let drained = async {
            loop {
                let exited = self.inner.worker_exited.notified();
                if self.inner.active.load(Ordering::SeqCst) == 0 {
                    break;
                }
                exited.await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }

    fn sender_for(&self, external_id: ExternalId) -> Option<mpsc::Sender<InboundEvent>> {
        let mut registry = self.inner.registry();
        if registry.closed {
            return None;
        }

        if let Some(slot) = registry.workers.get(&external_id) {
            if !slot.sender.is_closed() {
                return Some(slot.sender.clone());
            }
        }

        registry.next_generation += 1;
        let generation = registry.next_generation;
        let (sender, receiver) = mpsc::channel(self.inner.settings.queue_capacity);
        let predecessor = registry.retiring.remove(&external_id).map(|(_, done)| done);
        registry.workers.insert(
            external_id,
            WorkerSlot {
                generation,
                sender: sender.clone(),
            },
        );

        self.inner.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveWorker(self.inner.clone());
        tokio::spawn(run_worker(guard, external_id, generation, receiver, predecessor));

        Some(sender)
    }
}

async fn run_worker(
    guard: ActiveWorker,
    external_id: ExternalId,
    generation: u64,
    mut receiver: mpsc::Receiver<InboundEvent>,
    predecessor: Option<oneshot::Receiver<()>>,
) {
    let inner = guard.0.clone();
    if let Some(done) = predecessor {
        // Either outcome means the previous worker is gone
        let _ = done.await;
    }
    debug!(external_id, generation, "Worker started");

    loop {
        match tokio::time::timeout(inner.settings.worker_idle, receiver.recv()).await {
            Ok(Some(event)) => inner.process(event).await,
            Ok(None) => break,
            Err(_) => {
                retire(&inner, external_id, generation, &mut receiver).await;
                break;
            }
        }
    }

    debug!(external_id, generation, "Worker stopped");
    drop(guard);
}

async fn retire(
    inner: &Inner,
    external_id: ExternalId,
    generation: u64,
    receiver: &mut mpsc::Receiver<InboundEvent>,
) {
    let done = {
        let mut registry = inner.registry();
        if registry
            .workers
            .get(&external_id)
            .is_some_and(|slot| slot.generation == generation)
        {
            registry.workers.remove(&external_id);
        }
        let (done_tx, done_rx) = oneshot::channel();
        registry.retiring.insert(external_id, (generation, done_rx));
        done_tx
    };

    receiver.close();
    while let Some(event) = receiver.recv().await {
        inner.process(event).await;
    }

    {
        let mut registry = inner.registry();
        if registry
            .retiring
            .get(&external_id)
            .is_some_and(|(retiring, _)| *retiring == generation)
        {
            registry.retiring.remove(&external_id);
        }
    }
    let _ = done.send(());
    debug!(external_id, generation, "Worker retired after idle period");
}
