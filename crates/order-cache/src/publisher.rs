//! Change publisher
//!
//! Decouples the rate of index mutations from the rate of subscriber
//! callbacks. Accepted changes go into an unbounded FIFO queue; a periodic
//! task drains the whole queue and invokes every subscriber once per change,
//! in enqueue order.
//!
//! Lock order is queue, then subscribers. The drain lock is re-entrant so a
//! callback may remove itself, or tear the publisher down, from inside
//! `on_change`.

use crate::error::{CacheError, CacheResult};
use crate::types::{ChangeKind, Order, OrderChange};
use chrono::Utc;
use observability::CacheMetrics;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Default time between drains
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_millis(250);

/// Receives published changes
///
/// Called from the drain task; keep it quick. Any `Fn(&OrderChange)` closure
/// that is `Send + Sync` is a subscriber.
pub trait ChangeSubscriber: Send + Sync {
    fn on_change(&self, change: &OrderChange);
}

impl<F> ChangeSubscriber for F
where
    F: Fn(&OrderChange) + Send + Sync,
{
    fn on_change(&self, change: &OrderChange) {
        self(change)
    }
}

/// Handle returned by [`ChangePublisher::add_subscriber`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Registration {
    id: SubscriberId,
    /// First sequence number this subscriber may see
    since: u64,
    subscriber: Arc<dyn ChangeSubscriber>,
}

#[derive(Default)]
struct Queue {
    items: VecDeque<OrderChange>,
    next_sequence: u64,
}

/// Rate-bounded, ordered relay from the dispatcher to subscribers
pub struct ChangePublisher {
    queue: Mutex<Queue>,
    subscribers: RwLock<Vec<Registration>>,
    next_subscriber: AtomicU64,
    drain_lock: ReentrantMutex<()>,
    closed: AtomicBool,
    started: AtomicBool,
    cancel: CancellationToken,
    interval: Duration,
    metrics: CacheMetrics,
}

impl ChangePublisher {
    /// Create a publisher that drains every `interval` once started
    pub fn new(interval: Duration, metrics: CacheMetrics) -> Self {
        Self {
            queue: Mutex::new(Queue::default()),
            subscribers: RwLock::new(Vec::new()),
            next_subscriber: AtomicU64::new(1),
            drain_lock: ReentrantMutex::new(()),
            closed: AtomicBool::new(false),
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            interval,
            metrics,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Spawn the periodic drain task
    ///
    /// The first drain happens one interval from now. Returns `None` if the
    /// task is already running or the publisher was ended. Must be called
    /// from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.is_closed() || self.started.swap(true, Ordering::AcqRel) {
            return None;
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let publisher: Weak<Self> = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        info!(interval_ms = self.interval.as_millis() as u64, "Change publisher started");

        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        match publisher.upgrade() {
                            Some(p) => {
                                p.drain();
                            }
                            None => break,
                        }
                    }
                }
            }
            debug!("Change publisher drain task stopped");
        }))
    }

    /// Register a subscriber
    ///
    /// It only sees changes enqueued after this call returns.
    pub fn add_subscriber(&self, subscriber: Arc<dyn ChangeSubscriber>) -> CacheResult<SubscriberId> {
        if self.is_closed() {
            return Err(CacheError::PublisherClosed);
        }

        let id = SubscriberId(self.next_subscriber.fetch_add(1, Ordering::Relaxed));
        let queue = self.queue.lock();
        self.subscribers.write().push(Registration {
            id,
            since: queue.next_sequence,
            subscriber,
        });
        drop(queue);

        debug!(subscriber = %id, "Subscriber added");
        Ok(id)
    }

    /// Deregister a subscriber
    ///
    /// Once this returns the subscriber is never invoked again. If a drain
    /// is in flight on another thread this waits for it to finish.
    pub fn remove_subscriber(&self, id: SubscriberId) -> bool {
        let removed = {
            let mut subscribers = self.subscribers.write();
            let before = subscribers.len();
            subscribers.retain(|r| r.id != id);
            subscribers.len() != before
        };

        let _drain = self.drain_lock.lock();
        if removed {
            debug!(subscriber = %id, "Subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Changes waiting for the next drain
    pub fn pending(&self) -> usize {
        self.queue.lock().items.len()
    }

    /// Queue a change; discarded once the publisher is ended
    ///
    /// Returns the sequence number assigned, if queued.
    pub fn enqueue(&self, kind: ChangeKind, order: Order) -> Option<u64> {
        if self.is_closed() {
            return None;
        }

        let mut queue = self.queue.lock();
        let sequence = queue.next_sequence;
        queue.next_sequence += 1;
        queue.items.push_back(OrderChange {
            sequence,
            kind,
            order,
            queued_at: Utc::now(),
        });
        self.metrics.set_queue_depth(queue.items.len());
        Some(sequence)
    }

    /// Deliver everything queued so far
    ///
    /// Each change goes to every eligible subscriber, in registration
    /// order, before the next change is delivered. Returns the number of
    /// callback invocations.
    pub fn drain(&self) -> u64 {
        let _drain = self.drain_lock.lock();

        let batch = std::mem::take(&mut self.queue.lock().items);
        if batch.is_empty() {
            return 0;
        }
        self.metrics.set_queue_depth(0);

        let mut invocations = 0u64;
        for change in &batch {
            let targets: Vec<(SubscriberId, Arc<dyn ChangeSubscriber>)> = self
                .subscribers
                .read()
                .iter()
                .filter(|r| change.sequence >= r.since)
                .map(|r| (r.id, Arc::clone(&r.subscriber)))
                .collect();

            for (id, subscriber) in targets {
                // An earlier callback in this batch may have removed it
                if !self.is_registered(id) {
                    continue;
                }
                let outcome = catch_unwind(AssertUnwindSafe(|| subscriber.on_change(change)));
                invocations += 1;
                if outcome.is_err() {
                    error!(
                        subscriber = %id,
                        order_id = %change.order.id,
                        sequence = change.sequence,
                        "Subscriber panicked while handling change"
                    );
                }
            }
        }

        trace!(changes = batch.len(), invocations, "Drain complete");
        self.metrics.record_drain(invocations);
        invocations
    }

    /// Tear the publisher down
    ///
    /// Clears subscribers, stops the drain task and discards anything still
    /// queued. Idempotent; always acknowledges.
    pub fn end(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        self.cancel.cancel();

        let _drain = self.drain_lock.lock();
        self.subscribers.write().clear();
        let discarded = {
            let mut queue = self.queue.lock();
            let n = queue.items.len();
            queue.items.clear();
            n
        };
        self.metrics.set_queue_depth(0);

        if first {
            info!(discarded, "Change publisher ended");
        }
        true
    }

    fn is_registered(&self, id: SubscriberId) -> bool {
        self.subscribers.read().iter().any(|r| r.id == id)
    }
}

impl Drop for ChangePublisher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
