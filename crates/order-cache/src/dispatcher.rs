//! Event dispatcher
//!
//! The only path that mutates the index once the cache is running. Each
//! event is applied and its change queued while the write lock is held, so
//! the publisher queue is always in mutation order.

use crate::index::OrderIndex;
use crate::publisher::ChangePublisher;
use crate::types::{ChangeKind, RawEvent};
use observability::CacheMetrics;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace};

/// What the dispatcher did with one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Applied to the index and queued under this kind
    Applied(ChangeKind),
    /// No order payload; ignored
    Dropped,
}

/// Routes raw events to index mutations
#[derive(Clone)]
pub struct EventDispatcher {
    index: Arc<RwLock<OrderIndex>>,
    publisher: Arc<ChangePublisher>,
    metrics: CacheMetrics,
}

impl EventDispatcher {
    pub fn new(index: Arc<RwLock<OrderIndex>>, publisher: Arc<ChangePublisher>, metrics: CacheMetrics) -> Self {
        Self { index, publisher, metrics }
    }

    /// Apply one event
    ///
    /// Any add or modify that leaves nothing to fill is a removal. Removals
    /// are published even when the id was never indexed.
    pub fn dispatch(&self, event: RawEvent) -> DispatchOutcome {
        let Some(order) = event.order else {
            self.metrics.record_dropped();
            debug!(kind = %event.kind, "Dropping event without order payload");
            return DispatchOutcome::Dropped;
        };

        let mut index = self.index.write();
        let published = match event.kind {
            ChangeKind::Added | ChangeKind::Modified if !order.is_live() => {
                index.remove(&order.id);
                ChangeKind::Removed
            }
            ChangeKind::Added => {
                index.upsert(order.clone());
                ChangeKind::Added
            }
            ChangeKind::Modified => {
                index.upsert(order.clone());
                ChangeKind::Modified
            }
            ChangeKind::Removed => {
                index.remove(&order.id);
                ChangeKind::Removed
            }
        };

        trace!(
            order_id = %order.id,
            item = %order.item_key,
            side = %order.side,
            qty_remaining = order.qty_remaining,
            received = %event.kind,
            applied = %published,
            "Event applied"
        );

        self.publisher.enqueue(published, order);
        let open_orders = index.len();
        drop(index);

        self.metrics.record_event(published.as_str());
        self.metrics.set_open_orders(open_orders);
        DispatchOutcome::Applied(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::DEFAULT_DRAIN_INTERVAL;
    use crate::types::fixtures::order;
    use crate::types::OrderChange;
    use common::{ItemKey, OrderId, Side};
    use parking_lot::Mutex;

    struct Harness {
        index: Arc<RwLock<OrderIndex>>,
        publisher: Arc<ChangePublisher>,
        dispatcher: EventDispatcher,
        seen: Arc<Mutex<Vec<OrderChange>>>,
    }

    fn harness() -> Harness {
        let metrics = CacheMetrics::new();
        let index = Arc::new(RwLock::new(OrderIndex::new()));
        let publisher = Arc::new(ChangePublisher::new(DEFAULT_DRAIN_INTERVAL, metrics.clone()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        publisher
            .add_subscriber(Arc::new(move |c: &OrderChange| sink.lock().push(c.clone())))
            .unwrap();
        let dispatcher = EventDispatcher::new(Arc::clone(&index), Arc::clone(&publisher), metrics);
        Harness { index, publisher, dispatcher, seen }
    }

    #[test]
    fn test_added_inserts_and_queues() {
        let h = harness();
        let outcome = h.dispatcher.dispatch(RawEvent::added(order("o1", Side::Sell, "item-1", 5)));

        assert_eq!(outcome, DispatchOutcome::Applied(ChangeKind::Added));
        assert!(h.index.read().contains(&OrderId::from("o1")));
        assert_eq!(h.publisher.pending(), 1);
    }

    #[test]
    fn test_modified_to_zero_removes() {
        let h = harness();
        h.dispatcher.dispatch(RawEvent::added(order("o1", Side::Sell, "item-1", 5)));
        let outcome = h.dispatcher.dispatch(RawEvent::modified(order("o1", Side::Sell, "item-1", 0)));

        assert_eq!(outcome, DispatchOutcome::Applied(ChangeKind::Removed));
        let index = h.index.read();
        assert!(index.get(&"o1".into()).is_none());
        assert!(index.by_item_and_side(Side::Sell, &ItemKey::from("item-1")).is_empty());
        index.assert_consistent();
    }

    #[test]
    fn test_modified_partial_fill_updates() {
        let h = harness();
        h.dispatcher.dispatch(RawEvent::added(order("o1", Side::Buy, "item-1", 5)));
        let outcome = h.dispatcher.dispatch(RawEvent::modified(order("o1", Side::Buy, "item-1", 2)));

        assert_eq!(outcome, DispatchOutcome::Applied(ChangeKind::Modified));
        assert_eq!(h.index.read().get(&"o1".into()).unwrap().qty_remaining, 2);
    }

    #[test]
    fn test_added_with_zero_quantity_is_never_stored() {
        let h = harness();
        let outcome = h.dispatcher.dispatch(RawEvent::added(order("o1", Side::Buy, "item-1", 0)));
        assert_eq!(outcome, DispatchOutcome::Applied(ChangeKind::Removed));
        assert!(h.index.read().is_empty());
    }

    #[test]
    fn test_removal_of_unknown_id_still_published() {
        let h = harness();
        let outcome = h.dispatcher.dispatch(RawEvent::removed(order("ghost", Side::Buy, "item-1", 3)));

        assert_eq!(outcome, DispatchOutcome::Applied(ChangeKind::Removed));
        h.publisher.drain();
        let seen = h.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, ChangeKind::Removed);
        assert_eq!(seen[0].order.id.as_str(), "ghost");
    }

    #[test]
    fn test_missing_payload_is_dropped() {
        let h = harness();
        let outcome = h.dispatcher.dispatch(RawEvent { kind: ChangeKind::Modified, order: None });

        assert_eq!(outcome, DispatchOutcome::Dropped);
        assert_eq!(h.publisher.pending(), 0);
        assert!(h.index.read().is_empty());
    }

    #[test]
    fn test_queue_follows_mutation_order() {
        let h = harness();
        h.dispatcher.dispatch(RawEvent::added(order("o1", Side::Buy, "item-1", 5)));
        h.dispatcher.dispatch(RawEvent::modified(order("o1", Side::Buy, "item-1", 4)));
        h.dispatcher.dispatch(RawEvent::removed(order("o1", Side::Buy, "item-1", 4)));
        h.publisher.drain();

        let kinds: Vec<ChangeKind> = h.seen.lock().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Added, ChangeKind::Modified, ChangeKind::Removed]);
        let sequences: Vec<u64> = h.seen.lock().iter().map(|c| c.sequence).collect();
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));
    }
}
