//! Reconciliation controller
//!
//! Merges the one-shot snapshot and the live stream into the index. The
//! live subscription is armed first so nothing falls in the gap before the
//! snapshot is taken; both sources then go through the dispatcher, whose
//! mutations are idempotent, so whichever arrives last wins.

use crate::dispatcher::EventDispatcher;
use crate::index::OrderIndex;
use crate::sources::{EventStream, LiveEventSource, SnapshotSource};
use crate::types::RawEvent;
use observability::CacheMetrics;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of a bootstrap
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    /// Orders in the index when bootstrap finished
    pub open_orders: usize,
    pub distinct_items: usize,
    /// Rows returned by the snapshot source, zero on failure
    pub snapshot_rows: usize,
    pub snapshot_failed: bool,
    pub live_armed: bool,
}

/// Bootstraps the index from its two sources
pub struct Reconciler {
    index: Arc<RwLock<OrderIndex>>,
    dispatcher: EventDispatcher,
    snapshot: Arc<dyn SnapshotSource>,
    live: Arc<dyn LiveEventSource>,
    metrics: CacheMetrics,
}

impl Reconciler {
    pub fn new(
        index: Arc<RwLock<OrderIndex>>,
        dispatcher: EventDispatcher,
        snapshot: Arc<dyn SnapshotSource>,
        live: Arc<dyn LiveEventSource>,
        metrics: CacheMetrics,
    ) -> Self {
        Self {
            index,
            dispatcher,
            snapshot,
            live,
            metrics,
        }
    }

    /// Arm the live stream, then load the snapshot
    ///
    /// Neither source failing is fatal. Returns the report and the ingest
    /// task handle when the live stream was armed; the task runs until the
    /// stream closes or `cancel` fires.
    #[instrument(skip_all)]
    pub async fn bootstrap(&self, cancel: CancellationToken) -> (BootstrapReport, Option<JoinHandle<()>>) {
        let ingest = match self.live.subscribe().await {
            Ok(stream) => {
                debug!("Live subscription armed");
                Some(tokio::spawn(ingest(stream, self.dispatcher.clone(), cancel)))
            }
            Err(e) => {
                error!(error = %e, "Live subscription failed, continuing with snapshot only");
                None
            }
        };

        let (snapshot_rows, snapshot_failed) = match self.snapshot.fetch_all_open_orders().await {
            Ok(rows) => {
                let count = rows.len();
                for row in rows {
                    self.dispatcher.dispatch(RawEvent::added(row));
                }
                self.metrics.record_snapshot(count);
                (count, false)
            }
            Err(e) => {
                self.metrics.record_snapshot_failure();
                error!(error = %e, "Snapshot fetch failed, continuing with live events only");
                (0, true)
            }
        };

        let report = {
            let index = self.index.read();
            BootstrapReport {
                open_orders: index.len(),
                distinct_items: index.distinct_item_count(),
                snapshot_rows,
                snapshot_failed,
                live_armed: ingest.is_some(),
            }
        };

        if report.snapshot_failed && !report.live_armed {
            warn!("Both sources unavailable, cache is empty");
        }
        info!(
            open_orders = report.open_orders,
            distinct_items = report.distinct_items,
            snapshot_rows = report.snapshot_rows,
            live_armed = report.live_armed,
            "Bootstrap complete"
        );

        (report, ingest)
    }
}

/// Drain the live stream into the dispatcher
async fn ingest(mut stream: EventStream, dispatcher: EventDispatcher, cancel: CancellationToken) {
    let mut received = 0u64;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = stream.recv() => match event {
                Some(event) => {
                    received += 1;
                    dispatcher.dispatch(event);
                }
                None => {
                    info!(received, "Live event stream closed");
                    return;
                }
            }
        }
    }
    debug!(received, "Live ingestion cancelled");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{ChangePublisher, DEFAULT_DRAIN_INTERVAL};
    use crate::sources::memory::{ChannelEventSource, InMemorySnapshotSource};
    use crate::types::fixtures::order;
    use common::Side;
    use std::time::Duration;

    fn reconciler(
        snapshot: InMemorySnapshotSource,
        live: impl LiveEventSource + 'static,
    ) -> (Reconciler, Arc<RwLock<OrderIndex>>) {
        let metrics = CacheMetrics::new();
        let index = Arc::new(RwLock::new(OrderIndex::new()));
        let publisher = Arc::new(ChangePublisher::new(DEFAULT_DRAIN_INTERVAL, metrics.clone()));
        let dispatcher = EventDispatcher::new(Arc::clone(&index), publisher, metrics.clone());
        let reconciler = Reconciler::new(
            Arc::clone(&index),
            dispatcher,
            Arc::new(snapshot),
            Arc::new(live),
            metrics,
        );
        (reconciler, index)
    }

    #[tokio::test]
    async fn test_snapshot_rows_are_indexed() {
        let (live, _tx) = ChannelEventSource::new();
        let snapshot = InMemorySnapshotSource::new(vec![
            order("o1", Side::Sell, "item-1", 5),
            order("o2", Side::Buy, "item-2", 1),
        ]);
        let (reconciler, index) = reconciler(snapshot, live);

        let (report, ingest) = reconciler.bootstrap(CancellationToken::new()).await;
        assert_eq!(
            report,
            BootstrapReport {
                open_orders: 2,
                distinct_items: 2,
                snapshot_rows: 2,
                snapshot_failed: false,
                live_armed: true,
            }
        );
        assert!(ingest.is_some());
        index.read().assert_consistent();
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_failure_degrades_to_live_only() {
        let (live, tx) = ChannelEventSource::new();
        let snapshot = InMemorySnapshotSource::failing("rpc down").with_delay(Duration::from_millis(50));
        let (reconciler, index) = reconciler(snapshot, live);

        // Delivered while the snapshot request is in flight
        tx.send(RawEvent::added(order("o9", Side::Buy, "item-9", 3))).unwrap();
        let (report, _ingest) = reconciler.bootstrap(CancellationToken::new()).await;

        assert!(report.snapshot_failed);
        assert!(report.live_armed);
        assert_eq!(report.open_orders, 1);
        assert!(index.read().contains(&"o9".into()));
    }

    #[tokio::test]
    async fn test_subscription_failure_keeps_snapshot() {
        let snapshot = InMemorySnapshotSource::new(vec![order("o1", Side::Sell, "item-1", 5)]);
        let (reconciler, _index) = reconciler(snapshot, ChannelEventSource::failing("ws refused"));

        let (report, ingest) = reconciler.bootstrap(CancellationToken::new()).await;
        assert!(!report.live_armed);
        assert!(ingest.is_none());
        assert_eq!(report.open_orders, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_event_before_snapshot_row_is_overwritten() {
        let (live, tx) = ChannelEventSource::new();
        let snapshot = InMemorySnapshotSource::new(vec![order("o1", Side::Sell, "item-1", 5)])
            .with_delay(Duration::from_millis(50));
        let (reconciler, index) = reconciler(snapshot, live);

        tx.send(RawEvent::added(order("o1", Side::Sell, "item-1", 8))).unwrap();
        reconciler.bootstrap(CancellationToken::new()).await;

        // Snapshot row arrived last
        assert_eq!(index.read().get(&"o1".into()).unwrap().qty_remaining, 5);
    }

    #[tokio::test]
    async fn test_ingest_stops_on_cancel() {
        let (live, tx) = ChannelEventSource::new();
        let (reconciler, index) = reconciler(InMemorySnapshotSource::default(), live);
        let cancel = CancellationToken::new();

        let (_, ingest) = reconciler.bootstrap(cancel.clone()).await;
        cancel.cancel();
        ingest.unwrap().await.unwrap();

        // Nobody is reading any more
        let _ = tx.send(RawEvent::added(order("late", Side::Buy, "item-1", 1)));
        tokio::task::yield_now().await;
        assert!(index.read().is_empty());
    }
}
