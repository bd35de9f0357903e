//! The cache context object
//!
//! Owns the index, the publisher, the dispatcher and the ingest task.
//! Construct one per process (or per test) and share it behind an `Arc`.

use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::error::{CacheError, CacheResult};
use crate::index::{OrderIndex, SideBook};
use crate::publisher::{ChangePublisher, ChangeSubscriber, SubscriberId, DEFAULT_DRAIN_INTERVAL};
use crate::reconciler::{BootstrapReport, Reconciler};
use crate::sources::{LiveEventSource, SnapshotSource};
use crate::types::{Order, RawEvent};
use common::{CurrencyKey, ItemKey, OrderId, OwnerKey, Side};
use observability::CacheMetrics;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Tunables for [`MarketplaceCache`]
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Time between publisher drains
    pub drain_interval: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            drain_interval: DEFAULT_DRAIN_INTERVAL,
        }
    }
}

/// Queryable mirror of every open marketplace order
///
/// # Example
///
/// ```ignore
/// let cache = MarketplaceCache::new(snapshot, live, CacheOptions::default());
/// let items = cache.initialize().await?;
/// let asks = cache.orders_for_item(Side::Sell, &ItemKey::from("item-1"));
/// ```
pub struct MarketplaceCache {
    index: Arc<RwLock<OrderIndex>>,
    publisher: Arc<ChangePublisher>,
    dispatcher: EventDispatcher,
    reconciler: Reconciler,
    initialized: AtomicBool,
    report: Mutex<Option<BootstrapReport>>,
    ingest_cancel: CancellationToken,
}

impl MarketplaceCache {
    pub fn new(
        snapshot: Arc<dyn SnapshotSource>,
        live: Arc<dyn LiveEventSource>,
        options: CacheOptions,
    ) -> Self {
        let metrics = CacheMetrics::new();
        let index = Arc::new(RwLock::new(OrderIndex::new()));
        let publisher = Arc::new(ChangePublisher::new(options.drain_interval, metrics.clone()));
        let dispatcher = EventDispatcher::new(Arc::clone(&index), Arc::clone(&publisher), metrics.clone());
        let reconciler = Reconciler::new(Arc::clone(&index), dispatcher.clone(), snapshot, live, metrics);

        Self {
            index,
            publisher,
            dispatcher,
            reconciler,
            initialized: AtomicBool::new(false),
            report: Mutex::new(None),
            ingest_cancel: CancellationToken::new(),
        }
    }

    /// Start the publisher and bootstrap the index
    ///
    /// Returns the number of distinct items observed. Source failures are
    /// logged and degrade the cache rather than failing this call.
    pub async fn initialize(&self) -> CacheResult<usize> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(CacheError::AlreadyInitialized);
        }

        let _drain_task = self.publisher.start();
        let (report, _ingest) = self.reconciler.bootstrap(self.ingest_cancel.child_token()).await;
        let distinct_items = report.distinct_items;
        *self.report.lock() = Some(report);
        Ok(distinct_items)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// What bootstrap found, once it has run
    pub fn bootstrap_report(&self) -> Option<BootstrapReport> {
        self.report.lock().clone()
    }

    pub fn add_subscriber(&self, subscriber: Arc<dyn ChangeSubscriber>) -> CacheResult<SubscriberId> {
        self.publisher.add_subscriber(subscriber)
    }

    pub fn remove_subscriber(&self, id: SubscriberId) -> bool {
        self.publisher.remove_subscriber(id)
    }

    /// Apply an event outside the live stream, through the same path
    pub fn apply(&self, event: RawEvent) -> DispatchOutcome {
        self.dispatcher.dispatch(event)
    }

    /// Deliver queued changes now instead of waiting for the next tick
    pub fn drain_now(&self) -> u64 {
        self.publisher.drain()
    }

    /// Borrow the index directly
    ///
    /// Writers wait while the guard is alive, so do not hold it across an await.
    pub fn read_index(&self) -> RwLockReadGuard<'_, OrderIndex> {
        self.index.read()
    }

    pub fn get_order(&self, id: &OrderId) -> Option<Order> {
        self.index.read().get(id).cloned()
    }

    pub fn all_open_orders(&self) -> HashMap<OrderId, Order> {
        self.index.read().all_orders().clone()
    }

    pub fn open_order_count(&self) -> usize {
        self.index.read().len()
    }

    pub fn orders_by_side(&self, side: Side) -> SideBook {
        self.index.read().orders_by_side(side).clone()
    }

    pub fn orders_for_item(&self, side: Side, item: &ItemKey) -> HashMap<OrderId, Order> {
        self.index.read().by_item_and_side(side, item).clone()
    }

    pub fn orders_for_item_both_sides(&self, item: &ItemKey) -> HashMap<OrderId, Order> {
        self.index
            .read()
            .by_item_both_sides(item)
            .into_iter()
            .map(|(id, order)| (id.clone(), order.clone()))
            .collect()
    }

    pub fn orders_for_item_and_currency(&self, side: Side, item: &ItemKey, currency: &CurrencyKey) -> Vec<Order> {
        let index = self.index.read();
        let orders: Vec<Order> =
            OrderIndex::filter_by_currency(currency, index.by_item_and_side(side, item).values())
                .into_iter()
                .cloned()
                .collect();
        orders
    }

    pub fn orders_by_owner(&self, owner: &OwnerKey) -> Vec<Order> {
        self.index.read().by_owner(owner).into_iter().cloned().collect()
    }

    pub fn distinct_item_keys(&self) -> Vec<ItemKey> {
        self.index.read().distinct_item_keys().cloned().collect()
    }

    /// Tear down the publisher
    ///
    /// Subscribers are cleared and queued changes dropped. Live ingestion
    /// keeps running, so the index stays fresh and queryable.
    pub fn shutdown(&self) -> bool {
        let ack = self.publisher.end();
        info!(open_orders = self.open_order_count(), "Order cache shut down");
        ack
    }
}

impl Drop for MarketplaceCache {
    fn drop(&mut self) {
        self.ingest_cancel.cancel();
    }
}
