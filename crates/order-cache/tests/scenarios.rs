//! End-to-end behaviour of the order cache through its public API
//!
//! Covers:
//! - Snapshot bootstrap and per-item lookups
//! - Fill-to-zero removal arriving on the live stream
//! - Side isolation for a shared item
//! - Timer-bounded notification delivery
//! - Idempotence and arrival-order independence

use common::{CurrencyKey, ItemKey, OrderId, OwnerKey, Side};
use order_cache::{
    CacheOptions, ChangeKind, ChannelEventSource, InMemorySnapshotSource, MarketplaceCache,
    NoLiveEvents, Order, OrderChange, RawEvent,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn order(id: &str, side: Side, item: &str, price: u64, qty: u64) -> Order {
    Order {
        id: OrderId::from(id),
        side,
        owner: OwnerKey::from("owner-1"),
        item_key: ItemKey::from(item),
        currency_key: CurrencyKey::from("cur-1"),
        price,
        qty_remaining: qty,
    }
}

fn recorder(cache: &MarketplaceCache) -> Arc<Mutex<Vec<OrderChange>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    cache
        .add_subscriber(Arc::new(move |c: &OrderChange| sink.lock().push(c.clone())))
        .unwrap();
    seen
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// Every indexed order sits in exactly its own bucket, and nowhere else
fn assert_views_agree(cache: &MarketplaceCache) {
    let index = cache.read_index();
    let mut bucketed = 0;
    for side in Side::ALL {
        for (item, bucket) in index.orders_by_side(side) {
            for (id, order) in bucket {
                bucketed += 1;
                let stored = index.get(id).unwrap();
                assert_eq!(stored, order);
                assert_eq!((stored.side, &stored.item_key), (side, item));
            }
        }
    }
    assert_eq!(bucketed, index.len());
}

#[tokio::test(start_paused = true)]
async fn test_scenario_snapshot_bootstrap_then_fill_to_zero() {
    let (live, tx) = ChannelEventSource::new();
    let cache = MarketplaceCache::new(
        Arc::new(InMemorySnapshotSource::new(vec![order("o1", Side::Sell, "item-1", 100, 5)])),
        Arc::new(live),
        CacheOptions::default(),
    );

    assert_eq!(cache.initialize().await.unwrap(), 1);
    let item = ItemKey::from("item-1");
    let asks = cache.orders_for_item(Side::Sell, &item);
    assert_eq!(asks.len(), 1);
    assert_eq!(asks[&OrderId::from("o1")].qty_remaining, 5);
    assert_eq!(cache.distinct_item_keys(), vec![item.clone()]);

    let seen = recorder(&cache);
    tx.send(RawEvent::modified(order("o1", Side::Sell, "item-1", 100, 0))).unwrap();
    settle().await;

    assert!(cache.get_order(&"o1".into()).is_none());
    assert!(cache.orders_for_item(Side::Sell, &item).is_empty());
    assert_eq!(cache.distinct_item_keys(), vec![item]);
    assert!(seen.lock().is_empty());

    tokio::time::advance(Duration::from_millis(260)).await;
    settle().await;
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, ChangeKind::Removed);
    assert_eq!(seen[0].order.id.as_str(), "o1");
}

#[tokio::test]
async fn test_scenario_opposite_sides_never_collide() {
    let cache = MarketplaceCache::new(
        Arc::new(InMemorySnapshotSource::default()),
        Arc::new(NoLiveEvents),
        CacheOptions::default(),
    );
    cache.initialize().await.unwrap();

    cache.apply(RawEvent::added(order("bid-1", Side::Buy, "item-1", 90, 2)));
    cache.apply(RawEvent::added(order("ask-1", Side::Sell, "item-1", 110, 3)));

    let item = ItemKey::from("item-1");
    let bids = cache.orders_for_item(Side::Buy, &item);
    let asks = cache.orders_for_item(Side::Sell, &item);
    assert_eq!(bids.len(), 1);
    assert_eq!(asks.len(), 1);
    assert!(bids.keys().all(|id| !asks.contains_key(id)));
    assert_eq!(cache.orders_for_item_both_sides(&item).len(), 2);
    assert_views_agree(&cache);
}

#[tokio::test(start_paused = true)]
async fn test_notifications_arrive_only_on_ticks() {
    let cache = MarketplaceCache::new(
        Arc::new(InMemorySnapshotSource::default()),
        Arc::new(NoLiveEvents),
        CacheOptions {
            drain_interval: Duration::from_millis(100),
        },
    );
    cache.initialize().await.unwrap();
    let seen = recorder(&cache);

    // First tick at 100ms; enqueue in between
    tokio::time::advance(Duration::from_millis(30)).await;
    for i in 0..10 {
        cache.apply(RawEvent::added(order(&format!("o{i}"), Side::Buy, "item-1", 10, 1)));
    }
    tokio::time::advance(Duration::from_millis(30)).await;
    settle().await;
    assert!(seen.lock().is_empty());

    tokio::time::advance(Duration::from_millis(45)).await;
    settle().await;
    let ids: Vec<String> = seen.lock().iter().map(|c| c.order.id.to_string()).collect();
    let expected: Vec<String> = (0..10).map(|i| format!("o{i}")).collect();
    assert_eq!(ids, expected);

    tokio::time::advance(Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(seen.lock().len(), 10);
}

#[tokio::test]
async fn test_repeated_event_is_idempotent() {
    let cache = MarketplaceCache::new(
        Arc::new(InMemorySnapshotSource::default()),
        Arc::new(NoLiveEvents),
        CacheOptions::default(),
    );
    cache.initialize().await.unwrap();

    cache.apply(RawEvent::added(order("o1", Side::Buy, "item-1", 10, 4)));
    let once = cache.all_open_orders();
    cache.apply(RawEvent::added(order("o1", Side::Buy, "item-1", 10, 4)));
    assert_eq!(cache.all_open_orders(), once);

    cache.apply(RawEvent::modified(order("o1", Side::Buy, "item-1", 10, 2)));
    let modified_once = cache.all_open_orders();
    cache.apply(RawEvent::modified(order("o1", Side::Buy, "item-1", 10, 2)));
    assert_eq!(cache.all_open_orders(), modified_once);

    // Double removal is harmless
    cache.apply(RawEvent::removed(order("o1", Side::Buy, "item-1", 10, 2)));
    cache.apply(RawEvent::removed(order("o1", Side::Buy, "item-1", 10, 2)));
    assert_eq!(cache.open_order_count(), 0);
    assert_views_agree(&cache);
}

#[tokio::test]
async fn test_last_arrival_wins_in_either_order() {
    let snapshot_row = order("o1", Side::Sell, "item-1", 100, 5);
    let live_row = order("o1", Side::Sell, "item-1", 100, 3);

    for (first, second) in [
        (snapshot_row.clone(), live_row.clone()),
        (live_row.clone(), snapshot_row.clone()),
    ] {
        let cache = MarketplaceCache::new(
            Arc::new(InMemorySnapshotSource::default()),
            Arc::new(NoLiveEvents),
            CacheOptions::default(),
        );
        cache.initialize().await.unwrap();
        cache.apply(RawEvent::added(first));
        cache.apply(RawEvent::added(second.clone()));

        assert_eq!(cache.get_order(&"o1".into()), Some(second));
        assert_views_agree(&cache);
    }
}

#[tokio::test(start_paused = true)]
async fn test_live_events_during_snapshot_are_kept() {
    let (live, tx) = ChannelEventSource::new();
    let snapshot = InMemorySnapshotSource::new(vec![
        order("o1", Side::Sell, "item-1", 100, 5),
        order("o2", Side::Buy, "item-2", 80, 1),
    ])
    .with_delay(Duration::from_millis(40));
    let cache = MarketplaceCache::new(Arc::new(snapshot), Arc::new(live), CacheOptions::default());

    tx.send(RawEvent::added(order("o3", Side::Buy, "item-3", 70, 9))).unwrap();
    assert_eq!(cache.initialize().await.unwrap(), 3);

    let report = cache.bootstrap_report().unwrap();
    assert_eq!(report.open_orders, 3);
    assert_eq!(report.snapshot_rows, 2);
    assert!(report.live_armed);
    assert_views_agree(&cache);
}

#[tokio::test]
async fn test_mixed_stream_keeps_views_consistent() {
    let cache = MarketplaceCache::new(
        Arc::new(InMemorySnapshotSource::default()),
        Arc::new(NoLiveEvents),
        CacheOptions::default(),
    );
    cache.initialize().await.unwrap();

    let sides = [Side::Buy, Side::Sell];
    for i in 0..60u64 {
        let id = format!("o{}", i % 15);
        let side = sides[(i % 2) as usize];
        let item = format!("item-{}", i % 4);
        let event = match i % 5 {
            0 | 1 => RawEvent::added(order(&id, side, &item, 10 + i, 1 + i % 3)),
            2 => RawEvent::modified(order(&id, side, &item, 10 + i, i % 3)),
            3 => RawEvent::removed(order(&id, side, &item, 10 + i, 0)),
            _ => RawEvent { kind: ChangeKind::Modified, order: None },
        };
        cache.apply(event);
        assert_views_agree(&cache);
    }

    for order in cache.all_open_orders().values() {
        assert!(order.qty_remaining > 0);
    }
}
