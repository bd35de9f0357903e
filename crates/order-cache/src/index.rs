//! The order index
//!
//! Three coupled views over the same set of live orders:
//!
//! 1. by id, the authoritative store
//! 2. side -> item -> (id -> order), for per-item book lookups
//! 3. the set of item keys ever indexed
//!
//! An order is in view 2 exactly when it is in view 1, under its own
//! `(side, item_key)`. View 3 only grows.

use crate::types::Order;
use common::{CurrencyKey, ItemKey, OrderId, OwnerKey, Side};
use std::collections::{BTreeSet, HashMap};

/// Orders for one `(side, item)` pair, keyed by id
pub type ItemOrders = HashMap<OrderId, Order>;

/// Every item's orders on one side
pub type SideBook = HashMap<ItemKey, ItemOrders>;

#[derive(Debug, Default)]
struct Books {
    buy: SideBook,
    sell: SideBook,
}

impl Books {
    fn side(&self, side: Side) -> &SideBook {
        match side {
            Side::Buy => &self.buy,
            Side::Sell => &self.sell,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideBook {
        match side {
            Side::Buy => &mut self.buy,
            Side::Sell => &mut self.sell,
        }
    }

    fn insert(&mut self, order: Order) {
        self.side_mut(order.side)
            .entry(order.item_key.clone())
            .or_default()
            .insert(order.id.clone(), order);
    }

    /// Remove `id` from the `(side, item)` bucket, dropping the bucket when it empties
    fn remove(&mut self, side: Side, item: &ItemKey, id: &OrderId) {
        let book = self.side_mut(side);
        if let Some(bucket) = book.get_mut(item) {
            bucket.remove(id);
            if bucket.is_empty() {
                book.remove(item);
            }
        }
    }
}

/// In-memory mirror of every open order
///
/// Not synchronised; the cache wraps it in a single-writer lock.
#[derive(Debug, Default)]
pub struct OrderIndex {
    by_id: HashMap<OrderId, Order>,
    books: Books,
    items: BTreeSet<ItemKey>,
    // Returned for (side, item) pairs with no orders
    empty: ItemOrders,
}

impl OrderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new order or overwrite an existing one with the same id
    ///
    /// Returns the previous value. If the order moved to a different
    /// `(side, item)` it is taken out of the old bucket first.
    ///
    /// Callers are expected to route zero-quantity orders to [`remove`](Self::remove).
    pub fn upsert(&mut self, order: Order) -> Option<Order> {
        let previous = self.by_id.insert(order.id.clone(), order.clone());

        if let Some(prev) = &previous {
            if prev.side != order.side || prev.item_key != order.item_key {
                self.books.remove(prev.side, &prev.item_key, &prev.id);
            }
        }

        self.items.insert(order.item_key.clone());
        self.books.insert(order);
        previous
    }

    /// Delete an order from every view
    ///
    /// Returns the removed order, `None` if the id was unknown.
    pub fn remove(&mut self, id: &OrderId) -> Option<Order> {
        let removed = self.by_id.remove(id)?;
        self.books.remove(removed.side, &removed.item_key, id);
        Some(removed)
    }

    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.by_id.contains_key(id)
    }

    /// The full by-id view
    pub fn all_orders(&self) -> &HashMap<OrderId, Order> {
        &self.by_id
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Every item's orders on one side
    pub fn orders_by_side(&self, side: Side) -> &SideBook {
        self.books.side(side)
    }

    /// Live view of one `(side, item)` bucket; empty when nothing rests there
    pub fn by_item_and_side(&self, side: Side, item: &ItemKey) -> &ItemOrders {
        self.books.side(side).get(item).unwrap_or(&self.empty)
    }

    /// Buy and sell orders for an item, keyed by id
    pub fn by_item_both_sides(&self, item: &ItemKey) -> HashMap<&OrderId, &Order> {
        Side::ALL
            .iter()
            .flat_map(|side| self.by_item_and_side(*side, item))
            .collect()
    }

    /// Linear scan of the by-id view
    pub fn by_owner(&self, owner: &OwnerKey) -> Vec<&Order> {
        self.by_id.values().filter(|o| &o.owner == owner).collect()
    }

    /// Keep only orders settled in `currency`
    pub fn filter_by_currency<'a, I>(currency: &CurrencyKey, orders: I) -> Vec<&'a Order>
    where
        I: IntoIterator<Item = &'a Order>,
    {
        orders
            .into_iter()
            .filter(|o| &o.currency_key == currency)
            .collect()
    }

    /// Every item key ever indexed, sorted
    ///
    /// Items are not forgotten when their last order goes away.
    pub fn distinct_item_keys(&self) -> impl Iterator<Item = &ItemKey> {
        self.items.iter()
    }

    pub fn distinct_item_count(&self) -> usize {
        self.items.len()
    }

    /// Check that the by-id view and the bucket view hold the same orders
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut bucketed = 0;
        for side in Side::ALL {
            for (item, bucket) in self.books.side(side) {
                assert!(!bucket.is_empty(), "empty bucket left for {side}/{item}");
                for (id, order) in bucket {
                    bucketed += 1;
                    let stored = self.by_id.get(id).expect("bucketed order missing by id");
                    assert_eq!(stored, order);
                    assert_eq!(stored.side, side);
                    assert_eq!(&stored.item_key, item);
                }
            }
        }
        assert_eq!(bucketed, self.by_id.len());
    }
}
