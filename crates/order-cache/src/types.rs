//! Order cache types

use chrono::{DateTime, Utc};
use common::{CurrencyKey, ItemKey, OrderId, OwnerKey, Side};
use serde::{Deserialize, Serialize};

/// One resting order
///
/// Everything except `qty_remaining` is fixed when the order account is
/// created. An order with zero remaining quantity is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub owner: OwnerKey,
    pub item_key: ItemKey,
    pub currency_key: CurrencyKey,
    /// Price per unit in the currency's smallest denomination
    pub price: u64,
    pub qty_remaining: u64,
}

impl Order {
    /// True while the order can still be filled
    pub fn is_live(&self) -> bool {
        self.qty_remaining > 0
    }
}

/// Kind of change carried by a live event or a published notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Lowercase name, used as a metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound event exactly as the live source delivered it
///
/// `order` is optional because upstream decoders sometimes emit a kind with
/// no payload; such events are dropped by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub kind: ChangeKind,
    #[serde(default)]
    pub order: Option<Order>,
}

impl RawEvent {
    pub fn added(order: Order) -> Self {
        Self { kind: ChangeKind::Added, order: Some(order) }
    }

    pub fn modified(order: Order) -> Self {
        Self { kind: ChangeKind::Modified, order: Some(order) }
    }

    pub fn removed(order: Order) -> Self {
        Self { kind: ChangeKind::Removed, order: Some(order) }
    }
}

/// An accepted mutation waiting in the publisher queue
///
/// For removals `order` is the terminal state the dispatcher saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderChange {
    /// Position in the publisher queue, strictly increasing
    pub sequence: u64,
    pub kind: ChangeKind,
    pub order: Order,
    pub queued_at: DateTime<Utc>,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_json_field_names() {
        let json = r#"{
            "id": "o1",
            "side": "sell",
            "owner": "w1",
            "itemKey": "item-1",
            "currencyKey": "cur-1",
            "price": 100,
            "qtyRemaining": 5
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.id.as_str(), "o1");
        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.qty_remaining, 5);
        assert!(order.is_live());
    }

    #[test]
    fn test_raw_event_without_payload() {
        let event: RawEvent = serde_json::from_str(r#"{"kind":"removed"}"#).unwrap();
        assert_eq!(event.kind, ChangeKind::Removed);
        assert!(event.order.is_none());
    }
}
