//! Snapshot and live-event collaborators
//!
//! The cache only sees these two traits. Decoding on-chain accounts and the
//! subscription transport live behind them.

use crate::error::CacheResult;
use crate::types::{Order, RawEvent};
use async_trait::async_trait;
use tokio::sync::mpsc;

pub mod file;
pub mod memory;

#[cfg(feature = "http")]
pub mod http;

/// Stream of live events handed to the cache by a [`LiveEventSource`]
pub type EventStream = mpsc::UnboundedReceiver<RawEvent>;

/// One-shot fetch of every currently open order
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the full open-order set
    ///
    /// May fail on network or decoding errors; the cache degrades to
    /// live-only when it does.
    async fn fetch_all_open_orders(&self) -> CacheResult<Vec<Order>>;
}

/// At-least-once, unordered delivery of order changes
#[async_trait]
pub trait LiveEventSource: Send + Sync {
    /// Start delivery
    ///
    /// The cache calls this exactly once and fans events out internally.
    async fn subscribe(&self) -> CacheResult<EventStream>;
}
