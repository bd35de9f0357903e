//! In-process collaborators, used by tests and for embedding

use super::{EventStream, LiveEventSource, SnapshotSource};
use crate::error::{CacheError, CacheResult};
use crate::types::{Order, RawEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Snapshot source serving a fixed set of rows
pub struct InMemorySnapshotSource {
    rows: Vec<Order>,
    failure: Option<String>,
    delay: Duration,
    fetches: AtomicUsize,
}

impl InMemorySnapshotSource {
    pub fn new(rows: Vec<Order>) -> Self {
        Self {
            rows,
            failure: None,
            delay: Duration::ZERO,
            fetches: AtomicUsize::new(0),
        }
    }

    /// A source whose fetch always fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(Vec::new())
        }
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of fetches served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Default for InMemorySnapshotSource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl SnapshotSource for InMemorySnapshotSource {
    async fn fetch_all_open_orders(&self) -> CacheResult<Vec<Order>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => Err(CacheError::SnapshotFetch(message.clone())),
            None => Ok(self.rows.clone()),
        }
    }
}

/// Live source fed through a channel sender held by the caller
pub struct ChannelEventSource {
    receiver: Mutex<Option<EventStream>>,
    failure: Option<String>,
}

impl ChannelEventSource {
    /// Create the source and the sender that feeds it
    pub fn new() -> (Self, mpsc::UnboundedSender<RawEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            receiver: Mutex::new(Some(rx)),
            failure: None,
        };
        (source, tx)
    }

    /// A source whose subscription always fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            receiver: Mutex::new(None),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl LiveEventSource for ChannelEventSource {
    async fn subscribe(&self) -> CacheResult<EventStream> {
        if let Some(message) = &self.failure {
            return Err(CacheError::Subscription(message.clone()));
        }
        self.receiver
            .lock()
            .take()
            .ok_or_else(|| CacheError::Subscription("channel source already subscribed".to_string()))
    }
}

/// Live source that never delivers anything
#[derive(Debug, Default)]
pub struct NoLiveEvents;

#[async_trait]
impl LiveEventSource for NoLiveEvents {
    async fn subscribe(&self) -> CacheResult<EventStream> {
        // Sender dropped at once; the ingest task sees a closed stream
        let (_tx, rx) = mpsc::unbounded_channel();
        Ok(rx)
    }
}
