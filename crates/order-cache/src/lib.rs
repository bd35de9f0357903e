//! In-memory mirror of open marketplace orders
//!
//! The cache bootstraps from a one-shot snapshot, merges an at-least-once
//! live event stream into the same index, answers synchronous lookups by
//! id, item, side, currency and owner, and republishes every accepted
//! change to subscribers on a fixed cadence.
//!
//! # Components
//!
//! - [`index::OrderIndex`] - the indexed maps themselves
//! - [`dispatcher::EventDispatcher`] - the single mutation path
//! - [`reconciler::Reconciler`] - snapshot plus live bootstrap
//! - [`publisher::ChangePublisher`] - timer-driven change fan-out
//! - [`service::MarketplaceCache`] - the context object tying them together
//!
//! # Feature Flags
//!
//! - `http` - Enable the HTTP snapshot source

pub mod dispatcher;
pub mod error;
pub mod index;
pub mod publisher;
pub mod reconciler;
pub mod service;
pub mod sources;
pub mod types;

pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use error::{CacheError, CacheResult};
pub use index::OrderIndex;
pub use publisher::{ChangePublisher, ChangeSubscriber, SubscriberId, DEFAULT_DRAIN_INTERVAL};
pub use reconciler::BootstrapReport;
pub use service::{CacheOptions, MarketplaceCache};
pub use types::{ChangeKind, Order, OrderChange, RawEvent};

// Source exports
pub use sources::file::{FileSnapshotSource, JsonLinesEventSource};
pub use sources::memory::{ChannelEventSource, InMemorySnapshotSource, NoLiveEvents};
pub use sources::{EventStream, LiveEventSource, SnapshotSource};

#[cfg(feature = "http")]
pub use sources::http::HttpSnapshotSource;
