//! Order cache error types

use thiserror::Error;

/// Errors surfaced by the order cache and its collaborators
///
/// Most of these never reach a caller of the cache: snapshot and
/// subscription failures are logged and the cache degrades instead.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The snapshot source could not produce the open-order set
    #[error("Snapshot fetch failed: {0}")]
    SnapshotFetch(String),

    /// The live event source could not be subscribed to
    #[error("Live subscription failed: {0}")]
    Subscription(String),

    /// A record could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// I/O error from a file or stdin source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The publisher has been torn down
    #[error("Change publisher is closed")]
    PublisherClosed,

    /// `initialize` was called twice
    #[error("Cache already initialized")]
    AlreadyInitialized,
}

/// Result type for cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;
