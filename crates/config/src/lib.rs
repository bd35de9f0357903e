use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Top-level configuration for the order mirror
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MirrorConfig {
    pub venue: VenueConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub publisher: Option<PublisherConfig>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

impl MirrorConfig {
    /// Publisher drain period, falling back to the default
    pub fn drain_interval(&self) -> Duration {
        let ms = self
            .publisher
            .as_ref()
            .map(|p| p.drain_interval_ms)
            .unwrap_or_else(default_drain_interval_ms);
        Duration::from_millis(ms)
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    pub fn metrics(&self) -> MetricsConfig {
        self.metrics.clone().unwrap_or_default()
    }

    /// URL the HTTP snapshot source should hit
    pub fn snapshot_url(&self) -> Option<&str> {
        match &self.snapshot {
            SnapshotConfig::Http { url } => Some(url.as_deref().unwrap_or(&self.venue.rpc_url)),
            SnapshotConfig::File { .. } | SnapshotConfig::Disabled => None,
        }
    }
}

/// The on-chain marketplace being mirrored
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VenueConfig {
    pub rpc_url: String,
    pub program_id: String,
    #[serde(default = "default_commitment")]
    pub commitment: Commitment,
}

/// RPC commitment level used for snapshot reads and subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// Where the startup snapshot comes from
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotConfig {
    /// JSON array of orders on disk
    File { path: String },
    /// JSON array of orders from an HTTP gateway; defaults to `venue.rpc_url`
    Http {
        #[serde(default)]
        url: Option<String>,
    },
    /// Start live-only
    #[default]
    #[serde(rename = "none")]
    Disabled,
}

/// Where live events come from
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventsConfig {
    /// Newline-delimited JSON events on stdin
    Stdin,
    /// Newline-delimited JSON events from a file
    File { path: String },
    #[default]
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublisherConfig {
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: default_drain_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// pretty, json or compact
    #[serde(default = "default_log_format")]
    pub format: String,
    /// `EnvFilter` directives, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}
