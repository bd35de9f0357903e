//! Observability infrastructure for OrderMirror
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics
//! - The order cache's metric set
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("ordermirror", LogFormat::Pretty, "info")?;
//!
//! // Optional
//! observability::metrics::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, CacheMetrics};
