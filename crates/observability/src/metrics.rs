//! Prometheus metrics infrastructure
//!
//! With no exporter installed every handle below is a no-op, so the cache
//! can record unconditionally.

use metrics::{counter, gauge, Counter, Gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize the Prometheus metrics exporter
///
/// Starts an HTTP listener on the given port exposing `/metrics`.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Metrics for the order cache
///
/// # Metrics
///
/// * `order_cache_events_total{kind}` - Events applied to the index
/// * `order_cache_events_dropped_total` - Malformed events discarded
/// * `order_cache_snapshot_rows_total` - Snapshot rows applied
/// * `order_cache_snapshot_failures_total` - Failed snapshot fetches
/// * `order_cache_drains_total` - Publisher drains that delivered at least one change
/// * `order_cache_notifications_total` - Subscriber callback invocations
/// * `order_cache_open_orders` - Current index size
/// * `order_cache_queue_depth` - Changes waiting for the next drain
#[derive(Clone)]
pub struct CacheMetrics {
    events_by_kind: fn(&'static str) -> Counter,
    events_dropped: Counter,
    snapshot_rows: Counter,
    snapshot_failures: Counter,
    drains: Counter,
    notifications: Counter,
    open_orders: Gauge,
    queue_depth: Gauge,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self {
            events_by_kind: |kind| counter!("order_cache_events_total", "kind" => kind),
            events_dropped: counter!("order_cache_events_dropped_total"),
            snapshot_rows: counter!("order_cache_snapshot_rows_total"),
            snapshot_failures: counter!("order_cache_snapshot_failures_total"),
            drains: counter!("order_cache_drains_total"),
            notifications: counter!("order_cache_notifications_total"),
            open_orders: gauge!("order_cache_open_orders"),
            queue_depth: gauge!("order_cache_queue_depth"),
        }
    }

    /// Record an applied event; `kind` is one of added/modified/removed
    pub fn record_event(&self, kind: &'static str) {
        (self.events_by_kind)(kind).increment(1);
    }

    pub fn record_dropped(&self) {
        self.events_dropped.increment(1);
    }

    pub fn record_snapshot(&self, rows: usize) {
        self.snapshot_rows.increment(rows as u64);
    }

    pub fn record_snapshot_failure(&self) {
        self.snapshot_failures.increment(1);
    }

    /// Record one drain and how many callbacks it made
    pub fn record_drain(&self, notifications: u64) {
        self.drains.increment(1);
        self.notifications.increment(notifications);
    }

    pub fn set_open_orders(&self, count: usize) {
        self.open_orders.set(count as f64);
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as f64);
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}
