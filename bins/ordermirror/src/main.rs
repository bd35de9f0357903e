//! OrderMirror binary
//!
//! Commands for initializing and validating configuration, inspecting a
//! snapshot, and running the cache against live events.

use anyhow::{Context, Result};
use cli::{Cli, Commands, LogFormatArg};
use common::{ItemKey, OwnerKey, Side};
use config::{
    generate_default_config, load_config, save_config, validate_config, EventsConfig, MirrorConfig,
    SnapshotConfig,
};
use observability::{init_logging, init_metrics, LogFormat};
use order_cache::{
    CacheOptions, ChangeSubscriber, FileSnapshotSource, InMemorySnapshotSource, JsonLinesEventSource,
    LiveEventSource, MarketplaceCache, NoLiveEvents, OrderChange, SnapshotSource,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Start {
            config,
            log_format,
            drain_interval_ms,
            print_changes,
        } => start_command(config, log_format, drain_interval_ms, print_changes).await,
        Commands::Inspect { config, item, owner } => {
            init_logging("ordermirror", LogFormat::Compact, "warn")?;
            inspect_command(config, item, owner).await
        }
        Commands::Validate { config } => {
            init_logging("ordermirror", LogFormat::Pretty, "info")?;
            validate_command(config).await
        }
        Commands::Init { output } => {
            init_logging("ordermirror", LogFormat::Pretty, "info")?;
            init_command(output).await
        }
    }
}

/// Load and validate, logging warnings and bailing on errors
fn load_valid_config(path: &Path) -> Result<MirrorConfig> {
    let config = load_config(path)?;
    check_config(&config)?;
    Ok(config)
}

fn check_config(config: &MirrorConfig) -> Result<()> {
    let report = validate_config(config);

    for default in &report.defaults_applied {
        debug!(field = %default.field, value = %default.value, "Default applied");
    }
    if !report.warnings.is_empty() {
        warn!("Configuration warnings:");
        for warning in &report.warnings {
            warn!(field = %warning.field, message = %warning.message);
        }
    }

    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start due to configuration errors");
    }

    Ok(())
}

fn snapshot_source(config: &MirrorConfig) -> Result<Arc<dyn SnapshotSource>> {
    match &config.snapshot {
        SnapshotConfig::File { path } => Ok(Arc::new(FileSnapshotSource::new(path))),
        SnapshotConfig::Http { .. } => http_snapshot_source(config),
        SnapshotConfig::Disabled => Ok(Arc::new(InMemorySnapshotSource::default())),
    }
}

#[cfg(feature = "http")]
fn http_snapshot_source(config: &MirrorConfig) -> Result<Arc<dyn SnapshotSource>> {
    let url = config
        .snapshot_url()
        .context("snapshot.type is http but no URL could be resolved")?;
    Ok(Arc::new(order_cache::HttpSnapshotSource::new(
        url,
        &config.venue.program_id,
        config.venue.commitment.as_str(),
    )))
}

#[cfg(not(feature = "http"))]
fn http_snapshot_source(_config: &MirrorConfig) -> Result<Arc<dyn SnapshotSource>> {
    anyhow::bail!("snapshot.type 'http' requires building with `--features http`")
}

fn live_source(config: &MirrorConfig) -> Arc<dyn LiveEventSource> {
    match &config.events {
        EventsConfig::Stdin => Arc::new(JsonLinesEventSource::stdin()),
        EventsConfig::File { path } => Arc::new(JsonLinesEventSource::file(path)),
        EventsConfig::Disabled => Arc::new(NoLiveEvents),
    }
}

/// Logs every change, and optionally echoes it to stdout
fn change_logger(print: bool) -> Arc<dyn ChangeSubscriber> {
    Arc::new(move |change: &OrderChange| {
        debug!(
            sequence = change.sequence,
            kind = %change.kind,
            order_id = %change.order.id,
            item = %change.order.item_key,
            qty_remaining = change.order.qty_remaining,
            "Order changed"
        );
        if print {
            match serde_json::to_string(change) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "Failed to encode change"),
            }
        }
    })
}

async fn start_command(
    config_path: PathBuf,
    log_format: Option<LogFormatArg>,
    drain_interval_ms: Option<u64>,
    print_changes: bool,
) -> Result<()> {
    let config = load_config(&config_path)?;
    let logging = config.logging();
    let format = match log_format {
        Some(arg) => LogFormat::parse(arg.as_str()),
        None => LogFormat::parse(&logging.format),
    }
    .unwrap_or_default();
    if let Err(e) = init_logging("ordermirror", format, &logging.filter) {
        // Validation below reports the bad filter and stops startup
        init_logging("ordermirror", format, "info")?;
        warn!(error = %e, filter = %logging.filter, "Configured log filter rejected");
    }

    info!(path = ?config_path, "OrderMirror starting");
    check_config(&config)?;

    let metrics = config.metrics();
    if metrics.enabled {
        init_metrics(metrics.port)?;
    }

    let drain_interval = drain_interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.drain_interval());
    if drain_interval.is_zero() {
        anyhow::bail!("--drain-interval-ms must be positive");
    }

    info!(
        rpc_url = %config.venue.rpc_url,
        program_id = %config.venue.program_id,
        commitment = config.venue.commitment.as_str(),
        drain_interval_ms = drain_interval.as_millis() as u64,
        "Starting order cache"
    );

    let cache = MarketplaceCache::new(
        snapshot_source(&config)?,
        live_source(&config),
        CacheOptions { drain_interval },
    );
    let distinct_items = cache.initialize().await?;
    info!(
        distinct_items,
        open_orders = cache.open_order_count(),
        "Order cache ready"
    );

    let subscriber = cache.add_subscriber(change_logger(print_changes))?;

    let mut status = tokio::time::interval(STATUS_INTERVAL);
    status.tick().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            _ = status.tick() => {
                let index = cache.read_index();
                info!(
                    open_orders = index.len(),
                    distinct_items = index.distinct_item_count(),
                    "Cache status"
                );
            }
        }
    }

    cache.remove_subscriber(subscriber);
    let ack = cache.shutdown();
    info!(ack, "OrderMirror stopped");
    Ok(())
}

async fn inspect_command(config_path: PathBuf, item: Option<String>, owner: Option<String>) -> Result<()> {
    let config = load_valid_config(&config_path)?;

    let cache = MarketplaceCache::new(snapshot_source(&config)?, Arc::new(NoLiveEvents), CacheOptions::default());
    cache.initialize().await?;

    if let Some(report) = cache.bootstrap_report() {
        if report.snapshot_failed {
            anyhow::bail!("Snapshot could not be loaded, see log for details");
        }
    }

    if let Some(owner) = owner {
        let owner = OwnerKey::from(owner);
        let mut orders = cache.orders_by_owner(&owner);
        if let Some(item) = item.as_deref() {
            orders.retain(|o| o.item_key.as_str() == item);
        }
        orders.sort_by(|a, b| a.item_key.cmp(&b.item_key).then(a.price.cmp(&b.price)));

        println!("Orders owned by {} ({}):", owner, orders.len());
        for o in &orders {
            println!(
                "  {}  {} {}  price={} qty={}  currency={}",
                o.id, o.side, o.item_key, o.price, o.qty_remaining, o.currency_key
            );
        }
        cache.shutdown();
        return Ok(());
    }

    let items: Vec<ItemKey> = match item {
        Some(item) => vec![ItemKey::from(item)],
        None => cache.distinct_item_keys(),
    };

    println!("Open orders: {}", cache.open_order_count());
    println!("Distinct items: {}", items.len());
    println!();
    for item in &items {
        let bids = cache.orders_for_item(Side::Buy, item);
        let asks = cache.orders_for_item(Side::Sell, item);
        let best_bid = bids.values().map(|o| o.price).max();
        let best_ask = asks.values().map(|o| o.price).min();
        println!(
            "  {}  bids={} best={}  asks={} best={}",
            item,
            bids.len(),
            best_bid.map_or_else(|| "-".to_string(), |p| p.to_string()),
            asks.len(),
            best_ask.map_or_else(|| "-".to_string(), |p| p.to_string()),
        );
    }

    cache.shutdown();
    Ok(())
}

async fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    info!(path = ?config_path.as_ref(), "Validating configuration");

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("RPC: {}", config.venue.rpc_url);
    println!("Program: {}", config.venue.program_id);
    println!("Commitment: {}", config.venue.commitment.as_str());
    println!("Snapshot: {:?}", config.snapshot);
    println!("Events: {:?}", config.events);
    println!("Drain interval: {:?}", config.drain_interval());

    Ok(())
}

async fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("Next steps:");
    println!("  1. Point venue.rpc_url and venue.program_id at the marketplace to mirror");
    println!("  2. Choose a snapshot source (file, http or none)");
    println!(
        "  3. Run 'ordermirror validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  4. Run 'ordermirror start --config {:?}' to start mirroring",
        output_path
    );

    Ok(())
}
