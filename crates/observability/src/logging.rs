//! Tracing subscriber setup shared by every OrderMirror command
//!
//! Logs go to stderr so `start --print-changes` and `inspect` can keep
//! stdout for their own output.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
    Compact,
}

impl LogFormat {
    /// Case-insensitive; `None` for anything unrecognised
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown log format: {}", s))
    }
}

/// Pick the filter directives to run with
///
/// A non-empty `RUST_LOG` that parses wins. Otherwise `default_filter` is
/// used, and it is an error for that one not to parse.
fn resolve_filter(rust_log: Option<&str>, default_filter: &str) -> anyhow::Result<EnvFilter> {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return Ok(filter);
        }
    }
    Ok(EnvFilter::try_new(default_filter)?)
}

/// Install the global subscriber
///
/// Fails if `default_filter` is malformed (and `RUST_LOG` does not
/// override it) or if a subscriber is already installed.
///
/// ```ignore
/// init_logging("ordermirror", LogFormat::Json, "info,order_cache=debug")?;
/// ```
pub fn init_logging(service_name: &str, format: LogFormat, default_filter: &str) -> anyhow::Result<()> {
    let filter = resolve_filter(std::env::var("RUST_LOG").ok().as_deref(), default_filter)?;

    // Exactly one of these is Some
    let pretty = (format == LogFormat::Pretty).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(true)
            .with_line_number(true)
    });
    let json = (format == LogFormat::Json).then(|| fmt::layer().json().with_writer(std::io::stderr));
    let compact = (format == LogFormat::Compact).then(|| fmt::layer().compact().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(compact)
        .try_init()?;

    tracing::debug!(service = service_name, ?format, "Logging ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_log_format_names() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!("compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
        assert!("syslog".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_rust_log_overrides_default_filter() {
        let filter = resolve_filter(Some("debug"), "warn").unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        let filter = resolve_filter(None, "warn").unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));

        // Blank or broken RUST_LOG falls through to the default
        let filter = resolve_filter(Some("  "), "error").unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::ERROR));
        let filter = resolve_filter(Some("order_cache=loud"), "warn").unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_malformed_default_filter_is_an_error() {
        assert!(resolve_filter(None, "order_cache=loud").is_err());
    }
}
