use crate::*;
use regex::Regex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("venue.rpc_url '{url}' is invalid: {message}")]
    InvalidRpcUrl { url: String, message: String },

    #[error("venue.program_id is required")]
    MissingProgramId,

    #[error("{section}.path is required")]
    MissingPath { section: String },

    #[error("snapshot.url '{url}' is invalid: {message}")]
    InvalidSnapshotUrl { url: String, message: String },

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("logging.filter '{filter}' is invalid: {message}")]
    InvalidLogFilter { filter: String, message: String },

    #[error("metrics.port must be non-zero when metrics are enabled")]
    InvalidMetricsPort,

    #[error("Environment variable '{var}' is missing or invalid: {message}")]
    InvalidEnvVar { var: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &MirrorConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_venue(&config.venue, &mut report);
    validate_sources(config, &mut report);
    validate_publisher(config.publisher.as_ref(), &mut report);
    validate_logging(config.logging.as_ref(), &mut report);
    validate_metrics(config.metrics.as_ref(), &mut report);

    report
}

fn check_env_placeholder(field: &str, value: &str, report: &mut ValidationReport) -> bool {
    if substitution::has_unresolved_env_vars(value) {
        report.add_error(ValidationError::InvalidEnvVar {
            var: value.to_string(),
            message: format!("{} still contains an unresolved placeholder", field),
        });
        return true;
    }
    false
}

fn check_http_url(value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("scheme '{}' is not http(s)", other)),
    }
}

fn validate_venue(venue: &VenueConfig, report: &mut ValidationReport) {
    if !check_env_placeholder("venue.rpc_url", &venue.rpc_url, report) {
        if let Err(message) = check_http_url(&venue.rpc_url) {
            report.add_error(ValidationError::InvalidRpcUrl {
                url: venue.rpc_url.clone(),
                message,
            });
        }
    }

    if venue.program_id.trim().is_empty() {
        report.add_error(ValidationError::MissingProgramId);
    } else if !check_env_placeholder("venue.program_id", &venue.program_id, report) {
        if let Ok(base58) = Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$") {
            if !base58.is_match(&venue.program_id) {
                report.add_warning(
                    "venue.program_id",
                    "Does not look like a base58 account address",
                );
            }
        }
    }

    if venue.commitment == Commitment::Processed {
        report.add_warning(
            "venue.commitment",
            "processed commitment can surface orders from forks that are later dropped",
        );
    }
}

fn validate_sources(config: &MirrorConfig, report: &mut ValidationReport) {
    match &config.snapshot {
        SnapshotConfig::File { path } => {
            if path.trim().is_empty() {
                report.add_error(ValidationError::MissingPath {
                    section: "snapshot".to_string(),
                });
            }
        }
        SnapshotConfig::Http { url } => match url {
            Some(url) => {
                if !check_env_placeholder("snapshot.url", url, report) {
                    if let Err(message) = check_http_url(url) {
                        report.add_error(ValidationError::InvalidSnapshotUrl {
                            url: url.clone(),
                            message,
                        });
                    }
                }
            }
            None => report.add_default("snapshot.url", &config.venue.rpc_url),
        },
        SnapshotConfig::Disabled => {
            report.add_warning("snapshot", "No snapshot source; the cache starts live-only");
        }
    }

    match &config.events {
        EventsConfig::File { path } => {
            if path.trim().is_empty() {
                report.add_error(ValidationError::MissingPath {
                    section: "events".to_string(),
                });
            }
        }
        EventsConfig::Stdin => {}
        EventsConfig::Disabled => {
            report.add_warning("events", "No live event source; the cache will not change after bootstrap");
        }
    }
}

fn validate_publisher(publisher: Option<&PublisherConfig>, report: &mut ValidationReport) {
    let Some(publisher) = publisher else {
        report.add_default("publisher.drain_interval_ms", &default_drain_interval_ms().to_string());
        return;
    };

    if publisher.drain_interval_ms == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "publisher.drain_interval_ms".to_string(),
        });
    } else if publisher.drain_interval_ms < 10 {
        report.add_warning(
            "publisher.drain_interval_ms",
            "Intervals under 10ms make subscriber batching ineffective",
        );
    }
}

fn validate_logging(logging: Option<&LoggingConfig>, report: &mut ValidationReport) {
    let Some(logging) = logging else {
        report.add_default("logging.format", &default_log_format());
        report.add_default("logging.filter", &default_log_filter());
        return;
    };

    let valid_formats = ["pretty", "json", "compact"];
    if !valid_formats.contains(&logging.format.to_lowercase().as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(logging.format.clone()));
    }

    if let Err(e) = EnvFilter::try_new(&logging.filter) {
        report.add_error(ValidationError::InvalidLogFilter {
            filter: logging.filter.clone(),
            message: e.to_string(),
        });
    }
}

fn validate_metrics(metrics: Option<&MetricsConfig>, report: &mut ValidationReport) {
    let Some(metrics) = metrics else {
        report.add_default("metrics.enabled", "false");
        return;
    };

    if metrics.enabled && metrics.port == 0 {
        report.add_error(ValidationError::InvalidMetricsPort);
    }
}
