use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ordermirror")]
#[command(about = "OrderMirror - in-memory mirror of open marketplace orders")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bootstrap the cache and follow live events until Ctrl+C
    Start {
        /// Path to the configuration file
        #[arg(short, long, default_value = "master_config/ordermirror.yaml", env = "ORDERMIRROR_CONFIG")]
        config: PathBuf,

        /// Override the configured log format
        #[arg(long, value_enum)]
        log_format: Option<LogFormatArg>,

        /// Override publisher.drain_interval_ms
        #[arg(long)]
        drain_interval_ms: Option<u64>,

        /// Print every published change to stdout as JSON
        #[arg(long)]
        print_changes: bool,
    },

    /// Load the snapshot once and print a summary of the book
    Inspect {
        /// Path to the configuration file
        #[arg(short, long, default_value = "master_config/ordermirror.yaml", env = "ORDERMIRROR_CONFIG")]
        config: PathBuf,

        /// Only show this item
        #[arg(long)]
        item: Option<String>,

        /// Only show orders created by this wallet
        #[arg(long)]
        owner: Option<String>,
    },

    /// Validate configuration without starting
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "master_config/ordermirror.yaml", env = "ORDERMIRROR_CONFIG")]
        config: PathBuf,
    },

    /// Initialize a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "ordermirror.yaml")]
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable with colors
    Pretty,
    /// One JSON object per line
    Json,
    /// Single-line compact
    Compact,
}

impl LogFormatArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormatArg::Pretty => "pretty",
            LogFormatArg::Json => "json",
            LogFormatArg::Compact => "compact",
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
