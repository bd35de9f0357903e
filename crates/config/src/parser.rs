use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MirrorConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    let substituted = substitution::substitute_env_vars(&content)?;

    let config: MirrorConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!("Configuration loaded successfully");
    Ok(config)
}

#[instrument]
pub fn generate_default_config() -> MirrorConfig {
    use defaults::*;

    MirrorConfig {
        venue: VenueConfig {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            program_id: "traderDnaR5w6Tcoi3NFm53i48FTDNbGjBSZwWXDRrg".to_string(),
            commitment: default_commitment(),
        },
        snapshot: SnapshotConfig::File {
            path: default_snapshot_path(),
        },
        events: EventsConfig::Stdin,
        publisher: Some(PublisherConfig::default()),
        logging: Some(LoggingConfig::default()),
        metrics: Some(MetricsConfig::default()),
    }
}

#[instrument(skip(config))]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &MirrorConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}
