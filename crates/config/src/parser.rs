use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<KittyConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    let config = parse_config(&content)?;

    info!("Configuration loaded successfully");
    Ok(config)
}

/// Parse YAML text after environment substitution
pub fn parse_config(content: &str) -> Result<KittyConfig> {
    let substituted = substitution::substitute_env_vars(content);
    debug!("Environment variable substitution completed");

    serde_yaml::from_str(&substituted).with_context(|| "Failed to parse YAML configuration")
}

/// Starter configuration for a local dev chain
///
/// Contract addresses and the wallet account are left as environment
/// placeholders for the deployer to fill in.
#[instrument]
pub fn generate_default_config() -> KittyConfig {
    KittyConfig {
        app: AppConfig {
            name: "Trip Kitty".to_string(),
            version: "0.1.0".to_string(),
        },
        chain: ChainConfig {
            name: "anvil".to_string(),
            chain_id: default_chain_id(),
            rpc_url: default_rpc_url(),
            receipt_poll_interval_ms: Some(default_receipt_poll_interval_ms()),
        },
        contracts: ContractsConfig {
            trip: "${KITTY_TRIP_ADDRESS}".to_string(),
            token: "${KITTY_TOKEN_ADDRESS}".to_string(),
            faucet: None,
            factory: None,
        },
        token: TokenConfig::default(),
        trip: TripConfig {
            name: default_trip_name(),
            code: Some(common::JoinCode::generate().to_string()),
            creator: None,
        },
        wallet: WalletConfig {
            account: Some("${KITTY_ACCOUNT}".to_string()),
        },
        logging: LoggingConfig::default(),
        monitoring: MonitoringConfig::default(),
    }
}

#[instrument(skip(config))]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &KittyConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}
