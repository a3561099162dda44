use common::{parse_address, Address, JoinCode, Trip};
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

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    /// Human-readable network name, e.g. "base-sepolia"
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    /// How often to poll for a transaction receipt
    #[serde(default)]
    pub receipt_poll_interval_ms: Option<u64>,
}

/// Deployed contract addresses, as 0x-prefixed hex
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractsConfig {
    /// Empty until a trip has been created
    #[serde(default)]
    pub trip: String,
    pub token: String,
    #[serde(default)]
    pub faucet: Option<String>,
    /// Trip factory, needed only by `kitty create`
    #[serde(default)]
    pub factory: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    #[serde(default = "default_token_symbol")]
    pub symbol: String,
    #[serde(default = "default_token_decimals")]
    pub decimals: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            symbol: default_token_symbol(),
            decimals: default_token_decimals(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TripConfig {
    #[serde(default = "default_trip_name")]
    pub name: String,
    /// Join code shared with other members
    #[serde(default)]
    pub code: Option<String>,
    /// Wallet that created the trip
    #[serde(default)]
    pub creator: Option<String>,
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            name: default_trip_name(),
            code: None,
            creator: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WalletConfig {
    /// Account used as `from` for transactions; the node or wallet signs
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Prometheus exporter port; no exporter when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// Top-level `kitty.yaml`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KittyConfig {
    pub app: AppConfig,
    pub chain: ChainConfig,
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub trip: TripConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl KittyConfig {
    pub fn trip_address(&self) -> common::Result<Address> {
        parse_address(&self.contracts.trip)
    }

    pub fn token_address(&self) -> common::Result<Address> {
        parse_address(&self.contracts.token)
    }

    pub fn faucet_address(&self) -> common::Result<Option<Address>> {
        self.contracts.faucet.as_deref().map(parse_address).transpose()
    }

    pub fn factory_address(&self) -> common::Result<Option<Address>> {
        self.contracts.factory.as_deref().map(parse_address).transpose()
    }

    pub fn wallet_account(&self) -> common::Result<Option<Address>> {
        self.wallet.account.as_deref().map(parse_address).transpose()
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.chain
                .receipt_poll_interval_ms
                .unwrap_or_else(default_receipt_poll_interval_ms),
        )
    }

    /// Build the trip described by this configuration
    ///
    /// A missing join code gets a freshly generated one.
    pub fn build_trip(&self) -> common::Result<Trip> {
        let code = match self.trip.code.as_deref() {
            Some(code) => code.parse()?,
            None => JoinCode::generate(),
        };
        let creator = self.trip.creator.as_deref().map(parse_address).transpose()?;
        Ok(Trip::new(
            self.trip.name.clone(),
            code,
            creator,
            self.trip_address()?,
            self.chain.chain_id,
        ))
    }
}
