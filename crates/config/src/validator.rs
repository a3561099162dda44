use crate::*;
use common::{parse_address, JoinCode, AMOUNT_DECIMALS};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

const LOG_FORMATS: [&str; 3] = ["pretty", "json", "compact"];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("App name is required")]
    MissingAppName,

    #[error("Invalid version format: {0}. Must be in format X.Y.Z (e.g., 1.0.0)")]
    InvalidVersionFormat(String),

    #[error("Chain name is required")]
    MissingChainName,

    #[error("chain_id must be a positive integer")]
    InvalidChainId,

    #[error("Invalid rpc_url '{url}': {message}")]
    InvalidRpcUrl { url: String, message: String },

    #[error("receipt_poll_interval_ms must be a positive integer")]
    InvalidPollInterval,

    #[error("{field}: '{value}' is not a 20-byte hex address")]
    InvalidAddress { field: String, value: String },

    #[error("contracts.factory is required to create a trip")]
    MissingFactory,

    #[error("Token decimals must be {expected}, got {actual}")]
    InvalidTokenDecimals { expected: u32, actual: u32 },

    #[error("Token symbol is required")]
    MissingTokenSymbol,

    #[error("Trip name is required")]
    MissingTripName,

    #[error("Invalid join code '{0}'")]
    InvalidJoinCode(String),

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("metrics_port must be non-zero")]
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

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("version pattern is valid"))
}

pub fn validate_config(config: &KittyConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_app(&config.app, &mut report);
    validate_chain(&config.chain, &mut report);
    validate_contracts(&config.contracts, &mut report);
    validate_token(&config.token, &mut report);
    validate_trip(&config.trip, &mut report);
    validate_wallet(&config.wallet, &mut report);
    validate_observability(config, &mut report);

    report
}

/// Checks for `kitty create`, which runs before any trip contract exists
///
/// The trip, token and faucet sections are not consulted; the factory is
/// required.
pub fn validate_for_create(config: &KittyConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_app(&config.app, &mut report);
    validate_chain(&config.chain, &mut report);
    match &config.contracts.factory {
        Some(factory) => validate_address("contracts.factory", factory, &mut report),
        None => report.add_error(ValidationError::MissingFactory),
    }
    validate_wallet(&config.wallet, &mut report);
    validate_observability(config, &mut report);

    report
}

fn validate_observability(config: &KittyConfig, report: &mut ValidationReport) {
    if !LOG_FORMATS.contains(&config.logging.format.to_lowercase().as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(config.logging.format.clone()));
    }
    if config.monitoring.metrics_port == Some(0) {
        report.add_error(ValidationError::InvalidMetricsPort);
    }
}

fn validate_app(app: &AppConfig, report: &mut ValidationReport) {
    if app.name.trim().is_empty() {
        report.add_error(ValidationError::MissingAppName);
    }

    if !version_regex().is_match(&app.version) {
        report.add_error(ValidationError::InvalidVersionFormat(app.version.clone()));
    }
}

fn validate_chain(chain: &ChainConfig, report: &mut ValidationReport) {
    if chain.name.trim().is_empty() {
        report.add_error(ValidationError::MissingChainName);
    }

    if chain.chain_id == 0 {
        report.add_error(ValidationError::InvalidChainId);
    }

    if !check_env_vars("chain.rpc_url", &chain.rpc_url, report) {
        match url::Url::parse(&chain.rpc_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => report.add_error(ValidationError::InvalidRpcUrl {
                url: chain.rpc_url.clone(),
                message: format!("scheme must be http or https, got {}", url.scheme()),
            }),
            Err(e) => report.add_error(ValidationError::InvalidRpcUrl {
                url: chain.rpc_url.clone(),
                message: e.to_string(),
            }),
        }
    }

    match chain.receipt_poll_interval_ms {
        Some(0) => report.add_error(ValidationError::InvalidPollInterval),
        Some(_) => {}
        None => report.add_default(
            "chain.receipt_poll_interval_ms",
            &default_receipt_poll_interval_ms().to_string(),
        ),
    }
}

fn validate_contracts(contracts: &ContractsConfig, report: &mut ValidationReport) {
    validate_address("contracts.trip", &contracts.trip, report);
    validate_address("contracts.token", &contracts.token, report);

    match &contracts.faucet {
        Some(faucet) => validate_address("contracts.faucet", faucet, report),
        None => report.add_warning(
            "contracts.faucet",
            "No faucet configured; `kitty claim` is unavailable",
        ),
    }
    if let Some(factory) = &contracts.factory {
        validate_address("contracts.factory", factory, report);
    }

    if contracts.trip.eq_ignore_ascii_case(&contracts.token) {
        report.add_warning("contracts.token", "Token address equals the trip address");
    }
}

fn validate_token(token: &TokenConfig, report: &mut ValidationReport) {
    if token.symbol.trim().is_empty() {
        report.add_error(ValidationError::MissingTokenSymbol);
    }

    if token.decimals != AMOUNT_DECIMALS {
        report.add_error(ValidationError::InvalidTokenDecimals {
            expected: AMOUNT_DECIMALS,
            actual: token.decimals,
        });
    }
}

fn validate_trip(trip: &TripConfig, report: &mut ValidationReport) {
    if trip.name.trim().is_empty() {
        report.add_error(ValidationError::MissingTripName);
    }

    match &trip.code {
        Some(code) => {
            if code.parse::<JoinCode>().is_err() {
                report.add_error(ValidationError::InvalidJoinCode(code.clone()));
            }
        }
        None => report.add_warning(
            "trip.code",
            "No join code set; a new one is generated on every run",
        ),
    }

    if let Some(creator) = &trip.creator {
        validate_address("trip.creator", creator, report);
    }
}

fn validate_wallet(wallet: &WalletConfig, report: &mut ValidationReport) {
    match &wallet.account {
        Some(account) => validate_address("wallet.account", account, report),
        None => report.add_warning(
            "wallet.account",
            "No wallet account configured; pass --from for transactions",
        ),
    }
}

fn validate_address(field: &str, value: &str, report: &mut ValidationReport) {
    if check_env_vars(field, value, report) {
        return;
    }
    if parse_address(value).is_err() {
        report.add_error(ValidationError::InvalidAddress {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

/// Report unresolved placeholders in `value`; returns whether any were found
fn check_env_vars(field: &str, value: &str, report: &mut ValidationReport) -> bool {
    let vars = unresolved_env_vars(value);
    for var in &vars {
        report.add_error(ValidationError::InvalidEnvVar {
            var: var.clone(),
            message: format!("not set (used by {})", field),
        });
    }
    !vars.is_empty()
}
