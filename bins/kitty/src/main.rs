//! Trip Kitty command-line client
//!
//! Reads a trip configuration, connects to the chain over JSON-RPC and runs
//! one flow per invocation: create a trip, settle up, split a receipt, join,
//! claim, or inspect members and balances.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chain::{
    JsonRpcClient, RpcFactoryContract, RpcFaucetContract, RpcTokenContract, RpcTripContract,
};
use chrono::{DateTime, Utc};
use cli::{Cli, Commands};
use common::{parse_address, Address, JoinCode, TokenAmount};
use config::{
    generate_default_config, load_config, save_config, validate_config, validate_for_create,
    KittyConfig, ValidationReport,
};
use observability::{init_logging, init_metrics, LogFormat};
use settlement::{
    JoinOutcome, Receipt, RecordedReceipt, Session, SettlementError, SettlementService,
    TripCreator,
};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Config is read before logging starts so it can pick the log format
    let loaded = match &cli.command {
        Commands::Init { .. } => None,
        Commands::Code { new: true } => None,
        _ => Some(load_config(&cli.config)),
    };

    let format = cli
        .log_format
        .map(|f| f.as_str().to_string())
        .or_else(|| match &loaded {
            Some(Ok(config)) => Some(config.logging.format.clone()),
            _ => None,
        })
        .and_then(|f| LogFormat::parse(&f))
        .unwrap_or_default();

    if let Err(e) = init_logging("kitty", format) {
        eprintln!("[error] Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }
    debug!(?cli, "CLI arguments parsed");

    match run(cli, loaded).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Command failed");
            eprintln!("[error] {}", describe(&e));
            ExitCode::FAILURE
        }
    }
}

/// User-facing text for a failed command
fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<SettlementError>() {
        Some(settlement) => settlement.user_message(),
        None => format!("{:#}", err),
    }
}

async fn run(cli: Cli, loaded: Option<Result<KittyConfig>>) -> Result<()> {
    let from = cli.from.clone();

    match cli.command {
        Commands::Init { output } => {
            info!("Executing 'init' command");
            init_command(&output)
        }
        Commands::Code { new: true } => {
            println!("{}", JoinCode::generate());
            Ok(())
        }
        command => {
            let config = match loaded {
                Some(result) => result?,
                None => load_config(&cli.config)?,
            };

            match command {
                Commands::Create { name } => {
                    info!("Executing 'create' command");
                    create_command(config, from.as_deref(), &name).await
                }
                command if command.needs_chain() => {
                    let app = App::connect(config, from.as_deref()).await?;
                    app.execute(command).await
                }
                Commands::Validate => {
                    info!("Executing 'validate' command");
                    validate_command(&cli.config, &config)
                }
                _ => code_command(&config),
            }
        }
    }
}

fn print_report(report: &ValidationReport) {
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
    }
}

fn validate_command(path: &Path, config: &KittyConfig) -> Result<()> {
    info!(?path, "Validating configuration");

    let report = validate_config(config);

    println!("\n=== Configuration Validation Report ===\n");
    print_report(&report);

    if !report.is_valid() {
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("App: {} {}", config.app.name, config.app.version);
    println!("Chain: {} (id {})", config.chain.name, config.chain.chain_id);
    println!("Trip: {}", config.trip.name);
    println!("Trip contract: {}", config.contracts.trip);
    println!("Token: {} at {}", config.token.symbol, config.contracts.token);

    Ok(())
}

fn init_command(output_path: &Path) -> Result<()> {
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    if let Some(code) = &config.trip.code {
        println!("Join code: {}", code);
    }
    println!();
    println!("Next steps:");
    println!("  1. Set KITTY_TRIP_ADDRESS, KITTY_TOKEN_ADDRESS and KITTY_ACCOUNT");
    println!("  2. Point chain.rpc_url at your node");
    println!("  3. Run 'kitty validate --config {:?}' to check configuration", output_path);
    println!("  4. Run 'kitty create --name <trip>' (needs contracts.factory) or 'kitty join' to join an existing trip");

    Ok(())
}

fn code_command(config: &KittyConfig) -> Result<()> {
    let code = config
        .trip
        .code
        .as_deref()
        .context("No join code configured; run 'kitty code --new' and add it under trip.code")?;
    let code: JoinCode = code.parse().context("Invalid trip.code")?;
    println!("{}", code);
    Ok(())
}

/// Reject an invalid configuration, surfacing warnings through the log
fn check_report(report: &ValidationReport) -> Result<()> {
    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }
    if !report.is_valid() {
        print_report(report);
        anyhow::bail!("Configuration has {} error(s)", report.errors.len());
    }
    Ok(())
}

/// Open the JSON-RPC client and make sure it serves the configured chain
async fn connect_rpc(config: &KittyConfig) -> Result<Arc<JsonRpcClient>> {
    if let Some(port) = config.monitoring.metrics_port {
        init_metrics(port)?;
    }

    let rpc = Arc::new(JsonRpcClient::new(
        &config.chain.rpc_url,
        config.receipt_poll_interval(),
    ));
    let remote_chain = rpc
        .chain_id()
        .await
        .with_context(|| format!("Failed to reach RPC endpoint {}", rpc.url()))?;
    if remote_chain != config.chain.chain_id {
        anyhow::bail!(
            "RPC endpoint is on chain {}, configuration expects {} ({})",
            remote_chain,
            config.chain.chain_id,
            config.chain.name
        );
    }
    Ok(rpc)
}

/// Session for `--from`, falling back to `wallet.account`
fn open_session(config: &KittyConfig, from: Option<&str>) -> Result<(Session, Option<Address>)> {
    let account = match from {
        Some(from) => Some(
            parse_address(from).with_context(|| format!("Invalid --from account '{}'", from))?,
        ),
        None => config.wallet_account()?,
    };
    let session = match account {
        Some(account) => Session::connected(account),
        None => Session::disconnected(),
    };
    Ok((session, account))
}

async fn create_command(config: KittyConfig, from: Option<&str>, name: &str) -> Result<()> {
    check_report(&validate_for_create(&config))?;
    let factory = config
        .factory_address()?
        .context("contracts.factory is required to create a trip")?;

    let rpc = connect_rpc(&config).await?;
    let (session, _) = open_session(&config, from)?;
    let creator = TripCreator::new(
        Arc::new(RpcFactoryContract::new(rpc.clone(), factory)),
        rpc.clone(),
        config.chain.chain_id,
    );

    let created = creator.create_trip(&session, name).await?;
    let trip = &created.trip;
    println!("[ok] Created {}", trip.name);
    println!("  contract:  {}", trip.address);
    println!("  join code: {}", trip.code);
    println!("  tx:        {}", created.receipt.tx_hash);
    println!();
    println!("Add this to your configuration:");
    println!();
    println!("contracts:");
    println!("  trip: \"{}\"", trip.address);
    println!("trip:");
    println!("  name: \"{}\"", trip.name);
    println!("  code: \"{}\"", trip.code);
    if let Some(creator) = &trip.creator {
        println!("  creator: \"{}\"", creator);
    }
    Ok(())
}

/// A configured trip with a live chain connection
struct App {
    config: KittyConfig,
    session: Session,
    service: SettlementService,
}

impl App {
    async fn connect(config: KittyConfig, from: Option<&str>) -> Result<Self> {
        check_report(&validate_config(&config))?;

        let trip = config.build_trip().context("Invalid trip configuration")?;
        let rpc = connect_rpc(&config).await?;
        let (session, account) = open_session(&config, from)?;

        let trip_address = config.trip_address()?;
        let mut service = SettlementService::new(
            trip,
            Arc::new(RpcTripContract::new(rpc.clone(), trip_address)),
            Arc::new(RpcTokenContract::new(rpc.clone(), config.token_address()?)),
            rpc.clone(),
        );
        if let Some(faucet) = config.faucet_address()? {
            service = service.with_faucet(Arc::new(RpcFaucetContract::new(rpc.clone(), faucet)));
        }

        info!(
            trip = %service.trip().name,
            contract = %trip_address,
            chain = %config.chain.name,
            account = ?account,
            "Connected"
        );

        Ok(Self {
            config,
            session,
            service,
        })
    }

    fn symbol(&self) -> &str {
        &self.config.token.symbol
    }

    fn amount(&self, amount: TokenAmount) -> String {
        format!("{} {}", amount, self.symbol())
    }

    fn label(&self, member: &Address) -> String {
        let mut label = member.to_string();
        if self.session.account().ok().as_ref() == Some(member) {
            label.push_str(" (you)");
        }
        if self.service.trip().is_creator(member) {
            label.push_str(" (creator)");
        }
        label
    }

    async fn execute(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Members => self.members().await,
            Commands::Balances => self.balances().await,
            Commands::Join => self.join().await,
            Commands::Claim => self.claim().await,
            Commands::Settle { dry_run } => self.settle(dry_run).await,
            Commands::Split { receipts } => self.split(&receipts).await,
            Commands::Init { .. } | Commands::Validate | Commands::Code { .. } => {
                anyhow::bail!("Command does not use the chain")
            }
            Commands::Create { .. } => anyhow::bail!("Trip creation does not need a trip"),
        }
    }

    async fn members(&self) -> Result<()> {
        let members = self.service.members().await?;
        println!("{} ({} members)", self.service.trip().name, members.len());
        for member in &members {
            println!("  {}", self.label(member));
        }
        Ok(())
    }

    async fn balances(&self) -> Result<()> {
        let balances = self.service.balances().await?;
        println!("{} balances ({}):", self.service.trip().name, self.symbol());
        for entry in &balances {
            let status = if entry.balance.is_debtor() {
                "owes"
            } else if entry.balance.is_creditor() {
                "is owed"
            } else {
                "settled"
            };
            println!(
                "  {:>14}  {}  {}",
                entry.balance.to_string(),
                status,
                self.label(&entry.member)
            );
        }

        if self.session.account().is_ok() {
            let held = self.service.wallet_balance(&self.session).await?;
            println!();
            println!("Wallet holds {}", self.amount(held));
        }
        Ok(())
    }

    async fn join(&self) -> Result<()> {
        match self.service.join(&self.session).await? {
            JoinOutcome::AlreadyMember => {
                println!("[ok] Already a member of {}", self.service.trip().name);
            }
            JoinOutcome::Joined(receipt) => {
                println!("[ok] Joined {}", self.service.trip().name);
                println!("  tx: {}", receipt.tx_hash);
            }
        }
        Ok(())
    }

    async fn claim(&self) -> Result<()> {
        let claimed = self.service.claim(&self.session).await?;
        println!("[ok] Faucet claimed");
        println!("  tx: {}", claimed.receipt.tx_hash);
        println!("  wallet balance: {}", self.amount(claimed.balance));
        Ok(())
    }

    async fn settle(&self, dry_run: bool) -> Result<()> {
        if dry_run {
            let candidate = self.service.preview_settlement(&self.session).await?;
            println!(
                "Would pay {} to {}",
                self.amount(candidate.amount),
                self.label(&candidate.creditor)
            );
            if !candidate.clears_debt() {
                println!(
                    "  {} would remain owed to other members",
                    self.amount(candidate.remaining_debt())
                );
            }
            return Ok(());
        }

        let receipt = self.service.settle_up(&self.session).await?;
        println!(
            "[ok] Paid {} to {}",
            self.amount(receipt.candidate.amount),
            self.label(&receipt.candidate.creditor)
        );
        println!("  approve tx: {}", receipt.approval.tx_hash);
        println!("  settle tx:  {}", receipt.settlement.tx_hash);

        let remaining = receipt.remaining_debt();
        if remaining.is_zero() {
            println!("You are all settled up.");
        } else {
            println!(
                "[warn] You still owe {}. Run 'kitty settle' again to pay the next creditor.",
                self.amount(remaining)
            );
        }
        Ok(())
    }

    async fn split(&self, paths: &[PathBuf]) -> Result<()> {
        let receipts = paths
            .iter()
            .map(|path| read_receipt(path))
            .collect::<Result<Vec<_>>>()?;

        if let Ok(me) = self.session.account() {
            if !self.service.trip().is_creator(&me) {
                println!("[warn] Only the trip creator is expected to split receipts");
            }
        }

        let split = self.service.execute_split(&self.session, &receipts).await?;
        println!(
            "[ok] Recorded {} split across {} members",
            self.amount(split.amount),
            split.members.len()
        );
        println!("  tx: {}", split.receipt.tx_hash);
        Ok(())
    }
}

/// Load a receipt file, dated by its modification time
fn read_receipt(path: &Path) -> Result<RecordedReceipt> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read receipt: {:?}", path))?;
    let receipt = Receipt::from_json(&content)
        .with_context(|| format!("Failed to parse receipt: {:?}", path))?;
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to stat receipt: {:?}", path))?;
    Ok(RecordedReceipt::new(DateTime::<Utc>::from(modified), receipt))
}
