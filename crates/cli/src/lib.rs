use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kitty")]
#[command(about = "Trip Kitty - shared trip expenses settled on-chain")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "KITTY_CONFIG", default_value = "kitty.yaml")]
    pub config: PathBuf,

    /// Account to send transactions from (overrides wallet.account)
    #[arg(long, global = true, env = "KITTY_FROM")]
    pub from: Option<String>,

    /// Log output format (overrides logging.format)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter configuration file
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "kitty.yaml")]
        output: PathBuf,
    },

    /// Validate the configuration without touching the chain
    Validate,

    /// Create a new trip on-chain through the factory
    Create {
        /// Display name of the new trip
        #[arg(short, long)]
        name: String,
    },

    /// Show the trip's join code
    Code {
        /// Generate a fresh code instead
        #[arg(long)]
        new: bool,
    },

    /// List on-chain members
    Members,

    /// Show every member's balance
    Balances,

    /// Join the trip with the configured account
    Join,

    /// Claim test tokens from the faucet
    Claim,

    /// Pay the largest creditor what you owe them
    Settle {
        /// Show who would be paid without sending anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Split the latest receipt across all members
    Split {
        /// Receipt JSON file(s); the most recently modified one is used
        #[arg(short, long = "receipt", required = true, num_args = 1..)]
        receipts: Vec<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    Pretty,
    Json,
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

impl Commands {
    /// Whether the command talks to the chain
    pub fn needs_chain(&self) -> bool {
        !matches!(
            self,
            Commands::Init { .. } | Commands::Validate | Commands::Code { .. }
        )
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_settle_with_global_flags() {
        let cli = Cli::try_parse_from([
            "kitty",
            "settle",
            "--config",
            "trips/bali.yaml",
            "--from",
            "0x4444444444444444444444444444444444444444",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("trips/bali.yaml"));
        assert_eq!(
            cli.from.as_deref(),
            Some("0x4444444444444444444444444444444444444444")
        );
        assert!(matches!(cli.command, Commands::Settle { dry_run: true }));
        assert!(cli.command.needs_chain());
    }

    #[test]
    fn test_split_takes_several_receipts() {
        let cli = Cli::try_parse_from([
            "kitty",
            "split",
            "--receipt",
            "dinner.json",
            "lunch.json",
        ])
        .unwrap();

        match cli.command {
            Commands::Split { receipts } => assert_eq!(receipts.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_split_requires_a_receipt() {
        assert!(Cli::try_parse_from(["kitty", "split"]).is_err());
    }

    #[test]
    fn test_create_takes_a_name() {
        let cli = Cli::try_parse_from(["kitty", "create", "--name", "Bali 2026"]).unwrap();
        match &cli.command {
            Commands::Create { name } => assert_eq!(name, "Bali 2026"),
            other => panic!("unexpected command {:?}", other),
        }
        assert!(cli.command.needs_chain());

        assert!(Cli::try_parse_from(["kitty", "create"]).is_err());
    }

    #[test]
    fn test_offline_commands() {
        let cli = Cli::try_parse_from(["kitty", "--log-format", "json", "validate"]).unwrap();
        assert_eq!(cli.log_format, Some(LogFormatArg::Json));
        assert!(!cli.command.needs_chain());

        let cli = Cli::try_parse_from(["kitty", "code", "--new"]).unwrap();
        assert!(matches!(cli.command, Commands::Code { new: true }));
    }
}
