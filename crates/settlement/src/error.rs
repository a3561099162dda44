//! Settlement error types

use chain::ChainError;
use common::{Address, Balance};
use thiserror::Error;

/// Broad failure classes, used for user messaging and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fixable by the user (connect, join, wait); nothing was sent
    Precondition,
    /// Wallet or user declined a request
    Rejected,
    /// Contract execution reverted
    Reverted,
    /// Transport or RPC failure
    Network,
}

impl ErrorKind {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Precondition => "precondition",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Reverted => "reverted",
            ErrorKind::Network => "network",
        }
    }
}

/// Errors that can occur during settlement operations
#[derive(Error, Debug)]
pub enum SettlementError {
    /// No wallet connected
    #[error("No wallet connected")]
    NoWallet,

    /// Caller is not an on-chain member of the trip
    #[error("{0} is not a member of this trip")]
    NotMember(Address),

    /// Caller's balance is zero or positive
    #[error("No debt to settle (balance {balance})")]
    NoDebt { balance: Balance },

    /// No member has a positive balance
    #[error("No creditor found")]
    NoCreditor,

    /// Too few on-chain members to split an expense
    #[error("At least 2 on-chain members are required, found {count}")]
    NotEnoughMembers { count: usize },

    /// No receipt has been recorded
    #[error("No receipt recorded")]
    NoReceipt,

    /// Receipt cannot be turned into an expense
    #[error("Invalid receipt: {0}")]
    InvalidReceipt(String),

    /// No faucet contract configured
    #[error("No faucet configured")]
    NoFaucet,

    /// Faucet claim is still cooling down
    #[error("Faucet cooldown active for another {remaining_secs}s")]
    FaucetCooldown { remaining_secs: u64 },

    /// Trip name is blank
    #[error("Trip name must not be empty")]
    EmptyTripName,

    /// Another settlement on this session has not finished
    #[error("A settlement is already in progress")]
    SettlementInProgress,

    /// Contract call failed
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl SettlementError {
    /// Failure class
    pub fn kind(&self) -> ErrorKind {
        match self {
            SettlementError::Chain(ChainError::Rejected(_)) => ErrorKind::Rejected,
            SettlementError::Chain(ChainError::Reverted(_)) => ErrorKind::Reverted,
            SettlementError::Chain(_) => ErrorKind::Network,
            _ => ErrorKind::Precondition,
        }
    }

    /// Short message for the person at the keyboard
    pub fn user_message(&self) -> String {
        match self {
            SettlementError::NoWallet => "Connect your wallet first".to_string(),
            SettlementError::NotMember(_) => {
                "You are not an on-chain member of this trip yet. Join first.".to_string()
            }
            SettlementError::NoDebt { .. } => "You have no debt to settle".to_string(),
            SettlementError::NoCreditor => "No creditor found".to_string(),
            SettlementError::NotEnoughMembers { count } => format!(
                "At least 2 on-chain members are needed to split (currently {})",
                count
            ),
            SettlementError::NoReceipt => "Record a receipt first".to_string(),
            SettlementError::InvalidReceipt(msg) => msg.clone(),
            SettlementError::NoFaucet => "No faucet is configured for this trip".to_string(),
            SettlementError::FaucetCooldown { remaining_secs } => format!(
                "Faucet cooldown applies, try again in {}",
                format_duration(*remaining_secs)
            ),
            SettlementError::EmptyTripName => "Enter a trip name".to_string(),
            SettlementError::SettlementInProgress => {
                "A settlement is already in progress".to_string()
            }
            SettlementError::Chain(err) => err.reason(),
        }
    }
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    match (hours, minutes) {
        (0, 0) => format!("{}s", secs),
        (0, m) => format!("{}m", m),
        (h, m) => format!("{}h {}m", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(SettlementError::NoWallet.kind(), ErrorKind::Precondition);
        assert_eq!(SettlementError::NoCreditor.kind(), ErrorKind::Precondition);
        assert_eq!(SettlementError::EmptyTripName.kind(), ErrorKind::Precondition);
        assert_eq!(
            SettlementError::from(ChainError::Rejected("no".to_string())).kind(),
            ErrorKind::Rejected
        );
        assert_eq!(
            SettlementError::from(ChainError::Reverted("x".to_string())).kind(),
            ErrorKind::Reverted
        );
        assert_eq!(
            SettlementError::from(ChainError::Transport("x".to_string())).kind(),
            ErrorKind::Network
        );
    }

    #[test]
    fn test_chain_message_is_verbatim() {
        let err = SettlementError::from(ChainError::Reverted("insufficient balance".to_string()));
        assert_eq!(err.user_message(), "insufficient balance");
    }

    #[test]
    fn test_network_fallback_text() {
        let err = SettlementError::from(ChainError::Transport(String::new()));
        assert_eq!(err.user_message(), chain::UNKNOWN_REASON);
    }

    #[test]
    fn test_cooldown_message() {
        let err = SettlementError::FaucetCooldown { remaining_secs: 3 * 3600 + 120 };
        assert_eq!(err.user_message(), "Faucet cooldown applies, try again in 3h 2m");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(600), "10m");
    }
}
