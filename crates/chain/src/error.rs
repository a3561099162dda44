//! Chain client error types

use thiserror::Error;

/// Fallback text when a failure carries no usable message
pub const UNKNOWN_REASON: &str = "unknown reason";

/// Errors returned by contract clients
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Node unreachable or response unreadable
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON-RPC error that is neither a rejection nor a revert
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<String>,
    },

    /// Wallet or user declined the request
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Contract execution reverted
    #[error("Execution reverted: {0}")]
    Reverted(String),

    /// Return data did not match the expected ABI type
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Result type for chain operations
pub type ChainResult<T> = std::result::Result<T, ChainError>;

impl ChainError {
    /// Short human-readable reason suitable for showing to a user
    pub fn reason(&self) -> String {
        let text = match self {
            ChainError::Transport(msg) => msg,
            ChainError::Rpc { message, .. } => message,
            ChainError::Rejected(msg) => {
                if msg.is_empty() {
                    return "User rejected the request".to_string();
                }
                msg
            }
            ChainError::Reverted(reason) => reason,
            ChainError::Decode(msg) => msg,
        };
        if text.trim().is_empty() {
            UNKNOWN_REASON.to_string()
        } else {
            text.clone()
        }
    }
}
