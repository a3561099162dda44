//! Settlement flows for Trip Kitty
//!
//! This crate decides who pays whom and drives the contract calls:
//!
//! - [`selector`] - pure creditor/amount selection for a debtor
//! - [`service`] - settle-up, execute-split, join and faucet flows
//! - [`session`] - connected wallet and its in-flight settlement flag
//! - [`receipt`] - recorded receipts and their content references
//! - [`create`] - opening a new trip through the factory
//!
//! # Single creditor per call
//!
//! A settle-up pays exactly one creditor. A debtor who owes more than the
//! largest single credit clears the debt over several invocations; each
//! [`SettlementReceipt`] reports what is left.

pub mod create;
pub mod error;
pub mod receipt;
pub mod selector;
pub mod service;
pub mod session;

pub use create::{trip_salt, CreatedTrip, TripCreator};
pub use error::{ErrorKind, SettlementError};
pub use receipt::{latest_receipt, Receipt, ReceiptItem, RecordedReceipt};
pub use selector::{select_settlement, MemberBalance, SettlementCandidate};
pub use service::{ClaimReceipt, JoinOutcome, SettlementReceipt, SettlementService, SplitReceipt};
pub use session::{Session, SettlingGuard};

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, SettlementError>;
