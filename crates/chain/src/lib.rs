//! Contract clients for Trip Kitty
//!
//! The trip pool, its factory, its stablecoin and the faucet are external
//! contracts.
//! This crate gives them a protocol-agnostic async surface and two
//! implementations:
//!
//! - [`rpc`] - Ethereum JSON-RPC over HTTP (feature `rpc`, on by default)
//! - [`memory`] - in-process double used by tests and offline demos
//!
//! [`abi`] holds the `sol!` bindings and the log and revert helpers shared
//! by both.

pub mod abi;
pub mod error;
pub mod memory;
#[cfg(feature = "rpc")]
pub mod rpc;
pub mod traits;

pub use error::{ChainError, ChainResult, UNKNOWN_REASON};
pub use memory::{ChainCall, InMemoryChain, Method};
#[cfg(feature = "rpc")]
pub use rpc::{
    JsonRpcClient, RpcFactoryContract, RpcFaucetContract, RpcTokenContract, RpcTripContract,
};
pub use traits::{
    FactoryContract, FaucetContract, TokenContract, TransactionWaiter, TripContract, TxLog,
    TxReceipt,
};
