//! Contract client traits
//!
//! State-changing calls return as soon as the transaction is submitted;
//! callers that depend on its effects must wait for the receipt through
//! [`TransactionWaiter`] before issuing the next call.

use async_trait::async_trait;
use common::{Address, Balance, Bytes, TokenAmount, TxHash, B256};
use serde::{Deserialize, Serialize};

use crate::error::ChainResult;

/// Event log attached to a receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLog {
    /// Emitting contract
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
}

/// Mined transaction outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Block the transaction was included in, if reported
    pub block_number: Option<u64>,
    /// Logs emitted during execution
    #[serde(default)]
    pub logs: Vec<TxLog>,
}

/// The trip pooling contract
#[async_trait]
pub trait TripContract: Send + Sync {
    /// Contract address
    fn address(&self) -> Address;

    /// On-chain members in contract order
    async fn get_members(&self) -> ChainResult<Vec<Address>>;

    /// Signed balance of `member` (negative = owes, positive = owed)
    async fn get_balance(&self, member: Address) -> ChainResult<Balance>;

    /// Join the trip as `from`
    async fn join(&self, from: Address) -> ChainResult<TxHash>;

    /// Record an expense paid by `from`, split across `split_with`
    async fn add_expense(
        &self,
        from: Address,
        amount: TokenAmount,
        content_ref: B256,
        split_with: Vec<Address>,
    ) -> ChainResult<TxHash>;

    /// Pay `amount` of `token` from `from` to `creditor`
    ///
    /// The contract pulls the tokens, so `from` must have approved at
    /// least `amount` for the trip contract beforehand.
    async fn settle_token(
        &self,
        from: Address,
        creditor: Address,
        amount: TokenAmount,
        token: Address,
    ) -> ChainResult<TxHash>;
}

/// ERC-20 stablecoin used for settlement
#[async_trait]
pub trait TokenContract: Send + Sync {
    /// Token address
    fn address(&self) -> Address;

    /// Allow `spender` to pull up to `amount` from `from`
    async fn approve(&self, from: Address, spender: Address, amount: TokenAmount)
        -> ChainResult<TxHash>;

    /// Token holdings of `owner`
    async fn balance_of(&self, owner: Address) -> ChainResult<TokenAmount>;
}

/// Test-token faucet
#[async_trait]
pub trait FaucetContract: Send + Sync {
    /// Faucet address
    fn address(&self) -> Address;

    /// Claim test tokens as `from`
    async fn claim(&self, from: Address) -> ChainResult<TxHash>;

    /// Unix time of the last claim by `user` (0 if never)
    async fn last_claim(&self, user: Address) -> ChainResult<u64>;

    /// Seconds between claims
    async fn cooldown(&self) -> ChainResult<u64>;
}

/// Trip factory
#[async_trait]
pub trait FactoryContract: Send + Sync {
    /// Factory address
    fn address(&self) -> Address;

    /// Address `createTrip(salt)` would return for `from`, without sending
    async fn predict_trip(&self, from: Address, salt: B256) -> ChainResult<Address>;

    /// Deploy a new trip contract as `from`
    async fn create_trip(&self, from: Address, salt: B256) -> ChainResult<TxHash>;
}

/// Blocks until a submitted transaction is mined
#[async_trait]
pub trait TransactionWaiter: Send + Sync {
    /// Wait for the receipt of `tx_hash`
    ///
    /// Returns [`ChainError::Reverted`](crate::ChainError::Reverted) when
    /// the transaction was mined but failed. There is no timeout.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> ChainResult<TxReceipt>;
}
