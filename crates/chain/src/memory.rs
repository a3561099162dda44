//! In-memory contract double
//!
//! Implements the trip, token, faucet, factory and waiter traits against
//! shared in-process state. Every call is appended to a journal so tests can
//! assert ordering, and any method can be made to fail once with a chosen
//! error.
//!
//! The expense accounting here is a plain equal split. It exists so the
//! settle-up and split flows can be exercised end to end and does not model
//! the deployed contract's rules.

use std::collections::HashMap;

use async_trait::async_trait;
use common::{keccak256, Address, Balance, TokenAmount, TxHash, B256, I256, U256};
use parking_lot::Mutex;

use crate::abi;
use crate::error::{ChainError, ChainResult};
use crate::traits::{
    FactoryContract, FaucetContract, TokenContract, TransactionWaiter, TripContract, TxLog,
    TxReceipt,
};

/// Tokens handed out per faucet claim (100.00)
pub const DEFAULT_FAUCET_AMOUNT: TokenAmount = TokenAmount::from_units(100_000_000);

/// Seconds between faucet claims
pub const DEFAULT_FAUCET_COOLDOWN: u64 = 24 * 60 * 60;

/// Contract methods that can be failure-injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GetMembers,
    GetBalance,
    Join,
    AddExpense,
    SettleToken,
    Approve,
    BalanceOf,
    Claim,
    CreateTrip,
    WaitForReceipt,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    GetMembers,
    GetBalance(Address),
    Join {
        from: Address,
    },
    AddExpense {
        from: Address,
        amount: TokenAmount,
        content_ref: B256,
        split_with: Vec<Address>,
    },
    SettleToken {
        from: Address,
        creditor: Address,
        amount: TokenAmount,
        token: Address,
    },
    Approve {
        from: Address,
        spender: Address,
        amount: TokenAmount,
    },
    BalanceOf(Address),
    Claim {
        from: Address,
    },
    CreateTrip {
        from: Address,
        salt: B256,
    },
    WaitForReceipt(TxHash),
}

impl ChainCall {
    /// Whether the call changes contract state
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            ChainCall::Join { .. }
                | ChainCall::AddExpense { .. }
                | ChainCall::SettleToken { .. }
                | ChainCall::Approve { .. }
                | ChainCall::Claim { .. }
                | ChainCall::CreateTrip { .. }
        )
    }
}

#[derive(Default)]
struct State {
    members: Vec<Address>,
    balances: HashMap<Address, I256>,
    token_balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    last_claims: HashMap<Address, u64>,
    trips: HashMap<B256, Address>,
    mined: HashMap<TxHash, (u64, Vec<TxLog>)>,
    failures: HashMap<Method, ChainError>,
    journal: Vec<ChainCall>,
    block_number: u64,
    tx_counter: u64,
}

impl State {
    fn take_failure(&mut self, method: Method) -> ChainResult<()> {
        match self.failures.remove(&method) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn require_member(&self, account: &Address) -> ChainResult<()> {
        if self.members.contains(account) {
            Ok(())
        } else {
            Err(ChainError::Reverted("not member".to_string()))
        }
    }

    fn balance(&self, member: &Address) -> I256 {
        self.balances.get(member).copied().unwrap_or(I256::ZERO)
    }

    fn held(&self, owner: &Address) -> U256 {
        self.token_balances.get(owner).copied().unwrap_or(U256::ZERO)
    }

    fn mine(&mut self) -> TxHash {
        self.mine_with_logs(Vec::new())
    }

    fn mine_with_logs(&mut self, logs: Vec<TxLog>) -> TxHash {
        self.tx_counter += 1;
        self.block_number += 1;
        let hash = keccak256(self.tx_counter.to_be_bytes());
        self.mined.insert(hash, (self.block_number, logs));
        hash
    }
}

fn signed(amount: U256) -> ChainResult<I256> {
    I256::try_from(amount).map_err(|_| ChainError::Reverted("amount too large".to_string()))
}

/// Address a factory deploys to for `(from, salt)`
fn derive_trip_address(factory: Address, from: Address, salt: B256) -> Address {
    let mut preimage = Vec::with_capacity(20 + 20 + 32);
    preimage.extend_from_slice(factory.as_slice());
    preimage.extend_from_slice(from.as_slice());
    preimage.extend_from_slice(salt.as_slice());
    Address::from_word(keccak256(preimage))
}

/// In-process trip, token, faucet and factory contracts
pub struct InMemoryChain {
    trip_address: Address,
    token_address: Address,
    faucet_address: Address,
    factory_address: Address,
    faucet_amount: TokenAmount,
    faucet_cooldown: u64,
    state: Mutex<State>,
}

impl InMemoryChain {
    /// Create an empty chain with the given contract addresses
    pub fn new(trip_address: Address, token_address: Address) -> Self {
        Self {
            trip_address,
            token_address,
            faucet_address: Address::repeat_byte(0xfa),
            factory_address: Address::repeat_byte(0xfc),
            faucet_amount: DEFAULT_FAUCET_AMOUNT,
            faucet_cooldown: DEFAULT_FAUCET_COOLDOWN,
            state: Mutex::new(State::default()),
        }
    }

    /// Add a member with a starting balance
    pub fn with_member(self, member: Address, balance: Balance) -> Self {
        {
            let mut state = self.state.lock();
            if !state.members.contains(&member) {
                state.members.push(member);
            }
            state.balances.insert(member, balance.value());
        }
        self
    }

    /// Give `owner` token holdings
    pub fn with_tokens(self, owner: Address, amount: TokenAmount) -> Self {
        self.state.lock().token_balances.insert(owner, amount.value());
        self
    }

    /// Overwrite a member's trip balance
    pub fn set_balance(&self, member: Address, balance: Balance) {
        self.state.lock().balances.insert(member, balance.value());
    }

    /// Make the next call to `method` fail with `error`
    pub fn fail_next(&self, method: Method, error: ChainError) {
        self.state.lock().failures.insert(method, error);
    }

    /// Record a faucet claim at `timestamp`
    pub fn set_last_claim(&self, user: Address, timestamp: u64) {
        self.state.lock().last_claims.insert(user, timestamp);
    }

    /// Current trip balance of `member`
    pub fn balance(&self, member: &Address) -> Balance {
        Balance::from_value(self.state.lock().balance(member))
    }

    /// Current token holdings of `owner`
    pub fn token_balance(&self, owner: &Address) -> TokenAmount {
        TokenAmount::from_value(self.state.lock().held(owner))
    }

    /// Remaining allowance `owner` granted `spender`
    pub fn allowance(&self, owner: &Address, spender: &Address) -> TokenAmount {
        TokenAmount::from_value(
            self.state
                .lock()
                .allowances
                .get(&(*owner, *spender))
                .copied()
                .unwrap_or(U256::ZERO),
        )
    }

    /// Every call made so far, in order
    pub fn journal(&self) -> Vec<ChainCall> {
        self.state.lock().journal.clone()
    }

    /// Only the state-changing calls made so far
    pub fn writes(&self) -> Vec<ChainCall> {
        self.journal().into_iter().filter(ChainCall::is_write).collect()
    }

    /// Forget recorded calls
    pub fn clear_journal(&self) {
        self.state.lock().journal.clear();
    }

    /// Sum of all member balances; zero while the ledger is conserved
    pub fn total_balance(&self) -> Balance {
        let total = self
            .state
            .lock()
            .balances
            .values()
            .fold(I256::ZERO, |sum, b| sum + *b);
        Balance::from_value(total)
    }

    /// Trip deployed for `salt`, if any
    pub fn deployed_trip(&self, salt: &B256) -> Option<Address> {
        self.state.lock().trips.get(salt).copied()
    }

    fn now() -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

#[async_trait]
impl TripContract for InMemoryChain {
    fn address(&self) -> Address {
        self.trip_address
    }

    async fn get_members(&self) -> ChainResult<Vec<Address>> {
        let mut state = self.state.lock();
        state.journal.push(ChainCall::GetMembers);
        state.take_failure(Method::GetMembers)?;
        Ok(state.members.clone())
    }

    async fn get_balance(&self, member: Address) -> ChainResult<Balance> {
        let mut state = self.state.lock();
        state.journal.push(ChainCall::GetBalance(member));
        state.take_failure(Method::GetBalance)?;
        Ok(Balance::from_value(state.balance(&member)))
    }

    async fn join(&self, from: Address) -> ChainResult<TxHash> {
        let mut state = self.state.lock();
        state.journal.push(ChainCall::Join { from });
        state.take_failure(Method::Join)?;

        if state.members.contains(&from) {
            return Err(ChainError::Reverted("already member".to_string()));
        }
        state.members.push(from);
        state.balances.insert(from, I256::ZERO);
        Ok(state.mine())
    }

    async fn add_expense(
        &self,
        from: Address,
        amount: TokenAmount,
        content_ref: B256,
        split_with: Vec<Address>,
    ) -> ChainResult<TxHash> {
        let mut state = self.state.lock();
        state.journal.push(ChainCall::AddExpense {
            from,
            amount,
            content_ref,
            split_with: split_with.clone(),
        });
        state.take_failure(Method::AddExpense)?;

        state.require_member(&from)?;
        if split_with.is_empty() {
            return Err(ChainError::Reverted("empty split".to_string()));
        }
        for member in &split_with {
            state.require_member(member)?;
        }

        let count = U256::from(split_with.len());
        let share = signed(amount.value() / count)?;
        let paid = signed(amount.value() / count * count)?;
        for member in &split_with {
            *state.balances.entry(*member).or_insert(I256::ZERO) -= share;
        }
        *state.balances.entry(from).or_insert(I256::ZERO) += paid;

        Ok(state.mine())
    }

    async fn settle_token(
        &self,
        from: Address,
        creditor: Address,
        amount: TokenAmount,
        token: Address,
    ) -> ChainResult<TxHash> {
        let mut state = self.state.lock();
        state.journal.push(ChainCall::SettleToken {
            from,
            creditor,
            amount,
            token,
        });
        state.take_failure(Method::SettleToken)?;

        if token != self.token_address {
            return Err(ChainError::Reverted("unsupported token".to_string()));
        }
        state.require_member(&from)?;
        state.require_member(&creditor)?;

        let units = amount.value();
        let allowance = state
            .allowances
            .get(&(from, self.trip_address))
            .copied()
            .unwrap_or(U256::ZERO);
        if allowance < units {
            return Err(ChainError::Reverted("insufficient allowance".to_string()));
        }
        let held = state.held(&from);
        if held < units {
            return Err(ChainError::Reverted("insufficient balance".to_string()));
        }
        let moved = signed(units)?;

        state.allowances.insert((from, self.trip_address), allowance - units);
        state.token_balances.insert(from, held - units);
        *state.token_balances.entry(creditor).or_insert(U256::ZERO) += units;
        *state.balances.entry(from).or_insert(I256::ZERO) += moved;
        *state.balances.entry(creditor).or_insert(I256::ZERO) -= moved;

        Ok(state.mine())
    }
}

#[async_trait]
impl TokenContract for InMemoryChain {
    fn address(&self) -> Address {
        self.token_address
    }

    async fn approve(
        &self,
        from: Address,
        spender: Address,
        amount: TokenAmount,
    ) -> ChainResult<TxHash> {
        let mut state = self.state.lock();
        state.journal.push(ChainCall::Approve {
            from,
            spender,
            amount,
        });
        state.take_failure(Method::Approve)?;

        state.allowances.insert((from, spender), amount.value());
        Ok(state.mine())
    }

    async fn balance_of(&self, owner: Address) -> ChainResult<TokenAmount> {
        let mut state = self.state.lock();
        state.journal.push(ChainCall::BalanceOf(owner));
        state.take_failure(Method::BalanceOf)?;
        Ok(TokenAmount::from_value(state.held(&owner)))
    }
}

#[async_trait]
impl FaucetContract for InMemoryChain {
    fn address(&self) -> Address {
        self.faucet_address
    }

    async fn claim(&self, from: Address) -> ChainResult<TxHash> {
        let now = Self::now();
        let mut state = self.state.lock();
        state.journal.push(ChainCall::Claim { from });
        state.take_failure(Method::Claim)?;

        let last = state.last_claims.get(&from).copied().unwrap_or(0);
        if last != 0 && now < last.saturating_add(self.faucet_cooldown) {
            return Err(ChainError::Reverted("cooldown".to_string()));
        }
        state.last_claims.insert(from, now);
        *state.token_balances.entry(from).or_insert(U256::ZERO) += self.faucet_amount.value();
        Ok(state.mine())
    }

    async fn last_claim(&self, user: Address) -> ChainResult<u64> {
        Ok(self.state.lock().last_claims.get(&user).copied().unwrap_or(0))
    }

    async fn cooldown(&self) -> ChainResult<u64> {
        Ok(self.faucet_cooldown)
    }
}

#[async_trait]
impl FactoryContract for InMemoryChain {
    fn address(&self) -> Address {
        self.factory_address
    }

    async fn predict_trip(&self, from: Address, salt: B256) -> ChainResult<Address> {
        if self.state.lock().trips.contains_key(&salt) {
            return Err(ChainError::Reverted("trip exists".to_string()));
        }
        Ok(derive_trip_address(self.factory_address, from, salt))
    }

    async fn create_trip(&self, from: Address, salt: B256) -> ChainResult<TxHash> {
        let mut state = self.state.lock();
        state.journal.push(ChainCall::CreateTrip { from, salt });
        state.take_failure(Method::CreateTrip)?;

        if state.trips.contains_key(&salt) {
            return Err(ChainError::Reverted("trip exists".to_string()));
        }
        let trip = derive_trip_address(self.factory_address, from, salt);
        state.trips.insert(salt, trip);
        let log = abi::trip_created_log(self.factory_address, from, trip, salt);
        Ok(state.mine_with_logs(vec![log]))
    }
}

#[async_trait]
impl TransactionWaiter for InMemoryChain {
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> ChainResult<TxReceipt> {
        let mut state = self.state.lock();
        state.journal.push(ChainCall::WaitForReceipt(tx_hash));
        state.take_failure(Method::WaitForReceipt)?;

        match state.mined.get(&tx_hash) {
            Some((block, logs)) => Ok(TxReceipt {
                tx_hash,
                block_number: Some(*block),
                logs: logs.clone(),
            }),
            None => Err(ChainError::Rpc {
                code: -32000,
                message: format!("unknown transaction {}", tx_hash),
                data: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn addr(last: u8) -> Address {
        Address::with_last_byte(last)
    }

    fn chain() -> InMemoryChain {
        InMemoryChain::new(addr(0xee), addr(0xdd))
    }

    #[tokio::test]
    async fn test_join_twice_reverts() {
        let chain = chain();
        chain.join(addr(1)).await.unwrap();
        let err = chain.join(addr(1)).await.unwrap_err();
        assert_eq!(err, ChainError::Reverted("already member".to_string()));
        assert_eq!(chain.get_members().await.unwrap(), vec![addr(1)]);
    }

    #[tokio::test]
    async fn test_add_expense_conserves_total() {
        let chain = chain()
            .with_member(addr(1), Balance::zero())
            .with_member(addr(2), Balance::zero())
            .with_member(addr(3), Balance::zero());

        chain
            .add_expense(
                addr(1),
                TokenAmount::from_units(30_000_000),
                B256::repeat_byte(1),
                vec![addr(1), addr(2), addr(3)],
            )
            .await
            .unwrap();

        assert_eq!(chain.balance(&addr(1)), Balance::from_units(20_000_000));
        assert_eq!(chain.balance(&addr(2)), Balance::from_units(-10_000_000));
        assert_eq!(chain.balance(&addr(3)), Balance::from_units(-10_000_000));
        assert!(chain.total_balance().is_zero());
    }

    #[tokio::test]
    async fn test_settle_requires_allowance() {
        let trip = addr(0xee);
        let token = addr(0xdd);
        let chain = chain()
            .with_member(addr(1), Balance::from_units(-100))
            .with_member(addr(2), Balance::from_units(100))
            .with_tokens(addr(1), TokenAmount::from_units(1_000));

        let err = chain
            .settle_token(addr(1), addr(2), TokenAmount::from_units(100), token)
            .await
            .unwrap_err();
        assert_eq!(err, ChainError::Reverted("insufficient allowance".to_string()));

        chain.approve(addr(1), trip, TokenAmount::from_units(100)).await.unwrap();
        chain
            .settle_token(addr(1), addr(2), TokenAmount::from_units(100), token)
            .await
            .unwrap();

        assert!(chain.balance(&addr(1)).is_zero());
        assert!(chain.balance(&addr(2)).is_zero());
        assert_eq!(chain.token_balance(&addr(2)), TokenAmount::from_units(100));
        assert!(chain.allowance(&addr(1), &trip).is_zero());
    }

    #[tokio::test]
    async fn test_settle_rejects_other_token() {
        let chain = chain()
            .with_member(addr(1), Balance::from_units(-100))
            .with_member(addr(2), Balance::from_units(100));
        let err = chain
            .settle_token(addr(1), addr(2), TokenAmount::from_units(100), addr(0x99))
            .await
            .unwrap_err();
        assert_matches!(err, ChainError::Reverted(reason) if reason == "unsupported token");
    }

    #[tokio::test]
    async fn test_fail_next_fires_once() {
        let chain = chain();
        chain.fail_next(Method::GetMembers, ChainError::Transport("down".to_string()));
        assert!(chain.get_members().await.is_err());
        assert!(chain.get_members().await.is_ok());
    }

    #[tokio::test]
    async fn test_receipts() {
        let chain = chain();
        let hash = chain.join(addr(1)).await.unwrap();
        let receipt = chain.wait_for_receipt(hash).await.unwrap();
        assert_eq!(receipt.tx_hash, hash);
        assert_eq!(receipt.block_number, Some(1));

        assert!(receipt.logs.is_empty());

        let unknown = TxHash::repeat_byte(7);
        assert!(chain.wait_for_receipt(unknown).await.is_err());
    }

    #[tokio::test]
    async fn test_faucet_cooldown() {
        let chain = chain();
        chain.claim(addr(1)).await.unwrap();
        assert_eq!(chain.token_balance(&addr(1)), DEFAULT_FAUCET_AMOUNT);
        let err = chain.claim(addr(1)).await.unwrap_err();
        assert_eq!(err, ChainError::Reverted("cooldown".to_string()));
    }

    #[test]
    fn test_faucet_reads() {
        let chain = chain();
        chain.set_last_claim(addr(1), 42);
        assert_eq!(tokio_test::block_on(chain.last_claim(addr(1))).unwrap(), 42);
        assert_eq!(tokio_test::block_on(chain.last_claim(addr(2))).unwrap(), 0);
        assert_eq!(
            tokio_test::block_on(chain.cooldown()).unwrap(),
            DEFAULT_FAUCET_COOLDOWN
        );
    }

    #[tokio::test]
    async fn test_create_trip_emits_event() {
        let chain = chain();
        let factory = FactoryContract::address(&chain);
        let salt = B256::repeat_byte(0x5a);

        let predicted = chain.predict_trip(addr(1), salt).await.unwrap();
        let hash = chain.create_trip(addr(1), salt).await.unwrap();
        let receipt = chain.wait_for_receipt(hash).await.unwrap();

        assert_eq!(abi::created_trip(&receipt.logs, factory), Some(predicted));
        assert_eq!(chain.deployed_trip(&salt), Some(predicted));
        assert_eq!(chain.writes(), vec![ChainCall::CreateTrip { from: addr(1), salt }]);
    }

    #[tokio::test]
    async fn test_create_trip_salt_is_single_use() {
        let chain = chain();
        let salt = B256::repeat_byte(0x5a);
        chain.create_trip(addr(1), salt).await.unwrap();

        let err = chain.create_trip(addr(2), salt).await.unwrap_err();
        assert_eq!(err, ChainError::Reverted("trip exists".to_string()));
        assert_matches!(chain.predict_trip(addr(2), salt).await, Err(ChainError::Reverted(_)));
    }

    #[tokio::test]
    async fn test_journal_marks_writes() {
        let chain = chain();
        chain.get_members().await.unwrap();
        chain.join(addr(1)).await.unwrap();
        assert_eq!(chain.journal().len(), 2);
        assert_eq!(chain.writes(), vec![ChainCall::Join { from: addr(1) }]);
    }
}
