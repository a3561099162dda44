//! Settlement service
//!
//! Drives the on-chain flows for one trip: settle-up (approve, then
//! `settleToken`), execute-split (`addExpense`), join and faucet claim.
//! Every write is followed by a wait for its receipt before the next call.

use std::sync::Arc;

use chain::{FaucetContract, TokenContract, TransactionWaiter, TripContract, TxReceipt};
use common::{Address, TokenAmount, Trip, B256};
use observability::{FlowGuard, FlowMetrics};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SettlementError;
use crate::receipt::{latest_receipt, RecordedReceipt};
use crate::selector::{select_settlement, MemberBalance, SettlementCandidate};
use crate::session::Session;
use crate::Result;

/// Completed settle-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    /// Creditor and amount that were paid
    pub candidate: SettlementCandidate,
    /// Mined `approve` transaction
    pub approval: TxReceipt,
    /// Mined `settleToken` transaction
    pub settlement: TxReceipt,
}

impl SettlementReceipt {
    /// Debt the caller still owes other creditors
    pub fn remaining_debt(&self) -> TokenAmount {
        self.candidate.remaining_debt()
    }
}

/// Completed expense split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitReceipt {
    pub amount: TokenAmount,
    pub content_ref: B256,
    pub members: Vec<Address>,
    pub receipt: TxReceipt,
}

/// Result of a join request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Caller was already on the member list; nothing was sent
    AlreadyMember,
    /// Join transaction mined
    Joined(TxReceipt),
}

/// Completed faucet claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub receipt: TxReceipt,
    /// Token holdings after the claim
    pub balance: TokenAmount,
}

/// Settlement flows for one trip
pub struct SettlementService {
    trip: Trip,
    contract: Arc<dyn TripContract>,
    token: Arc<dyn TokenContract>,
    waiter: Arc<dyn TransactionWaiter>,
    faucet: Option<Arc<dyn FaucetContract>>,
    settle_metrics: FlowMetrics,
    split_metrics: FlowMetrics,
    join_metrics: FlowMetrics,
    claim_metrics: FlowMetrics,
}

impl SettlementService {
    /// Create a service over the trip's contracts
    pub fn new(
        trip: Trip,
        contract: Arc<dyn TripContract>,
        token: Arc<dyn TokenContract>,
        waiter: Arc<dyn TransactionWaiter>,
    ) -> Self {
        Self {
            trip,
            contract,
            token,
            waiter,
            faucet: None,
            settle_metrics: FlowMetrics::new("settle"),
            split_metrics: FlowMetrics::new("split"),
            join_metrics: FlowMetrics::new("join"),
            claim_metrics: FlowMetrics::new("claim"),
        }
    }

    /// Attach a test-token faucet
    pub fn with_faucet(mut self, faucet: Arc<dyn FaucetContract>) -> Self {
        self.faucet = Some(faucet);
        self
    }

    pub fn trip(&self) -> &Trip {
        &self.trip
    }

    /// On-chain members in directory order
    pub async fn members(&self) -> Result<Vec<Address>> {
        Ok(self.contract.get_members().await?)
    }

    /// Signed balance of every member, in directory order
    pub async fn balances(&self) -> Result<Vec<MemberBalance>> {
        let members = self.contract.get_members().await?;
        let mut balances = Vec::with_capacity(members.len());
        for member in members {
            let balance = self.contract.get_balance(member).await?;
            balances.push(MemberBalance::new(member, balance));
        }
        Ok(balances)
    }

    /// Stablecoin holdings of the connected wallet
    pub async fn wallet_balance(&self, session: &Session) -> Result<TokenAmount> {
        let me = session.account()?;
        Ok(self.token.balance_of(me).await?)
    }

    /// Work out who the connected wallet should pay, without sending anything
    pub async fn preview_settlement(&self, session: &Session) -> Result<SettlementCandidate> {
        let me = session.account()?;
        self.select_for(me).await
    }

    /// Pay the largest creditor as much of the caller's debt as they are owed
    ///
    /// Sends `approve(trip, amount)` on the token, waits for it to be mined,
    /// then sends `settleToken(creditor, amount, token)` and waits again.
    /// Only one creditor is paid per call; see
    /// [`SettlementReceipt::remaining_debt`].
    pub async fn settle_up(&self, session: &Session) -> Result<SettlementReceipt> {
        let mut flow = self.settle_metrics.start();
        let result = self.run_settle_up(session).await;
        finish(&mut flow, &result);
        result
    }

    async fn run_settle_up(&self, session: &Session) -> Result<SettlementReceipt> {
        let me = session.account()?;
        let _settling = session.begin_settlement()?;

        let candidate = self.select_for(me).await?;
        info!(
            caller = %me,
            creditor = %candidate.creditor,
            amount = %candidate.amount,
            debt = %candidate.debt,
            "Settling debt"
        );

        let approve_tx = self
            .token
            .approve(me, self.contract.address(), candidate.amount)
            .await?;
        debug!(tx = %approve_tx, "Approval submitted");
        let approval = self.waiter.wait_for_receipt(approve_tx).await?;
        debug!(tx = %approve_tx, block = ?approval.block_number, "Approval mined");

        let settle_tx = self
            .contract
            .settle_token(me, candidate.creditor, candidate.amount, self.token.address())
            .await?;
        debug!(tx = %settle_tx, "Settlement submitted");
        let settlement = self.waiter.wait_for_receipt(settle_tx).await?;

        info!(
            caller = %me,
            creditor = %candidate.creditor,
            amount = %candidate.amount,
            tx = %settle_tx,
            remaining = %candidate.remaining_debt(),
            "Settlement confirmed"
        );

        Ok(SettlementReceipt {
            candidate,
            approval,
            settlement,
        })
    }

    async fn select_for(&self, me: Address) -> Result<SettlementCandidate> {
        let members = self.contract.get_members().await?;
        if !members.contains(&me) {
            return Err(SettlementError::NotMember(me));
        }

        let my_balance = self.contract.get_balance(me).await?;
        if !my_balance.is_debtor() {
            return Err(SettlementError::NoDebt {
                balance: my_balance,
            });
        }

        let mut others = Vec::with_capacity(members.len());
        for member in members.into_iter().filter(|m| *m != me) {
            let balance = self.contract.get_balance(member).await?;
            others.push(MemberBalance::new(member, balance));
        }

        select_settlement(me, my_balance, &others)
    }

    /// Record the latest receipt as an expense split across all members
    pub async fn execute_split(
        &self,
        session: &Session,
        receipts: &[RecordedReceipt],
    ) -> Result<SplitReceipt> {
        let mut flow = self.split_metrics.start();
        let result = self.run_split(session, receipts).await;
        finish(&mut flow, &result);
        result
    }

    async fn run_split(&self, session: &Session, receipts: &[RecordedReceipt]) -> Result<SplitReceipt> {
        let me = session.account()?;
        let latest = latest_receipt(receipts).ok_or(SettlementError::NoReceipt)?;
        let amount = latest.receipt.total_amount()?;
        let content_ref = latest.receipt.content_ref()?;

        let members = self.contract.get_members().await?;
        if members.len() < 2 {
            return Err(SettlementError::NotEnoughMembers {
                count: members.len(),
            });
        }
        if !members.contains(&me) {
            return Err(SettlementError::NotMember(me));
        }
        if !self.trip.is_creator(&me) {
            warn!(caller = %me, trip = %self.trip.name, "Split sent by a wallet other than the trip creator");
        }

        info!(
            caller = %me,
            amount = %amount,
            members = members.len(),
            content_ref = %content_ref,
            "Recording expense"
        );
        let tx = self
            .contract
            .add_expense(me, amount, content_ref, members.clone())
            .await?;
        let receipt = self.waiter.wait_for_receipt(tx).await?;
        info!(tx = %tx, "Expense recorded");

        Ok(SplitReceipt {
            amount,
            content_ref,
            members,
            receipt,
        })
    }

    /// Join the trip with the connected wallet
    pub async fn join(&self, session: &Session) -> Result<JoinOutcome> {
        let mut flow = self.join_metrics.start();
        let result = self.run_join(session).await;
        finish(&mut flow, &result);
        result
    }

    async fn run_join(&self, session: &Session) -> Result<JoinOutcome> {
        let me = session.account()?;
        let members = self.contract.get_members().await?;
        if members.contains(&me) {
            debug!(caller = %me, "Already a member");
            return Ok(JoinOutcome::AlreadyMember);
        }

        let tx = self.contract.join(me).await?;
        let receipt = self.waiter.wait_for_receipt(tx).await?;
        info!(caller = %me, tx = %tx, trip = %self.trip.name, "Joined trip");
        Ok(JoinOutcome::Joined(receipt))
    }

    /// Claim test tokens from the faucet
    pub async fn claim(&self, session: &Session) -> Result<ClaimReceipt> {
        let mut flow = self.claim_metrics.start();
        let result = self.run_claim(session).await;
        finish(&mut flow, &result);
        result
    }

    async fn run_claim(&self, session: &Session) -> Result<ClaimReceipt> {
        let me = session.account()?;
        let faucet = self.faucet.as_ref().ok_or(SettlementError::NoFaucet)?;

        let last = faucet.last_claim(me).await?;
        if last != 0 {
            let cooldown = faucet.cooldown().await?;
            let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
            let ready_at = last.saturating_add(cooldown);
            if now < ready_at {
                return Err(SettlementError::FaucetCooldown {
                    remaining_secs: ready_at - now,
                });
            }
        }

        let tx = faucet.claim(me).await?;
        let receipt = self.waiter.wait_for_receipt(tx).await?;
        let balance = self.token.balance_of(me).await?;
        info!(caller = %me, tx = %tx, balance = %balance, "Faucet claimed");
        Ok(ClaimReceipt { receipt, balance })
    }
}

pub(crate) fn finish<T>(flow: &mut FlowGuard<'_>, result: &Result<T>) {
    match result {
        Ok(_) => flow.set_outcome("ok"),
        Err(err) => {
            warn!(kind = err.kind().as_str(), error = %err, "Flow failed");
            flow.set_outcome(err.kind().as_str());
        }
    }
}
