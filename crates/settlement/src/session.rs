//! Wallet session
//!
//! A session is one connected (or not yet connected) wallet. The busy flag
//! for settle-up lives here, so two sessions never block each other.

use std::sync::atomic::{AtomicBool, Ordering};

use common::Address;

use crate::error::SettlementError;

/// Connected wallet and its in-flight settlement flag
#[derive(Debug, Default)]
pub struct Session {
    account: Option<Address>,
    settling: AtomicBool,
}

impl Session {
    /// Session for a connected wallet
    pub fn connected(account: Address) -> Self {
        Self {
            account: Some(account),
            settling: AtomicBool::new(false),
        }
    }

    /// Session without a wallet
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Connected account, or [`SettlementError::NoWallet`]
    pub fn account(&self) -> Result<Address, SettlementError> {
        self.account.ok_or(SettlementError::NoWallet)
    }

    /// Whether a settlement is running on this session
    pub fn is_settling(&self) -> bool {
        self.settling.load(Ordering::Acquire)
    }

    /// Mark a settlement as running until the guard drops
    pub fn begin_settlement(&self) -> Result<SettlingGuard<'_>, SettlementError> {
        self.settling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SettlementError::SettlementInProgress)?;
        Ok(SettlingGuard { session: self })
    }
}

/// Clears the session's settling flag on drop
#[derive(Debug)]
pub struct SettlingGuard<'a> {
    session: &'a Session,
}

impl Drop for SettlingGuard<'_> {
    fn drop(&mut self) {
        self.session.settling.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_disconnected_has_no_account() {
        assert_matches!(Session::disconnected().account(), Err(SettlementError::NoWallet));
    }

    #[test]
    fn test_guard_blocks_second_settlement() {
        let session = Session::connected(Address::ZERO);
        let guard = session.begin_settlement().unwrap();
        assert!(session.is_settling());
        assert_matches!(
            session.begin_settlement(),
            Err(SettlementError::SettlementInProgress)
        );
        drop(guard);
        assert!(!session.is_settling());
        assert!(session.begin_settlement().is_ok());
    }

    #[test]
    fn test_sessions_are_independent() {
        let first = Session::connected(Address::ZERO);
        let second = Session::connected(Address::ZERO);
        let _guard = first.begin_settlement().unwrap();
        assert!(second.begin_settlement().is_ok());
    }
}
