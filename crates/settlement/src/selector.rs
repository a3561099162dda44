//! Creditor selection for a debtor
//!
//! One creditor per call: the largest positive balance wins, ties go to
//! whoever comes first in directory order, and the payment is capped by
//! both the caller's debt and that creditor's credit.

use common::{Address, Balance, TokenAmount};
use serde::{Deserialize, Serialize};

use crate::error::SettlementError;

/// A member and their signed balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBalance {
    pub member: Address,
    pub balance: Balance,
}

impl MemberBalance {
    pub fn new(member: Address, balance: Balance) -> Self {
        Self { member, balance }
    }
}

/// Who to pay and how much
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementCandidate {
    /// Member receiving the payment
    pub creditor: Address,
    /// Creditor's balance at selection time
    pub creditor_balance: Balance,
    /// `min(debt, credit)`
    pub amount: TokenAmount,
    /// Caller's debt at selection time
    pub debt: TokenAmount,
}

impl SettlementCandidate {
    /// Debt left after this payment goes through
    pub fn remaining_debt(&self) -> TokenAmount {
        self.debt.saturating_sub(self.amount)
    }

    /// Whether this payment clears the caller's whole debt
    pub fn clears_debt(&self) -> bool {
        self.remaining_debt().is_zero()
    }
}

/// Pick the creditor and amount `me` should pay
///
/// `balances` is scanned in order; `me`'s own entry is ignored. Fails with
/// [`SettlementError::NoDebt`] when `my_balance >= 0` and with
/// [`SettlementError::NoCreditor`] when nobody has a positive balance.
pub fn select_settlement(
    me: Address,
    my_balance: Balance,
    balances: &[MemberBalance],
) -> Result<SettlementCandidate, SettlementError> {
    let debt = my_balance
        .debt()
        .ok_or(SettlementError::NoDebt { balance: my_balance })?;

    let mut best: Option<&MemberBalance> = None;
    for entry in balances.iter().filter(|e| e.member != me) {
        if !entry.balance.is_creditor() {
            continue;
        }
        // strict comparison keeps the first of equal balances
        if best.map_or(true, |b| entry.balance > b.balance) {
            best = Some(entry);
        }
    }

    let creditor = best.ok_or(SettlementError::NoCreditor)?;
    let credit = creditor
        .balance
        .credit()
        .ok_or(SettlementError::NoCreditor)?;

    Ok(SettlementCandidate {
        creditor: creditor.member,
        creditor_balance: creditor.balance,
        amount: debt.min(credit),
        debt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn addr(last: u8) -> Address {
        Address::with_last_byte(last)
    }

    fn amount(units: u128) -> TokenAmount {
        TokenAmount::from_units(units)
    }

    fn entries(values: &[(u8, i128)]) -> Vec<MemberBalance> {
        values
            .iter()
            .map(|(a, b)| MemberBalance::new(addr(*a), Balance::from_units(*b)))
            .collect()
    }

    const ME: u8 = 0;
    const A: u8 = 1;
    const B: u8 = 2;

    #[test]
    fn test_picks_largest_creditor_and_caps_at_credit() {
        let balances = entries(&[(ME, -300_000), (A, 100_000), (B, 250_000)]);
        let candidate =
            select_settlement(addr(ME), Balance::from_units(-300_000), &balances).unwrap();

        assert_eq!(candidate.creditor, addr(B));
        assert_eq!(candidate.amount, amount(250_000));
        assert_eq!(candidate.remaining_debt(), amount(50_000));
        assert!(!candidate.clears_debt());
    }

    #[test]
    fn test_full_debt_covered_in_one_step() {
        let balances = entries(&[(ME, -50_000), (A, 100_000)]);
        let candidate =
            select_settlement(addr(ME), Balance::from_units(-50_000), &balances).unwrap();

        assert_eq!(candidate.creditor, addr(A));
        assert_eq!(candidate.amount, amount(50_000));
        assert!(candidate.clears_debt());
    }

    #[test]
    fn test_creditor_caller_has_no_debt() {
        let balances = entries(&[(ME, 20_000), (A, -20_000)]);
        let err = select_settlement(addr(ME), Balance::from_units(20_000), &balances).unwrap_err();
        assert_matches!(err, SettlementError::NoDebt { balance } if balance == Balance::from_units(20_000));
    }

    #[test]
    fn test_settled_caller_has_no_debt() {
        let balances = entries(&[(ME, 0), (A, 0)]);
        let err = select_settlement(addr(ME), Balance::zero(), &balances).unwrap_err();
        assert_matches!(err, SettlementError::NoDebt { .. });
    }

    #[test]
    fn test_no_creditor_found() {
        let balances = entries(&[(ME, -10_000), (A, 0), (B, 0)]);
        let err = select_settlement(addr(ME), Balance::from_units(-10_000), &balances).unwrap_err();
        assert_matches!(err, SettlementError::NoCreditor);
        assert_eq!(err.user_message(), "No creditor found");
    }

    #[test]
    fn test_tie_goes_to_first_in_order() {
        let balances = entries(&[(ME, -200_000), (B, 100_000), (A, 100_000)]);
        let candidate =
            select_settlement(addr(ME), Balance::from_units(-200_000), &balances).unwrap();
        assert_eq!(candidate.creditor, addr(B));
    }

    #[test]
    fn test_debt_beyond_128_bits() {
        let huge = Balance::from_decimal_str("-1000000000000000000000000000000000000000000").unwrap();
        let credit = Balance::from_units(i128::MAX);
        let balances = vec![MemberBalance::new(addr(A), credit)];
        let candidate = select_settlement(addr(ME), huge, &balances).unwrap();

        assert_eq!(candidate.amount, amount(i128::MAX as u128));
        assert_eq!(Some(candidate.debt), huge.debt());
        assert!(!candidate.clears_debt());
    }

    #[test]
    fn test_own_stale_entry_is_ignored() {
        // directory snapshot still shows the caller as a creditor
        let balances = entries(&[(ME, 500_000), (A, 100_000)]);
        let candidate =
            select_settlement(addr(ME), Balance::from_units(-100_000), &balances).unwrap();
        assert_eq!(candidate.creditor, addr(A));
    }

    proptest! {
        #[test]
        fn picks_first_maximal_creditor(
            my_debt in 1i128..=1_000_000_000,
            others in prop::collection::vec(-1_000_000_000i128..=1_000_000_000, 1..12),
        ) {
            let balances: Vec<MemberBalance> = others
                .iter()
                .enumerate()
                .map(|(i, b)| MemberBalance::new(addr(i as u8 + 1), Balance::from_units(*b)))
                .collect();
            let my_balance = Balance::from_units(-my_debt);

            match select_settlement(addr(ME), my_balance, &balances) {
                Ok(candidate) => {
                    let max = others.iter().copied().max().unwrap();
                    prop_assert!(max > 0);
                    let first = others.iter().position(|b| *b == max).unwrap();
                    prop_assert_eq!(candidate.creditor, addr(first as u8 + 1));
                    prop_assert_eq!(candidate.creditor_balance, Balance::from_units(max));

                    let expected = my_debt.min(max) as u128;
                    prop_assert_eq!(candidate.amount, amount(expected));
                    prop_assert!(candidate.amount <= amount(my_debt as u128));
                    prop_assert!(candidate.amount <= amount(max as u128));
                }
                Err(err) => {
                    prop_assert!(
                        matches!(err, SettlementError::NoCreditor),
                        "expected NoCreditor, got {:?}",
                        err
                    );
                    prop_assert!(others.iter().all(|b| *b <= 0));
                }
            }
        }

        #[test]
        fn non_debtor_is_always_rejected(
            my_balance in 0i128..=1_000_000_000,
            others in prop::collection::vec(-1_000_000_000i128..=1_000_000_000, 0..8),
        ) {
            let balances: Vec<MemberBalance> = others
                .iter()
                .enumerate()
                .map(|(i, b)| MemberBalance::new(addr(i as u8 + 1), Balance::from_units(*b)))
                .collect();
            let result = select_settlement(addr(ME), Balance::from_units(my_balance), &balances);
            prop_assert!(
                matches!(result, Err(SettlementError::NoDebt { .. })),
                "expected NoDebt, got {:?}",
                result
            );
        }
    }
}
