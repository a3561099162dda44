//! Common types used across Trip Kitty
//!
//! Addresses, hashes and 256-bit words are the `alloy-primitives` types. This
//! module adds address parsing with the crate's error type, the 6-decimal
//! fixed-point quantities that cross the contract boundary, and the trip
//! record.

use crate::code::JoinCode;
use crate::error::{Error, Result};
pub use alloy_primitives::{keccak256, Address, Bytes, TxHash, B256, I256, U256, U64};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of decimal places of every on-chain amount
pub const AMOUNT_DECIMALS: u32 = 6;

/// `10^AMOUNT_DECIMALS`
pub const AMOUNT_SCALE: u64 = 1_000_000;

// ==================== Address ====================

/// Parse a 20-byte hex address, with or without `0x`, in any hex case
///
/// Mixed-case input is not checked against its EIP-55 checksum, so two
/// spellings of the same bytes always parse to the same address.
pub fn parse_address(s: &str) -> Result<Address> {
    s.trim()
        .parse::<Address>()
        .map_err(|e| Error::invalid_address(format!("'{}': {}", s, e)))
}

/// Lowercase `0x` hex, the form used for hashing and storage keys
pub fn lowercase_address(address: &Address) -> String {
    format!("0x{}", alloy_primitives::hex::encode(address.as_slice()))
}

// ==================== Fixed point ====================

fn scale() -> U256 {
    U256::from(AMOUNT_SCALE)
}

/// Parse a decimal string into a sign and a 6-decimal magnitude, rounding
/// half away from zero
fn parse_scaled(input: &str) -> Result<(bool, U256)> {
    let s = input.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        Some(_) => (false, s),
        None => return Err(Error::invalid_amount("empty amount")),
    };

    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        return Err(Error::invalid_amount(format!("'{}' is not a decimal number", input)));
    }

    let overflow = || Error::invalid_amount(format!("'{}' is out of range", input));
    let ten = U256::from(10u64);

    let mut units = U256::ZERO;
    for b in int_part.bytes() {
        units = units
            .checked_mul(ten)
            .and_then(|u| u.checked_add(U256::from(b - b'0')))
            .ok_or_else(overflow)?;
    }
    units = units.checked_mul(scale()).ok_or_else(overflow)?;

    let frac = frac_part.as_bytes();
    let mut frac_units: u64 = 0;
    for i in 0..AMOUNT_DECIMALS as usize {
        let digit = frac.get(i).map(|b| u64::from(b - b'0')).unwrap_or(0);
        frac_units = frac_units * 10 + digit;
    }
    if frac.get(AMOUNT_DECIMALS as usize).is_some_and(|b| *b >= b'5') {
        frac_units += 1;
    }

    units = units.checked_add(U256::from(frac_units)).ok_or_else(overflow)?;
    Ok((negative, units))
}

/// Scale a float by `10^6` and round half away from zero
fn scale_f64(value: f64) -> Result<i128> {
    if !value.is_finite() {
        return Err(Error::invalid_amount(format!("{} is not finite", value)));
    }
    let scaled = (value * AMOUNT_SCALE as f64).round();
    if scaled.abs() >= 1e30 {
        return Err(Error::invalid_amount(format!("{} is out of range", value)));
    }
    Ok(scaled as i128)
}

/// Render units as a decimal string with at least two decimals
fn format_scaled(negative: bool, magnitude: U256) -> String {
    let whole = magnitude / scale();
    // below 10^6, so the low limb holds all of it
    let frac = (magnitude % scale()).as_limbs()[0];
    let frac = format!("{:06}", frac);
    let frac = frac.trim_end_matches('0');
    let frac = if frac.len() < 2 {
        format!("{:0<2}", frac)
    } else {
        frac.to_string()
    };
    let sign = if negative && !magnitude.is_zero() { "-" } else { "" };
    format!("{}{}.{}", sign, whole, frac)
}

/// Signed member balance in 6-decimal stablecoin units
///
/// Positive means the member is owed money, negative means the member owes.
/// Holds the full `int256` range the contract reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(pub I256);

impl Balance {
    /// Zero balance
    pub const fn zero() -> Self {
        Self(I256::ZERO)
    }

    /// Create from raw 6-decimal units
    pub fn from_units(units: i128) -> Self {
        let magnitude = I256::from_raw(U256::from(units.unsigned_abs()));
        Self(if units < 0 { -magnitude } else { magnitude })
    }

    /// Wrap a raw `int256`
    pub const fn from_value(value: I256) -> Self {
        Self(value)
    }

    /// Raw `int256` in 6-decimal units
    pub const fn value(&self) -> I256 {
        self.0
    }

    /// Member owes money
    pub fn is_debtor(&self) -> bool {
        self.0.is_negative()
    }

    /// Member is owed money
    pub fn is_creditor(&self) -> bool {
        self.0.is_positive()
    }

    /// Member is settled
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Amount owed, if the member is a debtor
    pub fn debt(&self) -> Option<TokenAmount> {
        self.is_debtor().then(|| TokenAmount(self.0.unsigned_abs()))
    }

    /// Amount owed to the member, if a creditor
    pub fn credit(&self) -> Option<TokenAmount> {
        self.is_creditor().then(|| TokenAmount(self.0.unsigned_abs()))
    }

    /// Parse a signed decimal string such as `-0.30`
    pub fn from_decimal_str(s: &str) -> Result<Self> {
        let (negative, magnitude) = parse_scaled(s)?;
        let sign = if negative {
            alloy_primitives::Sign::Negative
        } else {
            alloy_primitives::Sign::Positive
        };
        I256::checked_from_sign_and_abs(sign, magnitude)
            .map(Self)
            .ok_or_else(|| Error::invalid_amount(format!("'{}' is out of range", s)))
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Balance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_scaled(self.is_debtor(), self.0.unsigned_abs()))
    }
}

/// Unsigned token quantity in 6-decimal units, as sent to the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAmount(pub U256);

impl TokenAmount {
    /// Zero tokens
    pub const ZERO: TokenAmount = TokenAmount(U256::ZERO);

    /// Create from raw 6-decimal units
    pub const fn from_units(units: u128) -> Self {
        Self(U256::from_limbs([units as u64, (units >> 64) as u64, 0, 0]))
    }

    /// Wrap a raw `uint256`
    pub const fn from_value(value: U256) -> Self {
        Self(value)
    }

    /// Raw `uint256` in 6-decimal units
    pub const fn value(&self) -> U256 {
        self.0
    }

    /// Whether the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Parse a non-negative decimal string such as `15.00`
    pub fn from_decimal_str(s: &str) -> Result<Self> {
        match parse_scaled(s)? {
            (true, magnitude) if !magnitude.is_zero() => {
                Err(Error::invalid_amount(format!("'{}' is negative", s)))
            }
            (_, magnitude) => Ok(Self(magnitude)),
        }
    }

    /// Convert a decimal float, `round(value * 1_000_000)`
    pub fn from_f64(value: f64) -> Result<Self> {
        let units = scale_f64(value)?;
        u128::try_from(units)
            .map(Self::from_units)
            .map_err(|_| Error::invalid_amount(format!("'{}' is negative", value)))
    }

    /// Subtract, saturating at zero
    pub fn saturating_sub(self, other: TokenAmount) -> TokenAmount {
        TokenAmount(self.0.saturating_sub(other.0))
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_scaled(false, self.0))
    }
}

// ==================== Trip ====================

/// A trip: a fund pool and membership group bound to one contract instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    /// Off-chain identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Code other members use to find the trip
    pub code: JoinCode,
    /// Wallet that created the trip, when known
    pub creator: Option<Address>,
    /// Pooling contract
    pub address: Address,
    /// Chain the contract lives on
    pub chain_id: u64,
}

impl Trip {
    /// Create a trip with a fresh id
    pub fn new(
        name: impl Into<String>,
        code: JoinCode,
        creator: Option<Address>,
        address: Address,
        chain_id: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            code,
            creator,
            address,
            chain_id,
        }
    }

    /// Whether `account` created this trip. Unknown creators match nobody.
    pub fn is_creator(&self, account: &Address) -> bool {
        self.creator.as_ref() == Some(account)
    }
}
