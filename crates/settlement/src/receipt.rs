//! Recorded receipts
//!
//! A receipt is the structured result of scanning a bill. Only its total
//! goes on-chain; the rest is referenced by a Keccak-256 content hash.

use chrono::{DateTime, Utc};
use common::{keccak256, TokenAmount, B256};
use serde::{Deserialize, Serialize};

use crate::error::SettlementError;

/// One line on a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub name: String,
    #[serde(default)]
    pub qty: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Scanned receipt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Receipt {
    /// Parse receipt JSON
    pub fn from_json(json: &str) -> Result<Self, SettlementError> {
        serde_json::from_str(json).map_err(|e| SettlementError::InvalidReceipt(e.to_string()))
    }

    /// Total as a 6-decimal token amount; must be strictly positive
    pub fn total_amount(&self) -> Result<TokenAmount, SettlementError> {
        let total = self
            .total
            .ok_or_else(|| SettlementError::InvalidReceipt("receipt has no total".to_string()))?;
        let amount = TokenAmount::from_f64(total)
            .map_err(|e| SettlementError::InvalidReceipt(e.to_string()))?;
        if amount.is_zero() {
            return Err(SettlementError::InvalidReceipt(format!(
                "receipt total must be positive, got {}",
                total
            )));
        }
        Ok(amount)
    }

    /// Keccak-256 of the receipt's JSON encoding
    pub fn content_ref(&self) -> Result<B256, SettlementError> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| SettlementError::InvalidReceipt(e.to_string()))?;
        Ok(keccak256(bytes))
    }
}

/// A receipt and when it was recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedReceipt {
    pub recorded_at: DateTime<Utc>,
    pub receipt: Receipt,
}

impl RecordedReceipt {
    pub fn new(recorded_at: DateTime<Utc>, receipt: Receipt) -> Self {
        Self {
            recorded_at,
            receipt,
        }
    }
}

/// Most recently recorded receipt
///
/// Receipts recorded at the same instant resolve to the earliest in the
/// list.
pub fn latest_receipt(receipts: &[RecordedReceipt]) -> Option<&RecordedReceipt> {
    receipts
        .iter()
        .reduce(|best, r| if r.recorded_at > best.recorded_at { r } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    const SCANNED: &str = r#"{
        "total": 42.5,
        "currency": "USD",
        "merchant": "Warung Made",
        "items": [
            { "name": "Nasi goreng", "qty": 2, "price": 12.5 },
            { "name": "Es teh", "qty": 1, "price": null }
        ],
        "note": null
    }"#;

    #[test]
    fn test_parse_scanned_receipt() {
        let receipt = Receipt::from_json(SCANNED).unwrap();
        assert_eq!(receipt.items.len(), 2);
        assert_eq!(receipt.items[1].price, None);
        assert_eq!(receipt.total_amount().unwrap(), TokenAmount::from_units(42_500_000));
    }

    #[test]
    fn test_sparse_receipt_parses() {
        let receipt = Receipt::from_json(r#"{ "total": 15 }"#).unwrap();
        assert!(receipt.items.is_empty());
        assert_eq!(receipt.total_amount().unwrap(), TokenAmount::from_units(15_000_000));
    }

    #[test]
    fn test_missing_or_zero_total_rejected() {
        let missing = Receipt::from_json("{}").unwrap();
        assert_matches!(missing.total_amount(), Err(SettlementError::InvalidReceipt(_)));

        let zero = Receipt { total: Some(0.0), ..Receipt::default() };
        assert_matches!(zero.total_amount(), Err(SettlementError::InvalidReceipt(_)));

        let negative = Receipt { total: Some(-3.0), ..Receipt::default() };
        assert_matches!(negative.total_amount(), Err(SettlementError::InvalidReceipt(_)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert_matches!(Receipt::from_json("{ total: "), Err(SettlementError::InvalidReceipt(_)));
    }

    #[test]
    fn test_content_ref_tracks_content() {
        let a = Receipt::from_json(SCANNED).unwrap();
        let mut b = a.clone();
        assert_eq!(a.content_ref().unwrap(), b.content_ref().unwrap());
        b.note = Some("dinner".to_string());
        assert_ne!(a.content_ref().unwrap(), b.content_ref().unwrap());
    }

    #[test]
    fn test_latest_receipt() {
        let early = RecordedReceipt::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            Receipt { total: Some(1.0), ..Receipt::default() },
        );
        let late = RecordedReceipt::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            Receipt { total: Some(2.0), ..Receipt::default() },
        );
        let receipts = vec![late.clone(), early];
        assert_eq!(latest_receipt(&receipts), Some(&late));
        assert_eq!(latest_receipt(&[]), None);
    }

    #[test]
    fn test_latest_receipt_tie_keeps_first() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let first = RecordedReceipt::new(at, Receipt { total: Some(1.0), ..Receipt::default() });
        let second = RecordedReceipt::new(at, Receipt { total: Some(2.0), ..Receipt::default() });
        let receipts = vec![first.clone(), second];
        assert_eq!(latest_receipt(&receipts), Some(&first));
    }
}
