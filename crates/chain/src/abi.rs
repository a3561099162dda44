//! Contract ABIs
//!
//! Call and return types are generated by `sol!`. The helpers below cover
//! what the bindings do not: revert-reason decoding and locating a newly
//! created trip in a receipt's logs.

use alloy_sol_types::{sol, Panic, Revert, SolError, SolEvent};
use common::{Address, B256};

use crate::error::{ChainError, ChainResult};
use crate::traits::TxLog;

sol! {
    /// Trip pooling contract
    #[derive(Debug)]
    interface ITripKitty {
        function join() external;
        function addExpense(uint256 amountUsdScaled, bytes cid, address[] splitWith) external;
        function settleToken(address creditor, uint256 amountUsdScaled, address token) external;
        function getMembers() external view returns (address[]);
        function getBalance(address user) external view returns (int256);
    }

    /// Settlement stablecoin
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
    }

    /// Test-token faucet
    interface IFaucet {
        function claim() external;
        function lastClaim(address user) external view returns (uint256);
        function cooldown() external view returns (uint256);
    }

    /// Deploys one trip contract per salt
    interface ITripFactory {
        function createTrip(bytes32 salt) external returns (address trip);

        event TripCreated(address indexed creator, address indexed trip, bytes32 salt);
    }
}

impl From<alloy_sol_types::Error> for ChainError {
    fn from(err: alloy_sol_types::Error) -> Self {
        ChainError::Decode(err.to_string())
    }
}

/// Human-readable reason from revert data, if it is a standard payload
///
/// Understands `Error(string)` from `require`/`revert` and `Panic(uint256)`
/// from failed assertions and checked arithmetic.
pub fn decode_revert(data: &[u8]) -> Option<String> {
    if let Ok(revert) = Revert::abi_decode(data, true) {
        return Some(revert.reason);
    }
    let panic = Panic::abi_decode(data, true).ok()?;
    let description = panic
        .kind()
        .map(|kind| kind.to_string())
        .unwrap_or_else(|| "panic".to_string());
    let code = match u64::try_from(panic.code) {
        Ok(code) => format!("{:#04x}", code),
        Err(_) => panic.code.to_string(),
    };
    Some(format!("{} (panic code {})", description, code))
}

/// Trip contract deployed by `factory`, read from a receipt's logs
///
/// Prefers the factory's `TripCreated` event. Failing that, the first log
/// emitted by any contract other than the factory is taken to be the trip's
/// own initialization.
pub fn created_trip(logs: &[TxLog], factory: Address) -> Option<Address> {
    let from_event = logs.iter().find_map(|log| {
        if log.address != factory {
            return None;
        }
        match log.topics.as_slice() {
            [signature, _creator, trip, ..] if *signature == ITripFactory::TripCreated::SIGNATURE_HASH => {
                Some(Address::from_word(*trip))
            }
            _ => None,
        }
    });

    from_event.or_else(|| {
        logs.iter()
            .map(|log| log.address)
            .find(|address| *address != factory)
    })
}

/// `TripCreated` log as the factory emits it
pub fn trip_created_log(factory: Address, creator: Address, trip: Address, salt: B256) -> TxLog {
    TxLog {
        address: factory,
        topics: vec![
            ITripFactory::TripCreated::SIGNATURE_HASH,
            creator.into_word(),
            trip.into_word(),
        ],
        data: salt.to_vec().into(),
    }
}

/// Narrow a `uint256` that holds a timestamp or duration
pub fn to_u64(value: common::U256, what: &str) -> ChainResult<u64> {
    u64::try_from(value).map_err(|_| ChainError::Decode(format!("{} exceeds u64", what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::{SolCall, SolValue};
    use common::{Bytes, I256, U256};

    #[test]
    fn test_known_selectors() {
        assert_eq!(IERC20::approveCall::SELECTOR, [0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(IERC20::balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(Revert::SELECTOR, [0x08, 0xc3, 0x79, 0xa0]);
        assert_eq!(Panic::SELECTOR, [0x4e, 0x48, 0x7b, 0x71]);
    }

    #[test]
    fn test_add_expense_layout() {
        let call = ITripKitty::addExpenseCall {
            amountUsdScaled: U256::from(15_000_000u64),
            cid: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
            splitWith: vec![Address::with_last_byte(1), Address::with_last_byte(2)],
        };
        let data = call.abi_encode();

        // selector, three head words, bytes (len + one padded word), array (len + two words)
        assert_eq!(data.len(), 4 + 3 * 32 + 2 * 32 + 3 * 32);
        assert_eq!(&data[..4], ITripKitty::addExpenseCall::SELECTOR.as_slice());
        assert_eq!(data[4 + 32 + 31], 0x60);
        assert_eq!(data[4 + 2 * 32 + 31], 0xa0);
        assert_eq!(&data[4 + 0x80..4 + 0x84], &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_full_width_returns_decode() {
        let max = U256::MAX.abi_encode();
        let decoded = IERC20::balanceOfCall::abi_decode_returns(&max, true).unwrap();
        assert_eq!(decoded._0, U256::MAX);

        let lowest = I256::MIN.abi_encode();
        let decoded = ITripKitty::getBalanceCall::abi_decode_returns(&lowest, true).unwrap();
        assert_eq!(decoded._0, I256::MIN);
    }

    #[test]
    fn test_truncated_return_is_decode_error() {
        let err: ChainError = ITripKitty::getMembersCall::abi_decode_returns(&[0u8; 10], true)
            .unwrap_err()
            .into();
        assert!(matches!(err, ChainError::Decode(_)));
    }

    #[test]
    fn test_decode_revert_reason() {
        let payload = Revert {
            reason: "insufficient allowance".to_string(),
        }
        .abi_encode();
        assert_eq!(decode_revert(&payload).as_deref(), Some("insufficient allowance"));
    }

    #[test]
    fn test_decode_panic() {
        let payload = Panic {
            code: U256::from(0x11u64),
        }
        .abi_encode();
        let reason = decode_revert(&payload).unwrap();
        assert!(reason.ends_with("(panic code 0x11)"), "{}", reason);
    }

    #[test]
    fn test_decode_revert_unknown_selector() {
        assert_eq!(decode_revert(&[0x12, 0x34, 0x56, 0x78]), None);
        assert_eq!(decode_revert(&[]), None);
    }

    #[test]
    fn test_created_trip_from_event() {
        let factory = Address::with_last_byte(0xfa);
        let trip = Address::with_last_byte(0x77);
        let logs = vec![
            TxLog {
                address: Address::with_last_byte(0x01),
                topics: vec![],
                data: Bytes::new(),
            },
            trip_created_log(factory, Address::with_last_byte(1), trip, B256::repeat_byte(9)),
        ];
        assert_eq!(created_trip(&logs, factory), Some(trip));
    }

    #[test]
    fn test_created_trip_falls_back_to_foreign_log() {
        let factory = Address::with_last_byte(0xfa);
        let logs = vec![
            TxLog {
                address: factory,
                topics: vec![B256::repeat_byte(1)],
                data: Bytes::new(),
            },
            TxLog {
                address: Address::with_last_byte(0x42),
                topics: vec![],
                data: Bytes::new(),
            },
        ];
        assert_eq!(created_trip(&logs, factory), Some(Address::with_last_byte(0x42)));
        assert_eq!(created_trip(&logs[..1], factory), None);
    }
}
