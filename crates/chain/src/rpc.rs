//! Ethereum JSON-RPC implementation of the contract traits
//!
//! Reads go through `eth_call`. Writes go through `eth_sendTransaction`,
//! which leaves signing to the node or wallet behind the endpoint.
//! Calldata and return values are encoded by the `sol!` bindings in
//! [`crate::abi`]; this module only carries them over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_sol_types::SolCall;
use async_trait::async_trait;
use common::{Address, Balance, Bytes, TokenAmount, TxHash, B256, U64};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::abi::{self, IFaucet, ITripFactory, ITripKitty, IERC20};
use crate::error::{ChainError, ChainResult};
use crate::traits::{
    FactoryContract, FaucetContract, TokenContract, TransactionWaiter, TripContract, TxLog,
    TxReceipt,
};

/// EIP-1193 "user rejected request"
const USER_REJECTED: i64 = 4001;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: TxHash,
    #[serde(default)]
    block_number: Option<U64>,
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    logs: Vec<TxLog>,
}

/// Pull the hex revert payload out of an error's `data` field
///
/// Nodes disagree on the shape: some return the hex string directly,
/// others nest it as `{ "data": "0x..." }`.
fn revert_data(data: &Option<Value>) -> Option<String> {
    match data.as_ref()? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("data").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Classify a JSON-RPC error object, keeping the richest reason available
fn classify_error(code: i64, message: String, data: Option<Value>) -> ChainError {
    if code == USER_REJECTED {
        return ChainError::Rejected(message);
    }

    let data_hex = revert_data(&data);
    if let Some(reason) = data_hex
        .as_deref()
        .and_then(|h| h.parse::<Bytes>().ok())
        .and_then(|bytes| abi::decode_revert(&bytes))
    {
        return ChainError::Reverted(reason);
    }

    if let Some(rest) = message.strip_prefix("execution reverted") {
        let reason = rest.trim_start_matches(':').trim();
        return ChainError::Reverted(if reason.is_empty() {
            "execution reverted".to_string()
        } else {
            reason.to_string()
        });
    }

    ChainError::Rpc {
        code,
        message,
        data: data_hex,
    }
}

/// JSON-RPC connection to an Ethereum node
pub struct JsonRpcClient {
    client: Client,
    url: String,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create a client for `url`, polling receipts every `poll_interval`
    pub fn new(url: &str, poll_interval: Duration) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
            poll_interval,
            next_id: AtomicU64::new(1),
        }
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> ChainResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "JSON-RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::Transport(format!("HTTP {}: {}", status, body)));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        if let Some(err) = body.error {
            warn!(method, code = err.code, message = %err.message, "JSON-RPC error");
            return Err(classify_error(err.code, err.message, err.data));
        }

        serde_json::from_value(body.result.unwrap_or(Value::Null))
            .map_err(|e| ChainError::Decode(format!("{} result: {}", method, e)))
    }

    /// Chain id reported by the node
    pub async fn chain_id(&self) -> ChainResult<u64> {
        let id: U64 = self.request("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    /// Read-only call of `call` against `to`, decoded with its return type
    pub async fn call<C: SolCall>(
        &self,
        from: Option<Address>,
        to: Address,
        call: &C,
    ) -> ChainResult<C::Return> {
        let mut tx = json!({ "to": to, "data": Bytes::from(call.abi_encode()) });
        if let Some(from) = from {
            tx["from"] = json!(from);
        }
        let output: Bytes = self.request("eth_call", json!([tx, "latest"])).await?;
        Ok(C::abi_decode_returns(&output, true)?)
    }

    /// Submit `call` as a transaction from `from` to `to`
    pub async fn send<C: SolCall>(&self, from: Address, to: Address, call: &C) -> ChainResult<TxHash> {
        let hash: TxHash = self
            .request(
                "eth_sendTransaction",
                json!([{
                    "from": from,
                    "to": to,
                    "data": Bytes::from(call.abi_encode()),
                }]),
            )
            .await?;
        info!(%from, %to, tx = %hash, "Transaction submitted");
        Ok(hash)
    }

    async fn get_receipt(&self, tx_hash: TxHash) -> ChainResult<Option<RawReceipt>> {
        self.request("eth_getTransactionReceipt", json!([tx_hash])).await
    }
}

fn into_receipt(raw: RawReceipt) -> ChainResult<TxReceipt> {
    let tx_hash = raw.transaction_hash;
    if raw.status == Some(U64::ZERO) {
        warn!(tx = %tx_hash, "Transaction reverted");
        return Err(ChainError::Reverted(format!("transaction {} reverted", tx_hash)));
    }
    Ok(TxReceipt {
        tx_hash,
        block_number: raw.block_number.map(|n| n.to::<u64>()),
        logs: raw.logs,
    })
}

#[async_trait]
impl TransactionWaiter for JsonRpcClient {
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> ChainResult<TxReceipt> {
        loop {
            if let Some(raw) = self.get_receipt(tx_hash).await? {
                let receipt = into_receipt(raw)?;
                debug!(tx = %tx_hash, block = ?receipt.block_number, "Transaction mined");
                return Ok(receipt);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

// ==================== Contracts ====================

/// Trip contract reached over JSON-RPC
pub struct RpcTripContract {
    rpc: Arc<JsonRpcClient>,
    address: Address,
}

impl RpcTripContract {
    pub fn new(rpc: Arc<JsonRpcClient>, address: Address) -> Self {
        Self { rpc, address }
    }
}

#[async_trait]
impl TripContract for RpcTripContract {
    fn address(&self) -> Address {
        self.address
    }

    async fn get_members(&self) -> ChainResult<Vec<Address>> {
        let members = self
            .rpc
            .call(None, self.address, &ITripKitty::getMembersCall {})
            .await?;
        Ok(members._0)
    }

    async fn get_balance(&self, member: Address) -> ChainResult<Balance> {
        let balance = self
            .rpc
            .call(None, self.address, &ITripKitty::getBalanceCall { user: member })
            .await?;
        Ok(Balance::from_value(balance._0))
    }

    async fn join(&self, from: Address) -> ChainResult<TxHash> {
        self.rpc
            .send(from, self.address, &ITripKitty::joinCall {})
            .await
    }

    async fn add_expense(
        &self,
        from: Address,
        amount: TokenAmount,
        content_ref: B256,
        split_with: Vec<Address>,
    ) -> ChainResult<TxHash> {
        let call = ITripKitty::addExpenseCall {
            amountUsdScaled: amount.value(),
            cid: Bytes::copy_from_slice(content_ref.as_slice()),
            splitWith: split_with,
        };
        self.rpc.send(from, self.address, &call).await
    }

    async fn settle_token(
        &self,
        from: Address,
        creditor: Address,
        amount: TokenAmount,
        token: Address,
    ) -> ChainResult<TxHash> {
        let call = ITripKitty::settleTokenCall {
            creditor,
            amountUsdScaled: amount.value(),
            token,
        };
        self.rpc.send(from, self.address, &call).await
    }
}

/// ERC-20 token reached over JSON-RPC
pub struct RpcTokenContract {
    rpc: Arc<JsonRpcClient>,
    address: Address,
}

impl RpcTokenContract {
    pub fn new(rpc: Arc<JsonRpcClient>, address: Address) -> Self {
        Self { rpc, address }
    }
}

#[async_trait]
impl TokenContract for RpcTokenContract {
    fn address(&self) -> Address {
        self.address
    }

    async fn approve(
        &self,
        from: Address,
        spender: Address,
        amount: TokenAmount,
    ) -> ChainResult<TxHash> {
        let call = IERC20::approveCall {
            spender,
            amount: amount.value(),
        };
        self.rpc.send(from, self.address, &call).await
    }

    async fn balance_of(&self, owner: Address) -> ChainResult<TokenAmount> {
        let held = self
            .rpc
            .call(None, self.address, &IERC20::balanceOfCall { owner })
            .await?;
        Ok(TokenAmount::from_value(held._0))
    }
}

/// Faucet reached over JSON-RPC
pub struct RpcFaucetContract {
    rpc: Arc<JsonRpcClient>,
    address: Address,
}

impl RpcFaucetContract {
    pub fn new(rpc: Arc<JsonRpcClient>, address: Address) -> Self {
        Self { rpc, address }
    }
}

#[async_trait]
impl FaucetContract for RpcFaucetContract {
    fn address(&self) -> Address {
        self.address
    }

    async fn claim(&self, from: Address) -> ChainResult<TxHash> {
        self.rpc.send(from, self.address, &IFaucet::claimCall {}).await
    }

    async fn last_claim(&self, user: Address) -> ChainResult<u64> {
        let last = self
            .rpc
            .call(None, self.address, &IFaucet::lastClaimCall { user })
            .await?;
        abi::to_u64(last._0, "lastClaim")
    }

    async fn cooldown(&self) -> ChainResult<u64> {
        let cooldown = self
            .rpc
            .call(None, self.address, &IFaucet::cooldownCall {})
            .await?;
        abi::to_u64(cooldown._0, "cooldown")
    }
}

/// Trip factory reached over JSON-RPC
pub struct RpcFactoryContract {
    rpc: Arc<JsonRpcClient>,
    address: Address,
}

impl RpcFactoryContract {
    pub fn new(rpc: Arc<JsonRpcClient>, address: Address) -> Self {
        Self { rpc, address }
    }
}

#[async_trait]
impl FactoryContract for RpcFactoryContract {
    fn address(&self) -> Address {
        self.address
    }

    async fn predict_trip(&self, from: Address, salt: B256) -> ChainResult<Address> {
        let created = self
            .rpc
            .call(Some(from), self.address, &ITripFactory::createTripCall { salt })
            .await?;
        Ok(created.trip)
    }

    async fn create_trip(&self, from: Address, salt: B256) -> ChainResult<TxHash> {
        self.rpc
            .send(from, self.address, &ITripFactory::createTripCall { salt })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::{Revert, SolError};
    use assert_matches::assert_matches;

    fn revert_hex(reason: &str) -> String {
        Bytes::from(
            Revert {
                reason: reason.to_string(),
            }
            .abi_encode(),
        )
        .to_string()
    }

    #[test]
    fn test_classify_user_rejection() {
        let err = classify_error(4001, "User rejected the request.".to_string(), None);
        assert_matches!(err, ChainError::Rejected(msg) if msg == "User rejected the request.");
    }

    #[test]
    fn test_classify_decodes_revert_data() {
        let data = Some(json!(revert_hex("insufficient balance")));
        let err = classify_error(3, "execution reverted: insufficient balance".to_string(), data);
        assert_eq!(err, ChainError::Reverted("insufficient balance".to_string()));
    }

    #[test]
    fn test_classify_nested_revert_data() {
        let data = Some(json!({ "data": revert_hex("not member") }));
        let err = classify_error(-32000, "failed".to_string(), data);
        assert_eq!(err, ChainError::Reverted("not member".to_string()));
    }

    #[test]
    fn test_classify_reverted_message_without_data() {
        let err = classify_error(-32000, "execution reverted: insufficient allowance".to_string(), None);
        assert_eq!(err, ChainError::Reverted("insufficient allowance".to_string()));

        let bare = classify_error(-32000, "execution reverted".to_string(), None);
        assert_eq!(bare, ChainError::Reverted("execution reverted".to_string()));
    }

    #[test]
    fn test_classify_plain_rpc_error() {
        let err = classify_error(-32601, "method not found".to_string(), None);
        assert_matches!(err, ChainError::Rpc { code: -32601, .. });
        assert_eq!(err.reason(), "method not found");
    }

    #[test]
    fn test_receipt_with_logs() {
        let raw: RawReceipt = serde_json::from_value(json!({
            "transactionHash": format!("0x{}", "ab".repeat(32)),
            "blockNumber": "0x10",
            "status": "0x1",
            "logs": [{
                "address": format!("0x{}", "fa".repeat(20)),
                "topics": [format!("0x{}", "01".repeat(32))],
                "data": "0x",
                "logIndex": "0x0",
            }],
        }))
        .unwrap();

        let receipt = into_receipt(raw).unwrap();
        assert_eq!(receipt.tx_hash, TxHash::repeat_byte(0xab));
        assert_eq!(receipt.block_number, Some(16));
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(receipt.logs[0].address, Address::repeat_byte(0xfa));
    }

    #[test]
    fn test_failed_status_is_revert() {
        let raw: RawReceipt = serde_json::from_value(json!({
            "transactionHash": format!("0x{}", "cd".repeat(32)),
            "blockNumber": "0x11",
            "status": "0x0",
        }))
        .unwrap();
        assert_matches!(into_receipt(raw), Err(ChainError::Reverted(_)));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transport_error() {
        let client = JsonRpcClient::new("http://127.0.0.1:9", Duration::from_millis(10));
        let err = client.chain_id().await.unwrap_err();
        assert_matches!(err, ChainError::Transport(_));
    }
}
