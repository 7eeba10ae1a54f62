// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Starcoin wallet adapter over HTTP JSON-RPC (default port 9850).
//!
//! The adapter assembles the raw transaction envelope around a
//! script-function payload, hands it to the wallet for signing, submits the
//! signed hex to the txpool and polls for the transaction info.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::U256;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    BalanceQuery, ChainAdapter, ChainError, ChainTarget, ChainTransactionPayload, TxReceipt,
};
use crate::encoding::{encode_string, encode_u64};
use crate::types::StarcoinAddress;

const DEFAULT_GAS_UNIT_PRICE: u64 = 1;
const DEFAULT_GAS_TOKEN: &str = "0x1::STC::STC";
/// Transactions expire one hour after the current block timestamp
const TX_EXPIRATION_SECS: u64 = 3_600;
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const RECEIPT_POLL_ATTEMPTS: u32 = 120;

/// The signing capability an injected Starcoin wallet provides. Key custody
/// stays on the wallet side; the adapter only sees hex blobs.
#[async_trait]
pub trait StarcoinTransactionSigner: Send + Sync {
    /// Sender account address (0x-prefixed 16-byte hex)
    fn sender_address(&self) -> &str;

    /// Sign a BCS-serialized raw transaction, returning the signed
    /// transaction as hex ready for txpool submission.
    async fn sign_transaction(&self, raw_txn_hex: &str) -> Result<String, ChainError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Minimal async JSON-RPC client for a Starcoin fullnode.
#[derive(Clone, Debug)]
pub struct StarcoinRpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
    request_id: Arc<AtomicU64>,
}

fn shared_http_client() -> reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT
        .get_or_init(|| {
            reqwest::Client::builder()
                .pool_max_idle_per_host(64)
                .tcp_keepalive(Some(Duration::from_secs(30)))
                .connect_timeout(Duration::from_secs(2))
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build reqwest client")
        })
        .clone()
}

fn is_transient_transport_error(err: &reqwest::Error) -> bool {
    if err.is_connect() || err.is_timeout() {
        return true;
    }
    let msg = err.to_string().to_lowercase();
    msg.contains("connection closed")
        || msg.contains("connection reset")
        || msg.contains("broken pipe")
        || msg.contains("unexpected eof")
}

impl StarcoinRpcClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            http_client: shared_http_client(),
            rpc_url: rpc_url.into(),
            request_id: Arc::new(AtomicU64::new(1)),
        }
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, ChainError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: self.request_id.fetch_add(1, Ordering::SeqCst),
        };

        let max_attempts: usize = 3;
        for attempt in 0..max_attempts {
            let response = match self
                .http_client
                .post(&self.rpc_url)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt + 1 < max_attempts && is_transient_transport_error(&err) {
                        tracing::warn!(
                            "[StarcoinRpc] transport error calling {} (attempt {}/{}), retrying",
                            method,
                            attempt + 1,
                            max_attempts
                        );
                        tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
                        continue;
                    }
                    return Err(ChainError::Rpc(err.to_string()));
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(ChainError::Rpc(format!("HTTP {status}: {body}")));
            }

            let rpc_response: JsonRpcResponse = response
                .json()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))?;

            if let Some(error) = rpc_response.error {
                tracing::error!("[StarcoinRpc] {} failed: {} {}", method, error.code, error.message);
                return Err(super::classify_wallet_error(&format!(
                    "RPC error {}: {}",
                    error.code, error.message
                )));
            }
            return Ok(rpc_response.result.unwrap_or(Value::Null));
        }
        Err(ChainError::Rpc(format!(
            "transport kept failing calling {method}"
        )))
    }

    pub async fn chain_id(&self) -> Result<u8, ChainError> {
        let result = self.call("chain.id", vec![]).await?;
        result
            .get("id")
            .and_then(Value::as_u64)
            .map(|id| id as u8)
            .ok_or_else(|| ChainError::Rpc(format!("unexpected chain.id shape: {result}")))
    }

    /// Current head block timestamp in milliseconds.
    pub async fn block_timestamp_ms(&self) -> Result<u64, ChainError> {
        let result = self.call("chain.info", vec![]).await?;
        let ts = result
            .pointer("/head/timestamp")
            .ok_or_else(|| ChainError::Rpc(format!("unexpected chain.info shape: {result}")))?;
        match ts {
            Value::String(s) => s
                .parse::<u64>()
                .map_err(|e| ChainError::Rpc(format!("bad head timestamp {s}: {e}"))),
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| ChainError::Rpc(format!("bad head timestamp {n}"))),
            other => Err(ChainError::Rpc(format!("bad head timestamp {other}"))),
        }
    }

    pub async fn next_sequence_number(&self, address: &str) -> Result<u64, ChainError> {
        let result = self
            .call("txpool.next_sequence_number", vec![json!(address)])
            .await?;
        // Fresh accounts have no pool entry; their next sequence number is 0
        match result {
            Value::Null => Ok(0),
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| ChainError::Rpc(format!("bad sequence number {n}"))),
            other => Err(ChainError::Rpc(format!("bad sequence number {other}"))),
        }
    }

    pub async fn submit_hex_transaction(&self, signed_hex: &str) -> Result<String, ChainError> {
        let result = self
            .call("txpool.submit_hex_transaction", vec![json!(signed_hex)])
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChainError::Rpc(format!("unexpected submit result: {result}")))
    }

    pub async fn transaction_info(&self, txn_hash: &str) -> Result<Option<Value>, ChainError> {
        let result = self
            .call("chain.get_transaction_info", vec![json!(txn_hash)])
            .await?;
        Ok(match result {
            Value::Null => None,
            other => Some(other),
        })
    }

    pub async fn balance(&self, address: &str, token: &str) -> Result<U256, ChainError> {
        let result = self
            .call(
                "contract.call_v2",
                vec![json!({
                    "function_id": "0x1::Account::balance",
                    "type_args": [token],
                    "args": [address],
                })],
            )
            .await?;
        let first = result
            .as_array()
            .and_then(|values| values.first())
            .ok_or_else(|| ChainError::Rpc(format!("unexpected balance result: {result}")))?;
        let raw = match first {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => return Err(ChainError::Rpc(format!("unexpected balance value: {other}"))),
        };
        U256::from_dec_str(&raw).map_err(|e| ChainError::Rpc(format!("bad balance {raw}: {e}")))
    }
}

/// BCS-serialize a raw user transaction around an already encoded
/// script-function payload.
pub fn build_raw_transaction(
    sender: &StarcoinAddress,
    sequence_number: u64,
    payload: &[u8],
    max_gas_amount: u64,
    expiration_timestamp_secs: u64,
    chain_id: u8,
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(sender.as_bytes());
    out.extend_from_slice(&encode_u64(sequence_number));
    out.extend_from_slice(payload);
    out.extend_from_slice(&encode_u64(max_gas_amount));
    out.extend_from_slice(&encode_u64(DEFAULT_GAS_UNIT_PRICE));
    out.extend_from_slice(&encode_string(DEFAULT_GAS_TOKEN));
    out.extend_from_slice(&encode_u64(expiration_timestamp_secs));
    out.push(chain_id);
    out
}

/// Expiration derived from the chain's block timestamp, not local time;
/// `RawUserTransaction` expects seconds.
fn calculate_expiration_from_block(block_timestamp_ms: u64) -> u64 {
    (block_timestamp_ms / 1000).saturating_add(TX_EXPIRATION_SECS)
}

/// Adapter over one connected Starcoin wallet.
pub struct StarcoinWalletAdapter {
    rpc: StarcoinRpcClient,
    signer: Arc<dyn StarcoinTransactionSigner>,
    expected_chain_id: u8,
}

impl StarcoinWalletAdapter {
    pub fn new(
        rpc_url: impl Into<String>,
        signer: Arc<dyn StarcoinTransactionSigner>,
        expected_chain_id: u8,
    ) -> Self {
        Self {
            rpc: StarcoinRpcClient::new(rpc_url),
            signer,
            expected_chain_id,
        }
    }

    pub fn rpc(&self) -> &StarcoinRpcClient {
        &self.rpc
    }

    async fn wait_for_transaction(&self, txn_hash: &str) -> Result<TxReceipt, ChainError> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            if let Some(info) = self.rpc.transaction_info(txn_hash).await? {
                let status = info.get("status").cloned().unwrap_or(Value::Null);
                let success = matches!(&status, Value::String(s) if s == "Executed");
                let receipt = TxReceipt {
                    txn_hash: txn_hash.to_string(),
                    block_height: info
                        .get("block_number")
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.parse().ok())
                        .or_else(|| info.get("block_number").and_then(Value::as_u64))
                        .unwrap_or(0),
                    gas_used: info
                        .get("gas_used")
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.parse().ok())
                        .or_else(|| info.get("gas_used").and_then(Value::as_u64))
                        .unwrap_or(0),
                    success,
                };
                if !success {
                    return Err(ChainError::Reverted(format!(
                        "transaction {txn_hash} failed with status {status}"
                    )));
                }
                return Ok(receipt);
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
        Err(ChainError::Rpc(format!(
            "transaction {txn_hash} not found after {RECEIPT_POLL_ATTEMPTS} polls"
        )))
    }
}

#[async_trait]
impl ChainAdapter for StarcoinWalletAdapter {
    async fn switch_to_chain(&self, target: ChainTarget) -> Result<(), ChainError> {
        let expected = match target {
            ChainTarget::Starcoin(id) => id,
            ChainTarget::Evm(_) => {
                return Err(ChainError::UnsupportedPayload(
                    "starcoin wallet cannot switch to an evm chain".to_string(),
                ))
            }
        };
        if expected != self.expected_chain_id {
            return Err(ChainError::NetworkMismatch {
                expected: expected as u64,
                actual: self.expected_chain_id as u64,
            });
        }
        let actual = self.rpc.chain_id().await?;
        if actual != expected {
            return Err(ChainError::NetworkMismatch {
                expected: expected as u64,
                actual: actual as u64,
            });
        }
        Ok(())
    }

    async fn send_transaction(
        &self,
        payload: ChainTransactionPayload,
    ) -> Result<TxReceipt, ChainError> {
        let ChainTransactionPayload::Starcoin {
            payload,
            max_gas_amount,
        } = payload
        else {
            return Err(ChainError::UnsupportedPayload(
                "evm payload sent to the starcoin adapter".to_string(),
            ));
        };

        let sender_hex = self.signer.sender_address().to_string();
        let sender = StarcoinAddress::from_str(&sender_hex)
            .map_err(|e| ChainError::WalletNotConnected(format!("bad sender address: {e}")))?;
        let sequence_number = self.rpc.next_sequence_number(&sender_hex).await?;
        let block_timestamp_ms = self.rpc.block_timestamp_ms().await?;

        let raw_txn = build_raw_transaction(
            &sender,
            sequence_number,
            &payload,
            max_gas_amount,
            calculate_expiration_from_block(block_timestamp_ms),
            self.expected_chain_id,
        );

        let signed_hex = self
            .signer
            .sign_transaction(&format!("0x{}", hex::encode(&raw_txn)))
            .await?;
        let txn_hash = self.rpc.submit_hex_transaction(&signed_hex).await?;
        tracing::info!("[StarcoinWalletAdapter] broadcast txn {}", txn_hash);

        self.wait_for_transaction(&txn_hash).await
    }

    async fn call(&self, _payload: ChainTransactionPayload) -> Result<Vec<u8>, ChainError> {
        // Script-function payloads are not view-callable; Starcoin-side
        // idempotency checks read the indexer procedure instead.
        Err(ChainError::UnsupportedPayload(
            "read-only payload calls are not available on starcoin".to_string(),
        ))
    }

    async fn get_balance(&self, query: &BalanceQuery) -> Result<U256, ChainError> {
        let token = query.token.as_deref().unwrap_or(DEFAULT_GAS_TOKEN);
        self.rpc.balance(&query.address, token).await
    }
}
