// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Scripted fakes for the settlement driver's collaborators.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{Address as EthAddress, H256, U256};
use tokio_util::sync::CancellationToken;

use crate::chain::{
    BalanceQuery, ChainAdapter, ChainError, ChainTarget, ChainTransactionPayload, TxReceipt,
};
use crate::client::{CommitteeSignerApi, SignatureRequest, TransferIndexerApi};
use crate::config::{
    BridgeClientConfig, BridgeEnvironment, CommitteeConfig, EthConfig, IndexerConfig,
    StarcoinConfig, TokenConfig,
};
use crate::error::BridgeClientResult;
use crate::types::{
    ApprovalInfo, AuthSignature, CrossChainProcedure, DataSource, DepositInfo,
    EthToStarcoinBridgeAction, EthToStarcoinTokenBridge, SignatureResponse, StarcoinAddress,
    StarcoinToEthBridgeAction, StarcoinToEthTokenBridge, TransferByDepositResponse,
    TransferStatus,
};

pub fn test_config() -> BridgeClientConfig {
    BridgeClientConfig {
        environment: BridgeEnvironment::Custom,
        indexer: IndexerConfig {
            base_url: "http://127.0.0.1:9000".to_string(),
            poll_interval_ms: 10,
        },
        committee: CommitteeConfig {
            signer_urls: vec![
                "http://127.0.0.1:9101".to_string(),
                "http://127.0.0.1:9102".to_string(),
                "http://127.0.0.1:9103".to_string(),
            ],
            collection_timeout_ms: 500,
        },
        eth: EthConfig {
            eth_rpc_url: "http://127.0.0.1:8545".to_string(),
            eth_bridge_proxy_address: "0x0c9bd5ff20cac3f98f4cc01d4a5f174aeb204d18".to_string(),
            eth_bridge_chain_id: 12,
            eth_network_id: 31337,
        },
        starcoin: StarcoinConfig {
            starcoin_rpc_url: "http://127.0.0.1:9850".to_string(),
            starcoin_bridge_module_address: "0xf8eda27b31a0dcd9b6c06074d74a2c6c".to_string(),
            starcoin_bridge_module_name: "Bridge".to_string(),
            starcoin_bridge_chain_id: 2,
        },
        tokens: [
            (
                "ETH".to_string(),
                TokenConfig {
                    token_id: 2,
                    claim_function: "claim_bridge_eth".to_string(),
                    send_function: None,
                    decimals: Some(8),
                },
            ),
            (
                "USDT".to_string(),
                TokenConfig {
                    token_id: 4,
                    claim_function: "claim_bridge_usdt".to_string(),
                    send_function: Some("send_bridge_usdt".to_string()),
                    decimals: Some(6),
                },
            ),
        ]
        .into_iter()
        .collect(),
    }
}

pub fn deposit_procedure(status: TransferStatus, deposit_finalized: bool) -> CrossChainProcedure {
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64;
    CrossChainProcedure {
        source_chain_id: 12,
        destination_chain_id: 2,
        nonce: 1,
        current_status: status,
        is_complete: status == TransferStatus::Claimed,
        deposit: DepositInfo {
            txn_hash: "0xdeadbeef".to_string(),
            block_height: 100,
            // the deposit finalized well in the past so elapsed claim
            // delays count down from zero in tests
            timestamp_ms: now_ms - 3_600_000,
            sender_address: "0x00000000000000000000000000000000000000c8".to_string(),
            recipient_address: "0xba0f421cab925857ae31f058c2f027f8".to_string(),
            token_id: 2,
            amount: "1 ETH".to_string(),
            is_finalized: deposit_finalized,
        },
        approval: (status != TransferStatus::Deposited).then(|| ApprovalInfo {
            txn_hash: "0xapproval".to_string(),
            block_height: 101,
            timestamp_ms: now_ms - 1_800_000,
            data_source: DataSource::Starcoin,
            is_finalized: true,
        }),
        claim: None,
    }
}

pub fn indexer_response(procedure: CrossChainProcedure) -> TransferByDepositResponse {
    TransferByDepositResponse {
        procedure,
        claim_delay_seconds: 0,
    }
}

/// Committee attestation for the eth->starcoin direction matching
/// [`deposit_procedure`], signed by `key`.
pub fn eth_to_starcoin_signature(key: &str) -> SignatureResponse {
    SignatureResponse::EthToStarcoinBridgeAction(EthToStarcoinBridgeAction {
        eth_tx_hash: H256::zero(),
        eth_event_index: 0,
        eth_bridge_event: EthToStarcoinTokenBridge {
            nonce: 1,
            eth_chain_id: 12,
            starcoin_chain_id: 2,
            eth_address: EthAddress::from_str("0x00000000000000000000000000000000000000c8")
                .unwrap(),
            starcoin_address: StarcoinAddress::from_str("0xba0f421cab925857ae31f058c2f027f8")
                .unwrap(),
            token_id: 2,
            adjusted_amount: 100_000_000,
        },
        auth_signature: AuthSignature {
            authority_pub_key: key.to_string(),
            signature: hex::encode([0x11; 65]),
        },
    })
}

/// Committee attestation for the starcoin->eth direction.
pub fn starcoin_to_eth_signature(key: &str) -> SignatureResponse {
    SignatureResponse::StarcoinToEthBridgeAction(StarcoinToEthBridgeAction {
        starcoin_tx_hash: "0xdeadbeef".to_string(),
        starcoin_event_index: 0,
        starcoin_bridge_event: StarcoinToEthTokenBridge {
            nonce: 1,
            starcoin_chain_id: 2,
            eth_chain_id: 12,
            starcoin_address: StarcoinAddress::from_str("0xba0f421cab925857ae31f058c2f027f8")
                .unwrap(),
            eth_address: EthAddress::from_str("0x00000000000000000000000000000000000000c8")
                .unwrap(),
            token_id: 2,
            adjusted_amount: 100_000_000,
        },
        auth_signature: AuthSignature {
            authority_pub_key: key.to_string(),
            signature: hex::encode([0x22; 65]),
        },
    })
}

/// Indexer fake replaying a scripted sequence of responses; the last entry
/// repeats forever.
pub struct MockIndexer {
    responses: Mutex<VecDeque<BridgeClientResult<Option<TransferByDepositResponse>>>>,
    polls: AtomicUsize,
}

impl MockIndexer {
    pub fn with_sequence(
        responses: Vec<BridgeClientResult<Option<TransferByDepositResponse>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            polls: AtomicUsize::new(0),
        })
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferIndexerApi for MockIndexer {
    async fn transfer_by_deposit(
        &self,
        _txn_hash: &str,
    ) -> BridgeClientResult<Option<TransferByDepositResponse>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.pop_front().unwrap()
        } else {
            responses
                .front()
                .cloned()
                .unwrap_or(Ok(None))
        }
    }
}

/// Signer fake returning one scripted collection outcome per call; the last
/// outcome repeats.
pub struct MockSignerCommittee {
    outcomes: Mutex<VecDeque<BridgeClientResult<Vec<SignatureResponse>>>>,
    calls: AtomicUsize,
}

impl MockSignerCommittee {
    pub fn with_outcomes(
        outcomes: Vec<BridgeClientResult<Vec<SignatureResponse>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommitteeSignerApi for MockSignerCommittee {
    async fn collect_signatures(
        &self,
        _request: &SignatureRequest,
        _quorum: usize,
        _cancel: &CancellationToken,
    ) -> BridgeClientResult<Vec<SignatureResponse>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.len() > 1 {
            outcomes.pop_front().unwrap()
        } else {
            outcomes
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(vec![]))
        }
    }
}

/// Chain adapter fake recording broadcasts; results are scripted per send.
pub struct MockChainAdapter {
    pub sent: Mutex<Vec<ChainTransactionPayload>>,
    send_results: Mutex<VecDeque<Result<TxReceipt, ChainError>>>,
    call_results: Mutex<VecDeque<Result<Vec<u8>, ChainError>>>,
    /// Simulated wallet latency, lets tests overlap two submissions
    pub send_delay: Duration,
}

impl MockChainAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            send_results: Mutex::new(VecDeque::new()),
            call_results: Mutex::new(VecDeque::new()),
            send_delay: Duration::ZERO,
        })
    }

    pub fn with_send_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            send_results: Mutex::new(VecDeque::new()),
            call_results: Mutex::new(VecDeque::new()),
            send_delay: delay,
        })
    }

    pub fn push_send_result(&self, result: Result<TxReceipt, ChainError>) {
        self.send_results.lock().unwrap().push_back(result);
    }

    pub fn push_call_result(&self, result: Result<Vec<u8>, ChainError>) {
        self.call_results.lock().unwrap().push_back(result);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn default_receipt() -> TxReceipt {
        TxReceipt {
            txn_hash: "0xreceipt".to_string(),
            block_height: 1,
            gas_used: 100_000,
            success: true,
        }
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    async fn switch_to_chain(&self, _target: ChainTarget) -> Result<(), ChainError> {
        Ok(())
    }

    async fn send_transaction(
        &self,
        payload: ChainTransactionPayload,
    ) -> Result<TxReceipt, ChainError> {
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        self.sent.lock().unwrap().push(payload);
        self.send_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::default_receipt()))
    }

    async fn call(&self, _payload: ChainTransactionPayload) -> Result<Vec<u8>, ChainError> {
        self.call_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ethers::abi::encode(&[ethers::abi::Token::Uint(U256::zero())])))
    }

    async fn get_balance(&self, _query: &BalanceQuery) -> Result<U256, ChainError> {
        Ok(U256::zero())
    }
}
