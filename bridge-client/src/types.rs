// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use ethers::types::Address as EthAddress;
use ethers::types::H256;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::error::{BridgeClientError, BridgeClientResult};

/// Starcoin uses 16-byte addresses (128-bit)
pub const STARCOIN_ADDRESS_LENGTH: usize = 16;

/// Which chain the deposit originated on. Determines the destination chain
/// for the approve and claim submissions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransferDirection {
    EthToStarcoin,
    StarcoinToEth,
}

/// Numeric chain ids shared with the bridge contracts and the indexer.
///
/// This table doubles as the fallback mapping when an event payload does not
/// carry a numeric chain id directly. It must match the authoritative chain
/// registry of the deployment; treat the values as configuration data.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TryFromPrimitive, Display,
)]
#[repr(u8)]
pub enum BridgeChainId {
    StarcoinMainnet = 0,
    StarcoinTestnet = 1,
    StarcoinCustom = 2,
    EthMainnet = 10,
    EthSepolia = 11,
    EthCustom = 12,
}

impl BridgeChainId {
    pub fn is_starcoin_chain(&self) -> bool {
        matches!(
            self,
            BridgeChainId::StarcoinMainnet
                | BridgeChainId::StarcoinTestnet
                | BridgeChainId::StarcoinCustom
        )
    }

    pub fn is_evm_chain(&self) -> bool {
        !self.is_starcoin_chain()
    }
}

/// A 16-byte Starcoin account address, hex-encoded on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StarcoinAddress(pub [u8; STARCOIN_ADDRESS_LENGTH]);

impl StarcoinAddress {
    pub const ZERO: StarcoinAddress = StarcoinAddress([0u8; STARCOIN_ADDRESS_LENGTH]);

    pub fn new(bytes: [u8; STARCOIN_ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl FromStr for StarcoinAddress {
    type Err = BridgeClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(cleaned)
            .map_err(|e| BridgeClientError::Encoding(format!("invalid starcoin address: {e}")))?;
        if bytes.len() != STARCOIN_ADDRESS_LENGTH {
            return Err(BridgeClientError::Encoding(format!(
                "starcoin address must be {} bytes, got {}",
                STARCOIN_ADDRESS_LENGTH,
                bytes.len()
            )));
        }
        let mut arr = [0u8; STARCOIN_ADDRESS_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(StarcoinAddress(arr))
    }
}

impl fmt::Display for StarcoinAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for StarcoinAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StarcoinAddress({self})")
    }
}

impl Serialize for StarcoinAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for StarcoinAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        StarcoinAddress::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Indexer wire types (transfer procedure snapshot)
// ============================================================================

/// Transfer lifecycle status as reported by the indexer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Deposited,
    Approved,
    Claimed,
}

/// Which chain an event was observed on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataSource {
    Starcoin,
    Eth,
}

/// Snapshot of a bridge transfer's lifecycle, keyed by
/// `(source_chain_id, destination_chain_id, nonce)`.
///
/// Status transitions are monotonic: deposited -> approved -> claimed. An
/// absent `approval`/`claim` means the corresponding step has not happened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrossChainProcedure {
    /// Source chain ID where the deposit occurred
    pub source_chain_id: i32,
    /// Destination chain ID where the claim will occur
    pub destination_chain_id: i32,
    /// Transfer nonce (unique within source chain)
    pub nonce: i64,
    /// Current status of the transfer
    pub current_status: TransferStatus,
    /// Whether the transfer is complete (claimed)
    pub is_complete: bool,
    /// Deposit information (always present once observed)
    pub deposit: DepositInfo,
    /// Approval information (present after an approve transaction finalized)
    pub approval: Option<ApprovalInfo>,
    /// Claim information (present after a successful claim)
    pub claim: Option<ClaimInfo>,
}

/// Deposit event information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepositInfo {
    /// Deposit transaction hash (hex)
    pub txn_hash: String,
    /// Block height on the source chain
    pub block_height: i64,
    /// Timestamp in milliseconds
    pub timestamp_ms: i64,
    /// Sender address (hex)
    pub sender_address: String,
    /// Recipient address on the destination chain (hex)
    pub recipient_address: String,
    /// Token ID being transferred
    pub token_id: i32,
    /// Amount formatted as "100.123456 USDT"
    pub amount: String,
    /// Whether the deposit reached chain finality on the source chain
    pub is_finalized: bool,
}

/// Approval event information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalInfo {
    /// Approval transaction hash (hex)
    pub txn_hash: String,
    /// Block height where the approval was recorded
    pub block_height: i64,
    /// Timestamp in milliseconds
    pub timestamp_ms: i64,
    /// Which chain recorded the approval
    pub data_source: DataSource,
    /// Whether the approval is finalized
    pub is_finalized: bool,
}

/// Claim event information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaimInfo {
    /// Claim transaction hash (hex)
    pub txn_hash: String,
    /// Block height on the destination chain
    pub block_height: i64,
    /// Timestamp in milliseconds
    pub timestamp_ms: i64,
    /// Address that executed the claim (hex)
    pub claimer_address: String,
    /// Gas used for the claim transaction
    pub gas_usage: i64,
    /// Destination chain
    pub data_source: DataSource,
    /// Whether the claim is finalized
    pub is_finalized: bool,
}

/// Pagination info for transfer listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_count: i64,
    pub total_pages: u32,
}

/// Response for `GET /transfers/by-deposit-txn/:txn_hash`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferByDepositResponse {
    pub procedure: CrossChainProcedure,
    /// Time to wait after finalized approval before claim is allowed
    #[serde(default)]
    pub claim_delay_seconds: u64,
}

/// Response for `GET /transfers`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferListResponse {
    pub transfers: Vec<CrossChainProcedure>,
    pub pagination: Pagination,
    #[serde(default)]
    pub claim_delay_seconds: u64,
}

/// Query parameters for the transfer list endpoint
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// Response for `GET /estimate_fees?direction=...`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeEstimateResponse {
    /// Estimated cost of the deposit transaction on the source chain
    pub source_tx_estimate: i64,
    /// Combined estimate for the approve + claim legs
    pub combined_approve_and_claim_estimate: i64,
    pub approve_estimate: i64,
    pub claim_estimate: i64,
}

// ============================================================================
// Committee signature attestations
// ============================================================================

/// One validator's signature over an observed bridge action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AuthSignature {
    /// Compressed secp256k1 public key, hex-encoded
    pub authority_pub_key: String,
    /// 65-byte recoverable signature, hex-encoded
    pub signature: String,
}

/// Token transfer event observed on the EVM chain, destined for Starcoin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EthToStarcoinTokenBridge {
    pub nonce: u64,
    pub eth_chain_id: u8,
    pub starcoin_chain_id: u8,
    pub eth_address: EthAddress,
    pub starcoin_address: StarcoinAddress,
    pub token_id: u8,
    /// Amount adjusted to the bridge's canonical decimals
    pub adjusted_amount: u64,
}

/// Token transfer event observed on Starcoin, destined for the EVM chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StarcoinToEthTokenBridge {
    pub nonce: u64,
    pub starcoin_chain_id: u8,
    pub eth_chain_id: u8,
    pub starcoin_address: StarcoinAddress,
    pub eth_address: EthAddress,
    pub token_id: u8,
    pub adjusted_amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EthToStarcoinBridgeAction {
    /// Hash of the transaction where the event was emitted
    pub eth_tx_hash: H256,
    /// The index of the event in the transaction
    pub eth_event_index: u16,
    pub eth_bridge_event: EthToStarcoinTokenBridge,
    pub auth_signature: AuthSignature,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StarcoinToEthBridgeAction {
    /// Hash of the transaction where the event was emitted (hex)
    pub starcoin_tx_hash: String,
    /// The index of the event in the transaction
    pub starcoin_event_index: u16,
    pub starcoin_bridge_event: StarcoinToEthTokenBridge,
    pub auth_signature: AuthSignature,
}

/// One committee endpoint's attestation, tagged by direction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SignatureResponse {
    EthToStarcoinBridgeAction(EthToStarcoinBridgeAction),
    StarcoinToEthBridgeAction(StarcoinToEthBridgeAction),
}

impl SignatureResponse {
    pub fn auth_signature(&self) -> &AuthSignature {
        match self {
            SignatureResponse::EthToStarcoinBridgeAction(a) => &a.auth_signature,
            SignatureResponse::StarcoinToEthBridgeAction(a) => &a.auth_signature,
        }
    }

    pub fn authority_pub_key(&self) -> &str {
        &self.auth_signature().authority_pub_key
    }

    pub fn nonce(&self) -> u64 {
        match self {
            SignatureResponse::EthToStarcoinBridgeAction(a) => a.eth_bridge_event.nonce,
            SignatureResponse::StarcoinToEthBridgeAction(a) => a.starcoin_bridge_event.nonce,
        }
    }

    pub fn source_chain_id(&self) -> u8 {
        match self {
            SignatureResponse::EthToStarcoinBridgeAction(a) => a.eth_bridge_event.eth_chain_id,
            SignatureResponse::StarcoinToEthBridgeAction(a) => {
                a.starcoin_bridge_event.starcoin_chain_id
            }
        }
    }

    pub fn token_id(&self) -> u8 {
        match self {
            SignatureResponse::EthToStarcoinBridgeAction(a) => a.eth_bridge_event.token_id,
            SignatureResponse::StarcoinToEthBridgeAction(a) => a.starcoin_bridge_event.token_id,
        }
    }

    pub fn direction(&self) -> TransferDirection {
        match self {
            SignatureResponse::EthToStarcoinBridgeAction(_) => TransferDirection::EthToStarcoin,
            SignatureResponse::StarcoinToEthBridgeAction(_) => TransferDirection::StarcoinToEth,
        }
    }

    /// Decoded signature bytes for contract submission
    pub fn signature_bytes(&self) -> BridgeClientResult<Vec<u8>> {
        hex::decode(
            self.auth_signature()
                .signature
                .strip_prefix("0x")
                .unwrap_or(&self.auth_signature().signature),
        )
        .map_err(|e| BridgeClientError::Encoding(format!("invalid signature hex: {e}")))
    }

    /// True when both attestations cover the same observed event. Signers
    /// disagreeing here means someone saw a different transaction.
    pub fn attests_same_event(&self, other: &SignatureResponse) -> bool {
        match (self, other) {
            (
                SignatureResponse::EthToStarcoinBridgeAction(a),
                SignatureResponse::EthToStarcoinBridgeAction(b),
            ) => a.eth_bridge_event == b.eth_bridge_event,
            (
                SignatureResponse::StarcoinToEthBridgeAction(a),
                SignatureResponse::StarcoinToEthBridgeAction(b),
            ) => a.starcoin_bridge_event == b.starcoin_bridge_event,
            _ => false,
        }
    }
}
