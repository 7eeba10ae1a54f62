// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Chain submission capability.
//!
//! Each wallet context exposes the same small surface: switch the active
//! network, send an encoded transaction and wait for its receipt, read a
//! balance, and run a read-only contract call. The settlement driver only
//! ever sees this trait; the two concrete adapters live in [`eth`] and
//! [`starcoin`].

pub mod eth;
pub mod starcoin;

use async_trait::async_trait;
use ethers::types::{Address as EthAddress, Bytes, U256};
use thiserror::Error;

/// Wallet/chain-level failures, kept distinguishable so the driver can
/// decide between prompting reconnection, retrying after a delay, and
/// treating the step as fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    // The user declined the wallet prompt
    #[error("user rejected the wallet request: {0}")]
    UserRejected(String),
    // The wallet already has a pending request; retryable after a delay
    #[error("wallet already has a pending request")]
    RequestAlreadyPending,
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    // The wallet is on a different network than the transfer needs
    #[error("network mismatch: expected chain {expected}, wallet is on {actual}")]
    NetworkMismatch { expected: u64, actual: u64 },
    // The transaction executed and reverted; reason text when available
    #[error("transaction reverted: {0}")]
    Reverted(String),
    #[error("wallet not connected: {0}")]
    WalletNotConnected(String),
    // The bridge contract is paused; nothing can settle until unpause
    #[error("bridge is paused on the destination chain")]
    BridgePaused,
    // The payload variant does not belong to this chain
    #[error("unsupported payload for this chain adapter: {0}")]
    UnsupportedPayload(String),
    // Transport or node-level failure
    #[error("rpc error: {0}")]
    Rpc(String),
}

impl ChainError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ChainError::UserRejected(_) => "user_rejected",
            ChainError::RequestAlreadyPending => "request_already_pending",
            ChainError::InsufficientFunds(_) => "insufficient_funds",
            ChainError::NetworkMismatch { .. } => "network_mismatch",
            ChainError::Reverted(_) => "reverted",
            ChainError::WalletNotConnected(_) => "wallet_not_connected",
            ChainError::BridgePaused => "bridge_paused",
            ChainError::UnsupportedPayload(_) => "unsupported_payload",
            ChainError::Rpc(_) => "rpc_error",
        }
    }

    /// True for failures worth retrying after a short delay.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChainError::RequestAlreadyPending | ChainError::Rpc(_)
        )
    }
}

/// Classify a raw provider/wallet error message into a [`ChainError`].
///
/// Injected wallets surface rejections and busy states as stringly-typed
/// errors with stable markers (EIP-1193 code 4001, -32002); map them into
/// distinct kinds instead of a generic failure.
pub fn classify_wallet_error(message: &str) -> ChainError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("user rejected") || lower.contains("user denied") || lower.contains("4001") {
        return ChainError::UserRejected(message.to_string());
    }
    if lower.contains("already pending") || lower.contains("-32002") {
        return ChainError::RequestAlreadyPending;
    }
    if lower.contains("insufficient funds") || lower.contains("insufficient balance") {
        return ChainError::InsufficientFunds(message.to_string());
    }
    if let Some(idx) = lower.find("execution reverted") {
        let tail = &message[idx + "execution reverted".len()..];
        let reason = tail.trim_start_matches([':', ' ']);
        let reason = if reason.is_empty() { message } else { reason };
        return ChainError::Reverted(reason.to_string());
    }
    ChainError::Rpc(message.to_string())
}

/// The chain a wallet should switch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainTarget {
    /// EVM network id (eth_chainId)
    Evm(u64),
    /// Starcoin chain id
    Starcoin(u8),
}

/// Encoded transaction body, one variant per chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainTransactionPayload {
    Evm {
        to: EthAddress,
        data: Bytes,
        value: U256,
    },
    Starcoin {
        /// BCS-encoded script-function transaction payload
        payload: Vec<u8>,
        max_gas_amount: u64,
    },
}

/// Receipt of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub txn_hash: String,
    pub block_height: u64,
    pub gas_used: u64,
    pub success: bool,
}

/// Balance query, native coin unless a token code is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceQuery {
    pub address: String,
    pub token: Option<String>,
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Ask the wallet to switch its active network. Fails when the chain is
    /// unsupported or the user declines.
    async fn switch_to_chain(&self, target: ChainTarget) -> Result<(), ChainError>;

    /// Submit an encoded transaction and resolve once it is confirmed.
    /// Not cancellable after broadcast.
    async fn send_transaction(&self, payload: ChainTransactionPayload)
        -> Result<TxReceipt, ChainError>;

    /// Read-only contract call (used for on-chain idempotency guards).
    async fn call(&self, payload: ChainTransactionPayload) -> Result<Vec<u8>, ChainError>;

    /// Read-only balance query, used outside the settlement flow for display.
    async fn get_balance(&self, query: &BalanceQuery) -> Result<U256, ChainError>;
}
