// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::chain::ChainError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeClientError {
    // Malformed hex/address/length input fed to the payload codec
    #[error("encoding error: {0}")]
    Encoding(String),
    // Wallet or chain-level failure while submitting or reading
    #[error("chain error: {0}")]
    Chain(ChainError),
    // Fewer than the required distinct validator signatures were obtainable
    #[error("signature quorum not reached: got {distinct} distinct signers, need {required}")]
    Quorum { distinct: usize, required: usize },
    // Transport failure or unexpected shape from the indexer/signer endpoints
    #[error("indexer error: {0}")]
    Indexer(String),
    // A required wallet is missing or disconnected
    #[error("wallet not connected: {0}")]
    WalletNotConnected(String),
    // Signer endpoints returned attestations over different events
    #[error("signer endpoints disagree on the observed bridge event: {0}")]
    MismatchedSignerAction(String),
    // The configured token registry has no entry for this token id
    #[error("unknown token id: {0}")]
    UnknownTokenId(u8),
    // Configuration is missing or inconsistent
    #[error("configuration error: {0}")]
    Configuration(String),
    // Uncategorized error
    #[error("{0}")]
    Generic(String),
}

impl BridgeClientError {
    /// Returns a short string identifying the error type for metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            BridgeClientError::Encoding(_) => "encoding_error",
            BridgeClientError::Chain(e) => e.error_type(),
            BridgeClientError::Quorum { .. } => "quorum_error",
            BridgeClientError::Indexer(_) => "indexer_error",
            BridgeClientError::WalletNotConnected(_) => "wallet_not_connected",
            BridgeClientError::MismatchedSignerAction(_) => "mismatched_signer_action",
            BridgeClientError::UnknownTokenId(_) => "unknown_token_id",
            BridgeClientError::Configuration(_) => "configuration_error",
            BridgeClientError::Generic(_) => "generic",
        }
    }
}

impl From<ChainError> for BridgeClientError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::WalletNotConnected(msg) => BridgeClientError::WalletNotConnected(msg),
            other => BridgeClientError::Chain(other),
        }
    }
}

pub type BridgeClientResult<T> = Result<T, BridgeClientError>;
