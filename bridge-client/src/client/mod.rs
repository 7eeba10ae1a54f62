// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Typed boundary to the transfer indexer and the signer committee.
//!
//! No business logic lives here: request/response shapes, transport, and
//! retry only. The settlement driver consumes these through the two traits
//! so tests can substitute scripted implementations.

pub mod indexer;
pub mod signer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::BridgeClientResult;
use crate::types::{SignatureResponse, TransferByDepositResponse, TransferDirection};

/// Request sent to each committee signer endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    pub direction: TransferDirection,
    pub txn_hash: String,
    pub event_index: u16,
}

/// Transfer lookups against the indexer.
#[async_trait]
pub trait TransferIndexerApi: Send + Sync {
    /// Look up the cross-chain procedure for a deposit transaction hash.
    /// `Ok(None)` means the indexer has not seen the deposit yet.
    async fn transfer_by_deposit(
        &self,
        txn_hash: &str,
    ) -> BridgeClientResult<Option<TransferByDepositResponse>>;
}

/// Signature collection against the committee.
#[async_trait]
pub trait CommitteeSignerApi: Send + Sync {
    /// Collect at least `quorum` signatures with distinct authority public
    /// keys. Resolves as soon as the quorum is reached; partial endpoint
    /// failures are tolerated up to the collection window.
    async fn collect_signatures(
        &self,
        request: &SignatureRequest,
        quorum: usize,
        cancel: &CancellationToken,
    ) -> BridgeClientResult<Vec<SignatureResponse>>;
}
