// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ethers::types::{Address as EthAddress, U256};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::state::{SettlementState, SettlementStatus};
use crate::abi;
use crate::chain::{ChainAdapter, ChainError, ChainTarget, ChainTransactionPayload};
use crate::client::signer::SIGNATURE_QUORUM;
use crate::client::{CommitteeSignerApi, SignatureRequest, TransferIndexerApi};
use crate::config::BridgeClientConfig;
use crate::encoding::{encode_script_function_call, ScriptFunctionCall};
use crate::error::{BridgeClientError, BridgeClientResult};
use crate::metrics::BridgeClientMetrics;
use crate::status::derive_phase;
use crate::ttl_cache::TtlCache;
use crate::types::{
    CrossChainProcedure, SignatureResponse, TransferDirection, TransferStatus,
};

const STARCOIN_MAX_GAS_AMOUNT: u64 = 10_000_000;
const COUNTDOWN_TICK: Duration = Duration::from_secs(1);
const WALLET_BUSY_RETRIES: u32 = 3;
const WALLET_BUSY_RETRY_DELAY: Duration = Duration::from_secs(2);
/// The paused flag changes rarely; avoid re-reading it per submission
const PAUSE_CACHE_SECS: u64 = 5;

/// Releases an in-flight flag when the submission attempt ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    /// `None` when another call already holds the flag.
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives one transfer through settlement. Owns its signature working set
/// and submission flags exclusively; instances are keyed per transfer and
/// share only read-only configuration.
pub struct SettlementDriver {
    direction: TransferDirection,
    deposit_txn_hash: String,
    event_index: u16,
    config: Arc<BridgeClientConfig>,
    indexer: Arc<dyn TransferIndexerApi>,
    signers: Arc<dyn CommitteeSignerApi>,
    /// Adapter for the chain approve/claim are submitted on
    destination: Arc<dyn ChainAdapter>,
    metrics: Arc<BridgeClientMetrics>,
    cancel: CancellationToken,
    state: Mutex<SettlementState>,
    status_tx: watch::Sender<SettlementStatus>,
    approve_in_flight: AtomicBool,
    claim_in_flight: AtomicBool,
    made_local_submission: AtomicBool,
    pause_cache: TtlCache<bool>,
}

impl SettlementDriver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        direction: TransferDirection,
        deposit_txn_hash: impl Into<String>,
        event_index: u16,
        config: Arc<BridgeClientConfig>,
        indexer: Arc<dyn TransferIndexerApi>,
        signers: Arc<dyn CommitteeSignerApi>,
        destination: Arc<dyn ChainAdapter>,
        metrics: Arc<BridgeClientMetrics>,
    ) -> Self {
        let (status_tx, _) = watch::channel(SettlementStatus::default());
        Self {
            direction,
            deposit_txn_hash: deposit_txn_hash.into(),
            event_index,
            config,
            indexer,
            signers,
            destination,
            metrics,
            cancel: CancellationToken::new(),
            state: Mutex::new(SettlementState::WaitingForIndexer),
            status_tx,
            approve_in_flight: AtomicBool::new(false),
            claim_in_flight: AtomicBool::new(false),
            made_local_submission: AtomicBool::new(false),
            pause_cache: TtlCache::with_secs(PAUSE_CACHE_SECS),
        }
    }

    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    pub fn state(&self) -> SettlementState {
        *self.state.lock().expect("state lock poisoned")
    }

    /// Watch the driver's published status, including the claim countdown.
    pub fn subscribe(&self) -> watch::Receiver<SettlementStatus> {
        self.status_tx.subscribe()
    }

    /// Abandoning the transfer: stops the polling loop and aborts any
    /// pre-broadcast waiting. A broadcast already in flight completes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn set_state(&self, next: SettlementState) {
        let mut state = self.state.lock().expect("state lock poisoned");
        if *state == next {
            return;
        }
        if !state.can_advance_to(next) {
            warn!("refusing illegal settlement transition {} -> {}", state, next);
            return;
        }
        info!(
            txn_hash = %self.deposit_txn_hash,
            "settlement state {} -> {}", state, next
        );
        *state = next;
        drop(state);
        self.status_tx.send_modify(|status| status.state = next);
    }

    fn set_error(&self, error: &BridgeClientError) {
        warn!(txn_hash = %self.deposit_txn_hash, "settlement error: {error}");
        let message = error.to_string();
        self.status_tx
            .send_modify(|status| status.bridge_error = Some(message));
    }

    fn clear_error(&self) {
        self.status_tx
            .send_modify(|status| status.bridge_error = None);
    }

    /// Interruptible sleep; false means the transfer was abandoned.
    async fn sleep_tick(&self, interval: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(interval) => true,
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Drive the transfer until a terminal state or an error. Errors leave
    /// the machine in the last reached state with the error flag set; a
    /// fresh `run` call resumes from there after clearing the flag.
    pub async fn run(&self) -> BridgeClientResult<()> {
        self.clear_error();
        let poll_interval = Duration::from_millis(self.config.indexer.poll_interval_ms);

        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            self.metrics.indexer_polls.inc();
            let response = match self.indexer.transfer_by_deposit(&self.deposit_txn_hash).await {
                Ok(response) => response,
                Err(e) => {
                    // Transport problems retry transparently on the next tick
                    warn!("indexer poll failed: {e}");
                    if !self.sleep_tick(poll_interval).await {
                        return Ok(());
                    }
                    continue;
                }
            };
            // A late response must not advance an abandoned transfer
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let Some(response) = response else {
                self.status_tx
                    .send_modify(|status| status.phase = derive_phase(None));
                if !self.sleep_tick(poll_interval).await {
                    return Ok(());
                }
                continue;
            };

            let procedure = &response.procedure;
            let phase = derive_phase(Some(procedure));
            self.status_tx.send_modify(|status| status.phase = phase);

            if procedure.current_status == TransferStatus::Claimed || procedure.is_complete {
                // Polling stops entirely once the procedure is terminal
                let state = if self.made_local_submission.load(Ordering::SeqCst) {
                    SettlementState::Completed
                } else {
                    SettlementState::AlreadyClaimed
                };
                self.set_state(state);
                return Ok(());
            }

            if self.state() == SettlementState::WaitingForIndexer {
                let approval_finalized = procedure
                    .approval
                    .as_ref()
                    .map(|a| a.is_finalized)
                    .unwrap_or(false);
                if approval_finalized {
                    // A finalized approval record means the collect/approve
                    // legs already happened (here or elsewhere)
                    self.set_state(SettlementState::SubmittingClaim);
                } else if procedure.approval.is_none() && procedure.deposit.is_finalized {
                    self.set_state(SettlementState::CollectingValidatorSignatures);
                }
            }

            if self.state() == SettlementState::CollectingValidatorSignatures {
                let request = SignatureRequest {
                    direction: self.direction,
                    txn_hash: self.deposit_txn_hash.clone(),
                    event_index: self.event_index,
                };
                let signatures = match self
                    .signers
                    .collect_signatures(&request, SIGNATURE_QUORUM, &self.cancel)
                    .await
                {
                    Ok(signatures) => signatures,
                    Err(e) => {
                        self.set_error(&e);
                        return Err(e);
                    }
                };
                self.metrics
                    .signatures_collected
                    .inc_by(signatures.len() as u64);

                self.set_state(SettlementState::SubmittingApprove);
                match self.submit_approve(procedure, &signatures).await {
                    Ok(true) => self.set_state(SettlementState::SubmittingClaim),
                    Ok(false) => {} // another call holds the in-flight flag
                    Err(e) => {
                        self.set_error(&e);
                        return Err(e);
                    }
                }
            }

            if self.state() == SettlementState::SubmittingClaim {
                match self
                    .submit_claim(procedure, response.claim_delay_seconds)
                    .await
                {
                    Ok(true) => {
                        self.set_state(SettlementState::Completed);
                        return Ok(());
                    }
                    Ok(false) => {}
                    Err(e) => {
                        self.set_error(&e);
                        return Err(e);
                    }
                }
            }

            if !self.sleep_tick(poll_interval).await {
                return Ok(());
            }
        }
    }

    /// Submit the approve transaction on the destination chain.
    ///
    /// Re-entrant calls while a submission is in flight are a silent no-op
    /// (`Ok(false)`). Checks the on-chain/indexer idempotency guard first and
    /// reports `Ok(true)` without broadcasting when already approved.
    pub async fn submit_approve(
        &self,
        procedure: &CrossChainProcedure,
        signatures: &[SignatureResponse],
    ) -> BridgeClientResult<bool> {
        let Some(_guard) = InFlightGuard::acquire(&self.approve_in_flight) else {
            return Ok(false);
        };

        self.verify_signatures(procedure, signatures)?;

        match self.direction {
            TransferDirection::StarcoinToEth => {
                if self.eth_transfer_already_approved(procedure).await? {
                    info!(
                        nonce = procedure.nonce,
                        "transfer already approved on-chain, skipping approve broadcast"
                    );
                    return Ok(true);
                }
                if self.eth_bridge_paused().await? {
                    return Err(ChainError::BridgePaused.into());
                }
                let payload = self.build_eth_approve_payload(signatures)?;
                self.broadcast("approve", ChainTarget::Evm(self.config.eth.eth_network_id), payload)
                    .await
                    .map(|_| true)
            }
            TransferDirection::EthToStarcoin => {
                if procedure.approval.is_some() {
                    info!(
                        nonce = procedure.nonce,
                        "indexer already reports an approval, skipping approve broadcast"
                    );
                    return Ok(true);
                }
                let payload = self.build_starcoin_approve_payload(signatures)?;
                self.broadcast(
                    "approve",
                    ChainTarget::Starcoin(self.config.starcoin.starcoin_bridge_chain_id),
                    payload,
                )
                .await
                .map(|_| true)
            }
        }
    }

    /// Submit the claim transaction on the destination chain after the
    /// configured delay. Returns `Ok(false)` on a re-entrant call.
    pub async fn submit_claim(
        &self,
        procedure: &CrossChainProcedure,
        claim_delay_seconds: u64,
    ) -> BridgeClientResult<bool> {
        let Some(_guard) = InFlightGuard::acquire(&self.claim_in_flight) else {
            return Ok(false);
        };

        // The indexer may already know the transfer is claimed; never redo
        // an irreversible step
        if let Some(latest) = self.indexer.transfer_by_deposit(&self.deposit_txn_hash).await? {
            if latest.procedure.current_status == TransferStatus::Claimed
                || latest.procedure.is_complete
            {
                info!(nonce = procedure.nonce, "transfer already claimed, skipping");
                return Ok(true);
            }
        }

        if !self.countdown(procedure, claim_delay_seconds).await {
            return Err(BridgeClientError::Generic(
                "claim countdown aborted".to_string(),
            ));
        }

        let payload = match self.direction {
            TransferDirection::StarcoinToEth => ChainTransactionPayload::Evm {
                to: self.eth_bridge_proxy()?,
                data: abi::claim_approved_transfer_calldata(
                    self.config.source_chain_id(self.direction),
                    procedure.nonce as u64,
                ),
                value: U256::zero(),
            },
            TransferDirection::EthToStarcoin => {
                self.build_starcoin_claim_payload(procedure)?
            }
        };
        let target = match self.direction {
            TransferDirection::StarcoinToEth => ChainTarget::Evm(self.config.eth.eth_network_id),
            TransferDirection::EthToStarcoin => {
                ChainTarget::Starcoin(self.config.starcoin.starcoin_bridge_chain_id)
            }
        };
        self.broadcast("claim", target, payload).await.map(|_| true)
    }

    /// Count down the claim delay in whole seconds, publishing the remaining
    /// time. Remaining time is re-derived from the approval (or deposit
    /// finalization) timestamp every tick, so a fresh driver instance after a
    /// reload resumes the countdown instead of restarting it. Returns false
    /// when abandoned mid-countdown.
    async fn countdown(&self, procedure: &CrossChainProcedure, claim_delay_seconds: u64) -> bool {
        let anchor_ms = procedure
            .approval
            .as_ref()
            .map(|a| a.timestamp_ms)
            .unwrap_or(procedure.deposit.timestamp_ms)
            .max(0) as u64;
        let ready_at_ms = anchor_ms.saturating_add(claim_delay_seconds.saturating_mul(1000));

        loop {
            let remaining_ms = ready_at_ms.saturating_sub(Self::now_ms());
            let remaining_secs = remaining_ms.div_ceil(1000);
            self.metrics
                .claim_delay_remaining_secs
                .set(remaining_secs as i64);
            self.status_tx
                .send_modify(|status| status.claim_delay_remaining_secs = remaining_secs);
            if remaining_ms == 0 {
                return true;
            }
            if !self.sleep_tick(COUNTDOWN_TICK).await {
                return false;
            }
        }
    }

    /// Switch the wallet to the destination chain and broadcast. Reverts
    /// whose reason says the step already happened count as success; a
    /// wallet busy with another request is retried after a short delay
    /// rather than failing the step.
    async fn broadcast(
        &self,
        step: &'static str,
        target: ChainTarget,
        payload: ChainTransactionPayload,
    ) -> BridgeClientResult<()> {
        self.destination
            .switch_to_chain(target)
            .await
            .map_err(BridgeClientError::from)
            .inspect_err(|e| {
                self.metrics
                    .submission_errors
                    .with_label_values(&[step, e.error_type()])
                    .inc()
            })?;

        self.made_local_submission.store(true, Ordering::SeqCst);
        self.metrics.submissions.with_label_values(&[step]).inc();

        let mut wallet_busy_retries = WALLET_BUSY_RETRIES;
        loop {
            match self.destination.send_transaction(payload.clone()).await {
                Ok(receipt) => {
                    info!(step, txn_hash = %receipt.txn_hash, "submission confirmed");
                    return Ok(());
                }
                Err(ChainError::Reverted(reason))
                    if (step == "approve" && abi::is_already_approved_revert(&reason))
                        || (step == "claim" && abi::is_already_claimed_revert(&reason)) =>
                {
                    info!(step, %reason, "revert reason indicates the step already happened");
                    return Ok(());
                }
                Err(ChainError::RequestAlreadyPending) if wallet_busy_retries > 0 => {
                    wallet_busy_retries -= 1;
                    warn!(step, "wallet has a pending request, retrying shortly");
                    if !self.sleep_tick(WALLET_BUSY_RETRY_DELAY).await {
                        return Err(BridgeClientError::Generic(
                            "submission aborted while waiting for the wallet".to_string(),
                        ));
                    }
                }
                Err(e) => {
                    self.metrics
                        .submission_errors
                        .with_label_values(&[step, e.error_type()])
                        .inc();
                    return Err(e.into());
                }
            }
        }
    }

    fn eth_bridge_proxy(&self) -> BridgeClientResult<EthAddress> {
        EthAddress::from_str(&self.config.eth.eth_bridge_proxy_address).map_err(|e| {
            BridgeClientError::Configuration(format!(
                "bad eth bridge proxy address {}: {e}",
                self.config.eth.eth_bridge_proxy_address
            ))
        })
    }

    /// Cached read of the EVM bridge's `paused()` flag.
    async fn eth_bridge_paused(&self) -> BridgeClientResult<bool> {
        if let Some(paused) = self.pause_cache.get_if_valid().await {
            return Ok(paused);
        }
        let result = self
            .destination
            .call(ChainTransactionPayload::Evm {
                to: self.eth_bridge_proxy()?,
                data: abi::paused_calldata(),
                value: U256::zero(),
            })
            .await
            .map_err(BridgeClientError::from)?;
        let paused = abi::decode_paused(&result)?;
        self.pause_cache.update(paused).await;
        Ok(paused)
    }

    /// `transferApprovals(sourceChainId, nonce) > 0` means already approved.
    async fn eth_transfer_already_approved(
        &self,
        procedure: &CrossChainProcedure,
    ) -> BridgeClientResult<bool> {
        let data = abi::transfer_approvals_calldata(
            self.config.source_chain_id(self.direction),
            procedure.nonce as u64,
        );
        let result = self
            .destination
            .call(ChainTransactionPayload::Evm {
                to: self.eth_bridge_proxy()?,
                data,
                value: U256::zero(),
            })
            .await
            .map_err(BridgeClientError::from)?;
        Ok(abi::decode_transfer_approvals(&result)? > U256::zero())
    }

    /// The collected working set must agree with itself and with the polled
    /// procedure before anything irreversible happens.
    fn verify_signatures(
        &self,
        procedure: &CrossChainProcedure,
        signatures: &[SignatureResponse],
    ) -> BridgeClientResult<()> {
        let distinct = crate::client::signer::dedup_by_authority(signatures.to_vec());
        if distinct.len() < SIGNATURE_QUORUM {
            return Err(BridgeClientError::Quorum {
                distinct: distinct.len(),
                required: SIGNATURE_QUORUM,
            });
        }
        let first = &signatures[0];
        for signature in signatures {
            if signature.direction() != self.direction {
                return Err(BridgeClientError::MismatchedSignerAction(format!(
                    "attestation is for direction {}",
                    signature.direction()
                )));
            }
            if !first.attests_same_event(signature) {
                return Err(BridgeClientError::MismatchedSignerAction(
                    "signers attest different events".to_string(),
                ));
            }
        }
        if first.nonce() != procedure.nonce as u64 {
            return Err(BridgeClientError::MismatchedSignerAction(format!(
                "attested nonce {} does not match procedure nonce {}",
                first.nonce(),
                procedure.nonce
            )));
        }
        Ok(())
    }

    fn build_eth_approve_payload(
        &self,
        signatures: &[SignatureResponse],
    ) -> BridgeClientResult<ChainTransactionPayload> {
        let SignatureResponse::StarcoinToEthBridgeAction(action) = &signatures[0] else {
            return Err(BridgeClientError::MismatchedSignerAction(
                "expected a starcoin-to-eth attestation".to_string(),
            ));
        };
        let message = abi::BridgeApprovalMessage::from_action(action)?;
        let signature_bytes = signatures
            .iter()
            .take(SIGNATURE_QUORUM)
            .map(|s| s.signature_bytes())
            .collect::<BridgeClientResult<Vec<_>>>()?;
        Ok(ChainTransactionPayload::Evm {
            to: self.eth_bridge_proxy()?,
            data: abi::approve_transfer_calldata(&signature_bytes, &message),
            value: U256::zero(),
        })
    }

    fn build_starcoin_approve_payload(
        &self,
        signatures: &[SignatureResponse],
    ) -> BridgeClientResult<ChainTransactionPayload> {
        let SignatureResponse::EthToStarcoinBridgeAction(action) = &signatures[0] else {
            return Err(BridgeClientError::MismatchedSignerAction(
                "expected an eth-to-starcoin attestation".to_string(),
            ));
        };
        let event = &action.eth_bridge_event;

        let signature_bytes = signatures
            .iter()
            .take(SIGNATURE_QUORUM)
            .map(|s| s.signature_bytes())
            .collect::<BridgeClientResult<Vec<_>>>()?;
        let function_name = match signature_bytes.len() {
            1 => "approve_bridge_token_transfer_single",
            2 => "approve_bridge_token_transfer_two",
            3 => "approve_bridge_token_transfer_three",
            n => {
                return Err(BridgeClientError::Generic(format!(
                    "unsupported number of signatures: {n}"
                )))
            }
        };

        let mut args = vec![
            bcs_arg(&event.eth_chain_id)?,
            bcs_arg(&event.nonce)?,
            bcs_arg(&event.eth_address.as_bytes().to_vec())?,
            bcs_arg(&event.starcoin_chain_id)?,
            bcs_arg(&event.starcoin_address.to_vec())?,
            bcs_arg(&event.token_id)?,
            bcs_arg(&event.adjusted_amount)?,
        ];
        for signature in &signature_bytes {
            args.push(bcs_arg(signature)?);
        }

        let call = ScriptFunctionCall {
            module_address: self.config.starcoin.starcoin_bridge_module_address.clone(),
            module_name: self.config.starcoin.starcoin_bridge_module_name.clone(),
            function_name: function_name.to_string(),
            ty_args: vec![],
            args,
        };
        Ok(ChainTransactionPayload::Starcoin {
            payload: encode_script_function_call(&call)?,
            max_gas_amount: STARCOIN_MAX_GAS_AMOUNT,
        })
    }

    fn build_starcoin_claim_payload(
        &self,
        procedure: &CrossChainProcedure,
    ) -> BridgeClientResult<ChainTransactionPayload> {
        let token_id = u8::try_from(procedure.deposit.token_id)
            .map_err(|_| BridgeClientError::UnknownTokenId(u8::MAX))?;
        let (_, token) = self.config.token_by_id(token_id)?;

        let call = ScriptFunctionCall {
            module_address: self.config.starcoin.starcoin_bridge_module_address.clone(),
            module_name: self.config.starcoin.starcoin_bridge_module_name.clone(),
            function_name: token.claim_function.clone(),
            ty_args: vec![],
            args: vec![
                bcs_arg(&Self::now_ms())?,
                bcs_arg(&self.config.source_chain_id(self.direction))?,
                bcs_arg(&(procedure.nonce as u64))?,
            ],
        };
        Ok(ChainTransactionPayload::Starcoin {
            payload: encode_script_function_call(&call)?,
            max_gas_amount: STARCOIN_MAX_GAS_AMOUNT,
        })
    }
}

fn bcs_arg<T: serde::Serialize>(value: &T) -> BridgeClientResult<Vec<u8>> {
    bcs::to_bytes(value).map_err(|e| BridgeClientError::Encoding(e.to_string()))
}
