// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! EVM wallet adapter backed by an ethers signer middleware.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::core::k256::ecdsa::SigningKey;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::Wallet;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address as EthAddress, TransactionRequest, U256};

use super::{
    classify_wallet_error, BalanceQuery, ChainAdapter, ChainError, ChainTarget,
    ChainTransactionPayload, TxReceipt,
};

pub type EthSigner = SignerMiddleware<Provider<Http>, Wallet<SigningKey>>;

/// Adapter over one connected EVM wallet. The wallet is pinned to a single
/// network; `switch_to_chain` validates rather than re-homes it, the same
/// guard the node applies at connection time.
pub struct EthWalletAdapter {
    signer: Arc<EthSigner>,
    expected_network_id: u64,
}

impl EthWalletAdapter {
    pub fn new(signer: Arc<EthSigner>, expected_network_id: u64) -> Self {
        Self {
            signer,
            expected_network_id,
        }
    }

    async fn current_network_id(&self) -> Result<u64, ChainError> {
        let chain_id = self
            .signer
            .get_chainid()
            .await
            .map_err(|e| classify_wallet_error(&e.to_string()))?;
        Ok(chain_id.as_u64())
    }
}

#[async_trait]
impl ChainAdapter for EthWalletAdapter {
    async fn switch_to_chain(&self, target: ChainTarget) -> Result<(), ChainError> {
        let expected = match target {
            ChainTarget::Evm(id) => id,
            ChainTarget::Starcoin(_) => {
                return Err(ChainError::UnsupportedPayload(
                    "eth wallet cannot switch to a starcoin chain".to_string(),
                ))
            }
        };
        if expected != self.expected_network_id {
            return Err(ChainError::NetworkMismatch {
                expected,
                actual: self.expected_network_id,
            });
        }
        let actual = self.current_network_id().await?;
        if actual != expected {
            return Err(ChainError::NetworkMismatch { expected, actual });
        }
        Ok(())
    }

    async fn send_transaction(
        &self,
        payload: ChainTransactionPayload,
    ) -> Result<TxReceipt, ChainError> {
        let ChainTransactionPayload::Evm { to, data, value } = payload else {
            return Err(ChainError::UnsupportedPayload(
                "starcoin payload sent to the eth adapter".to_string(),
            ));
        };
        let tx = TransactionRequest::new().to(to).data(data).value(value);

        let pending = self
            .signer
            .send_transaction(tx, None)
            .await
            .map_err(|e| classify_wallet_error(&e.to_string()))?;
        tracing::info!("[EthWalletAdapter] broadcast tx {:?}", *pending);

        let receipt = pending
            .await
            .map_err(|e| classify_wallet_error(&e.to_string()))?
            .ok_or_else(|| ChainError::Rpc("transaction dropped from mempool".to_string()))?;

        let success = receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false);
        let result = TxReceipt {
            txn_hash: format!("{:?}", receipt.transaction_hash),
            block_height: receipt.block_number.map(|n| n.as_u64()).unwrap_or(0),
            gas_used: receipt.gas_used.map(|g| g.as_u64()).unwrap_or(0),
            success,
        };
        if !success {
            // Receipts carry no reason; surface the hash so the user can
            // inspect the failed transaction.
            return Err(ChainError::Reverted(format!(
                "transaction {} reverted",
                result.txn_hash
            )));
        }
        Ok(result)
    }

    async fn call(&self, payload: ChainTransactionPayload) -> Result<Vec<u8>, ChainError> {
        let ChainTransactionPayload::Evm { to, data, value } = payload else {
            return Err(ChainError::UnsupportedPayload(
                "starcoin payload sent to the eth adapter".to_string(),
            ));
        };
        let tx: TypedTransaction = TransactionRequest::new()
            .to(to)
            .data(data)
            .value(value)
            .into();
        let bytes = self
            .signer
            .call(&tx, None)
            .await
            .map_err(|e| classify_wallet_error(&e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn get_balance(&self, query: &BalanceQuery) -> Result<U256, ChainError> {
        let address = EthAddress::from_str(&query.address)
            .map_err(|e| ChainError::Rpc(format!("invalid eth address {}: {e}", query.address)))?;
        if query.token.is_some() {
            // ERC20 balances go through the display layer's own calls
            return Err(ChainError::UnsupportedPayload(
                "token balance queries are not routed through the wallet adapter".to_string(),
            ));
        }
        self.signer
            .get_balance(address, None)
            .await
            .map_err(|e| classify_wallet_error(&e.to_string()))
    }
}
