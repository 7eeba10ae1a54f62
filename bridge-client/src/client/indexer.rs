// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::TransferIndexerApi;
use crate::error::{BridgeClientError, BridgeClientResult};
use crate::retry_with_max_elapsed_time;
use crate::ttl_cache::TtlCache;
use crate::types::{
    FeeEstimateResponse, TransferByDepositResponse, TransferDirection, TransferListQuery,
    TransferListResponse,
};

/// Fee estimates move slowly; cache them between polls
const FEE_CACHE_SECS: u64 = 30;

fn shared_http_client() -> reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT
        .get_or_init(|| {
            reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(2))
                .timeout(Duration::from_secs(15))
                .build()
                .expect("Failed to build reqwest client")
        })
        .clone()
}

/// HTTP client for the transfer indexer API.
pub struct IndexerClient {
    http_client: reqwest::Client,
    base_url: String,
    fee_cache: TtlCache<FeeEstimateResponse>,
}

impl IndexerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http_client: shared_http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            fee_cache: TtlCache::with_secs(FEE_CACHE_SECS),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> BridgeClientResult<Option<T>> {
        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| BridgeClientError::Indexer(format!("GET {url}: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeClientError::Indexer(format!(
                "GET {url}: HTTP {status}: {body}"
            )));
        }
        let parsed = response
            .json::<T>()
            .await
            .map_err(|e| BridgeClientError::Indexer(format!("GET {url}: bad response: {e}")))?;
        Ok(Some(parsed))
    }

    /// `GET /transfers` with pagination and filters.
    pub async fn list_transfers(
        &self,
        query: &TransferListQuery,
    ) -> BridgeClientResult<TransferListResponse> {
        let url = format!("{}/transfers", self.base_url);
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(address) = &query.address {
            params.push(("address", address.clone()));
        }
        if let Some(status) = &query.status {
            params.push(("status", status.clone()));
        }
        if let Some(finalized_only) = query.finalized_only {
            params.push(("finalized_only", finalized_only.to_string()));
        }
        if let Some(chain_id) = query.chain_id {
            params.push(("chain_id", chain_id.to_string()));
        }
        if let Some(page) = query.page {
            params.push(("page", page.to_string()));
        }
        if let Some(page_size) = query.page_size {
            params.push(("page_size", page_size.to_string()));
        }
        self.get_json(&url, &params)
            .await?
            .ok_or_else(|| BridgeClientError::Indexer("transfer list endpoint missing".to_string()))
    }

    /// `GET /estimate_fees?direction=...`, served from the TTL cache when
    /// fresh. Transient transport failures retry with backoff since the
    /// caller usually needs a number before enabling the submit button.
    pub async fn estimate_fees(
        &self,
        direction: TransferDirection,
    ) -> BridgeClientResult<FeeEstimateResponse> {
        if let Some(cached) = self.fee_cache.get_if_valid().await {
            return Ok(cached);
        }
        let url = format!("{}/estimate_fees", self.base_url);
        let params = [("direction", direction.to_string())];
        let fetched = match retry_with_max_elapsed_time!(
            self.get_json::<FeeEstimateResponse>(&url, &params),
            Duration::from_secs(10)
        ) {
            Ok(fetched) => fetched?,
            Err(e) => return Err(e),
        };
        let estimate = fetched
            .ok_or_else(|| BridgeClientError::Indexer("fee estimate endpoint missing".to_string()))?;
        self.fee_cache.update(estimate.clone()).await;
        Ok(estimate)
    }
}

#[async_trait]
impl TransferIndexerApi for IndexerClient {
    async fn transfer_by_deposit(
        &self,
        txn_hash: &str,
    ) -> BridgeClientResult<Option<TransferByDepositResponse>> {
        let url = format!("{}/transfers/by-deposit-txn/{}", self.base_url, txn_hash);
        self.get_json(&url, &[]).await
    }
}
