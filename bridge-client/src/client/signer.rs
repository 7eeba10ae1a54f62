// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Committee signature collection.
//!
//! One request per configured validator endpoint, fanned out in parallel.
//! Responses sharing an authority public key are de-duplicated before the
//! quorum check; the first `quorum` distinct arrivals win. A missing signer
//! response is not fatal as long as the quorum is eventually reached inside
//! the collection window.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{CommitteeSignerApi, SignatureRequest};
use crate::error::{BridgeClientError, BridgeClientResult};
use crate::types::SignatureResponse;

/// Distinct signers required before approve may be submitted
pub const SIGNATURE_QUORUM: usize = 3;

const RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// HTTP client fanning out to the committee's `/sign` endpoints.
pub struct SignerCommitteeClient {
    http_client: reqwest::Client,
    signer_urls: Vec<String>,
    collection_timeout: Duration,
}

impl SignerCommitteeClient {
    pub fn new(signer_urls: Vec<String>, collection_timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            signer_urls,
            collection_timeout,
        }
    }

    /// Request one endpoint, retrying transient failures until `deadline`.
    async fn request_one(
        &self,
        base_url: &str,
        request: &SignatureRequest,
        deadline: Instant,
    ) -> BridgeClientResult<SignatureResponse> {
        let url = format!("{}/sign", base_url.trim_end_matches('/'));
        loop {
            let attempt = self.http_client.post(&url).json(request).send().await;
            match attempt {
                Ok(response) if response.status().is_success() => {
                    return response.json::<SignatureResponse>().await.map_err(|e| {
                        BridgeClientError::Indexer(format!("{url}: bad signature response: {e}"))
                    });
                }
                Ok(response) if response.status().is_server_error() => {
                    warn!("signer {url} returned {}, retrying", response.status());
                }
                Ok(response) => {
                    // 4xx: the signer refuses this request; retrying is useless
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(BridgeClientError::Indexer(format!(
                        "{url}: HTTP {status}: {body}"
                    )));
                }
                Err(e) => {
                    warn!("signer {url} transport error: {e}, retrying");
                }
            }
            if Instant::now() + RETRY_INTERVAL >= deadline {
                return Err(BridgeClientError::Indexer(format!(
                    "signer {url} unavailable within the collection window"
                )));
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }
}

/// Drop responses whose authority public key was already seen, keeping the
/// first arrival per signer.
pub fn dedup_by_authority(responses: Vec<SignatureResponse>) -> Vec<SignatureResponse> {
    let mut seen: BTreeMap<String, SignatureResponse> = BTreeMap::new();
    let mut distinct = Vec::new();
    for response in responses {
        let key = response.authority_pub_key().to_string();
        if let std::collections::btree_map::Entry::Vacant(e) = seen.entry(key) {
            e.insert(response.clone());
            distinct.push(response);
        }
    }
    distinct
}

#[async_trait]
impl CommitteeSignerApi for SignerCommitteeClient {
    async fn collect_signatures(
        &self,
        request: &SignatureRequest,
        quorum: usize,
        cancel: &CancellationToken,
    ) -> BridgeClientResult<Vec<SignatureResponse>> {
        let deadline = Instant::now() + self.collection_timeout;
        let mut pending: FuturesUnordered<_> = self
            .signer_urls
            .iter()
            .map(|url| self.request_one(url, request, deadline))
            .collect();

        let mut accepted: Vec<SignatureResponse> = Vec::new();
        let mut seen_authorities: BTreeSet<String> = BTreeSet::new();

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(BridgeClientError::Generic(
                        "signature collection cancelled".to_string(),
                    ));
                }
                next = pending.next() => next,
            };
            let Some(next) = next else { break };
            match next {
                Ok(response) => {
                    if response.direction() != request.direction {
                        warn!(
                            "signer returned an attestation for the wrong direction ({})",
                            response.direction()
                        );
                        continue;
                    }
                    if let Some(first) = accepted.first() {
                        if !first.attests_same_event(&response) {
                            warn!(
                                "signer {} attests a different event, dropping",
                                response.authority_pub_key()
                            );
                            continue;
                        }
                    }
                    let authority = response.authority_pub_key().to_string();
                    if !seen_authorities.insert(authority.clone()) {
                        warn!("duplicate signature from authority {authority}, dropping");
                        continue;
                    }
                    info!(
                        "got signature from {authority} ({}/{} distinct)",
                        seen_authorities.len(),
                        quorum
                    );
                    accepted.push(response);
                    if accepted.len() >= quorum {
                        accepted.truncate(quorum);
                        return Ok(accepted);
                    }
                }
                Err(e) => {
                    // Partial endpoint failure is tolerated; the quorum gate
                    // below decides whether it mattered
                    warn!("signer request failed: {e}");
                }
            }
        }

        Err(BridgeClientError::Quorum {
            distinct: accepted.len(),
            required: quorum,
        })
    }
}
