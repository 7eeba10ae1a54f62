// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, IntCounter, IntCounterVec, IntGauge, Registry,
};

/// Client-side bridge metrics, injected via `Arc` rather than held as
/// ambient globals so tests can use a fresh registry per run.
#[derive(Debug)]
pub struct BridgeClientMetrics {
    /// Transactions broadcast, labelled by settlement step
    pub(crate) submissions: IntCounterVec,
    /// Step failures, labelled by step and `error_type()`
    pub(crate) submission_errors: IntCounterVec,
    /// Indexer procedure polls issued
    pub(crate) indexer_polls: IntCounter,
    /// Validator signatures accepted into the working set
    pub(crate) signatures_collected: IntCounter,
    /// Seconds remaining in the current claim-delay countdown
    pub(crate) claim_delay_remaining_secs: IntGauge,
}

impl BridgeClientMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            submissions: register_int_counter_vec_with_registry!(
                "bridge_client_submissions_total",
                "Transactions broadcast by the settlement driver",
                &["step"],
                registry,
            )
            .unwrap(),
            submission_errors: register_int_counter_vec_with_registry!(
                "bridge_client_submission_errors_total",
                "Settlement step failures",
                &["step", "error_type"],
                registry,
            )
            .unwrap(),
            indexer_polls: register_int_counter_with_registry!(
                "bridge_client_indexer_polls_total",
                "Indexer procedure polls issued",
                registry,
            )
            .unwrap(),
            signatures_collected: register_int_counter_with_registry!(
                "bridge_client_signatures_collected_total",
                "Validator signatures accepted into the working set",
                registry,
            )
            .unwrap(),
            claim_delay_remaining_secs: register_int_gauge_with_registry!(
                "bridge_client_claim_delay_remaining_secs",
                "Seconds remaining in the current claim-delay countdown",
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        Self::new(&Registry::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_on_fresh_registry() {
        let registry = Registry::new();
        let metrics = BridgeClientMetrics::new(&registry);
        metrics.submissions.with_label_values(&["approve"]).inc();
        metrics
            .submission_errors
            .with_label_values(&["claim", "quorum_error"])
            .inc();
        metrics.claim_delay_remaining_secs.set(30);

        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "bridge_client_submissions_total"));
        assert!(families
            .iter()
            .any(|f| f.get_name() == "bridge_client_claim_delay_remaining_secs"));
    }
}
