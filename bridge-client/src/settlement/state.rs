// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::status::BridgePhase;

/// Settlement driver states. A superset of the indexer's procedure status:
/// submission-in-flight states are visible here but never in the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SettlementState {
    WaitingForIndexer,
    CollectingValidatorSignatures,
    SubmittingApprove,
    SubmittingClaim,
    Completed,
    /// Polling revealed the transfer claimed before any local submission
    AlreadyClaimed,
}

impl SettlementState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SettlementState::Completed | SettlementState::AlreadyClaimed
        )
    }

    /// Legal forward transitions. Terminal states accept nothing.
    pub fn can_advance_to(&self, next: SettlementState) -> bool {
        use SettlementState::*;
        match (self, next) {
            (WaitingForIndexer, CollectingValidatorSignatures) => true,
            // approval already recorded: the collect/approve legs are skipped
            (WaitingForIndexer, SubmittingClaim) => true,
            (WaitingForIndexer, AlreadyClaimed) => true,
            (CollectingValidatorSignatures, SubmittingApprove) => true,
            (SubmittingApprove, SubmittingClaim) => true,
            (SubmittingClaim, Completed) => true,
            // polling may reveal claimed from any non-terminal state
            (s, Completed) if !s.is_terminal() => true,
            _ => false,
        }
    }
}

/// Snapshot published to observers through the watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementStatus {
    pub state: SettlementState,
    pub phase: BridgePhase,
    /// Message of the step that failed, if any. Prior confirmed steps are
    /// untouched; the state field still names the last reached state.
    pub bridge_error: Option<String>,
    /// Whole seconds left in the claim-delay countdown, 0 when idle
    pub claim_delay_remaining_secs: u64,
}

impl Default for SettlementStatus {
    fn default() -> Self {
        Self {
            state: SettlementState::WaitingForIndexer,
            phase: BridgePhase::NotFound,
            bridge_error: None,
            claim_delay_remaining_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(SettlementState::Completed.is_terminal());
        assert!(SettlementState::AlreadyClaimed.is_terminal());
        assert!(!SettlementState::SubmittingClaim.is_terminal());
    }

    #[test]
    fn test_forward_transitions() {
        use SettlementState::*;
        assert!(WaitingForIndexer.can_advance_to(CollectingValidatorSignatures));
        assert!(WaitingForIndexer.can_advance_to(SubmittingClaim));
        assert!(WaitingForIndexer.can_advance_to(AlreadyClaimed));
        assert!(CollectingValidatorSignatures.can_advance_to(SubmittingApprove));
        assert!(SubmittingApprove.can_advance_to(SubmittingClaim));
        assert!(SubmittingClaim.can_advance_to(Completed));
    }

    #[test]
    fn test_no_backward_or_out_of_order_transitions() {
        use SettlementState::*;
        assert!(!SubmittingApprove.can_advance_to(CollectingValidatorSignatures));
        assert!(!SubmittingClaim.can_advance_to(SubmittingApprove));
        assert!(!WaitingForIndexer.can_advance_to(SubmittingApprove));
        assert!(!Completed.can_advance_to(SubmittingClaim));
        assert!(!AlreadyClaimed.can_advance_to(Completed));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(
            SettlementState::CollectingValidatorSignatures.to_string(),
            "collecting_validator_signatures"
        );
        assert_eq!(SettlementState::Completed.to_string(), "completed");
    }
}
