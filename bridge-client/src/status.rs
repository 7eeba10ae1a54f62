// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Derivation of the user-facing bridge phase from a transfer procedure
//! snapshot. Used for both the transfer list and the detail/settlement views.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::types::{CrossChainProcedure, TransferStatus};

/// The discrete phase of a transfer as shown to the user.
///
/// Derived, never stored. `Claim` always implies both "the user can claim"
/// and "the rate-limiter hold applies" — downstream consumers gate actions on
/// this pairing, not just display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BridgePhase {
    NotFound,
    Initiated,
    Verifying,
    Claim,
    Delivered,
}

/// Map a procedure snapshot (or its absence) to a phase.
///
/// The table is exhaustive:
///
/// | condition                                   | phase     |
/// |---------------------------------------------|-----------|
/// | no record                                   | NotFound  |
/// | status claimed                              | Delivered |
/// | status approved                             | Claim     |
/// | status deposited, deposit not finalized     | Initiated |
/// | status deposited, deposit finalized         | Verifying |
pub fn derive_phase(procedure: Option<&CrossChainProcedure>) -> BridgePhase {
    let Some(procedure) = procedure else {
        return BridgePhase::NotFound;
    };
    match procedure.current_status {
        TransferStatus::Claimed => BridgePhase::Delivered,
        TransferStatus::Approved => BridgePhase::Claim,
        TransferStatus::Deposited if !procedure.deposit.is_finalized => BridgePhase::Initiated,
        TransferStatus::Deposited => BridgePhase::Verifying,
    }
}
