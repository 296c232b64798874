//! Reconciliation failures

use serde::{Deserialize, Serialize};
use tally_core::InvalidReason;

/// Why a remote table was not adopted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ReconcileError {
    /// The remote table fails its own invariants
    #[error("remote table is invalid: {0}")]
    RemoteInvalid(InvalidReason),

    /// The remote table belongs to another network
    #[error("remote table belongs to a different network")]
    NetworkMismatch,

    /// Neither voting nor the burn fallback produced a valid table
    #[error("no valid table could be produced: {0}")]
    Unresolvable(InvalidReason),
}

impl ReconcileError {
    /// Stable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::RemoteInvalid(_) => "remote_invalid",
            ReconcileError::NetworkMismatch => "network_mismatch",
            ReconcileError::Unresolvable(_) => "unresolvable",
        }
    }
}
