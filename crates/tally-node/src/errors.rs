//! Node-level errors

use tally_core::{CodecError, ConfigError, InvalidReason, TransactionError};
use tally_sync::ReconcileError;
use thiserror::Error;

/// Result type for node operations
pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors surfaced by [`crate::Node`] operations
#[derive(Debug, Error)]
pub enum NodeError {
    /// Building, validating or applying a transfer failed
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Peer data could not be decoded
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A remote table could not be reconciled
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// The receiver declined to counter-sign
    #[error("receiver refused the transaction")]
    Refused,

    /// The receiver did not answer in time
    #[error("receiver could not be reached")]
    Unreachable,

    /// A node cannot start from an invalid table
    #[error("initial table is invalid: {0}")]
    InvalidInitialTable(InvalidReason),
}

impl NodeError {
    /// Stable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            NodeError::Transaction(inner) => inner.code(),
            NodeError::Codec(inner) => inner.code(),
            NodeError::Config(inner) => inner.code(),
            NodeError::Reconcile(inner) => inner.code(),
            NodeError::Refused => "refused",
            NodeError::Unreachable => "unreachable",
            NodeError::InvalidInitialTable(_) => "invalid_initial_table",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_errors_keep_their_code() {
        let err: NodeError = TransactionError::InvalidAmount.into();
        assert_eq!(err.code(), TransactionError::InvalidAmount.code());
        let err: NodeError = ReconcileError::NetworkMismatch.into();
        assert_eq!(err.code(), "network_mismatch");
        assert_eq!(NodeError::Refused.code(), "refused");
    }
}
