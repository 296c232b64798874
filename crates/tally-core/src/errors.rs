//! Error taxonomy for the ledger core
//!
//! Snapshot invariant violations are captured as [`InvalidReason`] values rather than
//! returned as errors: an invalid table can still be constructed and inspected.
//! Everything that can fail on a mutation or on wire input returns one of the enums
//! below. Each carries a stable `code()` for logs and peer-facing diagnostics.

use crate::crypto::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a snapshot fails its invariants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum InvalidReason {
    /// The identifier sentinel entry is absent or altered
    #[error("network identifier entry is missing or altered")]
    MissingIdentifier,

    /// A balance signature does not verify against its address
    #[error("balance signature for {address} does not verify")]
    InvalidSignature {
        /// Address whose balance carries the bad signature
        address: Address,
    },

    /// Amounts plus burned do not add up to the total supply
    #[error("coin sum {actual} does not match total supply {expected}")]
    CoinSumMismatch {
        /// Configured total supply
        expected: u64,
        /// Sum of all amounts plus burned, as far as it was computed
        actual: u64,
    },

    /// A balance is timestamped after the local clock
    #[error("balance for {address} is timestamped in the future ({timestamp})")]
    FutureTimestamp {
        /// Address with the future timestamp
        address: Address,
        /// Offending timestamp in milliseconds
        timestamp: u64,
    },

    /// Summing the table overflowed
    #[error("coin sum overflowed")]
    CoinOverflow,
}

impl InvalidReason {
    /// Stable code for this reason
    pub fn code(&self) -> &'static str {
        match self {
            InvalidReason::MissingIdentifier => "missing_identifier",
            InvalidReason::InvalidSignature { .. } => "invalid_signature",
            InvalidReason::CoinSumMismatch { .. } => "coin_sum_mismatch",
            InvalidReason::FutureTimestamp { .. } => "future_timestamp",
            InvalidReason::CoinOverflow => "coin_overflow",
        }
    }
}

/// Which signature of a transaction failed to verify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureRole {
    /// The sender's signature over the transfer intent
    Transaction,
    /// The sender's post-debit balance signature
    Sender,
    /// The receiver's post-credit balance signature
    Receiver,
}

impl fmt::Display for SignatureRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureRole::Transaction => write!(f, "transaction"),
            SignatureRole::Sender => write!(f, "sender"),
            SignatureRole::Receiver => write!(f, "receiver"),
        }
    }
}

/// Failure to validate or apply a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum TransactionError {
    /// The transaction is not newer than a recorded balance (replay guard)
    #[error("stale transaction for {address}: recorded {recorded}, attempted {attempted}")]
    StaleTransaction {
        /// Party whose recorded balance is at least as new
        address: Address,
        /// Recorded timestamp
        recorded: u64,
        /// Transaction timestamp
        attempted: u64,
    },

    /// The sender cannot cover the amount
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Sender's recorded amount
        available: u64,
        /// Requested transfer amount
        requested: u64,
    },

    /// One of the transaction signatures does not verify
    #[error("invalid {0} signature")]
    InvalidSignature(SignatureRole),

    /// Zero amount
    #[error("transaction amount must be positive")]
    InvalidAmount,

    /// Sender and receiver are the same address
    #[error("sender and receiver are the same address")]
    SelfTransfer,

    /// A party is the network identifier
    #[error("the network identifier cannot send or receive coins")]
    ReservedAddress,

    /// Transaction timestamp is after the local clock
    #[error("transaction timestamp {timestamp} is in the future (now {now})")]
    FutureTimestamp {
        /// Transaction timestamp
        timestamp: u64,
        /// Local clock reading
        now: u64,
    },

    /// The transaction is addressed to someone else
    #[error("transaction is not addressed to this wallet")]
    NotRecipient,

    /// The table the transaction was checked against is itself invalid
    #[error("table is invalid: {0}")]
    InvalidTable(InvalidReason),
}

impl TransactionError {
    /// Stable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            TransactionError::StaleTransaction { .. } => "stale_transaction",
            TransactionError::InsufficientFunds { .. } => "insufficient_funds",
            TransactionError::InvalidSignature(_) => "invalid_signature",
            TransactionError::InvalidAmount => "invalid_amount",
            TransactionError::SelfTransfer => "self_transfer",
            TransactionError::ReservedAddress => "reserved_address",
            TransactionError::FutureTimestamp { .. } => "future_timestamp",
            TransactionError::NotRecipient => "not_recipient",
            TransactionError::InvalidTable(_) => "invalid_table",
        }
    }

    /// Staleness means the transaction (or a newer one) has already landed
    pub fn is_stale(&self) -> bool {
        matches!(self, TransactionError::StaleTransaction { .. })
    }
}

/// Malformed wire data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Table buffer length is not `112·n + 8`
    #[error("table buffer length {actual} is not 112·n + 8")]
    TableLength {
        /// Received length
        actual: usize,
    },

    /// A transaction buffer has the wrong fixed width
    #[error("{kind} transaction buffer must be {expected} bytes, got {actual}")]
    TransactionLength {
        /// Which stage was being decoded
        kind: &'static str,
        /// Required length
        expected: usize,
        /// Received length
        actual: usize,
    },

    /// A table buffer lists the same address twice
    #[error("address {0} appears twice in table buffer")]
    DuplicateAddress(Address),
}

impl CodecError {
    /// Stable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            CodecError::TableLength { .. } => "table_length",
            CodecError::TransactionLength { .. } => "transaction_length",
            CodecError::DuplicateAddress(_) => "duplicate_address",
        }
    }
}

/// Address text that does not parse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Wrong number of hex characters
    #[error("address must be 64 hex characters, got {0}")]
    InvalidLength(usize),

    /// Non-hex character
    #[error("address contains a non-hex character")]
    InvalidHex,
}

/// Configuration that cannot be loaded or is out of range
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Network id is not `<identifier-hex>:<signature-hex>`
    #[error("invalid network id: {0}")]
    InvalidNetworkId(String),

    /// A field that must be positive is zero
    #[error("{field} must be positive")]
    NonPositive {
        /// Offending field
        field: &'static str,
    },

    /// A field holds a value outside its allowed range
    #[error("invalid {field}: {message}")]
    Invalid {
        /// Offending field
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// The genesis table fails its invariants
    #[error("invalid genesis table: {0}")]
    InvalidGenesis(InvalidReason),

    /// TOML could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// The configuration file could not be read
    #[error("io error: {0}")]
    Io(String),
}

impl ConfigError {
    /// Create an out-of-range error
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::InvalidNetworkId(_) => "invalid_network_id",
            ConfigError::NonPositive { .. } => "non_positive",
            ConfigError::Invalid { .. } => "invalid_value",
            ConfigError::InvalidGenesis(_) => "invalid_genesis",
            ConfigError::Parse(_) => "parse",
            ConfigError::Io(_) => "io",
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_transaction_error_codes_are_unique() {
        let address = Address::from_bytes([1; 32]);
        let errors = [
            TransactionError::StaleTransaction {
                address,
                recorded: 2,
                attempted: 1,
            },
            TransactionError::InsufficientFunds {
                available: 1,
                requested: 2,
            },
            TransactionError::InvalidSignature(SignatureRole::Sender),
            TransactionError::InvalidAmount,
            TransactionError::SelfTransfer,
            TransactionError::ReservedAddress,
            TransactionError::FutureTimestamp { timestamp: 2, now: 1 },
            TransactionError::NotRecipient,
            TransactionError::InvalidTable(InvalidReason::CoinOverflow),
        ];
        let codes: HashSet<_> = errors.iter().map(TransactionError::code).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_invalid_reason_display_is_readable() {
        let reason = InvalidReason::CoinSumMismatch {
            expected: 100,
            actual: 90,
        };
        assert_eq!(
            reason.to_string(),
            "coin sum 90 does not match total supply 100"
        );
        assert_eq!(reason.code(), "coin_sum_mismatch");
    }

    #[test]
    fn test_only_staleness_is_stale() {
        assert!(TransactionError::StaleTransaction {
            address: Address::from_bytes([0; 32]),
            recorded: 1,
            attempted: 1,
        }
        .is_stale());
        assert!(!TransactionError::InvalidAmount.is_stale());
    }
}
