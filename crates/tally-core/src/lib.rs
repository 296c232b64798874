//! Tally Core - fixed-supply ledger foundation
//!
//! This crate holds the data model every other Tally crate builds on:
//!
//! - `crypto`: SHA-256 digests, Ed25519 addresses, signatures and key pairs
//! - `ledger`: the immutable, self-validating [`LedgerSnapshot`] and its canonical
//!   binary form
//! - `transaction` / `wallet`: the three signed stages of a transfer and the key
//!   holder's operations for building them
//! - `config`: the shared [`NetworkConfig`] and the [`TallyConfig`] loading trait
//! - `time`: the [`PhysicalClock`] abstraction used for timestamps
//!
//! Nothing here performs I/O beyond reading configuration files, and nothing panics
//! on peer-supplied input.

#![forbid(unsafe_code)]

pub mod config;
pub mod crypto;
pub mod errors;
pub mod ledger;
pub mod time;
pub mod transaction;
pub mod wallet;

pub use config::{NetworkConfig, NetworkId, TallyConfig};
pub use crypto::{Address, Hash32, KeyPair, Signature};
pub use errors::{
    AddressError, CodecError, ConfigError, InvalidReason, SignatureRole, TransactionError,
};
pub use ledger::{verify_balance, Balance, LedgerSnapshot, SignedBalance};
pub use time::{FixedClock, PhysicalClock, SystemClock};
pub use transaction::{
    ConfirmationTransaction, PendingTransaction, SignedTransaction, Transaction,
};
pub use wallet::Wallet;
