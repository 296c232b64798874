//! Hashing and Ed25519 key primitives
//!
//! The ledger treats signing as a primitive: a holder signs a message with its
//! [`KeyPair`], and anyone can [`verify`] the signature against the holder's
//! [`Address`], which is the 32-byte verifying key itself.

pub mod hash;
pub mod keys;

pub use hash::{hash, Hash32};
pub use keys::{verify, Address, KeyPair, Signature};
