//! The ledger snapshot: an immutable, self-validating balance table
//!
//! A [`LedgerSnapshot`] maps addresses to holder-signed balances, tracks the burned
//! sink, and carries the network's identifier sentinel. Construction never fails:
//! a table that breaks an invariant is built with `is_valid() == false` and an
//! [`InvalidReason`](crate::errors::InvalidReason). Mutation produces a new snapshot.

pub mod balance;
pub mod codec;
pub mod snapshot;

pub use balance::{verify_balance, Balance, SignedBalance};
pub use codec::{ENTRY_LEN, TRAILER_LEN};
pub use snapshot::LedgerSnapshot;
