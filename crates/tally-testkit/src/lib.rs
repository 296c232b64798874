//! Tally Testing Infrastructure
//!
//! Shared fixtures for the Tally crates' integration tests: deterministic wallets and
//! genesis tables, a manually driven clock, and a scripted [`QuorumTransport`] that
//! answers from per-peer tables.
//!
//! ```toml
//! [dev-dependencies]
//! tally-testkit = { workspace = true }
//! ```
//!
//! ```rust,ignore
//! use tally_testkit::*;
//!
//! let ledger = LedgerBuilder::new().holder(100).holder(50).build();
//! let table = ledger.genesis();
//! assert!(table.is_valid());
//! ```
//!
//! [`QuorumTransport`]: tally_quorum::QuorumTransport

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod clock;
pub mod ledger;
pub mod peers;
pub mod logging;

pub use clock::ManualClock;
pub use ledger::{wallet, LedgerBuilder, LedgerFixture, GENESIS_TS};
pub use peers::ScriptedPeers;
pub use logging::init_tracing;
