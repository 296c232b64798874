//! # Tally Node - the per-node orchestrator
//!
//! A [`Node`] owns one participant's current table and wallet and is the only
//! component that replaces the table. It:
//!
//! - serializes every mutation through a FIFO lane
//! - sends transfers and counter-signs incoming ones after a quorum vote
//! - votes on other nodes' transfers, locking each sender until the outcome arrives
//! - applies gossiped transfers, retrying out-of-order ones once unblocked
//! - reconciles with peers whose table digest differs
//!
//! The network is only seen through [`Network`]; [`LocalHub`] provides an
//! in-process implementation for tests and demos.

#![forbid(unsafe_code)]

pub mod config;
pub mod errors;
pub mod events;
pub mod local;
pub mod network;
pub mod node;
mod pending;
mod retry;

pub use config::NodeConfig;
pub use errors::{NodeError, Result};
pub use events::NodeEvent;
pub use local::{LocalHub, LocalNetwork};
pub use network::{Network, PendingReply};
pub use node::{Delivery, Node, SyncOutcome};
