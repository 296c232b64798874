//! # Tally Quorum - sampled voting
//!
//! Every trust decision in Tally is made by asking a sample of peers and requiring a
//! stake-weighted supermajority (75 % by default):
//!
//! - **Balance confirmation**: is a claimed balance the one the network holds?
//! - **Dispute voting**: for addresses where two tables diverge, which side is right?
//! - **Transfer confirmation**: do deterministically chosen voters accept a transfer?
//!
//! Peers are weighted by the square root of their stake. Requests go out in waves
//! bounded by a vote budget, every request is bounded by a timeout, and timeouts
//! count as abstentions, never as negative votes.
//!
//! The network is reached only through [`QuorumTransport`].

#![forbid(unsafe_code)]

pub mod balance;
pub mod config;
pub mod confirmation;
pub mod dispute;
pub mod sampling;
pub mod seeded;
pub mod tally;
pub mod transport;
pub mod voter;

pub use balance::BalanceConfirmation;
pub use config::QuorumConfig;
pub use confirmation::{ConfirmationTicket, TransactionConfirmation};
pub use dispute::DisputeResult;
pub use sampling::StakeSampler;
pub use seeded::{voter_seed, SeededVoterSequence};
pub use tally::{stake_weight, DisputeSide, DisputeTally, DisputeVerdict, VoteTally};
pub use transport::{BalanceResponse, QuorumTransport};
pub use voter::QuorumVoter;
