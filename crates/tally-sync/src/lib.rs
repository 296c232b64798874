//! # Tally Sync - reconciliation of divergent tables
//!
//! When two nodes gossip different digests, the node that notices fetches the
//! remote table and hands both to the [`Reconciler`]:
//!
//! - **Merge**: per address the newer entry wins; entries present on one side only
//!   or with different amounts are disputed
//! - **Vote**: disputed addresses go to a [`DisputeVoter`] (normally the quorum voter)
//! - **Conserve**: addresses without a supermajority keep the lower amount and the
//!   difference is burned, so total supply never grows
//!
//! Every burn is logged at `warn` and listed in the [`ReconcileReport`].

#![forbid(unsafe_code)]

pub mod errors;
pub mod pure;
pub mod reconcile;
pub mod report;

pub use errors::ReconcileError;
pub use pure::{merge_tables, settle_disputes, MergePlan};
pub use reconcile::{DisputeVoter, ReconcileOutcome, Reconciler};
pub use report::{DisputeEntry, ReconcileReport, Resolution};
