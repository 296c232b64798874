//! The reconciliation engine
//!
//! Called by a node when a peer's digest differs from its own and the peer's table
//! has been fetched. The steps, in order:
//!
//! 0. Reject a remote table that is invalid or from another network.
//! 1. Merge entry by entry ([`merge_tables`]).
//! 2. If the merge is valid, adopt it without asking anyone.
//! 3. Otherwise vote on each disputed address and settle it; addresses without a
//!    supermajority keep the lower amount and burn the rest. A remaining supply
//!    shortfall is burned too. If the table is still invalid nothing is adopted.

use crate::errors::ReconcileError;
use crate::pure::{merge_tables, settle_disputes};
use crate::report::ReconcileReport;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tally_core::{Address, LedgerSnapshot, PhysicalClock};
use tally_quorum::{DisputeVerdict, QuorumVoter};

/// Source of dispute verdicts
#[async_trait]
pub trait DisputeVoter: Send + Sync {
    /// Vote on every disputed address, never asking peers in `exclude`
    async fn vote_on_disputes(
        &self,
        old: &LedgerSnapshot,
        new: &LedgerSnapshot,
        disputed: &[Address],
        exclude: &[Address],
    ) -> BTreeMap<Address, DisputeVerdict>;
}

#[async_trait]
impl DisputeVoter for QuorumVoter {
    async fn vote_on_disputes(
        &self,
        old: &LedgerSnapshot,
        new: &LedgerSnapshot,
        disputed: &[Address],
        exclude: &[Address],
    ) -> BTreeMap<Address, DisputeVerdict> {
        QuorumVoter::vote_on_disputes(self, old, new, disputed, exclude)
            .await
            .into_iter()
            .map(|(address, result)| (address, result.verdict))
            .collect()
    }
}

/// What reconciliation decided
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// The merge equals the local table
    Unchanged,
    /// The naive merge is valid and differs from the local table
    Resolved(LedgerSnapshot),
    /// Disputes were voted on or burned; the report lists each settlement
    Disputed {
        /// The table to adopt
        table: LedgerSnapshot,
        /// Per-address settlements
        report: ReconcileReport,
    },
    /// No change adopted
    Rejected(ReconcileError),
}

impl ReconcileOutcome {
    /// The table to adopt, if any
    pub fn adopted(&self) -> Option<&LedgerSnapshot> {
        match self {
            ReconcileOutcome::Resolved(table) | ReconcileOutcome::Disputed { table, .. } => {
                Some(table)
            }
            ReconcileOutcome::Unchanged | ReconcileOutcome::Rejected(_) => None,
        }
    }
}

/// Reconciles divergent tables using a dispute voter
pub struct Reconciler {
    voter: Arc<dyn DisputeVoter>,
    clock: Arc<dyn PhysicalClock>,
}

impl Reconciler {
    /// Create an engine
    pub fn new(voter: Arc<dyn DisputeVoter>, clock: Arc<dyn PhysicalClock>) -> Self {
        Self { voter, clock }
    }

    /// Reconcile the local table `old` with `new`, received from `from`
    pub async fn reconcile(
        &self,
        old: &LedgerSnapshot,
        new: &LedgerSnapshot,
        from: Address,
    ) -> ReconcileOutcome {
        if !old.same_network(new) {
            tracing::warn!(peer = %from.short(), "remote table from another network");
            return ReconcileOutcome::Rejected(ReconcileError::NetworkMismatch);
        }
        if let Some(reason) = new.invalid_reason() {
            tracing::warn!(peer = %from.short(), %reason, "remote table is invalid");
            return ReconcileOutcome::Rejected(ReconcileError::RemoteInvalid(reason.clone()));
        }

        let plan = merge_tables(old, new);
        let clock = self.clock.as_ref();
        let merged = LedgerSnapshot::new(
            Arc::clone(old.network()),
            plan.balances.clone(),
            plan.burned,
            clock,
        );
        if merged.is_valid() {
            if merged.digest() == old.digest() {
                tracing::debug!(peer = %from.short(), "merge leaves table unchanged");
                return ReconcileOutcome::Unchanged;
            }
            tracing::debug!(
                peer = %from.short(),
                disputed = plan.disputed.len(),
                "naive merge is valid"
            );
            return ReconcileOutcome::Resolved(merged);
        }

        tracing::debug!(
            peer = %from.short(),
            disputed = plan.disputed.len(),
            reason = ?merged.invalid_reason(),
            "merge invalid, voting on disputes"
        );
        let verdicts = self
            .voter
            .vote_on_disputes(old, new, &plan.disputed, &[from])
            .await;
        let (balances, burned, mut report) = settle_disputes(&plan, old, new, &verdicts);

        let mut settled = LedgerSnapshot::new(
            Arc::clone(old.network()),
            balances.clone(),
            burned,
            clock,
        );
        let total = old.network().total_coins();
        if !settled.is_valid() && settled.coin_sum() < total {
            let shortfall = total - settled.coin_sum();
            tracing::warn!(shortfall, "burning remaining supply shortfall");
            report.shortfall_burned = shortfall;
            settled = LedgerSnapshot::new(
                Arc::clone(old.network()),
                balances,
                burned.saturating_add(shortfall),
                clock,
            );
        }

        match settled.invalid_reason() {
            None => ReconcileOutcome::Disputed {
                table: settled,
                report,
            },
            Some(reason) => {
                tracing::warn!(peer = %from.short(), %reason, "reconciliation failed, keeping local table");
                ReconcileOutcome::Rejected(ReconcileError::Unresolvable(reason.clone()))
            }
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}
