//! Audit record of a disputed reconciliation

use serde::{Deserialize, Serialize};
use tally_core::Address;

/// How one disputed address was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// The quorum backed the local entry
    AdoptedOld,
    /// The quorum backed the remote entry
    AdoptedNew,
    /// No majority: the lower amount was kept and the difference burned
    Burned {
        /// Amount kept for the address (zero removes the entry)
        kept: u64,
        /// Amount moved to the burned sink
        delta: u64,
    },
}

/// One settled address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeEntry {
    /// The disputed address
    pub address: Address,
    /// How it was settled
    pub resolution: Resolution,
}

/// Everything a disputed reconciliation changed beyond the naive merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Per-address settlements in address order
    pub entries: Vec<DisputeEntry>,
    /// Extra burn applied to close a remaining supply shortfall
    pub shortfall_burned: u64,
}

impl ReconcileReport {
    /// Total moved to the burned sink by this reconciliation
    pub fn burned_total(&self) -> u64 {
        self.entries
            .iter()
            .map(|entry| match entry.resolution {
                Resolution::Burned { delta, .. } => delta,
                Resolution::AdoptedOld | Resolution::AdoptedNew => 0,
            })
            .sum::<u64>()
            .saturating_add(self.shortfall_burned)
    }

    /// Addresses settled by burning
    pub fn burned_addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.resolution, Resolution::Burned { .. }))
            .map(|entry| entry.address)
    }
}
