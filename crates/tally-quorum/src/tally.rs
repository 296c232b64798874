//! Weighted vote counting
//!
//! A voter's weight is the square root of its stake in the local table, so large
//! holders count for more without dominating outright. Zero stake means zero weight
//! and such peers are never sampled.

use serde::{Deserialize, Serialize};

/// Voting weight of a peer holding `stake`
pub fn stake_weight(stake: u64) -> f64 {
    (stake as f64).sqrt()
}

/// Yes/no tally for confirmations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    /// Weight of affirmative votes
    pub affirmative: f64,
    /// Weight of all counted votes
    pub total: f64,
    /// Number of peers that answered
    pub responses: usize,
}

impl VoteTally {
    /// Count one answer
    pub fn record(&mut self, weight: f64, affirmative: bool) {
        self.total += weight;
        if affirmative {
            self.affirmative += weight;
        }
        self.responses += 1;
    }

    /// `affirmative ≥ threshold · total` with at least `min_responses` answers
    ///
    /// An empty tally passes when `min_responses` is zero.
    pub fn is_confirmed(&self, threshold: f64, min_responses: usize) -> bool {
        self.responses >= min_responses && self.affirmative >= threshold * self.total
    }

    /// Affirmative share of the total weight, 1.0 for an empty tally
    pub fn ratio(&self) -> f64 {
        if self.total > 0.0 {
            self.affirmative / self.total
        } else {
            1.0
        }
    }
}

/// Which side a dispute vote lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeSide {
    /// The local table's entry
    Old,
    /// The remote table's entry
    New,
    /// Neither
    Other,
}

/// Outcome of voting on one disputed address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeVerdict {
    /// Keep the local entry
    Old,
    /// Adopt the remote entry
    New,
    /// No side reached a strict supermajority
    Inconclusive,
}

/// Three-way weighted tally for one disputed address
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DisputeTally {
    /// Weight for the local entry
    pub old: f64,
    /// Weight for the remote entry
    pub new: f64,
    /// Weight for any other answer
    pub other: f64,
    /// Number of counted answers
    pub responses: usize,
}

impl DisputeTally {
    /// Count one answer
    pub fn record(&mut self, weight: f64, side: DisputeSide) {
        match side {
            DisputeSide::Old => self.old += weight,
            DisputeSide::New => self.new += weight,
            DisputeSide::Other => self.other += weight,
        }
        self.responses += 1;
    }

    /// Total counted weight
    pub fn total(&self) -> f64 {
        self.old + self.new + self.other
    }

    /// A side wins only with a strict `> threshold · total` majority
    pub fn verdict(&self, threshold: f64) -> DisputeVerdict {
        let bar = threshold * self.total();
        if self.old > bar {
            DisputeVerdict::Old
        } else if self.new > bar {
            DisputeVerdict::New
        } else {
            DisputeVerdict::Inconclusive
        }
    }
}
