//! Stake-weighted sampling without replacement

use rand::Rng;
use std::collections::BTreeSet;
use tally_core::{Address, LedgerSnapshot};

/// Draws voters with probability proportional to their stake
///
/// Each draw removes the chosen peer from the pool. Peers without stake in the
/// table, and peers on the exclude list, never enter the pool.
#[derive(Debug, Clone)]
pub struct StakeSampler {
    pool: Vec<(Address, u64)>,
    total: u128,
}

impl StakeSampler {
    /// Build the pool from `candidates` weighted by their amount in `table`
    pub fn new<I>(table: &LedgerSnapshot, candidates: I, exclude: &[Address]) -> Self
    where
        I: IntoIterator<Item = Address>,
    {
        let unique: BTreeSet<Address> = candidates
            .into_iter()
            .filter(|address| !exclude.contains(address))
            .collect();
        let pool: Vec<(Address, u64)> = unique
            .into_iter()
            .map(|address| (address, table.amount_of(&address)))
            .filter(|(_, stake)| *stake > 0)
            .collect();
        let total = pool.iter().map(|(_, stake)| u128::from(*stake)).sum();
        Self { pool, total }
    }

    /// Peers left to draw
    pub fn remaining(&self) -> usize {
        self.pool.len()
    }

    /// Draw one peer
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Address> {
        if self.pool.is_empty() || self.total == 0 {
            return None;
        }
        let mut target = rng.gen_range(0..self.total);
        let mut chosen = self.pool.len() - 1;
        for (index, (_, stake)) in self.pool.iter().enumerate() {
            let stake = u128::from(*stake);
            if target < stake {
                chosen = index;
                break;
            }
            target -= stake;
        }
        let (address, stake) = self.pool.remove(chosen);
        self.total -= u128::from(stake);
        Some(address)
    }

    /// Draw up to `count` peers
    pub fn draw_many<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> Vec<Address> {
        std::iter::from_fn(|| self.draw(rng)).take(count).collect()
    }
}
