//! Seed-biased voter selection for transfer confirmation
//!
//! The voters for a transfer are a deterministic function of the sender's current
//! balance, the sender's address and the network address list. Any node holding
//! the same inputs derives the same sequence, so the sender cannot pick friendly
//! voters and third parties can audit who was asked.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tally_core::{Address, LedgerSnapshot, Transaction};

/// Fold the sender's amount and address into the 32-bit seed
///
/// The amount contributes its two little-endian 32-bit words, the address its
/// eight little-endian 32-bit words; all ten are XORed together.
pub fn voter_seed(amount: u64, sender: &Address) -> u32 {
    let amount_bytes = amount.to_le_bytes();
    let words = amount_bytes
        .chunks_exact(4)
        .chain(sender.as_bytes().chunks_exact(4));
    words.fold(0u32, |seed, chunk| {
        let mut word = [0u8; 4];
        word.copy_from_slice(chunk);
        seed ^ u32::from_le_bytes(word)
    })
}

/// The deterministic voter sequence for one transfer
#[derive(Debug, Clone)]
pub struct SeededVoterSequence {
    rng: ChaCha8Rng,
    candidates: Vec<Address>,
}

impl SeededVoterSequence {
    /// Build the sequence, or `None` when the sender has no recorded balance
    ///
    /// Candidates are `network_addresses` minus sender and receiver and minus peers
    /// without stake in `table`, sorted by address.
    pub fn new<I>(table: &LedgerSnapshot, transaction: &Transaction, network_addresses: I) -> Option<Self>
    where
        I: IntoIterator<Item = Address>,
    {
        let sender_balance = table.balance(&transaction.sender)?;
        let seed = voter_seed(sender_balance.amount, &transaction.sender);
        let mut candidates: Vec<Address> = network_addresses
            .into_iter()
            .filter(|address| *address != transaction.sender && *address != transaction.receiver)
            .filter(|address| table.amount_of(address) > 0)
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        Some(Self {
            rng: ChaCha8Rng::seed_from_u64(u64::from(seed)),
            candidates,
        })
    }

    /// Candidates not yet drawn
    pub fn remaining(&self) -> usize {
        self.candidates.len()
    }
}

impl Iterator for SeededVoterSequence {
    type Item = Address;

    /// Generate a pseudo-random address and take the nearest remaining candidate:
    /// the first one at or above it, else the last one.
    fn next(&mut self) -> Option<Address> {
        if self.candidates.is_empty() {
            return None;
        }
        let mut generated = [0u8; 32];
        self.rng.fill_bytes(&mut generated);
        let generated = Address::from_bytes(generated);
        let index = self
            .candidates
            .partition_point(|candidate| *candidate < generated)
            .min(self.candidates.len() - 1);
        Some(self.candidates.remove(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.candidates.len(), Some(self.candidates.len()))
    }
}
