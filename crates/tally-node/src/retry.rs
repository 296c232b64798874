//! Failed-transaction index
//!
//! A gossiped transfer that cannot be applied yet (its predecessor has not arrived)
//! is filed under both its sender and receiver. Each address keeps at most `limit`
//! entries; the oldest filed entry goes first.

use std::collections::{HashMap, VecDeque};
use tally_core::{Address, SignedTransaction};

#[derive(Debug)]
pub(crate) struct FailedIndex {
    limit: usize,
    by_address: HashMap<Address, VecDeque<SignedTransaction>>,
}

impl FailedIndex {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit,
            by_address: HashMap::new(),
        }
    }

    pub(crate) fn file(&mut self, transaction: SignedTransaction) {
        let intent = *transaction.transaction();
        for address in [intent.sender, intent.receiver] {
            let queue = self.by_address.entry(address).or_default();
            if queue.contains(&transaction) {
                continue;
            }
            queue.push_back(transaction);
            if queue.len() > self.limit {
                if let Some(dropped) = queue.pop_front() {
                    tracing::debug!(
                        address = %address.short(),
                        timestamp = dropped.transaction().timestamp,
                        "retry queue full, dropping oldest"
                    );
                }
            }
        }
    }

    /// Remove and return everything filed under `address`, oldest timestamp first
    pub(crate) fn take(&mut self, address: &Address) -> Vec<SignedTransaction> {
        let mut queue: Vec<_> = self
            .by_address
            .remove(address)
            .map(Vec::from)
            .unwrap_or_default();
        queue.sort_by_key(|tx| tx.transaction().timestamp);
        queue
    }

    /// Put back entries returned by [`FailedIndex::take`] that are still waiting
    pub(crate) fn restore(&mut self, address: Address, remaining: Vec<SignedTransaction>) {
        if !remaining.is_empty() {
            self.by_address.entry(address).or_default().extend(remaining);
        }
    }

    /// Drop `transaction` from every queue it was filed in
    pub(crate) fn forget(&mut self, transaction: &SignedTransaction) {
        self.by_address.retain(|_, queue| {
            queue.retain(|filed| filed != transaction);
            !queue.is_empty()
        });
    }

    pub(crate) fn len(&self, address: &Address) -> usize {
        self.by_address.get(address).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_testkit::LedgerBuilder;

    fn chain(count: usize) -> (Vec<SignedTransaction>, Address, Address) {
        let ledger = LedgerBuilder::new().holders(&[100, 10]).build();
        let mut table = ledger.genesis();
        let mut txs = Vec::new();
        for _ in 0..count {
            let tx = ledger.transfer_between(&table, 0, 1, 1);
            table = table.apply_transaction(&tx, ledger.clock.as_ref()).unwrap();
            txs.push(tx);
        }
        (txs, ledger.address(0), ledger.address(1))
    }

    #[test]
    fn test_filed_under_both_addresses_and_sorted() {
        let (txs, sender, receiver) = chain(3);
        let mut index = FailedIndex::new(8);
        for tx in txs.iter().rev() {
            index.file(*tx);
        }
        index.file(txs[0]);
        assert_eq!(index.len(&sender), 3);
        assert_eq!(index.len(&receiver), 3);
        assert_eq!(index.take(&sender), txs);
        assert_eq!(index.len(&sender), 0);
    }

    #[test]
    fn test_limit_drops_oldest_filed() {
        let (txs, sender, _) = chain(4);
        let mut index = FailedIndex::new(2);
        for tx in &txs {
            index.file(*tx);
        }
        assert_eq!(index.take(&sender), txs[2..].to_vec());
    }

    #[test]
    fn test_forget_clears_every_queue() {
        let (txs, sender, receiver) = chain(2);
        let mut index = FailedIndex::new(8);
        index.file(txs[0]);
        index.file(txs[1]);
        index.forget(&txs[0]);
        assert_eq!(index.len(&sender), 1);
        assert_eq!(index.len(&receiver), 1);
        let rest = index.take(&sender);
        index.restore(sender, rest);
        assert_eq!(index.len(&sender), 1);
    }
}
