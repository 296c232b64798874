//! Voter-side sender locks
//!
//! While a voter has said yes to a transfer it refuses to vote for another transfer
//! from the same sender until the outcome of the first arrives. A lock that is never
//! released expires after the configured timeout.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tally_core::{Address, ConfirmationTransaction};
use tokio::time::Instant;

#[derive(Debug)]
struct Lock {
    transaction: ConfirmationTransaction,
    expires: Instant,
}

#[derive(Debug)]
pub(crate) struct PendingLocks {
    ttl: Duration,
    locks: Mutex<HashMap<Address, Lock>>,
}

impl PendingLocks {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the sender of `transaction`; false when it is already locked
    pub(crate) fn try_lock(&self, transaction: &ConfirmationTransaction) -> bool {
        let sender = transaction.transaction().sender;
        let now = Instant::now();
        let mut locks = self.locks.lock();
        locks.retain(|_, lock| lock.expires > now);
        if locks.contains_key(&sender) {
            return false;
        }
        locks.insert(
            sender,
            Lock {
                transaction: *transaction,
                expires: now + self.ttl,
            },
        );
        true
    }

    /// Release the lock taken for `transaction`; other locks on its sender stay
    pub(crate) fn release(&self, transaction: &ConfirmationTransaction) -> bool {
        let sender = transaction.transaction().sender;
        let mut locks = self.locks.lock();
        match locks.get(&sender) {
            Some(lock) if lock.transaction == *transaction => {
                locks.remove(&sender);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_locked(&self, sender: &Address) -> bool {
        let now = Instant::now();
        self.locks
            .lock()
            .get(sender)
            .is_some_and(|lock| lock.expires > now)
    }
}
