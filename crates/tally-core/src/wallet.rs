//! The key holder's side of the transaction pipeline

use crate::crypto::{Address, KeyPair};
use crate::errors::TransactionError;
use crate::ledger::{Balance, LedgerSnapshot, SignedBalance};
use crate::time::PhysicalClock;
use crate::transaction::{
    ConfirmationTransaction, PendingTransaction, SignedTransaction, Transaction,
};

/// A wallet signs balances and transactions for one address
#[derive(Debug, Clone)]
pub struct Wallet {
    keys: KeyPair,
}

impl Wallet {
    /// Wrap a key pair
    pub fn new(keys: KeyPair) -> Self {
        Self { keys }
    }

    /// The wallet's address
    pub fn address(&self) -> Address {
        self.keys.address()
    }

    /// The underlying key pair
    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// Sign a balance for this wallet's address
    pub fn sign_balance(&self, amount: u64, timestamp: u64) -> SignedBalance {
        Balance::new(amount, timestamp).sign(&self.keys)
    }

    /// Build a pending transfer of `amount` to `receiver`
    ///
    /// The timestamp is `max(now, last + 1)` so it always moves past the sender's
    /// recorded balance, even when the local clock lags behind it. Such a transfer
    /// cannot be applied until the clock reaches its timestamp.
    pub fn create_transaction(
        &self,
        table: &LedgerSnapshot,
        amount: u64,
        receiver: Address,
        clock: &dyn PhysicalClock,
    ) -> Result<PendingTransaction, TransactionError> {
        let sender = self.address();
        if amount == 0 {
            return Err(TransactionError::InvalidAmount);
        }
        if sender == receiver {
            return Err(TransactionError::SelfTransfer);
        }
        let identifier = table.network().identifier();
        if sender == identifier || receiver == identifier {
            return Err(TransactionError::ReservedAddress);
        }
        let available = table.amount_of(&sender);
        let remaining = available
            .checked_sub(amount)
            .ok_or(TransactionError::InsufficientFunds {
                available,
                requested: amount,
            })?;
        let timestamp = clock
            .now_ms()
            .max(table.last_timestamp(&sender).saturating_add(1));

        let transaction = Transaction {
            sender,
            receiver,
            amount,
            timestamp,
        };
        let confirmation = ConfirmationTransaction {
            transaction,
            sender_transaction_signature: self.keys.sign(&transaction.signing_bytes()),
        };
        Ok(PendingTransaction {
            confirmation,
            sender_signature: self.sign_balance(remaining, timestamp).signature,
        })
    }

    /// Counter-sign a pending transfer addressed to this wallet
    pub fn sign_transaction(
        &self,
        table: &LedgerSnapshot,
        pending: &PendingTransaction,
    ) -> Result<SignedTransaction, TransactionError> {
        let intent = pending.transaction();
        if intent.receiver != self.address() {
            return Err(TransactionError::NotRecipient);
        }
        pending.verify_against(table)?;
        let recorded = table.last_timestamp(&intent.receiver);
        if recorded >= intent.timestamp {
            return Err(TransactionError::StaleTransaction {
                address: intent.receiver,
                recorded,
                attempted: intent.timestamp,
            });
        }
        let credited = table
            .amount_of(&intent.receiver)
            .checked_add(intent.amount)
            .ok_or(TransactionError::InvalidAmount)?;
        Ok(SignedTransaction {
            pending: *pending,
            receiver_signature: self.sign_balance(credited, intent.timestamp).signature,
        })
    }

    /// Verify a signed transfer against `table`
    pub fn verify_transaction(
        &self,
        table: &LedgerSnapshot,
        signed: &SignedTransaction,
    ) -> Result<(), TransactionError> {
        signed.verify_against(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SignatureRole;
    use crate::test_support::{wallet, TestNetwork, GENESIS_TS};
    use crate::time::FixedClock;
    use assert_matches::assert_matches;

    #[test]
    fn test_timestamp_moves_past_lagging_clock() {
        let net = TestNetwork::new(&[100]);
        let pending = net.wallets[0]
            .create_transaction(&net.genesis(), 1, wallet(50).address(), &FixedClock(0))
            .unwrap();
        assert_eq!(pending.transaction().timestamp, GENESIS_TS + 1);
    }

    #[test]
    fn test_create_rejects_overdraft_and_self() {
        let net = TestNetwork::new(&[100]);
        let sender = &net.wallets[0];
        let clock = FixedClock(GENESIS_TS + 1);
        assert_matches!(
            sender.create_transaction(&net.genesis(), 101, wallet(50).address(), &clock),
            Err(TransactionError::InsufficientFunds { .. })
        );
        assert_matches!(
            sender.create_transaction(&net.genesis(), 1, sender.address(), &clock),
            Err(TransactionError::SelfTransfer)
        );
        assert_matches!(
            sender.create_transaction(&net.genesis(), 0, wallet(50).address(), &clock),
            Err(TransactionError::InvalidAmount)
        );
    }

    #[test]
    fn test_only_recipient_can_sign() {
        let net = TestNetwork::new(&[100]);
        let pending = net.wallets[0]
            .create_transaction(
                &net.genesis(),
                1,
                wallet(50).address(),
                &FixedClock(GENESIS_TS + 1),
            )
            .unwrap();
        assert_matches!(
            wallet(51).sign_transaction(&net.genesis(), &pending),
            Err(TransactionError::NotRecipient)
        );
    }

    #[test]
    fn test_sign_checks_sender_transaction_signature_first() {
        let net = TestNetwork::new(&[100]);
        let receiver = wallet(50);
        let mut pending = net.wallets[0]
            .create_transaction(&net.genesis(), 1, receiver.address(), &FixedClock(GENESIS_TS + 1))
            .unwrap();
        pending.confirmation.transaction.amount = 2;
        assert_matches!(
            receiver.sign_transaction(&net.genesis(), &pending),
            Err(TransactionError::InvalidSignature(SignatureRole::Transaction))
        );
    }

    #[test]
    fn test_verify_transaction_accepts_counter_signed() {
        let net = TestNetwork::new(&[100]);
        let receiver = wallet(50);
        let table = net.genesis();
        let pending = net.wallets[0]
            .create_transaction(&table, 10, receiver.address(), &FixedClock(GENESIS_TS + 1))
            .unwrap();
        let signed = receiver.sign_transaction(&table, &pending).unwrap();
        assert!(net.wallets[0].verify_transaction(&table, &signed).is_ok());
    }
}
