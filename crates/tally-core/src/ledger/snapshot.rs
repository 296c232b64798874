//! Snapshot construction, validation and transaction application

use super::codec::encode_table;
use super::SignedBalance;
use crate::config::NetworkConfig;
use crate::crypto::{Address, Hash32};
use crate::errors::{InvalidReason, SignatureRole, TransactionError};
use crate::time::PhysicalClock;
use crate::transaction::SignedTransaction;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An immutable balance table of one network
///
/// Invariants checked at construction:
/// 1. `sum(amounts) + burned == total_coins`
/// 2. every non-identifier signature verifies over `(amount, timestamp)`
/// 3. no timestamp is after the local clock
/// 4. the identifier sentinel is present and exact
#[derive(Clone)]
pub struct LedgerSnapshot {
    network: Arc<NetworkConfig>,
    balances: BTreeMap<Address, SignedBalance>,
    burned: u64,
    coin_sum: u64,
    invalid: Option<InvalidReason>,
    digest: Hash32,
}

impl LedgerSnapshot {
    /// Build a snapshot and evaluate its invariants
    pub fn new(
        network: Arc<NetworkConfig>,
        balances: BTreeMap<Address, SignedBalance>,
        burned: u64,
        clock: &dyn PhysicalClock,
    ) -> Self {
        let coin_sum = balances
            .values()
            .try_fold(burned, |acc, balance| acc.checked_add(balance.amount))
            .unwrap_or(u64::MAX);
        let invalid = check_invariants(&network, &balances, burned, clock.now_ms()).err();
        let digest = Hash32::of(&encode_table(&balances, burned));
        Self {
            network,
            balances,
            burned,
            coin_sum,
            invalid,
            digest,
        }
    }

    /// Whether every invariant holds
    pub fn is_valid(&self) -> bool {
        self.invalid.is_none()
    }

    /// The first invariant violation found, if any
    pub fn invalid_reason(&self) -> Option<&InvalidReason> {
        self.invalid.as_ref()
    }

    /// Sum of all amounts plus burned (saturating at `u64::MAX`)
    pub fn coin_sum(&self) -> u64 {
        self.coin_sum
    }

    /// SHA-256 of the export buffer
    pub fn digest(&self) -> Hash32 {
        self.digest
    }

    /// Burned sink amount
    pub fn burned(&self) -> u64 {
        self.burned
    }

    /// The network this table belongs to
    pub fn network(&self) -> &Arc<NetworkConfig> {
        &self.network
    }

    /// Recorded balance of `address`
    pub fn balance(&self, address: &Address) -> Option<&SignedBalance> {
        self.balances.get(address)
    }

    /// Recorded amount of `address`, zero when absent
    pub fn amount_of(&self, address: &Address) -> u64 {
        self.balances.get(address).map_or(0, |balance| balance.amount)
    }

    /// Recorded timestamp of `address`, zero when absent
    pub fn last_timestamp(&self, address: &Address) -> u64 {
        self.balances
            .get(address)
            .map_or(0, |balance| balance.timestamp)
    }

    /// All balances in canonical order
    pub fn balances(&self) -> &BTreeMap<Address, SignedBalance> {
        &self.balances
    }

    /// All addresses in canonical order, identifier included
    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.balances.keys().copied()
    }

    /// Number of entries, identifier included
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Whether `other` belongs to the same network
    pub fn same_network(&self, other: &LedgerSnapshot) -> bool {
        Arc::ptr_eq(&self.network, &other.network) || *self.network == *other.network
    }

    /// Apply a fully signed transaction, returning the resulting snapshot
    ///
    /// `self` is never modified. Supply is unchanged by construction, so the new
    /// table only needs the two fresh signatures and the timestamp re-checked.
    pub fn apply_transaction(
        &self,
        tx: &SignedTransaction,
        clock: &dyn PhysicalClock,
    ) -> Result<LedgerSnapshot, TransactionError> {
        if let Some(reason) = &self.invalid {
            return Err(TransactionError::InvalidTable(reason.clone()));
        }
        let intent = tx.transaction();
        if intent.amount == 0 {
            return Err(TransactionError::InvalidAmount);
        }
        if intent.sender == intent.receiver {
            return Err(TransactionError::SelfTransfer);
        }
        let identifier = self.network.identifier();
        if intent.sender == identifier || intent.receiver == identifier {
            return Err(TransactionError::ReservedAddress);
        }

        let sender_recorded = self.last_timestamp(&intent.sender);
        if sender_recorded >= intent.timestamp {
            return Err(TransactionError::StaleTransaction {
                address: intent.sender,
                recorded: sender_recorded,
                attempted: intent.timestamp,
            });
        }
        let now = clock.now_ms();
        if intent.timestamp > now {
            return Err(TransactionError::FutureTimestamp {
                timestamp: intent.timestamp,
                now,
            });
        }

        let available = self.amount_of(&intent.sender);
        let sender_after = available.checked_sub(intent.amount).ok_or(
            TransactionError::InsufficientFunds {
                available,
                requested: intent.amount,
            },
        )?;
        let sender_balance =
            SignedBalance::new(sender_after, intent.timestamp, tx.sender_signature());
        if !sender_balance.verify(&intent.sender) {
            return Err(TransactionError::InvalidSignature(SignatureRole::Sender));
        }

        let receiver_recorded = self.last_timestamp(&intent.receiver);
        if receiver_recorded >= intent.timestamp {
            return Err(TransactionError::StaleTransaction {
                address: intent.receiver,
                recorded: receiver_recorded,
                attempted: intent.timestamp,
            });
        }
        let receiver_after = self
            .amount_of(&intent.receiver)
            .checked_add(intent.amount)
            .ok_or(TransactionError::InvalidTable(InvalidReason::CoinOverflow))?;
        let receiver_balance =
            SignedBalance::new(receiver_after, intent.timestamp, tx.receiver_signature());
        if !receiver_balance.verify(&intent.receiver) {
            return Err(TransactionError::InvalidSignature(SignatureRole::Receiver));
        }

        let mut balances = self.balances.clone();
        balances.insert(intent.sender, sender_balance);
        balances.insert(intent.receiver, receiver_balance);
        let digest = Hash32::of(&encode_table(&balances, self.burned));
        Ok(Self {
            network: Arc::clone(&self.network),
            balances,
            burned: self.burned,
            coin_sum: self.coin_sum,
            invalid: None,
            digest,
        })
    }
}

fn check_invariants(
    network: &NetworkConfig,
    balances: &BTreeMap<Address, SignedBalance>,
    burned: u64,
    now: u64,
) -> Result<(), InvalidReason> {
    let identifier = network.identifier();
    if balances.get(&identifier) != Some(&network.identifier_balance()) {
        return Err(InvalidReason::MissingIdentifier);
    }

    let total = network.total_coins();
    let mut sum = burned;
    for (address, balance) in balances {
        if *address == identifier {
            continue;
        }
        if !balance.verify(address) {
            return Err(InvalidReason::InvalidSignature { address: *address });
        }
        sum = sum
            .checked_add(balance.amount)
            .ok_or(InvalidReason::CoinOverflow)?;
        if sum > total {
            return Err(InvalidReason::CoinSumMismatch {
                expected: total,
                actual: sum,
            });
        }
        if balance.timestamp > now {
            return Err(InvalidReason::FutureTimestamp {
                address: *address,
                timestamp: balance.timestamp,
            });
        }
    }

    if sum != total {
        return Err(InvalidReason::CoinSumMismatch {
            expected: total,
            actual: sum,
        });
    }
    Ok(())
}

impl fmt::Debug for LedgerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerSnapshot")
            .field("digest", &self.digest)
            .field("entries", &self.balances.len())
            .field("burned", &self.burned)
            .field("invalid", &self.invalid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Balance;
    use crate::test_support::{TestNetwork, GENESIS_TS};
    use crate::time::FixedClock;
    use assert_matches::assert_matches;

    #[test]
    fn test_genesis_is_valid() {
        let net = TestNetwork::new(&[60, 40]);
        let table = net.genesis();
        assert!(table.is_valid());
        assert_eq!(table.coin_sum(), 100);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_missing_identifier_detected_first() {
        let net = TestNetwork::new(&[100]);
        let mut balances = net.genesis().balances().clone();
        balances.remove(&net.config.identifier());
        // Also break the sum; the identifier is reported before it
        balances.insert(
            net.wallets[0].address(),
            net.wallets[0].sign_balance(1, GENESIS_TS),
        );
        let table = LedgerSnapshot::new(net.config.clone(), balances, 0, &net.clock);
        assert_eq!(table.invalid_reason(), Some(&InvalidReason::MissingIdentifier));
    }

    #[test]
    fn test_altered_identifier_is_missing() {
        let net = TestNetwork::new(&[100]);
        let mut balances = net.genesis().balances().clone();
        let mut sentinel = net.config.identifier_balance();
        sentinel.timestamp = 1;
        balances.insert(net.config.identifier(), sentinel);
        let table = LedgerSnapshot::new(net.config.clone(), balances, 0, &net.clock);
        assert_matches!(table.invalid_reason(), Some(InvalidReason::MissingIdentifier));
    }

    #[test]
    fn test_unsigned_change_breaks_signature() {
        let net = TestNetwork::new(&[100]);
        let holder = net.wallets[0].address();
        let mut balances = net.genesis().balances().clone();
        if let Some(balance) = balances.get_mut(&holder) {
            balance.timestamp += 1;
        }
        let table = LedgerSnapshot::new(net.config.clone(), balances, 0, &net.clock);
        assert_eq!(
            table.invalid_reason(),
            Some(&InvalidReason::InvalidSignature { address: holder })
        );
    }

    #[test]
    fn test_future_timestamp_detected() {
        let net = TestNetwork::new(&[100]);
        let holder = &net.wallets[0];
        let mut balances = net.genesis().balances().clone();
        balances.insert(holder.address(), holder.sign_balance(100, net.clock.0 + 1));
        let table = LedgerSnapshot::new(net.config.clone(), balances, 0, &net.clock);
        assert_matches!(
            table.invalid_reason(),
            Some(InvalidReason::FutureTimestamp { .. })
        );
    }

    #[test]
    fn test_burned_counts_toward_supply() {
        let net = TestNetwork::with_burned(&[90], 10);
        assert!(net.genesis().is_valid());
        assert_eq!(net.genesis().coin_sum(), 100);
    }

    #[test]
    fn test_transfer_scenario() {
        let net = TestNetwork::new(&[100]);
        let sender = &net.wallets[0];
        let receiver = crate::test_support::wallet(50);
        let table = net.genesis();
        let clock = FixedClock(GENESIS_TS + 1);

        let pending = sender
            .create_transaction(&table, 40, receiver.address(), &clock)
            .unwrap();
        assert_eq!(pending.transaction().timestamp, GENESIS_TS + 1);
        let signed = receiver.sign_transaction(&table, &pending).unwrap();
        let next = table.apply_transaction(&signed, &clock).unwrap();

        assert!(next.is_valid());
        assert_eq!(
            next.balance(&sender.address()).map(SignedBalance::balance),
            Some(Balance::new(60, GENESIS_TS + 1))
        );
        assert_eq!(
            next.balance(&receiver.address()).map(SignedBalance::balance),
            Some(Balance::new(40, GENESIS_TS + 1))
        );
        assert_eq!(next.coin_sum(), table.coin_sum());
        assert_ne!(next.digest(), table.digest());
        // the source table is untouched
        assert_eq!(table.amount_of(&sender.address()), 100);
    }

    #[test]
    fn test_replay_is_stale() {
        let net = TestNetwork::new(&[100]);
        let receiver = crate::test_support::wallet(50);
        let clock = FixedClock(GENESIS_TS + 1);
        let table = net.genesis();
        let pending = net.wallets[0]
            .create_transaction(&table, 10, receiver.address(), &clock)
            .unwrap();
        let signed = receiver.sign_transaction(&table, &pending).unwrap();
        let next = table.apply_transaction(&signed, &clock).unwrap();
        let replay = next.apply_transaction(&signed, &clock);
        assert_matches!(replay, Err(TransactionError::StaleTransaction { .. }));
        assert!(replay.is_err_and(|err| err.is_stale()));
    }

    #[test]
    fn test_check_order_amount_then_self_then_reserved() {
        let net = TestNetwork::new(&[100]);
        let table = net.genesis();
        let sender = &net.wallets[0];
        let clock = FixedClock(GENESIS_TS + 1);

        let zero_to_self = net.forge(sender, sender.address(), 0, GENESIS_TS + 1, 100);
        assert_matches!(
            table.apply_transaction(&zero_to_self, &clock),
            Err(TransactionError::InvalidAmount)
        );
        let to_self = net.forge(sender, sender.address(), 5, GENESIS_TS + 1, 100);
        assert_matches!(
            table.apply_transaction(&to_self, &clock),
            Err(TransactionError::SelfTransfer)
        );
        let to_identifier = net.forge(sender, net.config.identifier(), 5, GENESIS_TS + 1, 100);
        assert_matches!(
            table.apply_transaction(&to_identifier, &clock),
            Err(TransactionError::ReservedAddress)
        );
    }

    #[test]
    fn test_future_and_insufficient_and_bad_signature() {
        let net = TestNetwork::new(&[100]);
        let table = net.genesis();
        let sender = &net.wallets[0];
        let receiver = crate::test_support::wallet(50).address();
        let clock = FixedClock(GENESIS_TS + 1);

        let future = net.forge(sender, receiver, 5, GENESIS_TS + 2, 100);
        assert_matches!(
            table.apply_transaction(&future, &clock),
            Err(TransactionError::FutureTimestamp { .. })
        );
        let too_much = net.forge(sender, receiver, 500, GENESIS_TS + 1, 100);
        assert_matches!(
            table.apply_transaction(&too_much, &clock),
            Err(TransactionError::InsufficientFunds {
                available: 100,
                requested: 500
            })
        );
        // sender signs the wrong post-debit balance
        let wrong_debit = net.forge(sender, receiver, 5, GENESIS_TS + 1, 100 - 4);
        assert_matches!(
            table.apply_transaction(&wrong_debit, &clock),
            Err(TransactionError::InvalidSignature(SignatureRole::Sender))
        );
    }

    #[test]
    fn test_invalid_table_refuses_transactions() {
        let net = TestNetwork::new(&[100]);
        let mut balances = net.genesis().balances().clone();
        balances.remove(&net.config.identifier());
        let broken = LedgerSnapshot::new(net.config.clone(), balances, 0, &net.clock);
        let tx = net.forge(
            &net.wallets[0],
            crate::test_support::wallet(50).address(),
            5,
            GENESIS_TS + 1,
            100,
        );
        assert_matches!(
            broken.apply_transaction(&tx, &net.clock),
            Err(TransactionError::InvalidTable(InvalidReason::MissingIdentifier))
        );
    }
}
