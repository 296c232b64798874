//! Deterministic wallets, networks and tables

use crate::clock::ManualClock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tally_core::{
    Address, KeyPair, LedgerSnapshot, NetworkConfig, SignedBalance, SignedTransaction, Wallet,
};

/// Timestamp of every genesis balance
pub const GENESIS_TS: u64 = 1_000;

/// Default starting time of the fixture clock
pub const START_MS: u64 = 1_000_000;

/// A wallet derived from `seed`; the same seed always yields the same address
pub fn wallet(seed: u64) -> Wallet {
    let mut secret = [0x5a; 32];
    secret[..8].copy_from_slice(&seed.to_le_bytes());
    Wallet::new(KeyPair::from_secret_bytes(secret))
}

/// Network id used by every fixture
pub fn network_id() -> String {
    let keys = KeyPair::from_secret_bytes([0xee; 32]);
    format!("{}:{}", keys.address(), keys.sign(b"tally test network"))
}

/// Builds a network whose genesis table funds a list of holders
#[derive(Debug, Clone)]
pub struct LedgerBuilder {
    amounts: Vec<u64>,
    burned: u64,
    now: u64,
}

impl Default for LedgerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerBuilder {
    /// Empty builder starting at [`START_MS`]
    pub fn new() -> Self {
        Self {
            amounts: Vec::new(),
            burned: 0,
            now: START_MS,
        }
    }

    /// Add a holder funded with `amount` (wallet seeds start at 1)
    pub fn holder(mut self, amount: u64) -> Self {
        self.amounts.push(amount);
        self
    }

    /// Add several holders
    pub fn holders(mut self, amounts: &[u64]) -> Self {
        self.amounts.extend_from_slice(amounts);
        self
    }

    /// Coins already burned at genesis
    pub fn burned(mut self, burned: u64) -> Self {
        self.burned = burned;
        self
    }

    /// Starting clock reading
    pub fn now(mut self, now_ms: u64) -> Self {
        self.now = now_ms;
        self
    }

    /// Build the network; total supply is the funded amounts plus burned
    pub fn build(self) -> LedgerFixture {
        let clock = Arc::new(ManualClock::new(self.now));
        let wallets: Vec<Wallet> = (1..=self.amounts.len() as u64).map(wallet).collect();
        let genesis: BTreeMap<Address, SignedBalance> = wallets
            .iter()
            .zip(&self.amounts)
            .map(|(holder, amount)| (holder.address(), holder.sign_balance(*amount, GENESIS_TS)))
            .collect();
        let total = self.amounts.iter().sum::<u64>() + self.burned;
        let network = NetworkConfig::new(
            &network_id(),
            total,
            100,
            genesis,
            self.burned,
            clock.as_ref(),
        )
        .expect("fixture genesis must be valid");
        LedgerFixture {
            network,
            wallets,
            clock,
        }
    }
}

/// A built network with its funded wallets and clock
#[derive(Debug, Clone)]
pub struct LedgerFixture {
    /// Shared network description
    pub network: Arc<NetworkConfig>,
    /// Genesis holders in builder order
    pub wallets: Vec<Wallet>,
    /// Clock every fixture table is validated against
    pub clock: Arc<ManualClock>,
}

impl LedgerFixture {
    /// The genesis snapshot
    pub fn genesis(&self) -> LedgerSnapshot {
        self.network.genesis_snapshot(self.clock.as_ref())
    }

    /// Holder `index`
    pub fn wallet(&self, index: usize) -> &Wallet {
        &self.wallets[index]
    }

    /// Address of holder `index`
    pub fn address(&self, index: usize) -> Address {
        self.wallets[index].address()
    }

    /// Every holder address
    pub fn addresses(&self) -> Vec<Address> {
        self.wallets.iter().map(Wallet::address).collect()
    }

    /// A table of `(holder index, amount, timestamp)` entries plus the sentinel
    pub fn table(&self, entries: &[(usize, u64, u64)], burned: u64) -> LedgerSnapshot {
        self.table_from(
            entries.iter().map(|(index, amount, timestamp)| {
                let holder = &self.wallets[*index];
                (holder.address(), holder.sign_balance(*amount, *timestamp))
            }),
            burned,
        )
    }

    /// A table of arbitrary signed entries plus the sentinel
    pub fn table_from<I>(&self, entries: I, burned: u64) -> LedgerSnapshot
    where
        I: IntoIterator<Item = (Address, SignedBalance)>,
    {
        let mut balances: BTreeMap<Address, SignedBalance> = entries.into_iter().collect();
        balances.insert(self.network.identifier(), self.network.identifier_balance());
        LedgerSnapshot::new(Arc::clone(&self.network), balances, burned, self.clock.as_ref())
    }

    /// A fully signed transfer from holder `from` to `to`, one tick after the clock
    pub fn transfer(
        &self,
        table: &LedgerSnapshot,
        from: usize,
        to: &Wallet,
        amount: u64,
    ) -> SignedTransaction {
        self.clock.advance(1);
        let pending = self.wallets[from]
            .create_transaction(table, amount, to.address(), self.clock.as_ref())
            .expect("fixture transfer must be creatable");
        to.sign_transaction(table, &pending)
            .expect("fixture transfer must be signable")
    }

    /// [`LedgerFixture::transfer`] between two holders
    pub fn transfer_between(
        &self,
        table: &LedgerSnapshot,
        from: usize,
        to: usize,
        amount: u64,
    ) -> SignedTransaction {
        let receiver = self.wallets[to].clone();
        self.transfer(table, from, &receiver, amount)
    }
}
