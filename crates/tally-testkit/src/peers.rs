//! A scripted quorum transport
//!
//! Each scripted peer answers balance queries from its own table and votes on
//! transfers according to a per-peer script. Every request is recorded so tests can
//! assert on who was asked and what they were told.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tally_core::{Address, ConfirmationTransaction, LedgerSnapshot};
use tally_quorum::{BalanceResponse, QuorumTransport};

#[derive(Debug, Clone)]
enum PeerScript {
    Table(Box<LedgerSnapshot>),
    Unreachable,
}

#[derive(Debug, Default)]
struct Script {
    peers: BTreeMap<Address, PeerScript>,
    overrides: HashMap<(Address, Address), BalanceResponse>,
    votes: HashMap<Address, Option<bool>>,
    disconnected: Vec<Address>,
    balance_requests: Vec<(Address, Address, bool)>,
    vote_requests: Vec<Address>,
    announcements: Vec<(Address, ConfirmationTransaction, bool)>,
}

/// In-memory [`QuorumTransport`] driven by per-peer scripts
#[derive(Debug, Default)]
pub struct ScriptedPeers {
    script: Mutex<Script>,
}

impl ScriptedPeers {
    /// No peers
    pub fn new() -> Self {
        Self::default()
    }

    /// A connected peer that answers from `table` and votes yes
    pub fn add_peer(&self, peer: Address, table: LedgerSnapshot) {
        self.script
            .lock()
            .peers
            .insert(peer, PeerScript::Table(Box::new(table)));
    }

    /// A connected peer that never answers
    pub fn add_unreachable(&self, peer: Address) {
        self.script.lock().peers.insert(peer, PeerScript::Unreachable);
    }

    /// Known on the network but not connected
    pub fn disconnect(&self, peer: Address) {
        self.script.lock().disconnected.push(peer);
    }

    /// Replace `peer`'s answer about `address`
    pub fn override_balance(&self, peer: Address, address: Address, response: BalanceResponse) {
        self.script
            .lock()
            .overrides
            .insert((peer, address), response);
    }

    /// Script `peer`'s transfer vote (`None` abstains)
    pub fn set_vote(&self, peer: Address, vote: Option<bool>) {
        self.script.lock().votes.insert(peer, vote);
    }

    /// Every `(address, peer, immediate)` balance query so far
    pub fn balance_requests(&self) -> Vec<(Address, Address, bool)> {
        self.script.lock().balance_requests.clone()
    }

    /// Peers asked for a transfer vote, in order
    pub fn vote_requests(&self) -> Vec<Address> {
        self.script.lock().vote_requests.clone()
    }

    /// Every `(peer, transaction, outcome)` announcement so far
    pub fn announcements(&self) -> Vec<(Address, ConfirmationTransaction, bool)> {
        self.script.lock().announcements.clone()
    }
}

#[async_trait]
impl QuorumTransport for ScriptedPeers {
    async fn request_balance(
        &self,
        address: Address,
        peer: Address,
        immediate: bool,
    ) -> BalanceResponse {
        let mut script = self.script.lock();
        script.balance_requests.push((address, peer, immediate));
        if let Some(response) = script.overrides.get(&(peer, address)) {
            return *response;
        }
        match script.peers.get(&peer) {
            Some(PeerScript::Table(table)) => table
                .balance(&address)
                .map_or(BalanceResponse::Absent, |balance| BalanceResponse::Balance(*balance)),
            Some(PeerScript::Unreachable) | None => BalanceResponse::Unreachable,
        }
    }

    async fn request_transaction_vote(
        &self,
        peer: Address,
        _transaction: &ConfirmationTransaction,
    ) -> Option<bool> {
        let mut script = self.script.lock();
        script.vote_requests.push(peer);
        match script.peers.get(&peer) {
            Some(PeerScript::Table(_)) => script.votes.get(&peer).copied().unwrap_or(Some(true)),
            Some(PeerScript::Unreachable) | None => None,
        }
    }

    async fn announce_confirmation(
        &self,
        peer: Address,
        transaction: &ConfirmationTransaction,
        outcome: bool,
    ) {
        self.script
            .lock()
            .announcements
            .push((peer, *transaction, outcome));
    }

    fn connected_addresses(&self) -> Vec<Address> {
        let script = self.script.lock();
        script
            .peers
            .keys()
            .filter(|peer| !script.disconnected.contains(peer))
            .copied()
            .collect()
    }

    fn network_addresses(&self) -> Vec<Address> {
        let script = self.script.lock();
        let mut all: Vec<Address> = script.peers.keys().copied().collect();
        all.extend(script.disconnected.iter().copied());
        all
    }
}
