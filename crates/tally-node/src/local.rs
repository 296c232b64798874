//! In-process loopback transport
//!
//! A [`LocalHub`] keeps a registry of nodes; each node talks to the others through
//! its own [`LocalNetwork`] handle, which calls the peer's handlers directly.
//! Requests are awaited inline, gossip is spawned onto the runtime. A node that is
//! not registered, has been dropped or was taken offline is unreachable.

use crate::network::{Network, PendingReply};
use crate::node::Node;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Weak};
use tally_core::{
    Address, ConfirmationTransaction, Hash32, PendingTransaction, SignedTransaction,
};
use tally_quorum::{BalanceResponse, QuorumTransport};

/// Registry of nodes sharing one loopback network
#[derive(Debug, Default)]
pub struct LocalHub {
    nodes: RwLock<BTreeMap<Address, Weak<Node>>>,
    offline: RwLock<BTreeSet<Address>>,
}

impl LocalHub {
    /// An empty hub
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The transport handle for the node at `address`
    pub fn network(self: &Arc<Self>, address: Address) -> Arc<LocalNetwork> {
        Arc::new(LocalNetwork {
            hub: Arc::clone(self),
            address,
        })
    }

    /// Make `node` reachable by its address
    pub fn register(&self, node: &Arc<Node>) {
        self.nodes.write().insert(node.address(), Arc::downgrade(node));
    }

    /// Stop delivering anything to or from `address`
    pub fn set_offline(&self, address: Address) {
        self.offline.write().insert(address);
    }

    /// Undo [`LocalHub::set_offline`]
    pub fn set_online(&self, address: Address) {
        self.offline.write().remove(&address);
    }

    fn node(&self, address: &Address) -> Option<Arc<Node>> {
        if self.offline.read().contains(address) {
            return None;
        }
        self.nodes.read().get(address).and_then(Weak::upgrade)
    }

    fn online_addresses(&self) -> Vec<Address> {
        let offline = self.offline.read();
        self.nodes
            .read()
            .iter()
            .filter(|(address, node)| !offline.contains(address) && node.strong_count() > 0)
            .map(|(address, _)| *address)
            .collect()
    }
}

/// One node's view of a [`LocalHub`]
#[derive(Debug)]
pub struct LocalNetwork {
    hub: Arc<LocalHub>,
    address: Address,
}

impl LocalNetwork {
    /// Reachable peers, or none while this node is offline
    fn peers(&self, exclude: Option<Address>) -> Vec<Arc<Node>> {
        if self.hub.offline.read().contains(&self.address) {
            return Vec::new();
        }
        self.hub
            .online_addresses()
            .into_iter()
            .filter(|address| *address != self.address && Some(*address) != exclude)
            .filter_map(|address| self.hub.node(&address))
            .collect()
    }

    fn peer(&self, address: &Address) -> Option<Arc<Node>> {
        if self.hub.offline.read().contains(&self.address) {
            return None;
        }
        self.hub.node(address)
    }
}

#[async_trait]
impl QuorumTransport for LocalNetwork {
    async fn request_balance(
        &self,
        address: Address,
        peer: Address,
        immediate: bool,
    ) -> BalanceResponse {
        match self.peer(&peer) {
            Some(node) => node.serve_balance(address, immediate).await,
            None => BalanceResponse::Unreachable,
        }
    }

    async fn request_transaction_vote(
        &self,
        peer: Address,
        transaction: &ConfirmationTransaction,
    ) -> Option<bool> {
        self.peer(&peer)
            .map(|node| node.handle_confirmation_request(transaction))
    }

    async fn announce_confirmation(
        &self,
        peer: Address,
        transaction: &ConfirmationTransaction,
        outcome: bool,
    ) {
        if let Some(node) = self.peer(&peer) {
            node.handle_confirmation_outcome(transaction, outcome);
        }
    }

    fn connected_addresses(&self) -> Vec<Address> {
        self.peers(None).iter().map(|node| node.address()).collect()
    }

    fn network_addresses(&self) -> Vec<Address> {
        self.hub
            .nodes
            .read()
            .keys()
            .filter(|address| **address != self.address)
            .copied()
            .collect()
    }
}

#[async_trait]
impl Network for LocalNetwork {
    async fn request_table(&self, peer: Address) -> Option<Vec<u8>> {
        self.peer(&peer).map(|node| node.serve_table())
    }

    fn share_table(&self, digest: Hash32, exclude: Option<Address>) {
        let from = self.address;
        for node in self.peers(exclude) {
            tokio::spawn(async move {
                node.handle_table_digest(digest, from).await;
            });
        }
    }

    fn share_transaction(&self, transaction: SignedTransaction, exclude: Option<Address>) {
        let from = self.address;
        for node in self.peers(exclude) {
            tokio::spawn(async move {
                node.handle_transaction(transaction, Some(from)).await;
            });
        }
    }

    async fn send_pending_transaction(&self, transaction: PendingTransaction) -> PendingReply {
        match self.peer(&transaction.transaction().receiver) {
            Some(node) => node.handle_pending_transaction(transaction, self.address).await,
            None => PendingReply::Unreachable,
        }
    }
}
