//! Digest announcements that do not end in an adopted table

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_matches::assert_matches;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_core::{Address, ConfirmationTransaction, Hash32, PendingTransaction, SignedTransaction};
use tally_node::{LocalHub, LocalNetwork, Network, Node, NodeConfig, PendingReply, SyncOutcome};
use tally_quorum::{BalanceResponse, QuorumTransport};
use tally_sync::ReconcileError;
use tally_testkit::{init_tracing, LedgerBuilder, LedgerFixture};

/// Loopback handle that counts table traffic and can serve a forged table
struct Observed {
    inner: Arc<LocalNetwork>,
    shares: AtomicUsize,
    fetches: AtomicUsize,
    forged: Mutex<Option<Vec<u8>>>,
}

impl Observed {
    fn shares(&self) -> usize {
        self.shares.load(Ordering::SeqCst)
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn forge(&self, bytes: Vec<u8>) {
        *self.forged.lock() = Some(bytes);
    }
}

#[async_trait]
impl QuorumTransport for Observed {
    async fn request_balance(
        &self,
        address: Address,
        peer: Address,
        immediate: bool,
    ) -> BalanceResponse {
        self.inner.request_balance(address, peer, immediate).await
    }

    async fn request_transaction_vote(
        &self,
        peer: Address,
        transaction: &ConfirmationTransaction,
    ) -> Option<bool> {
        self.inner.request_transaction_vote(peer, transaction).await
    }

    async fn announce_confirmation(
        &self,
        peer: Address,
        transaction: &ConfirmationTransaction,
        outcome: bool,
    ) {
        self.inner
            .announce_confirmation(peer, transaction, outcome)
            .await;
    }

    fn connected_addresses(&self) -> Vec<Address> {
        self.inner.connected_addresses()
    }

    fn network_addresses(&self) -> Vec<Address> {
        self.inner.network_addresses()
    }
}

#[async_trait]
impl Network for Observed {
    async fn request_table(&self, peer: Address) -> Option<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let forged = self.forged.lock().clone();
        match forged {
            Some(bytes) => Some(bytes),
            None => self.inner.request_table(peer).await,
        }
    }

    fn share_table(&self, digest: Hash32, exclude: Option<Address>) {
        self.shares.fetch_add(1, Ordering::SeqCst);
        self.inner.share_table(digest, exclude);
    }

    fn share_transaction(&self, transaction: SignedTransaction, exclude: Option<Address>) {
        self.inner.share_transaction(transaction, exclude);
    }

    async fn send_pending_transaction(&self, transaction: PendingTransaction) -> PendingReply {
        self.inner.send_pending_transaction(transaction).await
    }
}

/// Register holder `index` of `ledger` on `hub` behind an [`Observed`] handle
fn observed_node(
    hub: &Arc<LocalHub>,
    ledger: &LedgerFixture,
    index: usize,
) -> ObservedNode {
    init_tracing();
    let network = Arc::new(Observed {
        inner: hub.network(ledger.address(index)),
        shares: AtomicUsize::new(0),
        fetches: AtomicUsize::new(0),
        forged: Mutex::new(None),
    });
    let node = Node::new(
        ledger.wallet(index).clone(),
        network.clone(),
        NodeConfig::default(),
        ledger.genesis(),
        ledger.clock.clone(),
    )
    .unwrap();
    hub.register(&node);
    (node, network)
}

type ObservedNode = (Arc<Node>, Arc<Observed>);

/// Two nodes on one hub whose genesis tables fund different supplies
fn split_networks() -> (Arc<LocalHub>, ObservedNode, ObservedNode) {
    let hub = LocalHub::new();
    let ours = LedgerBuilder::new().holders(&[100, 50]).build();
    let theirs = LedgerBuilder::new().holders(&[70, 30]).build();
    let alice = observed_node(&hub, &ours, 0);
    let bob = observed_node(&hub, &theirs, 1);
    (hub, alice, bob)
}

#[tokio::test]
async fn test_invalid_peer_table_is_rejected_and_kept() {
    let (_hub, (alice, alice_net), (bob, _)) = split_networks();
    let before = alice.current_table().digest();
    let theirs = bob.current_table().digest();

    assert_matches!(
        alice.handle_table_digest(theirs, bob.address()).await,
        SyncOutcome::Rejected(ReconcileError::RemoteInvalid(_))
    );
    assert_eq!(alice.current_table().digest(), before);
    assert_eq!(alice_net.fetches(), 1);
    assert_eq!(alice_net.shares(), 1);

    // the same digest from the same peer is refused without another fetch
    assert_matches!(
        alice.handle_table_digest(theirs, bob.address()).await,
        SyncOutcome::Rejected(ReconcileError::RemoteInvalid(_))
    );
    assert_eq!(alice_net.fetches(), 1);
    assert_eq!(alice_net.shares(), 1);
    assert_eq!(alice.get_table().await.digest(), before);
}

#[tokio::test]
async fn test_irreconcilable_peers_stop_announcing() {
    let (_hub, (alice, alice_net), (bob, bob_net)) = split_networks();
    let (ours, theirs) = (alice.current_table().digest(), bob.current_table().digest());

    alice.announce_table();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let settled = alice_net.shares() + bob_net.shares();
    assert!(settled <= 3, "{settled} announcements");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(alice_net.shares() + bob_net.shares(), settled);
    assert_eq!(alice.current_table().digest(), ours);
    assert_eq!(bob.current_table().digest(), theirs);

    // a fresh announcement of an already rejected digest goes nowhere
    alice.announce_table();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(alice_net.shares() + bob_net.shares(), settled + 1);
}

#[tokio::test]
async fn test_malformed_peer_table_is_no_table() {
    let hub = LocalHub::new();
    let ledger = LedgerBuilder::new().holders(&[100, 50]).build();
    let (alice, alice_net) = observed_node(&hub, &ledger, 0);
    let (bob, _) = observed_node(&hub, &ledger, 1);
    let before = alice.current_table().digest();
    alice_net.forge(vec![0xAB; 17]);

    let announced = Hash32([7; 32]);
    assert_eq!(
        alice.handle_table_digest(announced, bob.address()).await,
        SyncOutcome::NoTable
    );
    assert_eq!(alice.current_table().digest(), before);
    assert_eq!(alice_net.shares(), 0);

    // undecodable tables are not remembered; the next announcement fetches again
    assert_eq!(
        alice.handle_table_digest(announced, bob.address()).await,
        SyncOutcome::NoTable
    );
    assert_eq!(alice_net.fetches(), 2);
}

#[tokio::test]
async fn test_offline_peer_is_no_table() {
    let hub = LocalHub::new();
    let ledger = LedgerBuilder::new().holders(&[100, 50]).build();
    let (alice, _) = observed_node(&hub, &ledger, 0);
    let (bob, _) = observed_node(&hub, &ledger, 1);
    hub.set_offline(bob.address());

    assert_eq!(
        alice.handle_table_digest(Hash32([7; 32]), bob.address()).await,
        SyncOutcome::NoTable
    );
}
