//! What a node needs from the network

use async_trait::async_trait;
use std::sync::Arc;
use tally_core::{
    Address, ConfirmationTransaction, Hash32, PendingTransaction, SignedTransaction,
};
use tally_quorum::{BalanceResponse, QuorumTransport};

/// A receiver's answer to a pending transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReply {
    /// The receiver counter-signed and applied the transfer
    Signed(SignedTransaction),
    /// The receiver declined
    Refused,
    /// No answer within the timeout
    Unreachable,
}

/// The node's transport
///
/// Extends the quorum requests with table exchange, gossip and transfer delivery.
/// Gossip methods are fire-and-forget: implementations hand the work off and return
/// immediately.
#[async_trait]
pub trait Network: QuorumTransport {
    /// Fetch `peer`'s table in its export form
    async fn request_table(&self, peer: Address) -> Option<Vec<u8>>;

    /// Gossip a table digest to every connected peer except `exclude`
    fn share_table(&self, digest: Hash32, exclude: Option<Address>);

    /// Gossip a finished transfer to every connected peer except `exclude`
    fn share_transaction(&self, transaction: SignedTransaction, exclude: Option<Address>);

    /// Deliver a pending transfer to its receiver and wait for the reply
    async fn send_pending_transaction(&self, transaction: PendingTransaction) -> PendingReply;
}

/// Presents a [`Network`] to the quorum voter
#[derive(Clone)]
pub(crate) struct QuorumLink(pub(crate) Arc<dyn Network>);

#[async_trait]
impl QuorumTransport for QuorumLink {
    async fn request_balance(
        &self,
        address: Address,
        peer: Address,
        immediate: bool,
    ) -> BalanceResponse {
        self.0.request_balance(address, peer, immediate).await
    }

    async fn request_transaction_vote(
        &self,
        peer: Address,
        transaction: &ConfirmationTransaction,
    ) -> Option<bool> {
        self.0.request_transaction_vote(peer, transaction).await
    }

    async fn announce_confirmation(
        &self,
        peer: Address,
        transaction: &ConfirmationTransaction,
        outcome: bool,
    ) {
        self.0.announce_confirmation(peer, transaction, outcome).await;
    }

    fn connected_addresses(&self) -> Vec<Address> {
        self.0.connected_addresses()
    }

    fn network_addresses(&self) -> Vec<Address> {
        self.0.network_addresses()
    }
}
