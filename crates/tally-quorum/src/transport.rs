//! What the quorum protocols need from the network

use async_trait::async_trait;
use tally_core::{Address, ConfirmationTransaction, SignedBalance};

/// A peer's answer to a balance query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceResponse {
    /// The peer holds this balance for the address
    Balance(SignedBalance),
    /// The peer has no entry for the address
    Absent,
    /// No answer within the timeout
    Unreachable,
}

/// Peer requests issued by the quorum voter
///
/// Implementations must not block: every call is awaited under a timeout, and an
/// implementation that cannot reach a peer answers `Unreachable` / `None`.
#[async_trait]
pub trait QuorumTransport: Send + Sync {
    /// Ask `peer` for its view of `address`
    ///
    /// `immediate` asks the peer to answer from its current table without queueing
    /// behind its own pending work.
    async fn request_balance(&self, address: Address, peer: Address, immediate: bool)
        -> BalanceResponse;

    /// Ask `peer` to vote on a transfer; `None` when it did not answer
    async fn request_transaction_vote(
        &self,
        peer: Address,
        transaction: &ConfirmationTransaction,
    ) -> Option<bool>;

    /// Tell `peer` the final outcome of a transfer it voted on
    async fn announce_confirmation(
        &self,
        peer: Address,
        transaction: &ConfirmationTransaction,
        outcome: bool,
    );

    /// Peers with a live connection
    fn connected_addresses(&self) -> Vec<Address>;

    /// Every peer address known on the network
    fn network_addresses(&self) -> Vec<Address>;
}
