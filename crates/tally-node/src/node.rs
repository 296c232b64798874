//! The node orchestrator
//!
//! A node owns the current snapshot and is the only thing that replaces it. Every
//! mutation (sending, counter-signing, applying gossip, reconciling) runs inside the
//! lane, a FIFO async mutex held for the whole action, so mutations never
//! interleave even though each one awaits peers. Reads that answer peers go around
//! the lane and see whatever snapshot is current.

use crate::config::NodeConfig;
use crate::errors::{NodeError, Result};
use crate::events::{NodeEvent, EVENT_CAPACITY};
use crate::network::{Network, PendingReply, QuorumLink};
use crate::pending::PendingLocks;
use crate::retry::FailedIndex;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tally_core::{
    Address, ConfirmationTransaction, Hash32, LedgerSnapshot, PendingTransaction,
    PhysicalClock, SignatureRole, SignedTransaction, TransactionError, Wallet,
};
use tally_quorum::{BalanceResponse, QuorumVoter, TransactionConfirmation};
use tally_sync::{DisputeVoter, ReconcileError, ReconcileOutcome, Reconciler};
use tokio::sync::broadcast;

/// Rejected `(peer, digest)` pairs remembered before the memo is reset
const REJECTED_CAPACITY: usize = 256;

/// What happened to a gossiped transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Applied, along with `retried` previously failed transfers it unblocked
    Applied {
        /// Failed transfers applied after it
        retried: usize,
    },
    /// Already reflected in the table
    Stale,
    /// Not applicable yet; filed for retry
    Deferred,
}

/// What a digest announcement led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The digest matches the local table
    InSync,
    /// The peer's table could not be fetched or decoded
    NoTable,
    /// Reconciliation kept the local table as it is
    Unchanged,
    /// A reconciled table was adopted
    Adopted(Hash32),
    /// Reconciliation failed and the local table was kept
    Rejected(ReconcileError),
}

/// One ledger participant
pub struct Node {
    wallet: Wallet,
    network: Arc<dyn Network>,
    config: NodeConfig,
    clock: Arc<dyn PhysicalClock>,
    voter: Arc<QuorumVoter>,
    reconciler: Reconciler,
    lane: tokio::sync::Mutex<()>,
    current: RwLock<Arc<LedgerSnapshot>>,
    pending: PendingLocks,
    failed: Mutex<FailedIndex>,
    rejected: Mutex<HashMap<(Address, Hash32), ReconcileError>>,
    events: broadcast::Sender<NodeEvent>,
}

impl Node {
    /// Start a node on `initial`, which must be valid
    pub fn new(
        wallet: Wallet,
        network: Arc<dyn Network>,
        config: NodeConfig,
        initial: LedgerSnapshot,
        clock: Arc<dyn PhysicalClock>,
    ) -> Result<Arc<Self>> {
        if let Some(reason) = initial.invalid_reason() {
            return Err(NodeError::InvalidInitialTable(reason.clone()));
        }
        let voter = Arc::new(QuorumVoter::new(
            Arc::new(QuorumLink(Arc::clone(&network))),
            config.quorum.clone(),
        ));
        let dispute_voter: Arc<dyn DisputeVoter> = voter.clone();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        tracing::info!(
            address = %wallet.address().short(),
            digest = ?initial.digest(),
            "node started"
        );
        Ok(Arc::new(Self {
            reconciler: Reconciler::new(dispute_voter, Arc::clone(&clock)),
            pending: PendingLocks::new(config.pending_lock_timeout),
            failed: Mutex::new(FailedIndex::new(config.max_failed_per_address)),
            rejected: Mutex::new(HashMap::new()),
            current: RwLock::new(Arc::new(initial)),
            lane: tokio::sync::Mutex::new(()),
            wallet,
            network,
            config,
            clock,
            voter,
            events,
        }))
    }

    /// This node's address
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Active configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Receive every event from now on
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    /// The current table without waiting for queued mutations
    pub fn current_table(&self) -> Arc<LedgerSnapshot> {
        self.current.read().clone()
    }

    /// The table after every mutation queued before this call
    pub async fn get_table(&self) -> Arc<LedgerSnapshot> {
        let _lane = self.lane.lock().await;
        self.current_table()
    }

    /// Whether this node, as a voter, holds a lock on `sender`
    pub fn is_sender_locked(&self, sender: &Address) -> bool {
        self.pending.is_locked(sender)
    }

    /// Failed transfers waiting on `address`
    pub fn failed_count(&self, address: &Address) -> usize {
        self.failed.lock().len(address)
    }

    /// Gossip the current digest to every peer
    pub fn announce_table(&self) {
        self.network.share_table(self.current_table().digest(), None);
    }

    fn publish(&self, table: LedgerSnapshot) {
        *self.current.write() = Arc::new(table);
        // earlier rejections were against the previous table
        self.rejected.lock().clear();
    }

    fn remember_rejection(&self, from: Address, digest: Hash32, err: &ReconcileError) {
        let mut rejected = self.rejected.lock();
        if rejected.len() >= REJECTED_CAPACITY {
            rejected.clear();
        }
        rejected.insert((from, digest), err.clone());
    }

    fn emit(&self, event: NodeEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Send `amount` to `receiver`
    ///
    /// Delivers the pending transfer to the receiver, which votes on it and
    /// counter-signs. The returned transfer is verified and applied locally before
    /// being gossiped. A transfer stamped ahead of the local clock (the sender's
    /// balance was stamped this millisecond) is held back until the clock catches up.
    pub async fn send_transaction(
        &self,
        amount: u64,
        receiver: Address,
    ) -> Result<SignedTransaction> {
        let _lane = self.lane.lock().await;
        let table = self.current_table();
        let pending =
            self.wallet
                .create_transaction(&table, amount, receiver, self.clock.as_ref())?;
        tracing::debug!(
            receiver = %receiver.short(),
            amount,
            timestamp = pending.transaction().timestamp,
            "sending pending transaction"
        );
        self.wait_for_clock(pending.transaction().timestamp).await?;

        let reply = tokio::time::timeout(
            self.config.pending_transaction_timeout,
            self.network.send_pending_transaction(pending),
        )
        .await
        .unwrap_or(PendingReply::Unreachable);

        let signed = match reply {
            PendingReply::Signed(signed) => signed,
            PendingReply::Refused => {
                tracing::warn!(receiver = %receiver.short(), "receiver refused transaction");
                return Err(NodeError::Refused);
            }
            PendingReply::Unreachable => {
                tracing::warn!(receiver = %receiver.short(), "receiver unreachable");
                return Err(NodeError::Unreachable);
            }
        };
        if signed.pending() != &pending {
            return Err(TransactionError::InvalidSignature(SignatureRole::Receiver).into());
        }
        self.wallet.verify_transaction(&table, &signed)?;
        let next = table.apply_transaction(&signed, self.clock.as_ref())?;

        self.publish(next);
        tracing::info!(receiver = %receiver.short(), amount, "transaction completed");
        self.emit(NodeEvent::TransactionCompleted(signed));
        self.network.share_transaction(signed, None);
        Ok(signed)
    }

    /// Sleep until the clock reaches `timestamp`, for at most the pending timeout
    async fn wait_for_clock(&self, timestamp: u64) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.config.pending_transaction_timeout;
        loop {
            let now = self.clock.now_ms();
            if now >= timestamp {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(TransactionError::FutureTimestamp { timestamp, now }.into());
            }
            tracing::trace!(ahead_ms = timestamp - now, "waiting for clock");
            tokio::time::sleep(Duration::from_millis(timestamp - now)).await;
        }
    }

    /// Receiver side of a transfer delivered by `from`
    ///
    /// Refused unless it is addressed to this node, delivered by its sender and
    /// newer than this node's own entry. Otherwise the node counter-signs, runs the
    /// transfer vote and the sender-balance vote, and applies only if both pass.
    pub async fn handle_pending_transaction(
        &self,
        pending: PendingTransaction,
        from: Address,
    ) -> PendingReply {
        let intent = *pending.transaction();
        let me = self.address();
        if intent.receiver != me
            || intent.sender != from
            || intent.timestamp <= self.current_table().last_timestamp(&me)
        {
            tracing::debug!(sender = %from.short(), "pending transaction not acceptable");
            return PendingReply::Refused;
        }

        let _lane = self.lane.lock().await;
        let table = self.current_table();
        let signed = match self.wallet.sign_transaction(&table, &pending) {
            Ok(signed) => signed,
            Err(err) => {
                tracing::debug!(sender = %from.short(), error = %err, "cannot counter-sign");
                return PendingReply::Refused;
            }
        };

        let confirmation = self
            .voter
            .confirm_transaction(&table, signed.confirmation())
            .await;
        let balance = self.voter.confirm_balance(&table, intent.sender).await;

        let ticket = match confirmation {
            TransactionConfirmation::Confirmed(ticket) => ticket,
            TransactionConfirmation::Rejected(tally) => {
                tracing::warn!(
                    sender = %from.short(),
                    ratio = tally.ratio(),
                    "transaction vote failed"
                );
                return PendingReply::Refused;
            }
        };
        if !balance.confirmed {
            tracing::warn!(
                sender = %from.short(),
                ratio = balance.tally.ratio(),
                "sender balance not confirmed"
            );
            ticket.finalize(false).await;
            return PendingReply::Refused;
        }

        match table.apply_transaction(&signed, self.clock.as_ref()) {
            Ok(next) => {
                self.publish(next);
                tracing::info!(sender = %from.short(), amount = intent.amount, "transaction received");
                self.emit(NodeEvent::TransactionCompleted(signed));
                self.network.share_transaction(signed, None);
                ticket.finalize(true).await;
                PendingReply::Signed(signed)
            }
            Err(err) => {
                tracing::warn!(sender = %from.short(), error = %err, "confirmed transaction failed to apply");
                ticket.finalize(false).await;
                PendingReply::Refused
            }
        }
    }

    /// Voter side of a transfer vote
    ///
    /// Votes yes and locks the sender, unless the request is badly signed or the
    /// sender is already locked.
    pub fn handle_confirmation_request(&self, transaction: &ConfirmationTransaction) -> bool {
        let sender = transaction.transaction().sender;
        if let Err(err) = transaction.verify() {
            tracing::debug!(sender = %sender.short(), error = %err, "vote request rejected");
            return false;
        }
        let vote = self.pending.try_lock(transaction);
        tracing::debug!(sender = %sender.short(), vote, "voted on transaction");
        vote
    }

    /// The outcome of a transfer this node voted on
    pub fn handle_confirmation_outcome(&self, transaction: &ConfirmationTransaction, outcome: bool) {
        let sender = transaction.transaction().sender;
        let released = self.pending.release(transaction);
        tracing::debug!(sender = %sender.short(), outcome, released, "transaction outcome received");
    }

    /// A finished transfer gossiped by `from`
    ///
    /// On success it is gossiped onward and failed transfers touching either party
    /// are retried. A stale transfer is ignored; any other failure files it for
    /// retry.
    pub async fn handle_transaction(
        &self,
        transaction: SignedTransaction,
        from: Option<Address>,
    ) -> Delivery {
        let _lane = self.lane.lock().await;
        let table = self.current_table();
        let next = match table.apply_transaction(&transaction, self.clock.as_ref()) {
            Ok(next) => next,
            Err(err) if err.is_stale() => {
                tracing::trace!(error = %err, "ignoring stale transaction");
                return Delivery::Stale;
            }
            Err(err) => {
                tracing::warn!(
                    sender = %transaction.transaction().sender.short(),
                    error = %err,
                    "transaction failed, filed for retry"
                );
                self.failed.lock().file(transaction);
                return Delivery::Deferred;
            }
        };

        let (next, retried) = self.retry_failed(next, &transaction);
        self.publish(next);
        self.emit(NodeEvent::TransactionCompleted(transaction));
        for tx in &retried {
            self.emit(NodeEvent::TransactionCompleted(*tx));
        }
        self.network.share_transaction(transaction, from);
        Delivery::Applied {
            retried: retried.len(),
        }
    }

    /// Apply filed transfers unblocked by `trigger`, oldest first per address
    fn retry_failed(
        &self,
        mut table: LedgerSnapshot,
        trigger: &SignedTransaction,
    ) -> (LedgerSnapshot, Vec<SignedTransaction>) {
        let trigger = *trigger.transaction();
        let mut failed = self.failed.lock();
        let mut applied = Vec::new();
        for address in [trigger.sender, trigger.receiver] {
            let mut remaining = Vec::new();
            let mut blocked = false;
            for tx in failed.take(&address) {
                if blocked {
                    remaining.push(tx);
                } else if tx.transaction().timestamp <= trigger.timestamp {
                    failed.forget(&tx);
                } else {
                    match table.apply_transaction(&tx, self.clock.as_ref()) {
                        Ok(next) => {
                            table = next;
                            failed.forget(&tx);
                            applied.push(tx);
                        }
                        Err(err) if err.is_stale() => failed.forget(&tx),
                        Err(_) => {
                            blocked = true;
                            remaining.push(tx);
                        }
                    }
                }
            }
            failed.restore(address, remaining);
        }
        if !applied.is_empty() {
            tracing::info!(count = applied.len(), "retried failed transactions");
        }
        (table, applied)
    }

    /// A peer announced its table digest
    ///
    /// If it differs from ours, fetch the peer's table and reconcile. An adopted
    /// table is re-announced. After a failed reconciliation our own digest is
    /// re-announced once, unless the peer is on another network; the same digest
    /// from the same peer is then refused without fetching until our table changes.
    pub async fn handle_table_digest(&self, digest: Hash32, from: Address) -> SyncOutcome {
        let _lane = self.lane.lock().await;
        let current = self.current_table();
        if digest == current.digest() {
            tracing::trace!(peer = %from.short(), "digest matches");
            return SyncOutcome::InSync;
        }
        if let Some(err) = self.rejected.lock().get(&(from, digest)).cloned() {
            tracing::trace!(peer = %from.short(), ?digest, "digest already rejected");
            return SyncOutcome::Rejected(err);
        }

        let fetched = tokio::time::timeout(
            self.config.quorum.request_timeout,
            self.network.request_table(from),
        )
        .await
        .ok()
        .flatten();
        let Some(bytes) = fetched else {
            tracing::debug!(peer = %from.short(), "peer table unavailable");
            return SyncOutcome::NoTable;
        };
        let remote = match LedgerSnapshot::import_buffer(
            Arc::clone(current.network()),
            &bytes,
            self.clock.as_ref(),
        ) {
            Ok(remote) => remote,
            Err(err) => {
                tracing::warn!(peer = %from.short(), error = %err, "undecodable peer table");
                return SyncOutcome::NoTable;
            }
        };

        match self.reconciler.reconcile(&current, &remote, from).await {
            ReconcileOutcome::Unchanged => SyncOutcome::Unchanged,
            ReconcileOutcome::Resolved(table) | ReconcileOutcome::Disputed { table, .. } => {
                let digest = table.digest();
                self.publish(table);
                tracing::info!(peer = %from.short(), ?digest, "adopted reconciled table");
                self.emit(NodeEvent::NewTable(digest));
                self.network.share_table(digest, None);
                SyncOutcome::Adopted(digest)
            }
            ReconcileOutcome::Rejected(err) => {
                self.remember_rejection(from, digest, &err);
                if err != ReconcileError::NetworkMismatch {
                    self.network.share_table(current.digest(), None);
                }
                SyncOutcome::Rejected(err)
            }
        }
    }

    /// Answer a peer's balance query
    pub async fn serve_balance(&self, address: Address, immediate: bool) -> BalanceResponse {
        let table = if immediate {
            self.current_table()
        } else {
            self.get_table().await
        };
        table
            .balance(&address)
            .map_or(BalanceResponse::Absent, |balance| BalanceResponse::Balance(*balance))
    }

    /// Answer a peer's table request with the export form of the current table
    pub fn serve_table(&self) -> Vec<u8> {
        self.current_table().export_buffer()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("address", &self.address())
            .field("digest", &self.current_table().digest())
            .finish_non_exhaustive()
    }
}
