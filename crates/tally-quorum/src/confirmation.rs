//! Seed-biased transfer confirmation

use crate::seeded::SeededVoterSequence;
use crate::tally::{stake_weight, VoteTally};
use crate::transport::QuorumTransport;
use crate::voter::QuorumVoter;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tally_core::{Address, ConfirmationTransaction, LedgerSnapshot};

/// Result of [`QuorumVoter::confirm_transaction`]
#[derive(Debug)]
pub enum TransactionConfirmation {
    /// The quorum did not confirm; voters have already been told
    Rejected(VoteTally),
    /// The quorum confirmed; the ticket must be finalized with the final outcome
    Confirmed(ConfirmationTicket),
}

impl TransactionConfirmation {
    /// Whether the transfer was confirmed
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TransactionConfirmation::Confirmed(_))
    }
}

/// Proof of a passed confirmation vote
///
/// Voters hold a per-sender lock until they hear the outcome. [`finalize`] reports
/// it to every asked voter and consumes the ticket, so it happens exactly once.
///
/// [`finalize`]: ConfirmationTicket::finalize
#[must_use = "voters stay locked until the ticket is finalized"]
pub struct ConfirmationTicket {
    transport: Arc<dyn QuorumTransport>,
    transaction: ConfirmationTransaction,
    voters: Vec<Address>,
    tally: VoteTally,
    timeout: Duration,
}

impl ConfirmationTicket {
    /// The confirmed transaction
    pub fn transaction(&self) -> &ConfirmationTransaction {
        &self.transaction
    }

    /// Every voter that was asked
    pub fn voters(&self) -> &[Address] {
        &self.voters
    }

    /// The tally that confirmed it
    pub fn tally(&self) -> &VoteTally {
        &self.tally
    }

    /// Report whether the transfer was finally applied
    pub async fn finalize(self, outcome: bool) {
        announce(
            self.transport.as_ref(),
            &self.voters,
            &self.transaction,
            outcome,
            self.timeout,
        )
        .await;
    }
}

impl std::fmt::Debug for ConfirmationTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationTicket")
            .field("transaction", &self.transaction)
            .field("voters", &self.voters.len())
            .field("tally", &self.tally)
            .finish_non_exhaustive()
    }
}

async fn announce(
    transport: &dyn QuorumTransport,
    voters: &[Address],
    transaction: &ConfirmationTransaction,
    outcome: bool,
    timeout: Duration,
) {
    let notices = voters.iter().map(|peer| {
        tokio::time::timeout(
            timeout,
            transport.announce_confirmation(*peer, transaction, outcome),
        )
    });
    join_all(notices).await;
}

impl QuorumVoter {
    /// Run the seed-biased confirmation vote for a transfer
    ///
    /// Voters come from [`SeededVoterSequence`] over the network address list. A
    /// sender without a recorded balance is rejected without voting.
    pub async fn confirm_transaction(
        &self,
        table: &LedgerSnapshot,
        transaction: &ConfirmationTransaction,
    ) -> TransactionConfirmation {
        let Some(mut sequence) = SeededVoterSequence::new(
            table,
            transaction.transaction(),
            self.transport.network_addresses(),
        ) else {
            tracing::debug!(
                sender = %transaction.transaction().sender.short(),
                "sender has no balance, confirmation rejected"
            );
            return TransactionConfirmation::Rejected(VoteTally::default());
        };

        let transport = &self.transport;
        let (asked, answers) = self
            .collect_waves(
                || sequence.next(),
                |peer| async move { transport.request_transaction_vote(peer, transaction).await },
            )
            .await;

        let mut tally = VoteTally::default();
        for (peer, vote) in answers {
            tally.record(stake_weight(table.amount_of(&peer)), vote);
        }
        let confirmed = tally.is_confirmed(self.config.threshold, self.config.min_responses);
        tracing::debug!(
            sender = %transaction.transaction().sender.short(),
            asked = asked.len(),
            responses = tally.responses,
            ratio = tally.ratio(),
            confirmed,
            "transaction confirmation tallied"
        );

        if confirmed {
            TransactionConfirmation::Confirmed(ConfirmationTicket {
                transport: Arc::clone(&self.transport),
                transaction: *transaction,
                voters: asked,
                tally,
                timeout: self.config.request_timeout,
            })
        } else {
            announce(
                self.transport.as_ref(),
                &asked,
                transaction,
                false,
                self.config.request_timeout,
            )
            .await;
            TransactionConfirmation::Rejected(tally)
        }
    }
}
