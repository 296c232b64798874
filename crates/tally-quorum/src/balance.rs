//! Balance confirmation: is a claimed balance the one the network holds?

use crate::sampling::StakeSampler;
use crate::tally::{stake_weight, VoteTally};
use crate::transport::BalanceResponse;
use crate::voter::QuorumVoter;
use tally_core::{Address, LedgerSnapshot};

/// Result of [`QuorumVoter::confirm_balance`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceConfirmation {
    /// Whether the quorum agreed with the local entry
    pub confirmed: bool,
    /// The weighted tally behind the decision
    pub tally: VoteTally,
}

impl QuorumVoter {
    /// Ask stake-sampled peers whether they hold the same entry for `address`
    ///
    /// A vote is affirmative when the peer's entry equals the local one exactly, or
    /// when neither side has an entry. The holder itself is never asked.
    pub async fn confirm_balance(
        &self,
        table: &LedgerSnapshot,
        address: Address,
    ) -> BalanceConfirmation {
        let local = table.balance(&address).copied();
        let mut sampler = StakeSampler::new(table, self.transport.connected_addresses(), &[address]);
        let transport = &self.transport;
        let rng = &self.rng;

        let (_, answers) = self
            .collect_waves(
                || sampler.draw(&mut *rng.lock()),
                |peer| async move {
                    match transport.request_balance(address, peer, false).await {
                        BalanceResponse::Balance(remote) => Some(Some(remote)),
                        BalanceResponse::Absent => Some(None),
                        BalanceResponse::Unreachable => None,
                    }
                },
            )
            .await;

        let mut tally = VoteTally::default();
        for (peer, remote) in answers {
            tally.record(stake_weight(table.amount_of(&peer)), remote == local);
        }
        let confirmed = tally.is_confirmed(self.config.threshold, self.config.min_responses);
        tracing::debug!(
            address = %address.short(),
            responses = tally.responses,
            ratio = tally.ratio(),
            confirmed,
            "balance confirmation tallied"
        );
        BalanceConfirmation { confirmed, tally }
    }
}
