//! Dispute voting between two divergent tables

use crate::sampling::StakeSampler;
use crate::tally::{stake_weight, DisputeSide, DisputeTally, DisputeVerdict};
use crate::transport::BalanceResponse;
use crate::voter::QuorumVoter;
use futures::future::join_all;
use std::collections::BTreeMap;
use tally_core::{Address, LedgerSnapshot, SignedBalance};

/// Per-address result of [`QuorumVoter::vote_on_disputes`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisputeResult {
    /// Which side won, if any
    pub verdict: DisputeVerdict,
    /// The weighted tally behind it
    pub tally: DisputeTally,
}

/// Bucket an answer by amount; an absent entry matches an absent side
fn classify(
    response: Option<SignedBalance>,
    old: Option<&SignedBalance>,
    new: Option<&SignedBalance>,
) -> DisputeSide {
    let amount = response.map(|balance| balance.amount);
    if amount == old.map(|balance| balance.amount) {
        DisputeSide::Old
    } else if amount == new.map(|balance| balance.amount) {
        DisputeSide::New
    } else {
        DisputeSide::Other
    }
}

impl QuorumVoter {
    /// Ask stake-sampled peers for their view of every disputed address
    ///
    /// Weights come from the `old` (local) table. Answers whose signature does not
    /// verify are dropped. A side wins an address only with a strict weighted
    /// supermajority; everything else is `Inconclusive`.
    pub async fn vote_on_disputes(
        &self,
        old: &LedgerSnapshot,
        new: &LedgerSnapshot,
        disputed: &[Address],
        exclude: &[Address],
    ) -> BTreeMap<Address, DisputeResult> {
        let mut sampler = StakeSampler::new(old, self.transport.connected_addresses(), exclude);
        let transport = &self.transport;
        let rng = &self.rng;

        let (_, answers) = self
            .collect_waves(
                || sampler.draw(&mut *rng.lock()),
                |peer| async move {
                    let queries = disputed.iter().map(|address| async move {
                        (*address, transport.request_balance(*address, peer, true).await)
                    });
                    let responses = join_all(queries).await;
                    let reachable = responses
                        .iter()
                        .any(|(_, response)| *response != BalanceResponse::Unreachable);
                    reachable.then_some(responses)
                },
            )
            .await;

        let mut tallies: BTreeMap<Address, DisputeTally> = disputed
            .iter()
            .map(|address| (*address, DisputeTally::default()))
            .collect();
        for (peer, responses) in answers {
            let weight = stake_weight(old.amount_of(&peer));
            for (address, response) in responses {
                let view = match response {
                    BalanceResponse::Balance(balance) if balance.verify(&address) => Some(balance),
                    BalanceResponse::Balance(_) | BalanceResponse::Unreachable => continue,
                    BalanceResponse::Absent => None,
                };
                if let Some(tally) = tallies.get_mut(&address) {
                    tally.record(weight, classify(view, old.balance(&address), new.balance(&address)));
                }
            }
        }

        tallies
            .into_iter()
            .map(|(address, tally)| {
                let verdict = tally.verdict(self.config.threshold);
                tracing::debug!(
                    address = %address.short(),
                    old = tally.old,
                    new = tally.new,
                    other = tally.other,
                    ?verdict,
                    "dispute tallied"
                );
                (address, DisputeResult { verdict, tally })
            })
            .collect()
    }
}
