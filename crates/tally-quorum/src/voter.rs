//! The quorum voter and its wave-batched fan-out

use crate::config::QuorumConfig;
use crate::transport::QuorumTransport;
use futures::future::join_all;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::sync::Arc;
use tally_core::Address;

/// Runs the quorum protocols against a transport
///
/// The voter holds no ledger state; every call takes the table it votes about.
/// It is used from inside a node's serialization lane and never re-enters it.
pub struct QuorumVoter {
    pub(crate) transport: Arc<dyn QuorumTransport>,
    pub(crate) config: QuorumConfig,
    pub(crate) rng: Mutex<ChaCha8Rng>,
}

impl QuorumVoter {
    /// Create a voter with an entropy-seeded sampler
    pub fn new(transport: Arc<dyn QuorumTransport>, config: QuorumConfig) -> Self {
        Self::with_seed(transport, config, rand::random())
    }

    /// Create a voter whose stake sampling is reproducible
    pub fn with_seed(transport: Arc<dyn QuorumTransport>, config: QuorumConfig, seed: u64) -> Self {
        Self {
            transport,
            config,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &QuorumConfig {
        &self.config
    }

    /// The transport votes are sent over
    pub fn transport(&self) -> &Arc<dyn QuorumTransport> {
        &self.transport
    }

    /// Ask voters in waves until the budget is met or voters run out
    ///
    /// Each wave issues `vote_budget - responses` requests concurrently and waits
    /// for all of them. A request that times out or yields `None` is an abstention.
    /// Returns every peer that was asked and the answers that came back.
    pub(crate) async fn collect_waves<N, A, F, T>(
        &self,
        mut next_voter: N,
        ask: A,
    ) -> (Vec<Address>, Vec<(Address, T)>)
    where
        N: FnMut() -> Option<Address>,
        A: Fn(Address) -> F,
        F: Future<Output = Option<T>>,
    {
        let mut asked = Vec::new();
        let mut answers = Vec::new();
        let timeout = self.config.request_timeout;
        while answers.len() < self.config.vote_budget {
            let wave_size = self.config.vote_budget - answers.len();
            let wave: Vec<Address> = std::iter::from_fn(&mut next_voter).take(wave_size).collect();
            if wave.is_empty() {
                break;
            }
            let requests = wave.iter().map(|peer| {
                let request = ask(*peer);
                async move { tokio::time::timeout(timeout, request).await.ok().flatten() }
            });
            let results = join_all(requests).await;
            tracing::trace!(
                wave = wave.len(),
                answered = results.iter().filter(|r| r.is_some()).count(),
                "quorum wave finished"
            );
            for (peer, result) in wave.iter().zip(results) {
                if let Some(answer) = result {
                    answers.push((*peer, answer));
                }
            }
            asked.extend(wave);
        }
        (asked, answers)
    }
}

impl std::fmt::Debug for QuorumVoter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuorumVoter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
