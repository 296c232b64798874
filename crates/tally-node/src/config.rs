//! Node configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tally_core::config::{duration_ms, parse_field, TallyConfig};
use tally_core::ConfigError;
use tally_quorum::QuorumConfig;

/// Settings for one node
///
/// ```toml
/// pending_transaction_timeout = 20000
/// max_failed_per_address = 32
///
/// [quorum]
/// vote_budget = 100
/// threshold = 0.75
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Quorum voting settings
    pub quorum: QuorumConfig,
    /// Bound on delivering a pending transfer to its receiver
    #[serde(with = "duration_ms")]
    pub pending_transaction_timeout: Duration,
    /// How long a voter keeps a sender locked without hearing the outcome
    #[serde(with = "duration_ms")]
    pub pending_lock_timeout: Duration,
    /// Failed transactions kept per address for retry
    pub max_failed_per_address: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            quorum: QuorumConfig::default(),
            pending_transaction_timeout: Duration::from_secs(20),
            pending_lock_timeout: Duration::from_secs(60),
            max_failed_per_address: 32,
        }
    }
}

impl TallyConfig for NodeConfig {
    const SECTION: &'static str = "node";

    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "pending_transaction_timeout_ms" | "pending_transaction_timeout" => {
                self.pending_transaction_timeout = Duration::from_millis(parse_field(key, value)?);
            }
            "pending_lock_timeout_ms" | "pending_lock_timeout" => {
                self.pending_lock_timeout = Duration::from_millis(parse_field(key, value)?);
            }
            "max_failed_per_address" => self.max_failed_per_address = parse_field(key, value)?,
            other => match other.strip_prefix("quorum_") {
                Some(field) => self.quorum.set_from_string(field, value)?,
                None => return Err(ConfigError::invalid(other, "unknown node setting")),
            },
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.quorum.validate()?;
        if self.pending_transaction_timeout.is_zero() {
            return Err(ConfigError::NonPositive {
                field: "pending_transaction_timeout",
            });
        }
        if self.pending_lock_timeout.is_zero() {
            return Err(ConfigError::NonPositive {
                field: "pending_lock_timeout",
            });
        }
        if self.max_failed_per_address == 0 {
            return Err(ConfigError::NonPositive {
                field: "max_failed_per_address",
            });
        }
        Ok(())
    }
}
