//! Quorum voting configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tally_core::config::{duration_ms, parse_field, TallyConfig};
use tally_core::ConfigError;

/// Tunables shared by every quorum protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuorumConfig {
    /// Maximum number of counted responses per vote
    pub vote_budget: usize,
    /// Weighted fraction of responses that must agree
    pub threshold: f64,
    /// Responses required before a confirmation may pass
    pub min_responses: usize,
    /// Bound on every single peer request
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            vote_budget: 100,
            threshold: 0.75,
            min_responses: 0,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl TallyConfig for QuorumConfig {
    const SECTION: &'static str = "quorum";

    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "vote_budget" => self.vote_budget = parse_field(key, value)?,
            "threshold" => self.threshold = parse_field(key, value)?,
            "min_responses" => self.min_responses = parse_field(key, value)?,
            "request_timeout_ms" | "request_timeout" => {
                self.request_timeout = Duration::from_millis(parse_field(key, value)?);
            }
            other => return Err(ConfigError::invalid(other, "unknown quorum setting")),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.vote_budget == 0 {
            return Err(ConfigError::NonPositive {
                field: "vote_budget",
            });
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "threshold",
                format!("{} is outside (0, 1]", self.threshold),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::NonPositive {
                field: "request_timeout",
            });
        }
        Ok(())
    }
}
