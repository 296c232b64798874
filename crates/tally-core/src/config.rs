//! Network and component configuration
//!
//! [`NetworkConfig`] describes one ledger network: its identifier, supply and genesis
//! table. It is built once, validated, and shared as `Arc<NetworkConfig>` by every
//! snapshot and node of that network.
//!
//! Component configs (quorum and node settings) implement [`TallyConfig`], which
//! provides TOML loading and `TALLY_*` environment overrides.

use crate::crypto::{Address, Signature};
use crate::errors::ConfigError;
use crate::ledger::{LedgerSnapshot, SignedBalance};
use crate::time::PhysicalClock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Prefix for environment overrides of component configs
pub const ENV_PREFIX: &str = "TALLY_";

/// Core trait for Tally component configuration types
pub trait TallyConfig: Clone + Default + Send + Sync + DeserializeOwned + 'static {
    /// Section name used for environment keys (`TALLY_<SECTION>_<FIELD>`)
    const SECTION: &'static str;

    /// Parse and validate a TOML document
    fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Apply `TALLY_<SECTION>_<FIELD>` environment overrides
    fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from an explicit set of variables
    fn merge_with_vars<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let prefix = format!("{ENV_PREFIX}{}_", Self::SECTION.to_ascii_uppercase());
        for (key, value) in vars {
            if let Some(field) = key.strip_prefix(&prefix) {
                self.set_from_string(&field.to_ascii_lowercase(), &value)?;
            }
        }
        self.validate()
    }

    /// Set a configuration value from a string
    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Parse a numeric override value
pub fn parse_field<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, format!("cannot parse {value:?}")))
}

/// Serde helper storing a `Duration` as integer milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize as milliseconds
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    /// Deserialize from milliseconds
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// The network id: the identifier address and the identifier's signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId {
    /// Reserved identifier address
    pub identifier: Address,
    /// Signature stored in the identifier sentinel entry
    pub signature: Signature,
}

impl NetworkId {
    /// Parse `<identifier-hex>:<signature-hex>`
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let (identifier, signature) = text
            .trim()
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidNetworkId("missing ':' separator".to_string()))?;
        let identifier = Address::parse(identifier)
            .map_err(|err| ConfigError::InvalidNetworkId(err.to_string()))?;
        let signature = Signature::from_hex(signature).ok_or_else(|| {
            ConfigError::InvalidNetworkId("signature must be 128 hex characters".to_string())
        })?;
        Ok(Self {
            identifier,
            signature,
        })
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.identifier, self.signature)
    }
}

/// Immutable description of one ledger network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    id: NetworkId,
    total_coins: u64,
    subdivision: u64,
    genesis: BTreeMap<Address, SignedBalance>,
    genesis_burned: u64,
}

impl NetworkConfig {
    /// Validate the parameters and the genesis table
    ///
    /// The identifier sentinel is inserted into the genesis table when absent.
    pub fn new(
        network_id: &str,
        total_coins: u64,
        subdivision: u64,
        genesis: BTreeMap<Address, SignedBalance>,
        genesis_burned: u64,
        clock: &dyn PhysicalClock,
    ) -> Result<Arc<Self>, ConfigError> {
        let id = NetworkId::parse(network_id)?;
        Self::from_parts(id, total_coins, subdivision, genesis, genesis_burned, clock)
    }

    /// Same as [`NetworkConfig::new`] with an already parsed id
    pub fn from_parts(
        id: NetworkId,
        total_coins: u64,
        subdivision: u64,
        mut genesis: BTreeMap<Address, SignedBalance>,
        genesis_burned: u64,
        clock: &dyn PhysicalClock,
    ) -> Result<Arc<Self>, ConfigError> {
        if total_coins == 0 {
            return Err(ConfigError::NonPositive {
                field: "total_coins",
            });
        }
        if subdivision == 0 {
            return Err(ConfigError::NonPositive {
                field: "subdivision",
            });
        }
        genesis
            .entry(id.identifier)
            .or_insert_with(|| SignedBalance::new(0, 0, id.signature));

        let config = Arc::new(Self {
            id,
            total_coins,
            subdivision,
            genesis,
            genesis_burned,
        });
        let snapshot = config.genesis_snapshot(clock);
        if let Some(reason) = snapshot.invalid_reason() {
            return Err(ConfigError::InvalidGenesis(reason.clone()));
        }
        tracing::debug!(
            network = %config.id.identifier.short(),
            total_coins,
            accounts = snapshot.len(),
            "network configuration loaded"
        );
        Ok(config)
    }

    /// Parse a TOML network description
    pub fn from_toml_str(text: &str, clock: &dyn PhysicalClock) -> Result<Arc<Self>, ConfigError> {
        let file: NetworkFile = toml::from_str(text)?;
        let mut genesis = BTreeMap::new();
        for entry in file.genesis {
            let balance = SignedBalance::new(entry.amount, entry.timestamp, entry.signature);
            if genesis.insert(entry.address, balance).is_some() {
                return Err(ConfigError::invalid(
                    "genesis",
                    format!("duplicate address {}", entry.address),
                ));
            }
        }
        Self::new(
            &file.network_id,
            file.total_coins,
            file.subdivision,
            genesis,
            file.genesis_burned,
            clock,
        )
    }

    /// Load a TOML network description from disk
    pub fn load_from_file(path: &Path, clock: &dyn PhysicalClock) -> Result<Arc<Self>, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content, clock)
    }

    /// Render as the TOML form accepted by [`NetworkConfig::from_toml_str`]
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let file = NetworkFile {
            network_id: self.id.to_string(),
            total_coins: self.total_coins,
            subdivision: self.subdivision,
            genesis_burned: self.genesis_burned,
            genesis: self
                .genesis
                .iter()
                .filter(|(address, _)| **address != self.id.identifier)
                .map(|(address, balance)| GenesisEntry {
                    address: *address,
                    amount: balance.amount,
                    timestamp: balance.timestamp,
                    signature: balance.signature,
                })
                .collect(),
        };
        toml::to_string(&file).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Build the genesis snapshot
    pub fn genesis_snapshot(self: &Arc<Self>, clock: &dyn PhysicalClock) -> LedgerSnapshot {
        LedgerSnapshot::new(
            Arc::clone(self),
            self.genesis.clone(),
            self.genesis_burned,
            clock,
        )
    }

    /// The network id
    pub fn id(&self) -> &NetworkId {
        &self.id
    }

    /// The reserved identifier address
    pub fn identifier(&self) -> Address {
        self.id.identifier
    }

    /// The signature stored in the identifier sentinel
    pub fn identifier_signature(&self) -> Signature {
        self.id.signature
    }

    /// The exact sentinel entry every table must carry at the identifier
    pub fn identifier_balance(&self) -> SignedBalance {
        SignedBalance::new(0, 0, self.id.signature)
    }

    /// Total supply, burned coins included
    pub fn total_coins(&self) -> u64 {
        self.total_coins
    }

    /// Indivisible units per coin
    pub fn subdivision(&self) -> u64 {
        self.subdivision
    }

    /// Genesis balances, sentinel included
    pub fn genesis(&self) -> &BTreeMap<Address, SignedBalance> {
        &self.genesis
    }

    /// Coins burned at genesis
    pub fn genesis_burned(&self) -> u64 {
        self.genesis_burned
    }
}

#[derive(Serialize, Deserialize)]
struct NetworkFile {
    network_id: String,
    total_coins: u64,
    #[serde(default = "default_subdivision")]
    subdivision: u64,
    #[serde(default)]
    genesis_burned: u64,
    #[serde(default)]
    genesis: Vec<GenesisEntry>,
}

#[derive(Serialize, Deserialize)]
struct GenesisEntry {
    address: Address,
    amount: u64,
    timestamp: u64,
    signature: Signature,
}

fn default_subdivision() -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{network_id, wallet, TestNetwork};
    use crate::time::FixedClock;
    use assert_matches::assert_matches;

    #[test]
    fn test_network_id_round_trip() {
        let text = network_id();
        let id = NetworkId::parse(&text).unwrap();
        assert_eq!(id.to_string(), text);
    }

    #[test]
    fn test_network_id_rejects_garbage() {
        assert_matches!(NetworkId::parse("nope"), Err(ConfigError::InvalidNetworkId(_)));
        let bad_sig = format!("{}:abcd", "00".repeat(32));
        assert_matches!(NetworkId::parse(&bad_sig), Err(ConfigError::InvalidNetworkId(_)));
    }

    #[test]
    fn test_zero_supply_rejected() {
        let result = NetworkConfig::new(&network_id(), 0, 1, BTreeMap::new(), 0, &FixedClock(10));
        assert_matches!(
            result,
            Err(ConfigError::NonPositive {
                field: "total_coins"
            })
        );
    }

    #[test]
    fn test_invalid_genesis_carries_reason() {
        let holder = wallet(1);
        let mut genesis = BTreeMap::new();
        genesis.insert(holder.address(), holder.sign_balance(50, 1));
        let result = NetworkConfig::new(&network_id(), 100, 1, genesis, 0, &FixedClock(10));
        assert_matches!(
            result,
            Err(ConfigError::InvalidGenesis(crate::errors::InvalidReason::CoinSumMismatch {
                expected: 100,
                actual: 50
            }))
        );
    }

    #[test]
    fn test_sentinel_inserted() {
        let net = TestNetwork::new(&[100]);
        let sentinel = net.config.genesis().get(&net.config.identifier()).copied();
        assert_eq!(sentinel, Some(net.config.identifier_balance()));
    }

    #[test]
    fn test_toml_round_trip() {
        let net = TestNetwork::new(&[60, 40]);
        let text = net.config.to_toml_string().unwrap();
        let parsed = NetworkConfig::from_toml_str(&text, &net.clock).unwrap();
        assert_eq!(*parsed, *net.config);
    }

    #[test]
    fn test_toml_file_loading() {
        let net = TestNetwork::new(&[100]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.toml");
        std::fs::write(&path, net.config.to_toml_string().unwrap()).unwrap();
        let loaded = NetworkConfig::load_from_file(&path, &net.clock).unwrap();
        assert_eq!(loaded.total_coins(), 100);
        assert_matches!(
            NetworkConfig::load_from_file(&dir.path().join("missing.toml"), &net.clock),
            Err(ConfigError::Io(_))
        );
    }
}
