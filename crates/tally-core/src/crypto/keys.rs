//! Ed25519 addresses, signatures and key pairs
//!
//! An [`Address`] is the holder's 32-byte Ed25519 verifying key. Addresses are
//! totally ordered by their bytes and that order is the canonical table order.
//! The text form is lowercase hex; parsing accepts either case.

use crate::errors::AddressError;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of an address in bytes
pub const ADDRESS_LEN: usize = 32;

/// Length of a signature in bytes
pub const SIGNATURE_LEN: usize = 64;

/// A ledger address: the holder's Ed25519 verifying key bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Wrap raw key bytes
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Copy an address out of a slice of exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let array: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len() * 2))?;
        Ok(Self(array))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Lowercase hex text form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse and normalize the hex text form
    pub fn parse(text: &str) -> Result<Self, AddressError> {
        let trimmed = text.trim();
        if trimmed.len() != ADDRESS_LEN * 2 {
            return Err(AddressError::InvalidLength(trimmed.len()));
        }
        let bytes = hex::decode(trimmed.to_ascii_lowercase()).map_err(|_| AddressError::InvalidHex)?;
        Self::from_slice(&bytes)
    }

    /// Short form used in log fields
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}…)", self.short())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// A detached Ed25519 signature
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    /// Wrap raw signature bytes
    pub const fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    /// Copy a signature out of a slice of exactly 64 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; SIGNATURE_LEN] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    /// Raw signature bytes
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    /// Lowercase hex text form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the hex text form
    pub fn from_hex(text: &str) -> Option<Self> {
        let bytes = hex::decode(text.trim()).ok()?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}…)", hex::encode(&self.0[..6]))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).ok_or_else(|| serde::de::Error::custom("expected 128 hex characters"))
    }
}

/// An Ed25519 signing key together with its address
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    address: Address,
}

impl KeyPair {
    /// Build a key pair from a 32-byte secret seed
    pub fn from_secret_bytes(secret: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&secret);
        let address = Address(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    /// Generate a fresh key pair
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut secret = [0u8; 32];
        rng.fill_bytes(&mut secret);
        Self::from_secret_bytes(secret)
    }

    /// The address (verifying key) of this key pair
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Verify `signature` over `message` against `address`
///
/// Returns `false` for addresses that are not valid curve points.
pub fn verify(message: &[u8], signature: &Signature, address: &Address) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(&address.0) else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(&signature.0);
    key.verify(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn key(seed: u8) -> KeyPair {
        KeyPair::from_secret_bytes([seed; 32])
    }

    #[test]
    fn test_sign_and_verify() {
        let pair = key(1);
        let signature = pair.sign(b"balance");
        assert!(verify(b"balance", &signature, &pair.address()));
        assert!(!verify(b"balance!", &signature, &pair.address()));
        assert!(!verify(b"balance", &signature, &key(2).address()));
    }

    #[test]
    fn test_address_parse_normalizes_case() {
        let address = key(3).address();
        let upper = address.to_hex().to_ascii_uppercase();
        let parsed = Address::parse(&upper).unwrap();
        assert_eq!(parsed, address);
        assert_eq!(parsed.to_string(), address.to_hex());
    }

    #[test]
    fn test_address_parse_rejects_bad_input() {
        assert_matches!(Address::parse("abcd"), Err(AddressError::InvalidLength(4)));
        let bad = "zz".repeat(32);
        assert_matches!(Address::parse(&bad), Err(AddressError::InvalidHex));
    }

    #[test]
    fn test_invalid_point_never_verifies() {
        let pair = key(4);
        let signature = pair.sign(b"m");
        let bogus = Address::from_bytes([0xff; 32]);
        assert!(!verify(b"m", &signature, &bogus));
    }

    #[test]
    fn test_addresses_order_by_bytes() {
        let low = Address::from_bytes([0; 32]);
        let mut high_bytes = [0; 32];
        high_bytes[0] = 1;
        assert!(low < Address::from_bytes(high_bytes));
    }
}
