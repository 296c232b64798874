//! Content hashing for ledger digests
//!
//! Table digests gossiped between nodes go through [`hash`], so the algorithm is
//! declared in exactly one place. The seeded voter sequence does not hash; it folds
//! the sender's balance and address bytes directly.
//!
//! Current algorithm: **SHA-256** (256-bit / 32-byte output)
//!
//! ```ignore
//! use tally_core::crypto::hash::hash;
//!
//! let digest = hash(b"table bytes");
//! assert_eq!(digest.len(), 32);
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hash arbitrary bytes to a 32-byte digest
#[inline]
pub fn hash(data: &[u8]) -> [u8; 32] {
    let result = Sha256::digest(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// A 32-byte digest
///
/// Displayed and serialized as lowercase hex; two snapshots with equal `Hash32` digests
/// hold byte-identical canonical exports.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    /// Create a digest from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash `data` into a digest
    pub fn of(data: &[u8]) -> Self {
        Self(hash(data))
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex text form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the hex text form
    pub fn from_hex(text: &str) -> Option<Self> {
        let bytes = hex::decode(text).ok()?;
        let array: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(array))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({}…)", &self.to_hex()[..12])
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).ok_or_else(|| serde::de::Error::custom("expected 64 hex characters"))
    }
}
