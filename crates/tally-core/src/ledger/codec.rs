//! Canonical binary form of a snapshot
//!
//! Per address in ascending byte order: `[pubkey 32][amount 8][timestamp 8][signature 64]`,
//! followed by a trailing `[burned 8]`. Integers are little-endian. The digest of a
//! snapshot is the hash of this buffer, so two nodes agree on a digest exactly when
//! their tables are byte-identical.

use super::{LedgerSnapshot, SignedBalance};
use crate::config::NetworkConfig;
use crate::crypto::keys::{ADDRESS_LEN, SIGNATURE_LEN};
use crate::crypto::{Address, Signature};
use crate::errors::CodecError;
use crate::time::PhysicalClock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Bytes per table entry
pub const ENTRY_LEN: usize = ADDRESS_LEN + 8 + 8 + SIGNATURE_LEN;

/// Bytes of the trailing burned amount
pub const TRAILER_LEN: usize = 8;

pub(crate) fn encode_table(balances: &BTreeMap<Address, SignedBalance>, burned: u64) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(balances.len() * ENTRY_LEN + TRAILER_LEN);
    for (address, balance) in balances {
        buffer.extend_from_slice(address.as_bytes());
        buffer.extend_from_slice(&balance.amount.to_le_bytes());
        buffer.extend_from_slice(&balance.timestamp.to_le_bytes());
        buffer.extend_from_slice(balance.signature.as_bytes());
    }
    buffer.extend_from_slice(&burned.to_le_bytes());
    buffer
}

pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(word)
}

pub(crate) fn read_address(bytes: &[u8], offset: usize) -> Address {
    let mut raw = [0u8; ADDRESS_LEN];
    raw.copy_from_slice(&bytes[offset..offset + ADDRESS_LEN]);
    Address::from_bytes(raw)
}

pub(crate) fn read_signature(bytes: &[u8], offset: usize) -> Signature {
    let mut raw = [0u8; SIGNATURE_LEN];
    raw.copy_from_slice(&bytes[offset..offset + SIGNATURE_LEN]);
    Signature::from_bytes(raw)
}

fn decode_table(bytes: &[u8]) -> Result<(BTreeMap<Address, SignedBalance>, u64), CodecError> {
    if bytes.len() < TRAILER_LEN || (bytes.len() - TRAILER_LEN) % ENTRY_LEN != 0 {
        return Err(CodecError::TableLength {
            actual: bytes.len(),
        });
    }
    let entries = (bytes.len() - TRAILER_LEN) / ENTRY_LEN;
    let mut balances = BTreeMap::new();
    for index in 0..entries {
        let base = index * ENTRY_LEN;
        let address = read_address(bytes, base);
        let amount = read_u64(bytes, base + ADDRESS_LEN);
        let timestamp = read_u64(bytes, base + ADDRESS_LEN + 8);
        let signature = read_signature(bytes, base + ADDRESS_LEN + 16);
        if balances
            .insert(address, SignedBalance::new(amount, timestamp, signature))
            .is_some()
        {
            return Err(CodecError::DuplicateAddress(address));
        }
    }
    let burned = read_u64(bytes, bytes.len() - TRAILER_LEN);
    Ok((balances, burned))
}

impl LedgerSnapshot {
    /// Canonical export buffer
    pub fn export_buffer(&self) -> Vec<u8> {
        encode_table(self.balances(), self.burned())
    }

    /// Rebuild a snapshot from an export buffer
    ///
    /// Only malformed framing is an error; a well-framed table that breaks an
    /// invariant is returned with `is_valid() == false`.
    pub fn import_buffer(
        network: Arc<NetworkConfig>,
        bytes: &[u8],
        clock: &dyn PhysicalClock,
    ) -> Result<Self, CodecError> {
        let (balances, burned) = decode_table(bytes)?;
        Ok(Self::new(network, balances, burned, clock))
    }
}
