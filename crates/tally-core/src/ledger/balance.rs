//! Balances and their holder signatures

use crate::crypto::{verify, Address, KeyPair, Signature};
use serde::{Deserialize, Serialize};

/// An unsigned balance: amount held at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Balance {
    /// Indivisible units held
    pub amount: u64,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl Balance {
    /// Create a balance
    pub const fn new(amount: u64, timestamp: u64) -> Self {
        Self { amount, timestamp }
    }

    /// Bytes the holder signs: `amount_le8 || timestamp_le8`
    pub fn signing_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.amount.to_le_bytes());
        bytes[8..].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes
    }

    /// Sign this balance with the holder's key
    pub fn sign(self, keys: &KeyPair) -> SignedBalance {
        SignedBalance {
            amount: self.amount,
            timestamp: self.timestamp,
            signature: keys.sign(&self.signing_bytes()),
        }
    }
}

/// A balance carrying the holder's signature over `(amount, timestamp)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignedBalance {
    /// Indivisible units held
    pub amount: u64,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Holder's signature over [`Balance::signing_bytes`]
    pub signature: Signature,
}

impl SignedBalance {
    /// Create a signed balance from parts
    pub const fn new(amount: u64, timestamp: u64, signature: Signature) -> Self {
        Self {
            amount,
            timestamp,
            signature,
        }
    }

    /// The unsigned part
    pub fn balance(&self) -> Balance {
        Balance::new(self.amount, self.timestamp)
    }

    /// Whether the signature verifies against `address`
    pub fn verify(&self, address: &Address) -> bool {
        verify_balance(address, self)
    }
}

/// Verify a signed balance against its holder's address
pub fn verify_balance(address: &Address, balance: &SignedBalance) -> bool {
    verify(
        &balance.balance().signing_bytes(),
        &balance.signature,
        address,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_bytes_layout() {
        let bytes = Balance::new(0x0102, 0x0304).signing_bytes();
        assert_eq!(&bytes[..2], &[0x02, 0x01]);
        assert_eq!(&bytes[8..10], &[0x04, 0x03]);
    }

    #[test]
    fn test_signature_binds_amount_and_timestamp() {
        let keys = KeyPair::from_secret_bytes([9; 32]);
        let signed = Balance::new(100, 5).sign(&keys);
        assert!(signed.verify(&keys.address()));

        let mut tampered = signed;
        tampered.amount += 1;
        assert!(!tampered.verify(&keys.address()));

        let mut tampered = signed;
        tampered.timestamp += 1;
        assert!(!tampered.verify(&keys.address()));
    }
}
