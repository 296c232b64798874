//! Transaction stages
//!
//! A transfer moves through three signed stages, each adding one signature:
//!
//! - [`ConfirmationTransaction`]: the intent plus the sender's signature over
//!   `amount_le8 || timestamp_le8 || receiver_32`
//! - [`PendingTransaction`]: adds the sender's self-signed post-debit balance
//! - [`SignedTransaction`]: adds the receiver's self-signed post-credit balance
//!
//! Only a `SignedTransaction` can be applied to a table. Stage checks are pure and
//! run wherever a transaction crosses a trust boundary.
//!
//! Wire forms are fixed width with little-endian integers:
//!
//! | stage | layout | bytes |
//! |---|---|---|
//! | confirmation | `sender 32 · sender_tx_sig 64 · receiver 32 · amount 8 · timestamp 8` | 144 |
//! | pending | `sender 32 · sender_sig 64 · sender_tx_sig 64 · receiver 32 · amount 8 · timestamp 8` | 208 |
//! | signed | pending followed by `receiver_sig 64` | 272 |

use crate::crypto::keys::{ADDRESS_LEN, SIGNATURE_LEN};
use crate::crypto::{verify, Address, Signature};
use crate::errors::{CodecError, SignatureRole, TransactionError};
use crate::ledger::codec::{read_address, read_signature, read_u64};
use crate::ledger::{LedgerSnapshot, SignedBalance};
use serde::{Deserialize, Serialize};

/// Confirmation wire length
pub const CONFIRMATION_LEN: usize = ADDRESS_LEN + SIGNATURE_LEN + ADDRESS_LEN + 16;
/// Pending wire length
pub const PENDING_LEN: usize = ADDRESS_LEN + 2 * SIGNATURE_LEN + ADDRESS_LEN + 16;
/// Signed wire length
pub const SIGNED_LEN: usize = PENDING_LEN + SIGNATURE_LEN;

/// The unsigned transfer intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    /// Debited address
    pub sender: Address,
    /// Credited address
    pub receiver: Address,
    /// Units moved
    pub amount: u64,
    /// Milliseconds since the Unix epoch; becomes both parties' new timestamp
    pub timestamp: u64,
}

impl Transaction {
    /// Bytes the sender signs: `amount_le8 || timestamp_le8 || receiver_32`
    pub fn signing_bytes(&self) -> [u8; 48] {
        let mut bytes = [0u8; 48];
        bytes[..8].copy_from_slice(&self.amount.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes[16..].copy_from_slice(self.receiver.as_bytes());
        bytes
    }

    fn check_shape(&self) -> Result<(), TransactionError> {
        if self.amount == 0 {
            return Err(TransactionError::InvalidAmount);
        }
        if self.sender == self.receiver {
            return Err(TransactionError::SelfTransfer);
        }
        Ok(())
    }
}

/// Intent plus the sender's transaction signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfirmationTransaction {
    /// The signed intent
    pub transaction: Transaction,
    /// Sender's signature over [`Transaction::signing_bytes`]
    pub sender_transaction_signature: Signature,
}

impl ConfirmationTransaction {
    /// The underlying intent
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Check the shape of the intent and the sender's transaction signature
    pub fn verify(&self) -> Result<(), TransactionError> {
        self.transaction.check_shape()?;
        if verify(
            &self.transaction.signing_bytes(),
            &self.sender_transaction_signature,
            &self.transaction.sender,
        ) {
            Ok(())
        } else {
            Err(TransactionError::InvalidSignature(SignatureRole::Transaction))
        }
    }

    /// Encode the 144-byte wire form
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(CONFIRMATION_LEN);
        buffer.extend_from_slice(self.transaction.sender.as_bytes());
        buffer.extend_from_slice(self.sender_transaction_signature.as_bytes());
        buffer.extend_from_slice(self.transaction.receiver.as_bytes());
        buffer.extend_from_slice(&self.transaction.amount.to_le_bytes());
        buffer.extend_from_slice(&self.transaction.timestamp.to_le_bytes());
        buffer
    }

    /// Decode the 144-byte wire form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        expect_len("confirmation", bytes, CONFIRMATION_LEN)?;
        let sender = read_address(bytes, 0);
        let signature = read_signature(bytes, ADDRESS_LEN);
        let tail = ADDRESS_LEN + SIGNATURE_LEN;
        Ok(Self {
            transaction: Transaction {
                sender,
                receiver: read_address(bytes, tail),
                amount: read_u64(bytes, tail + ADDRESS_LEN),
                timestamp: read_u64(bytes, tail + ADDRESS_LEN + 8),
            },
            sender_transaction_signature: signature,
        })
    }
}

/// Confirmation plus the sender's post-debit balance signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingTransaction {
    /// The confirmation stage
    pub confirmation: ConfirmationTransaction,
    /// Sender's signature over `(balance - amount, timestamp)`
    pub sender_signature: Signature,
}

impl PendingTransaction {
    /// The underlying intent
    pub fn transaction(&self) -> &Transaction {
        &self.confirmation.transaction
    }

    /// The confirmation stage
    pub fn confirmation(&self) -> &ConfirmationTransaction {
        &self.confirmation
    }

    /// Check every sender-side rule against `table`
    pub fn verify_against(&self, table: &LedgerSnapshot) -> Result<(), TransactionError> {
        self.confirmation.verify()?;
        let intent = self.transaction();
        let identifier = table.network().identifier();
        if intent.sender == identifier || intent.receiver == identifier {
            return Err(TransactionError::ReservedAddress);
        }
        let recorded = table.last_timestamp(&intent.sender);
        if recorded >= intent.timestamp {
            return Err(TransactionError::StaleTransaction {
                address: intent.sender,
                recorded,
                attempted: intent.timestamp,
            });
        }
        let available = table.amount_of(&intent.sender);
        let remaining =
            available
                .checked_sub(intent.amount)
                .ok_or(TransactionError::InsufficientFunds {
                    available,
                    requested: intent.amount,
                })?;
        let debit = SignedBalance::new(remaining, intent.timestamp, self.sender_signature);
        if !debit.verify(&intent.sender) {
            return Err(TransactionError::InvalidSignature(SignatureRole::Sender));
        }
        Ok(())
    }

    /// Encode the 208-byte wire form
    pub fn to_bytes(&self) -> Vec<u8> {
        let intent = self.transaction();
        let mut buffer = Vec::with_capacity(PENDING_LEN);
        buffer.extend_from_slice(intent.sender.as_bytes());
        buffer.extend_from_slice(self.sender_signature.as_bytes());
        buffer.extend_from_slice(self.confirmation.sender_transaction_signature.as_bytes());
        buffer.extend_from_slice(intent.receiver.as_bytes());
        buffer.extend_from_slice(&intent.amount.to_le_bytes());
        buffer.extend_from_slice(&intent.timestamp.to_le_bytes());
        buffer
    }

    /// Decode the 208-byte wire form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        expect_len("pending", bytes, PENDING_LEN)?;
        Ok(decode_pending(bytes))
    }
}

/// Pending plus the receiver's post-credit balance signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// The pending stage
    pub pending: PendingTransaction,
    /// Receiver's signature over `(balance + amount, timestamp)`
    pub receiver_signature: Signature,
}

impl SignedTransaction {
    /// The underlying intent
    pub fn transaction(&self) -> &Transaction {
        self.pending.transaction()
    }

    /// The pending stage
    pub fn pending(&self) -> &PendingTransaction {
        &self.pending
    }

    /// The confirmation stage
    pub fn confirmation(&self) -> &ConfirmationTransaction {
        &self.pending.confirmation
    }

    /// Sender's post-debit balance signature
    pub fn sender_signature(&self) -> Signature {
        self.pending.sender_signature
    }

    /// Receiver's post-credit balance signature
    pub fn receiver_signature(&self) -> Signature {
        self.receiver_signature
    }

    /// Check every rule of both parties against `table`
    pub fn verify_against(&self, table: &LedgerSnapshot) -> Result<(), TransactionError> {
        self.pending.verify_against(table)?;
        let intent = self.transaction();
        let recorded = table.last_timestamp(&intent.receiver);
        if recorded >= intent.timestamp {
            return Err(TransactionError::StaleTransaction {
                address: intent.receiver,
                recorded,
                attempted: intent.timestamp,
            });
        }
        let credited = table
            .amount_of(&intent.receiver)
            .checked_add(intent.amount)
            .ok_or(TransactionError::InvalidAmount)?;
        let credit = SignedBalance::new(credited, intent.timestamp, self.receiver_signature);
        if !credit.verify(&intent.receiver) {
            return Err(TransactionError::InvalidSignature(SignatureRole::Receiver));
        }
        Ok(())
    }

    /// Encode the 272-byte wire form
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = self.pending.to_bytes();
        buffer.extend_from_slice(self.receiver_signature.as_bytes());
        buffer
    }

    /// Decode the 272-byte wire form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        expect_len("signed", bytes, SIGNED_LEN)?;
        Ok(Self {
            pending: decode_pending(&bytes[..PENDING_LEN]),
            receiver_signature: read_signature(bytes, PENDING_LEN),
        })
    }
}

fn expect_len(kind: &'static str, bytes: &[u8], expected: usize) -> Result<(), CodecError> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(CodecError::TransactionLength {
            kind,
            expected,
            actual: bytes.len(),
        })
    }
}

fn decode_pending(bytes: &[u8]) -> PendingTransaction {
    let sender = read_address(bytes, 0);
    let sender_signature = read_signature(bytes, ADDRESS_LEN);
    let transaction_signature = read_signature(bytes, ADDRESS_LEN + SIGNATURE_LEN);
    let tail = ADDRESS_LEN + 2 * SIGNATURE_LEN;
    PendingTransaction {
        confirmation: ConfirmationTransaction {
            transaction: Transaction {
                sender,
                receiver: read_address(bytes, tail),
                amount: read_u64(bytes, tail + ADDRESS_LEN),
                timestamp: read_u64(bytes, tail + ADDRESS_LEN + 8),
            },
            sender_transaction_signature: transaction_signature,
        },
        sender_signature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{wallet, TestNetwork, GENESIS_TS};
    use crate::time::FixedClock;
    use assert_matches::assert_matches;

    fn signed_pair() -> (TestNetwork, SignedTransaction) {
        let net = TestNetwork::new(&[100]);
        let receiver = wallet(50);
        let table = net.genesis();
        let pending = net.wallets[0]
            .create_transaction(&table, 25, receiver.address(), &FixedClock(GENESIS_TS + 7))
            .unwrap();
        let signed = receiver.sign_transaction(&table, &pending).unwrap();
        (net, signed)
    }

    #[test]
    fn test_wire_lengths() {
        assert_eq!(CONFIRMATION_LEN, 144);
        assert_eq!(PENDING_LEN, 208);
        assert_eq!(SIGNED_LEN, 272);
    }

    #[test]
    fn test_signed_wire_round_trip() {
        let (_, signed) = signed_pair();
        let bytes = signed.to_bytes();
        assert_eq!(bytes.len(), SIGNED_LEN);
        assert_eq!(SignedTransaction::from_bytes(&bytes).unwrap(), signed);

        let confirmation = signed.confirmation().to_bytes();
        assert_eq!(
            ConfirmationTransaction::from_bytes(&confirmation).unwrap(),
            *signed.confirmation()
        );
        // the pending form is a prefix of the signed form
        assert_eq!(&bytes[..PENDING_LEN], signed.pending().to_bytes().as_slice());
    }

    #[test]
    fn test_wrong_length_is_codec_error() {
        assert_matches!(
            PendingTransaction::from_bytes(&[0u8; 207]),
            Err(CodecError::TransactionLength {
                kind: "pending",
                expected: 208,
                actual: 207
            })
        );
        assert_matches!(
            ConfirmationTransaction::from_bytes(&[0u8; 272]),
            Err(CodecError::TransactionLength { .. })
        );
    }

    #[test]
    fn test_confirmation_signature_binds_receiver() {
        let (_, signed) = signed_pair();
        let mut redirected = *signed.confirmation();
        redirected.transaction.receiver = wallet(51).address();
        assert_matches!(
            redirected.verify(),
            Err(TransactionError::InvalidSignature(SignatureRole::Transaction))
        );
        assert!(signed.confirmation().verify().is_ok());
    }

    #[test]
    fn test_verify_against_table() {
        let (net, signed) = signed_pair();
        let table = net.genesis();
        assert!(signed.verify_against(&table).is_ok());

        let next = table
            .apply_transaction(&signed, &FixedClock(GENESIS_TS + 7))
            .unwrap();
        assert_matches!(
            signed.verify_against(&next),
            Err(TransactionError::StaleTransaction { .. })
        );
    }

    #[test]
    fn test_tampered_receiver_signature() {
        let (net, mut signed) = signed_pair();
        signed.receiver_signature = signed.sender_signature();
        assert_matches!(
            signed.verify_against(&net.genesis()),
            Err(TransactionError::InvalidSignature(SignatureRole::Receiver))
        );
    }
}
