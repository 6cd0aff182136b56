// Transaction data structures

use crate::core::serialize::{fit_to_width, read_array, read_u64_le, trim_padding, FIELD_WIDTH};
use crate::core::{Canonical, Digest, Serializable};
use crate::error::{Error, Result};
use crate::wallet::SigningIdentity;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Encoded transaction length: idx + sender + receiver + amount + signature + nonce
pub const TRANSACTION_RECORD_LEN: usize = 8 + 4 * FIELD_WIDTH + 8;

/// Transfer of value between two wallet identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sequence index
    pub idx: u64,
    #[serde(with = "hex")]
    pub sender: [u8; 32],
    #[serde(with = "hex")]
    pub receiver: [u8; 32],
    /// Decimal amount text, stored in a fixed 32-byte field
    pub amount: String,
    #[serde(with = "hex")]
    pub signature: [u8; 32],
    /// Sender-scoped replay counter
    pub nonce: u64,
}

impl Transaction {
    /// Create an unsigned transaction. Identifiers longer than 32 bytes
    /// are truncated, shorter ones zero-padded.
    pub fn new(
        idx: u64,
        sender: &[u8],
        receiver: &[u8],
        amount: impl Into<String>,
        nonce: u64,
    ) -> Self {
        Self {
            idx,
            sender: fit_to_width(sender),
            receiver: fit_to_width(receiver),
            amount: amount.into(),
            signature: [0u8; 32],
            nonce,
        }
    }

    /// Transaction ID
    pub fn hash(&self) -> Digest {
        self.digest()
    }

    /// Digest the signer commits to: the canonical form with a zeroed signature
    pub fn signing_digest(&self) -> Digest {
        let unsigned = Self {
            signature: [0u8; 32],
            ..self.clone()
        };
        unsigned.digest()
    }

    /// Sign with an external identity. Only the first 32 bytes of the
    /// signature fit in the record, so a full signature that must be
    /// verified later has to be kept by the caller.
    pub fn sign<I: SigningIdentity + ?Sized>(&mut self, identity: &I) -> Vec<u8> {
        let signature = identity.sign(&self.signing_digest());
        self.signature = fit_to_width(&signature);
        signature
    }
}

impl Canonical for Transaction {
    fn canonical_text(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            self.idx,
            hex::encode(self.sender),
            hex::encode(self.receiver),
            self.amount,
            hex::encode(self.signature),
            self.nonce
        )
    }
}

impl Serializable for Transaction {
    fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(TRANSACTION_RECORD_LEN);
        buf.extend_from_slice(&self.idx.to_le_bytes());
        buf.extend_from_slice(&self.sender);
        buf.extend_from_slice(&self.receiver);
        buf.extend_from_slice(&fit_to_width::<FIELD_WIDTH>(self.amount.as_bytes()));
        buf.extend_from_slice(&self.signature);
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        Ok(buf)
    }

    fn decode(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let idx = read_u64_le(&mut cursor, "idx")?;
        let sender = read_array(&mut cursor, "sender")?;
        let receiver = read_array(&mut cursor, "receiver")?;
        let amount: [u8; FIELD_WIDTH] = read_array(&mut cursor, "amount")?;
        let signature = read_array(&mut cursor, "signature")?;
        let nonce = read_u64_le(&mut cursor, "nonce")?;

        if data.len() > TRANSACTION_RECORD_LEN {
            return Err(Error::MalformedTrailer {
                len: data.len() - TRANSACTION_RECORD_LEN,
            });
        }

        Ok(Self {
            idx,
            sender,
            receiver,
            amount: String::from_utf8_lossy(trim_padding(&amount)).into_owned(),
            signature,
            nonce,
        })
    }
}
