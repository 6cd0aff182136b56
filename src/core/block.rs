// Block data structures

use crate::config::BLOCK_VERSION;
use crate::consensus::parse_difficulty;
use crate::core::serialize::{
    magnitude_bytes, read_array, read_i32_le, read_i64_le, read_u64_le, FIELD_WIDTH,
};
use crate::core::{merkle_root, Canonical, Digest, Serializable, Transaction};
use crate::error::{Error, Result};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::io::{Cursor, Read};

/// Fixed part of a block record: version + prev + merkle + timestamp
/// + difficulty length + nonce (difficulty bytes excluded)
pub const BLOCK_FIXED_LEN: usize = 4 + 2 * FIELD_WIDTH + 8 + 4 + 8;

/// Block: header fields plus the ordered digests of its transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Chain position. Not part of the record or the digest.
    pub height: u64,
    /// Unix seconds
    pub timestamp: i64,
    pub previous_hash: Digest,
    pub merkle_root: Digest,
    /// Written as decimal text in JSON
    #[serde(with = "decimal")]
    pub difficulty: BigUint,
    /// Advanced by the miner
    pub nonce: u64,
    pub transactions: Vec<Digest>,
}

impl Block {
    /// Create an empty block with nonce 0 from decimal difficulty text
    pub fn new(
        height: u64,
        timestamp: i64,
        previous_hash: Digest,
        difficulty: &str,
    ) -> Result<Self> {
        let difficulty = parse_difficulty(difficulty)?;
        Ok(Self::with_difficulty(height, timestamp, previous_hash, difficulty))
    }

    pub fn with_difficulty(
        height: u64,
        timestamp: i64,
        previous_hash: Digest,
        difficulty: BigUint,
    ) -> Self {
        Self {
            height,
            timestamp,
            previous_hash,
            merkle_root: Digest::zero(),
            difficulty,
            nonce: 0,
            transactions: Vec::new(),
        }
    }

    /// Create a block committing to `transactions`
    pub fn with_transactions(
        height: u64,
        timestamp: i64,
        previous_hash: Digest,
        difficulty: &str,
        transactions: &[Transaction],
    ) -> Result<Self> {
        let mut block = Self::new(height, timestamp, previous_hash, difficulty)?;
        block.set_transactions(transactions.iter().map(Transaction::hash).collect());
        Ok(block)
    }

    /// First block of a chain
    pub fn genesis(timestamp: i64, difficulty: &str) -> Result<Self> {
        Self::new(0, timestamp, Digest::zero(), difficulty)
    }

    /// Replace the transaction list and recompute the Merkle root
    pub fn set_transactions(&mut self, digests: Vec<Digest>) {
        self.merkle_root = merkle_root(&digests);
        self.transactions = digests;
    }

    /// Whether the stored Merkle root commits to the transaction list
    pub fn has_valid_merkle_root(&self) -> bool {
        self.merkle_root == merkle_root(&self.transactions)
    }

    /// Get the block hash
    pub fn hash(&self) -> Digest {
        self.digest()
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_zero()
    }
}

impl Canonical for Block {
    fn canonical_text(&self) -> String {
        let template = self.template();
        format!("{}{}{}", template.prefix, self.nonce, template.suffix)
    }
}

/// Canonical text of a block split around its nonce, so a miner can
/// rehash nonce after nonce without rebuilding the other fields.
#[derive(Debug, Clone)]
pub struct HeaderTemplate {
    prefix: String,
    suffix: String,
}

impl HeaderTemplate {
    /// Digest of the block with `nonce` substituted; equals `Block::hash`
    pub fn hash_with_nonce(&self, nonce: u64) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(self.prefix.as_bytes());
        hasher.update(nonce.to_string().as_bytes());
        hasher.update(self.suffix.as_bytes());
        let mut result = [0u8; 32];
        result.copy_from_slice(&hasher.finalize());
        Digest::new(result)
    }
}

impl Block {
    pub fn template(&self) -> HeaderTemplate {
        let transactions: Vec<String> = self.transactions.iter().map(Digest::to_hex).collect();

        HeaderTemplate {
            prefix: format!(
                "v{}:{}:{}:{}:{}:",
                BLOCK_VERSION,
                self.previous_hash.to_hex(),
                self.merkle_root.to_hex(),
                self.timestamp,
                self.difficulty
            ),
            suffix: format!(":[{}]", transactions.join(",")),
        }
    }
}

impl Serializable for Block {
    fn encode(&self) -> Result<Vec<u8>> {
        let difficulty = magnitude_bytes(&self.difficulty);
        let difficulty_len = i32::try_from(difficulty.len())
            .map_err(|_| Error::MalformedRecord { field: "difficulty length" })?;

        let mut buf = Vec::with_capacity(
            BLOCK_FIXED_LEN + difficulty.len() + FIELD_WIDTH * self.transactions.len(),
        );
        buf.extend_from_slice(&BLOCK_VERSION.to_le_bytes());
        buf.extend_from_slice(self.previous_hash.as_bytes());
        buf.extend_from_slice(self.merkle_root.as_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&difficulty_len.to_le_bytes());
        buf.extend_from_slice(&difficulty);
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        for tx in &self.transactions {
            buf.extend_from_slice(tx.as_bytes());
        }

        Ok(buf)
    }

    fn decode(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let version = read_i32_le(&mut cursor, "version")?;
        if version != BLOCK_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let previous_hash = Digest::new(read_array(&mut cursor, "previous hash")?);
        let merkle_root = Digest::new(read_array(&mut cursor, "merkle root")?);
        let timestamp = read_i64_le(&mut cursor, "timestamp")?;

        let difficulty_len = read_i32_le(&mut cursor, "difficulty length")?;
        let difficulty_len = usize::try_from(difficulty_len)
            .map_err(|_| Error::MalformedRecord { field: "difficulty length" })?;
        let remaining = data.len() - cursor.position() as usize;
        if difficulty_len > remaining {
            return Err(Error::TruncatedRecord { field: "difficulty" });
        }
        let mut difficulty = vec![0u8; difficulty_len];
        cursor.read_exact(&mut difficulty)?;

        let nonce = read_u64_le(&mut cursor, "nonce")?;

        let trailer = &data[cursor.position() as usize..];
        if trailer.len() % FIELD_WIDTH != 0 {
            return Err(Error::MalformedTrailer { len: trailer.len() });
        }
        let transactions = trailer
            .chunks_exact(FIELD_WIDTH)
            .map(Digest::from_slice)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            height: 0,
            timestamp,
            previous_hash,
            merkle_root,
            difficulty: BigUint::from_bytes_be(&difficulty),
            nonce,
            transactions,
        })
    }
}

/// Difficulty as decimal text in serde formats
mod decimal {
    use crate::consensus::parse_difficulty;
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_difficulty(&text).map_err(de::Error::custom)
    }
}
