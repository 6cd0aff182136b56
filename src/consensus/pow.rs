// Proof of Work implementation

use crate::config::MAX_TARGET_HEX;
use crate::core::{Block, Digest, HeaderTemplate};
use crate::error::{Error, Result};
use num_bigint::BigUint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Parse decimal difficulty text. Only ASCII digits are accepted.
pub fn parse_difficulty(text: &str) -> Result<BigUint> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidDifficulty(text.to_string()));
    }
    BigUint::parse_bytes(text.as_bytes(), 10)
        .ok_or_else(|| Error::InvalidDifficulty(text.to_string()))
}

/// Target at difficulty 1
pub fn max_target() -> BigUint {
    BigUint::parse_bytes(MAX_TARGET_HEX.as_bytes(), 16).unwrap_or_default()
}

/// Upper bound a block digest must fall strictly below
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    value: BigUint,
    /// Big-endian 32-byte form; `None` when the target exceeds 2^256
    bytes: Option<[u8; 32]>,
}

impl Target {
    /// target = max_target / difficulty
    pub fn from_difficulty(difficulty: &str) -> Result<Self> {
        Self::from_difficulty_with_max(difficulty, &max_target())
    }

    /// Same division against a caller-chosen easiest target
    pub fn from_difficulty_with_max(difficulty: &str, max: &BigUint) -> Result<Self> {
        Self::for_difficulty(&parse_difficulty(difficulty)?, max)
    }

    /// Target for an already parsed difficulty
    pub fn for_difficulty(difficulty: &BigUint, max: &BigUint) -> Result<Self> {
        if difficulty.bits() == 0 {
            return Err(Error::DivisionByZero);
        }
        Ok(Self::from_value(max / difficulty))
    }

    pub fn from_value(value: BigUint) -> Self {
        let bytes = (value.bits() <= 256).then(|| {
            let be = value.to_bytes_be();
            let mut bytes = [0u8; 32];
            bytes[32 - be.len()..].copy_from_slice(&be);
            bytes
        });
        Self { value, bytes }
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// Check if a hash meets this target (hash < target)
    #[inline]
    pub fn is_met_by(&self, hash: &Digest) -> bool {
        match &self.bytes {
            // Lexicographic order on big-endian bytes is integer order
            Some(target) => hash.as_bytes() < target,
            None => true,
        }
    }

    /// Count leading zero bits of the 256-bit target (difficulty indicator)
    pub fn leading_zeros(&self) -> u64 {
        256u64.saturating_sub(self.value.bits())
    }
}

/// Shared stop flag for a running search
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Proof of Work miner
#[derive(Debug, Clone)]
pub struct Miner {
    max_target: BigUint,
    cancel: CancelToken,
    timeout: Option<Duration>,
}

impl Default for Miner {
    fn default() -> Self {
        Self::new()
    }
}

impl Miner {
    /// Create a miner against the protocol's maximum target
    pub fn new() -> Self {
        Self {
            max_target: max_target(),
            cancel: CancelToken::new(),
            timeout: None,
        }
    }

    /// Override the easiest target (test networks)
    pub fn with_max_target(mut self, max_target: BigUint) -> Self {
        self.max_target = max_target;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Limit each search to `timeout`, counted from the start of `mine`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Target for a difficulty, recomputed on every call
    pub fn target_for(&self, difficulty: &BigUint) -> Result<Target> {
        Target::for_difficulty(difficulty, &self.max_target)
    }

    /// Deadline for a search starting now
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|timeout| Instant::now() + timeout)
    }

    pub(crate) fn should_stop(&self, deadline: Option<Instant>) -> bool {
        self.cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Mine a block by advancing its nonce until its hash is below target.
    ///
    /// The search starts at the block's current nonce and wraps around at
    /// `u64::MAX`. It ends with `Found`, with `Cancelled` when the token is
    /// tripped or the deadline passes, or with `Exhausted` once every nonce
    /// has been tried. On `Found` the block carries the winning nonce.
    pub fn mine(&self, block: &mut Block) -> Result<MiningOutcome> {
        let target = self.target_for(&block.difficulty)?;
        let template = block.template();
        let start_nonce = block.nonce;
        let start_time = Instant::now();
        let deadline = self.deadline();
        let mut attempts = 0u64;

        loop {
            if self.should_stop(deadline) {
                log::warn!("Mining cancelled after {} attempts at nonce {}", attempts, block.nonce);
                return Ok(MiningOutcome::Cancelled { attempts });
            }

            let hash = template.hash_with_nonce(block.nonce);
            attempts = attempts.saturating_add(1);

            if target.is_met_by(&hash) {
                let result = MiningResult {
                    nonce: block.nonce,
                    hash,
                    attempts,
                    duration: start_time.elapsed(),
                };
                log::info!("Block mined! Nonce: {}, Hash: {}", result.nonce, result.hash);
                return Ok(MiningOutcome::Found(result));
            }

            // Progress indicator every 100k attempts
            if attempts % 100_000 == 0 {
                let elapsed = start_time.elapsed();
                log::debug!(
                    "Mining attempts: {} ({:.1} KH/s)",
                    attempts,
                    attempts as f64 / elapsed.as_secs_f64() / 1000.0
                );
            }

            block.nonce = block.nonce.wrapping_add(1);
            if block.nonce == start_nonce {
                log::warn!("Nonce space exhausted after {} attempts", attempts);
                return Ok(MiningOutcome::Exhausted { attempts });
            }
        }
    }

    /// Verify that a block satisfies PoW for its own difficulty
    pub fn verify(&self, block: &Block) -> Result<bool> {
        let target = self.target_for(&block.difficulty)?;
        Ok(target.is_met_by(&block.hash()))
    }

    pub(crate) fn template_and_target(&self, block: &Block) -> Result<(HeaderTemplate, Target)> {
        Ok((block.template(), self.target_for(&block.difficulty)?))
    }
}

/// How a search ended
#[derive(Debug)]
pub enum MiningOutcome {
    Found(MiningResult),
    /// Stopped by the cancel token or the deadline
    Cancelled { attempts: u64 },
    /// Every nonce was tried without success
    Exhausted { attempts: u64 },
}

impl MiningOutcome {
    pub fn found(self) -> Option<MiningResult> {
        match self {
            MiningOutcome::Found(result) => Some(result),
            _ => None,
        }
    }
}

/// Mining result
#[derive(Debug, Clone)]
pub struct MiningResult {
    /// The nonce that was found
    pub nonce: u64,
    /// The resulting hash
    pub hash: Digest,
    /// Number of attempts
    pub attempts: u64,
    /// Time taken
    pub duration: Duration,
}

impl MiningResult {
    /// Calculate hash rate (hashes per second)
    pub fn hash_rate(&self) -> f64 {
        self.attempts as f64 / self.duration.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Half of all digests qualify at difficulty 1
    fn easy_max() -> BigUint {
        BigUint::from(1u8) << 255
    }

    #[test]
    fn test_max_target_value() {
        let expected = BigUint::from(0xFFFFu32) << 208;
        assert_eq!(max_target(), expected);
        assert_eq!(Target::from_difficulty("1").unwrap().value(), &expected);
        assert_eq!(Target::from_difficulty("1").unwrap().leading_zeros(), 32);
    }

    #[test]
    fn test_target_is_floor_division() {
        let target = Target::from_difficulty("3").unwrap();
        assert_eq!(target.value(), &(max_target() / BigUint::from(3u8)));
    }

    #[test]
    fn test_invalid_difficulty() {
        for bad in ["", "abc", "-1", "+5", " 5", "1.5", "1_000"] {
            assert!(
                matches!(Target::from_difficulty(bad), Err(Error::InvalidDifficulty(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_zero_difficulty() {
        assert!(matches!(Target::from_difficulty("0"), Err(Error::DivisionByZero)));
        assert!(matches!(Target::from_difficulty("000"), Err(Error::DivisionByZero)));
    }

    #[test]
    fn test_huge_difficulty_gives_zero_target() {
        let target = Target::from_difficulty(&"9".repeat(100)).unwrap();
        assert_eq!(target.value(), &BigUint::default());
        assert!(!target.is_met_by(&Digest::zero()));
    }

    #[test]
    fn test_target_validation() {
        let target = Target::from_difficulty("1").unwrap();

        // Zero hash should always be valid (lowest possible)
        assert!(target.is_met_by(&Digest::zero()));

        // All 0xff hash should be invalid (highest possible)
        assert!(!target.is_met_by(&Digest::new([0xff; 32])));

        // Strictly below: a hash equal to the target does not qualify
        let mut equal = [0u8; 32];
        equal[4] = 0xff;
        equal[5] = 0xff;
        assert!(!target.is_met_by(&Digest::new(equal)));
        equal[5] = 0xfe;
        assert!(target.is_met_by(&Digest::new(equal)));
    }

    #[test]
    fn test_mine_easy_block() {
        let miner = Miner::new().with_max_target(easy_max());
        let mut block = Block::genesis(1_231_006_505, "1").unwrap();

        let result = miner.mine(&mut block).unwrap().found().unwrap();
        assert_eq!(block.nonce, result.nonce);
        assert_eq!(block.hash(), result.hash);
        assert!(result.hash.to_biguint() < easy_max());
        assert!(miner.verify(&block).unwrap());
    }

    #[test]
    fn test_mine_finds_smallest_nonce() {
        let miner = Miner::new().with_max_target(easy_max());
        let mut block = Block::genesis(7, "4").unwrap();
        let result = miner.mine(&mut block).unwrap().found().unwrap();

        let target = miner.target_for(&BigUint::from(4u8)).unwrap();
        let mut earlier = Block::genesis(7, "4").unwrap();
        for nonce in 0..result.nonce {
            earlier.nonce = nonce;
            assert!(!target.is_met_by(&earlier.hash()));
        }
        assert_eq!(result.attempts, result.nonce + 1);
    }

    #[test]
    fn test_mine_zero_difficulty() {
        let mut block = Block::genesis(0, "0").unwrap();
        assert!(matches!(Miner::new().mine(&mut block), Err(Error::DivisionByZero)));
    }

    #[test]
    fn test_mine_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let miner = Miner::new().with_cancel_token(token);
        let mut block = Block::genesis(0, "1").unwrap();

        let outcome = miner.mine(&mut block).unwrap();
        assert!(matches!(outcome, MiningOutcome::Cancelled { attempts: 0 }));
    }

    #[test]
    fn test_mine_deadline() {
        // Unreachable target: only the deadline can end the search
        let miner = Miner::new()
            .with_max_target(BigUint::default())
            .with_timeout(Duration::from_millis(20));
        let mut block = Block::genesis(0, "1").unwrap();

        let outcome = miner.mine(&mut block).unwrap();
        assert!(matches!(outcome, MiningOutcome::Cancelled { .. }));
    }

    #[test]
    fn test_timeout_counts_from_start_of_search() {
        let miner = Miner::new()
            .with_max_target(easy_max())
            .with_timeout(Duration::from_millis(50));
        std::thread::sleep(Duration::from_millis(80));

        // Built long before the search, reused for two searches
        for timestamp in [1, 2] {
            let mut block = Block::genesis(timestamp, "1").unwrap();
            assert!(miner.mine(&mut block).unwrap().found().is_some());
        }
    }

    #[test]
    #[ignore] // ~2^32 hashes at the real maximum target
    fn test_genesis_difficulty_one() {
        let miner = Miner::new();
        let mut block = Block::genesis(1_231_006_505, "1").unwrap();

        let result = miner.mine(&mut block).unwrap().found().unwrap();
        assert!(result.hash.to_biguint() < max_target());
        println!("Mining took {} attempts in {:?}", result.attempts, result.duration);
    }

    proptest! {
        #[test]
        fn prop_target_monotonic(a in 1u128.., b in 1u128..) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let easy = Target::from_difficulty(&low.to_string()).unwrap();
            let hard = Target::from_difficulty(&high.to_string()).unwrap();
            prop_assert!(hard.value() <= easy.value());
        }
    }
}
