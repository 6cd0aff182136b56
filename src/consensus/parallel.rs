// Multi-threaded nonce search
//
// Worker `w` of `k` tries nonce offsets w, w + k, w + 2k, ... from the
// block's starting nonce. A worker stops once its next offset is not below
// the best offset found so far, so every smaller offset is still tried and
// the winner is always the smallest qualifying offset, the same nonce the
// sequential miner returns. Cancellation only stops a search that has no
// winner yet.

use crate::consensus::pow::{Miner, MiningOutcome, MiningResult, Target};
use crate::core::{Block, HeaderTemplate};
use crate::error::Result;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Nonce search spread over worker threads
#[derive(Debug, Clone)]
pub struct ParallelMiner {
    miner: Miner,
    workers: usize,
}

impl ParallelMiner {
    /// `workers` is clamped to at least one
    pub fn new(miner: Miner, workers: usize) -> Self {
        Self {
            miner,
            workers: workers.max(1),
        }
    }

    /// One worker per available core
    pub fn with_available_parallelism(miner: Miner) -> Self {
        let workers = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self::new(miner, workers)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Same contract as `Miner::mine`
    pub fn mine(&self, block: &mut Block) -> Result<MiningOutcome> {
        let (template, target) = self.miner.template_and_target(block)?;
        let start_time = Instant::now();
        let search = Search::new(&self.miner, &template, &target, block.nonce, self.workers as u64);

        std::thread::scope(|scope| {
            for worker in 0..search.stride {
                let search = &search;
                scope.spawn(move || search.run(worker));
            }
        });

        let attempts = search.attempts.load(Ordering::Relaxed);
        if let Some(offset) = search.winner() {
            block.nonce = search.start_nonce.wrapping_add(offset);
            let result = MiningResult {
                nonce: block.nonce,
                hash: template.hash_with_nonce(block.nonce),
                attempts,
                duration: start_time.elapsed(),
            };
            log::info!(
                "Block mined by {} workers! Nonce: {}, Hash: {}",
                search.stride,
                result.nonce,
                result.hash
            );
            return Ok(MiningOutcome::Found(result));
        }

        if search.cancelled.load(Ordering::Acquire) {
            log::warn!("Parallel mining cancelled after {} attempts", attempts);
            Ok(MiningOutcome::Cancelled { attempts })
        } else {
            log::warn!("Nonce space exhausted after {} attempts", attempts);
            Ok(MiningOutcome::Exhausted { attempts })
        }
    }
}

/// State shared by the workers of one search
struct Search<'a> {
    miner: &'a Miner,
    template: &'a HeaderTemplate,
    target: &'a Target,
    deadline: Option<Instant>,
    start_nonce: u64,
    stride: u64,
    found: AtomicBool,
    best: AtomicU64,
    attempts: AtomicU64,
    cancelled: AtomicBool,
}

impl<'a> Search<'a> {
    fn new(
        miner: &'a Miner,
        template: &'a HeaderTemplate,
        target: &'a Target,
        start_nonce: u64,
        stride: u64,
    ) -> Self {
        Self {
            miner,
            template,
            target,
            deadline: miner.deadline(),
            start_nonce,
            stride,
            found: AtomicBool::new(false),
            best: AtomicU64::new(u64::MAX),
            attempts: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Smallest qualifying offset found so far
    fn winner(&self) -> Option<u64> {
        self.found
            .load(Ordering::Acquire)
            .then(|| self.best.load(Ordering::Acquire))
    }

    /// Try offsets `worker`, `worker + stride`, ... until one qualifies, a
    /// smaller winner is known, or the search is stopped. Once any winner
    /// exists, cancellation is ignored so every smaller offset still gets
    /// tried.
    fn run(&self, worker: u64) {
        let mut offset = worker;
        let mut local = 0u64;
        loop {
            match self.winner() {
                Some(best) if offset >= best => break,
                Some(_) => {}
                None => {
                    if self.miner.should_stop(self.deadline) {
                        self.cancelled.store(true, Ordering::Release);
                        break;
                    }
                }
            }

            local += 1;
            let nonce = self.start_nonce.wrapping_add(offset);
            if self.target.is_met_by(&self.template.hash_with_nonce(nonce)) {
                self.best.fetch_min(offset, Ordering::AcqRel);
                self.found.store(true, Ordering::Release);
                break;
            }

            if worker == 0 && local % 100_000 == 0 {
                log::debug!("Worker 0 at {} attempts ({} workers)", local, self.stride);
            }

            match offset.checked_add(self.stride) {
                Some(next) => offset = next,
                None => break,
            }
        }
        self.attempts.fetch_add(local, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::CancelToken;
    use crate::error::Error;
    use num_bigint::BigUint;
    use std::time::Duration;

    fn easy_miner() -> Miner {
        Miner::new().with_max_target(BigUint::from(1u8) << 255)
    }

    #[test]
    fn test_matches_sequential_result() {
        for difficulty in ["1", "16", "64"] {
            let mut sequential = Block::genesis(1_700_000_000, difficulty).unwrap();
            let expected = easy_miner().mine(&mut sequential).unwrap().found().unwrap();

            for workers in [1, 3, 8] {
                let mut block = Block::genesis(1_700_000_000, difficulty).unwrap();
                let result = ParallelMiner::new(easy_miner(), workers)
                    .mine(&mut block)
                    .unwrap()
                    .found()
                    .unwrap();
                assert_eq!(result.nonce, expected.nonce);
                assert_eq!(result.hash, expected.hash);
                assert_eq!(block.hash(), expected.hash);
            }
        }
    }

    #[test]
    fn test_starts_from_current_nonce_and_wraps() {
        let mut block = Block::genesis(11, "2").unwrap();
        block.nonce = u64::MAX - 1;
        let mut sequential = block.clone();

        let expected = easy_miner().mine(&mut sequential).unwrap().found().unwrap();
        let result = ParallelMiner::new(easy_miner(), 4).mine(&mut block).unwrap().found().unwrap();
        assert_eq!(result.nonce, expected.nonce);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancelToken::new();
        token.cancel();
        let miner = ParallelMiner::new(Miner::new().with_cancel_token(token), 4);
        let mut block = Block::genesis(0, "1").unwrap();

        let outcome = miner.mine(&mut block).unwrap();
        assert!(matches!(outcome, MiningOutcome::Cancelled { attempts: 0 }));
        assert_eq!(block.nonce, 0);
    }

    #[test]
    fn test_deadline_stops_all_workers() {
        let miner = Miner::new()
            .with_max_target(BigUint::default())
            .with_timeout(Duration::from_millis(20));
        let mut block = Block::genesis(0, "1").unwrap();

        let outcome = ParallelMiner::new(miner, 4).mine(&mut block).unwrap();
        assert!(matches!(outcome, MiningOutcome::Cancelled { .. }));
    }

    #[test]
    fn test_zero_difficulty() {
        let mut block = Block::genesis(0, "0").unwrap();
        assert!(matches!(
            ParallelMiner::new(Miner::new(), 2).mine(&mut block),
            Err(Error::DivisionByZero)
        ));
    }

    #[test]
    fn test_cancel_after_a_win_still_finds_smallest_nonce() {
        let token = CancelToken::new();
        let miner = easy_miner().with_cancel_token(token.clone());
        let mut block = Block::genesis(3, "8").unwrap();
        let expected = miner.clone().mine(&mut block.clone()).unwrap().found().unwrap();

        // Another worker already holds a later winner and the token trips
        let (template, target) = miner.template_and_target(&block).unwrap();
        let search = Search::new(&miner, &template, &target, block.nonce, 1);
        search.best.store(expected.nonce + 1_000, Ordering::Release);
        search.found.store(true, Ordering::Release);
        token.cancel();

        search.run(0);
        assert_eq!(search.winner(), Some(expected.nonce));
        assert!(!search.cancelled.load(Ordering::Acquire));

        block.nonce = expected.nonce;
        assert_eq!(block.hash(), expected.hash);
    }

    #[test]
    fn test_worker_count_clamped() {
        assert_eq!(ParallelMiner::new(Miner::new(), 0).workers(), 1);
    }
}
