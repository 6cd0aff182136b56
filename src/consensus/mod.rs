// Consensus: difficulty targets and proof-of-work search

pub mod pow;
pub mod parallel;

pub use pow::{
    max_target, parse_difficulty, CancelToken, Miner, MiningOutcome, MiningResult, Target,
};
pub use parallel::ParallelMiner;
