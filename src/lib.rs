// Single-node proof-of-work ledger
// Candidate blocks, nonce search against a difficulty target, a fixed
// binary record format and an append-only key-value log to persist it.

pub mod cli;
pub mod config;
pub mod consensus;
pub mod core;
pub mod error;
pub mod storage;
pub mod wallet;

// Re-exports for convenience
pub use cli::{Cli, CliHandler};
pub use config::{Backend, LedgerConfig};
pub use consensus::{CancelToken, Miner, MiningOutcome, MiningResult, ParallelMiner, Target};
pub use crate::core::{merkle_root, Block, Digest, Serializable, Transaction};
pub use error::{Error, Result};
pub use storage::{DynLedger, KvStore, Ledger, LogStore, SledStore};
pub use wallet::{KeyPair, SigningIdentity};
