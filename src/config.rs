// Protocol constants and ledger configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Version written at the head of every block record
pub const BLOCK_VERSION: i32 = 1;

/// Easiest possible target, 0xFFFF * 2^208 (Bitcoin's difficulty-1 target)
pub const MAX_TARGET_HEX: &str =
    "00000000FFFF0000000000000000000000000000000000000000000000000000";

/// Log file names under the data directory
pub const BLOCK_STORE: &str = "block";
pub const TX_STORE: &str = "tx";
pub const WALLET_STORE: &str = "wallet";

/// Storage engine behind the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Append-only length-prefixed log files
    #[default]
    Log,
    /// Embedded sled database
    Sled,
}

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory holding the `block`, `tx` and `wallet` stores
    pub data_dir: PathBuf,
    pub backend: Backend,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            backend: Backend::Log,
        }
    }
}

impl LedgerConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P, backend: Backend) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            backend,
        }
    }

    /// Load configuration from a JSON file; missing fields take defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config {}: {}", path.as_ref().display(), e))?;
        serde_json::from_str(&json).map_err(|e| format!("Failed to parse config: {}", e))
    }
}
