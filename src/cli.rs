// CLI commands

use clap::{Parser, Subcommand};
use crate::config::{Backend, LedgerConfig};
use crate::consensus::{CancelToken, Miner, MiningOutcome, ParallelMiner};
use crate::core::{fit_to_width, Block, Digest, Transaction};
use crate::storage::DynLedger;
use crate::wallet::{KeyPair, SigningIdentity};
use num_bigint::BigUint;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Parser)]
#[command(name = "pow-ledger")]
#[command(about = "Single-node proof-of-work ledger", long_about = None)]
pub struct Cli {
    /// JSON configuration file; flags below override it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the block, tx and wallet stores
    #[arg(long, global = true, env = "POW_LEDGER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Storage engine
    #[arg(long, global = true, value_enum, env = "POW_LEDGER_BACKEND")]
    pub backend: Option<Backend>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mine a block and store it
    Mine {
        /// Decimal difficulty
        #[arg(short, long, default_value = "1")]
        difficulty: String,
        /// Previous block hash (hex); zero for a genesis block
        #[arg(long)]
        prev: Option<String>,
        /// Chain position of the new block
        #[arg(long, default_value_t = 0)]
        height: u64,
        /// Unix timestamp; defaults to now
        #[arg(long)]
        timestamp: Option<i64>,
        /// Stored transaction IDs to include, in order
        #[arg(long = "tx")]
        transactions: Vec<String>,
        /// Worker threads; 1 mines on a single thread
        #[arg(short, long, default_value_t = 1)]
        threads: usize,
        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Easiest target as hex, for test networks
        #[arg(long)]
        max_target: Option<String>,
    },

    /// Block commands
    #[command(subcommand)]
    Block(BlockCommands),

    /// Transaction commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Wallet balance commands
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Show the public key and wallet ID derived from a seed phrase
    Identity {
        #[arg(long, env = "POW_LEDGER_SEED_PHRASE")]
        seed_phrase: String,
    },
}

#[derive(Subcommand)]
pub enum BlockCommands {
    /// Get block by hash
    Get { hash: String },
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Create, optionally sign, and store a transaction
    Add {
        #[arg(long)]
        idx: u64,
        /// Sender wallet ID (hex or text)
        #[arg(long)]
        sender: String,
        /// Receiver wallet ID (hex or text)
        #[arg(long)]
        receiver: String,
        /// Decimal amount
        #[arg(long)]
        amount: String,
        #[arg(long, default_value_t = 0)]
        nonce: u64,
        /// Sign with the key derived from this phrase
        #[arg(long, env = "POW_LEDGER_SEED_PHRASE")]
        seed_phrase: Option<String>,
    },

    /// Get transaction by ID
    Get { txid: String },
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Set the balance of a wallet
    Set {
        /// Wallet ID (hex or text)
        id: String,
        /// Decimal amount
        amount: String,
    },

    /// Get the balance of a wallet
    Get {
        /// Wallet ID (hex or text)
        id: String,
    },
}

/// Resolve the ledger configuration from the file and flags
pub fn resolve_config(cli: &Cli) -> Result<LedgerConfig, String> {
    let mut config = match &cli.config {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    Ok(config)
}

/// Wallet IDs are taken as hex when they decode, otherwise as raw text
fn parse_wallet_id(id: &str) -> Vec<u8> {
    hex::decode(id).unwrap_or_else(|_| id.as_bytes().to_vec())
}

fn parse_digest(text: &str) -> Result<Digest, String> {
    Digest::from_hex(text).map_err(|e| e.to_string())
}

fn parse_amount(text: &str) -> Result<BigUint, String> {
    BigUint::parse_bytes(text.as_bytes(), 10).ok_or_else(|| format!("Invalid amount: {}", text))
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

/// CLI handler
pub struct CliHandler {
    ledger: DynLedger,
}

impl CliHandler {
    /// Create a new CLI handler
    pub fn new(config: &LedgerConfig) -> Result<Self, String> {
        log::info!("Opening {:?} ledger at {}", config.backend, config.data_dir.display());
        let ledger = DynLedger::open(config).map_err(|e| e.to_string())?;
        Ok(Self { ledger })
    }

    /// Handle CLI command
    pub async fn handle(&self, cli: Cli) -> Result<(), String> {
        match cli.command {
            Commands::Mine {
                difficulty,
                prev,
                height,
                timestamp,
                transactions,
                threads,
                timeout_secs,
                max_target,
            } => {
                let previous_hash = match prev {
                    Some(prev) => {
                        let bytes = hex::decode(&prev)
                            .map_err(|e| format!("Invalid previous hash: {}", e))?;
                        Digest::new(fit_to_width(&bytes))
                    }
                    None => Digest::zero(),
                };
                let txs = transactions
                    .iter()
                    .map(|id| {
                        self.ledger
                            .get_transaction(&parse_digest(id)?)
                            .map_err(|e| format!("{}: {}", id, e))
                    })
                    .collect::<Result<Vec<_>, String>>()?;

                let timestamp = timestamp.unwrap_or_else(now);
                let block =
                    Block::with_transactions(height, timestamp, previous_hash, &difficulty, &txs)
                        .map_err(|e| e.to_string())?;
                let mut miner = Miner::new();
                if let Some(text) = max_target {
                    let max = BigUint::parse_bytes(text.as_bytes(), 16)
                        .ok_or_else(|| format!("Invalid max target: {}", text))?;
                    miner = miner.with_max_target(max);
                }
                if let Some(secs) = timeout_secs {
                    miner = miner.with_timeout(Duration::from_secs(secs));
                }
                self.mine(miner, block, &txs, threads).await
            }
            Commands::Block(BlockCommands::Get { hash }) => {
                let block =
                    self.ledger.get_block(&parse_digest(&hash)?).map_err(|e| e.to_string())?;
                self.print_json(&block)
            }
            Commands::Tx(cmd) => self.handle_tx(cmd),
            Commands::Wallet(cmd) => self.handle_wallet(cmd),
            Commands::Identity { seed_phrase } => {
                let keys = KeyPair::from_seed_phrase(&seed_phrase).map_err(|e| e.to_string())?;
                println!("Public key: {}", hex::encode(keys.public_key()));
                println!("Wallet ID:  {}", keys.wallet_id());
                Ok(())
            }
        }
    }

    /// Run the nonce search off the async runtime; Ctrl-C cancels it
    async fn mine(
        &self,
        miner: Miner,
        block: Block,
        txs: &[Transaction],
        threads: usize,
    ) -> Result<(), String> {
        let token = CancelToken::new();
        let miner = miner.with_cancel_token(token.clone());

        println!("Mining block at height {} with difficulty {}...", block.height, block.difficulty);

        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received, stopping miner");
                token.cancel();
            }
        });
        let search = tokio::task::spawn_blocking(move || {
            let mut block = block;
            let outcome = if threads > 1 {
                ParallelMiner::new(miner, threads).mine(&mut block)
            } else {
                miner.mine(&mut block)
            };
            (block, outcome)
        });
        let (block, outcome) = search.await.map_err(|e| format!("Mining task failed: {}", e))?;
        interrupt.abort();

        match outcome.map_err(|e| e.to_string())? {
            MiningOutcome::Found(result) => {
                let hash = self.ledger.commit(&block, txs).map_err(|e| e.to_string())?;
                println!("✓ Block mined");
                println!("  Hash: {}", hash);
                println!("  Nonce: {}", result.nonce);
                println!("  Attempts: {}", result.attempts);
                println!("  Duration: {:?}", result.duration);
                println!("  Hash rate: {:.2} H/s", result.hash_rate());
                Ok(())
            }
            MiningOutcome::Cancelled { attempts } => {
                Err(format!("Mining cancelled after {} attempts", attempts))
            }
            MiningOutcome::Exhausted { attempts } => {
                Err(format!("Nonce space exhausted after {} attempts", attempts))
            }
        }
    }

    /// Handle transaction commands
    fn handle_tx(&self, cmd: TxCommands) -> Result<(), String> {
        match cmd {
            TxCommands::Add {
                idx,
                sender,
                receiver,
                amount,
                nonce,
                seed_phrase,
            } => {
                parse_amount(&amount)?;
                let sender = parse_wallet_id(&sender);
                let receiver = parse_wallet_id(&receiver);
                let mut tx = Transaction::new(idx, &sender, &receiver, amount, nonce);
                if let Some(phrase) = seed_phrase {
                    let keys = KeyPair::from_seed_phrase(&phrase).map_err(|e| e.to_string())?;
                    let signature = tx.sign(&keys);
                    println!("Signature: {}", hex::encode(signature));
                }

                let txid = self.ledger.add_transaction(&tx).map_err(|e| e.to_string())?;
                println!("Transaction stored: {}", txid);
                Ok(())
            }
            TxCommands::Get { txid } => {
                let tx = self
                    .ledger
                    .get_transaction(&parse_digest(&txid)?)
                    .map_err(|e| e.to_string())?;
                self.print_json(&tx)
            }
        }
    }

    /// Handle wallet commands
    fn handle_wallet(&self, cmd: WalletCommands) -> Result<(), String> {
        match cmd {
            WalletCommands::Set { id, amount } => {
                let amount = parse_amount(&amount)?;
                self.ledger
                    .set_wallet(&parse_wallet_id(&id), &amount)
                    .map_err(|e| e.to_string())?;
                println!("Balance for {}: {}", id, amount);
                Ok(())
            }
            WalletCommands::Get { id } => {
                let balance =
                    self.ledger.get_wallet(&parse_wallet_id(&id)).map_err(|e| e.to_string())?;
                println!("Balance for {}: {}", id, balance);
                Ok(())
            }
        }
    }

    fn print_json<T: serde::Serialize>(&self, value: &T) -> Result<(), String> {
        let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
        println!("{}", json);
        Ok(())
    }
}
