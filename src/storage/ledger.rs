// Ledger storage: blocks, transactions and wallet balances

use crate::config::{Backend, LedgerConfig, BLOCK_STORE, TX_STORE, WALLET_STORE};
use crate::core::serialize::magnitude_bytes;
use crate::core::{Block, Digest, Serializable, Transaction};
use crate::error::{Error, Result};
use crate::storage::{KvStore, LogStore, SledStore};
use num_bigint::BigUint;
use std::path::Path;

/// Three independent stores: `block` and `tx` keyed by digest, `wallet`
/// keyed by wallet identifier. Writes across stores are not atomic.
pub struct Ledger<S = LogStore> {
    blocks: S,
    transactions: S,
    wallets: S,
}

pub type LogLedger = Ledger<LogStore>;
pub type SledLedger = Ledger<SledStore>;
pub type DynLedger = Ledger<Box<dyn KvStore>>;

impl Ledger<LogStore> {
    /// Open the `block`, `tx` and `wallet` logs under `dir`
    pub fn open_log<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Ok(Self::from_stores(
            LogStore::open(dir.as_ref(), BLOCK_STORE)?,
            LogStore::open(dir.as_ref(), TX_STORE)?,
            LogStore::open(dir.as_ref(), WALLET_STORE)?,
        ))
    }
}

impl Ledger<SledStore> {
    /// Open one sled database per store under `dir/sled`
    pub fn open_sled<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let root = dir.as_ref().join("sled");
        Ok(Self::from_stores(
            SledStore::open(root.join(BLOCK_STORE))?,
            SledStore::open(root.join(TX_STORE))?,
            SledStore::open(root.join(WALLET_STORE))?,
        ))
    }

    /// Create an in-memory ledger (for testing)
    pub fn temporary() -> Result<Self> {
        Ok(Self::from_stores(
            SledStore::temporary()?,
            SledStore::temporary()?,
            SledStore::temporary()?,
        ))
    }
}

impl Ledger<Box<dyn KvStore>> {
    /// Open whichever backend the configuration selects
    pub fn open(config: &LedgerConfig) -> Result<Self> {
        let ledger = match config.backend {
            Backend::Log => {
                let Ledger { blocks, transactions, wallets } =
                    LogLedger::open_log(&config.data_dir)?;
                Self::from_stores(Box::new(blocks), Box::new(transactions), Box::new(wallets))
            }
            Backend::Sled => {
                let Ledger { blocks, transactions, wallets } =
                    SledLedger::open_sled(&config.data_dir)?;
                Self::from_stores(Box::new(blocks), Box::new(transactions), Box::new(wallets))
            }
        };
        Ok(ledger)
    }
}

impl<S: KvStore> Ledger<S> {
    pub fn from_stores(blocks: S, transactions: S, wallets: S) -> Self {
        Self {
            blocks,
            transactions,
            wallets,
        }
    }

    /// Store a block keyed by its digest. The Merkle root must commit to
    /// the block's transaction list. A block already present is not
    /// written again.
    pub fn add_block(&self, block: &Block) -> Result<Digest> {
        if !block.has_valid_merkle_root() {
            return Err(Error::MerkleMismatch);
        }

        let hash = block.hash();
        if self.blocks.contains(hash.as_bytes())? {
            log::debug!("Block {} already stored", hash);
            return Ok(hash);
        }

        self.blocks.set(hash.as_bytes(), &block.encode()?)?;
        log::info!("Stored block {} ({} transactions)", hash, block.transactions.len());
        Ok(hash)
    }

    /// Get a block by hash. Height is not persisted and reads back as 0.
    pub fn get_block(&self, hash: &Digest) -> Result<Block> {
        Block::decode(&self.blocks.get(hash.as_bytes())?)
    }

    pub fn has_block(&self, hash: &Digest) -> Result<bool> {
        self.blocks.contains(hash.as_bytes())
    }

    /// Store a transaction keyed by its ID
    pub fn add_transaction(&self, tx: &Transaction) -> Result<Digest> {
        let txid = tx.hash();
        if !self.transactions.contains(txid.as_bytes())? {
            self.transactions.set(txid.as_bytes(), &tx.encode()?)?;
            log::debug!("Stored transaction {}", txid);
        }
        Ok(txid)
    }

    pub fn get_transaction(&self, txid: &Digest) -> Result<Transaction> {
        Transaction::decode(&self.transactions.get(txid.as_bytes())?)
    }

    /// Store a block's transactions, then the block. The block must list
    /// exactly these transactions in this order. A failure part way leaves
    /// the transactions written without their block.
    pub fn commit(&self, block: &Block, transactions: &[Transaction]) -> Result<Digest> {
        let listed = transactions.iter().map(Transaction::hash);
        if !listed.eq(block.transactions.iter().copied()) {
            return Err(Error::MerkleMismatch);
        }

        for tx in transactions {
            self.add_transaction(tx)?;
        }
        self.add_block(block)
    }

    /// Set a wallet balance, overwriting any previous one
    pub fn set_wallet(&self, wallet_id: &[u8], amount: &BigUint) -> Result<()> {
        self.wallets.upsert(wallet_id, &magnitude_bytes(amount))?;
        log::debug!("Wallet {} balance set to {}", hex::encode(wallet_id), amount);
        Ok(())
    }

    pub fn get_wallet(&self, wallet_id: &[u8]) -> Result<BigUint> {
        Ok(BigUint::from_bytes_be(&self.wallets.get(wallet_id)?))
    }
}
