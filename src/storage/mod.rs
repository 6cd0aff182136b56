// Storage layer: key-value engines and the ledger built on them

mod ledger;
mod log_store;
mod sled_store;

pub use ledger::{DynLedger, Ledger, LogLedger, SledLedger};
pub use log_store::LogStore;
pub use sled_store::SledStore;

use crate::error::{Error, Result};

/// Byte-keyed store shared by every engine
pub trait KvStore: Send + Sync {
    /// Write `value` under `key`
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Read the value for `key`, `Error::NotFound` if absent
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// Replace the value of an existing key, `Error::NotFound` if absent
    fn update(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Update if the key exists, otherwise set. Two callers racing on the
    /// first write of a key can both fall through to `set`.
    fn upsert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        match self.update(key, value) {
            Err(Error::NotFound) => self.set(key, value),
            other => other,
        }
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(Error::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<S: KvStore + ?Sized> KvStore for Box<S> {
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        (**self).get(key)
    }

    fn update(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).update(key, value)
    }

    fn upsert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).upsert(key, value)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        (**self).contains(key)
    }
}
