// Key-value store using sled

use crate::error::{Error, Result};
use crate::storage::KvStore;
use sled::Db;
use std::path::Path;

/// Embedded-database alternative to `LogStore`. Keys are unique, so the
/// last successful `set` for a key is the one `get` returns.
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open (or create) a database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref())?;
        log::info!("Opened sled store at {}", path.as_ref().display());
        Ok(Self { db })
    }

    /// Create an in-memory database (for testing)
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Manually flush database (call after batch operations)
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl KvStore for SledStore {
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.insert(key, value)?;
        log::trace!("sled: set {} byte key, {} byte value", key.len(), value.len());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let value = self.db.get(key)?;
        log::trace!("sled: get {} byte key, hit: {}", key.len(), value.is_some());
        value.map(|v| v.to_vec()).ok_or(Error::NotFound)
    }

    fn update(&self, key: &[u8], value: &[u8]) -> Result<()> {
        // Replace only if present, atomically
        let previous = self.db.fetch_and_update(key, |old| old.map(|_| value.to_vec()))?;
        log::trace!("sled: update {} byte key, present: {}", key.len(), previous.is_some());
        match previous {
            Some(_) => Ok(()),
            None => Err(Error::NotFound),
        }
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        let present = self.db.contains_key(key)?;
        log::trace!("sled: contains {} byte key: {}", key.len(), present);
        Ok(present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let store = SledStore::temporary().unwrap();
        store.set(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), b"v");
        assert!(matches!(store.get(b"missing"), Err(Error::NotFound)));
    }

    #[test]
    fn test_last_set_wins() {
        let store = SledStore::temporary().unwrap();
        store.set(b"k", b"first").unwrap();
        store.set(b"k", b"second").unwrap();
        assert_eq!(store.get(b"k").unwrap(), b"second");
    }

    #[test]
    fn test_update_requires_existing_key() {
        let store = SledStore::temporary().unwrap();
        assert!(matches!(store.update(b"k", b"v"), Err(Error::NotFound)));
        assert!(!store.contains(b"k").unwrap());

        store.set(b"k", b"v").unwrap();
        store.update(b"k", b"w").unwrap();
        assert_eq!(store.get(b"k").unwrap(), b"w");
    }

    #[test]
    fn test_upsert() {
        let store = SledStore::temporary().unwrap();
        store.upsert(b"k", b"1").unwrap();
        store.upsert(b"k", b"2").unwrap();
        assert_eq!(store.get(b"k").unwrap(), b"2");
    }

    #[test]
    fn test_operations_with_trace_logging() {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Trace)
            .try_init();

        let store = SledStore::temporary().unwrap();
        store.set(b"k", b"v").unwrap();
        assert!(store.contains(b"k").unwrap());
        store.update(b"k", b"w").unwrap();
        assert_eq!(store.get(b"k").unwrap(), b"w");
        assert!(matches!(store.get(b"missing"), Err(Error::NotFound)));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path().join("db")).unwrap();
            store.set(b"k", b"v").unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(dir.path().join("db")).unwrap();
        assert_eq!(store.get(b"k").unwrap(), b"v");
    }
}
