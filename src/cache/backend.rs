use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;

/// Disposition of a predecessor search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Found {
    /// The returned key equals the probe.
    Exact,
    /// The returned key is the greatest one strictly below the probe.
    Less,
}

/// Narrow contract over an ordered key/value store. Implementations must
/// order keys by raw bytes; the peek path's prefix and predecessor scans
/// depend on it. All calls are synchronous; each peek or stash is one
/// implicit transaction from the caller's point of view.
pub trait Backend: Send {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Greatest entry with key ≤ `key`, if any.
    fn read_leq(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>, Found)>>;

    fn write(&self, key: &[u8], value: &[u8]) -> Result<()>;

    fn remove(&self, key: &[u8]) -> Result<()>;

    /// Total number of stored keys, version entry included.
    fn count(&self) -> usize;

    fn clear(&self) -> Result<()>;

    /// Flush to durable storage; a no-op for ephemeral backends.
    fn sync(&self) -> Result<()>;
}

/// Durable backend over sled, an embedded ordered B+tree store.
pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path)?;
        debug!("opened sled cache store at {}", path.display());
        Ok(Self { db })
    }

    /// An unnamed store living in a temp directory, dropped on close.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

impl Backend for SledBackend {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    fn read_leq(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>, Found)>> {
        let found = self.db.range(..=key.to_vec()).next_back().transpose()?;
        Ok(found.map(|(k, v)| {
            let disp = if k.as_ref() == key {
                Found::Exact
            } else {
                Found::Less
            };
            (k.to_vec(), v.to_vec(), disp)
        }))
    }

    fn write(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        self.db.remove(key)?;
        Ok(())
    }

    fn count(&self) -> usize {
        self.db.len()
    }

    fn clear(&self) -> Result<()> {
        self.db.clear()?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// In-memory backend over a BTreeMap. Shares the ordering contract with
/// the sled backend; used by tests and ephemeral resolvers.
#[derive(Default)]
pub struct MemBackend {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemBackend {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn read_leq(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>, Found)>> {
        let map = self.map.read();
        Ok(map
            .range::<[u8], _>((Bound::Unbounded, Bound::Included(key)))
            .next_back()
            .map(|(k, v)| {
            let disp = if k.as_slice() == key {
                Found::Exact
            } else {
                Found::Less
            };
            (k.clone(), v.clone(), disp)
        }))
    }

    fn write(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.map.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        self.map.write().remove(key);
        Ok(())
    }

    fn count(&self) -> usize {
        self.map.read().len()
    }

    fn clear(&self) -> Result<()> {
        self.map.write().clear();
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
