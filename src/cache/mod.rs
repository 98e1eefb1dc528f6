pub mod backend;
pub mod entry;
pub mod key;
mod nsec1;
mod peek;
pub mod rank;
mod stash;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::cache::backend::Backend;
use crate::cache::entry::EntryHeader;
use crate::cache::key::{CACHE_VERSION, VERSION_KEY};
use crate::cache::rank::Rank;
use crate::config::CacheConfig;
use crate::dns::enums::RecordType;
use crate::dns::name::Dname;
use crate::dns::packet::Packet;
use crate::dns::rrset::RrSet;
use crate::error::{MimirError, Result};
use crate::query::{QueryCtx, QueryState};

/// Operation counters, read by the observability collaborator.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    deletes: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
    }
}

/// Paired wall-clock / monotonic reading taken at open. Hot paths that
/// need monotonic-safe "now" values derive them from this instead of
/// hitting the system clock.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    pub wall: u64,
    pub monotonic: Instant,
}

impl Checkpoint {
    fn now() -> Self {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            wall,
            monotonic: Instant::now(),
        }
    }
}

/// Low-level exact-entry view returned by `peek_exact`.
#[derive(Debug, Clone)]
pub struct ExactEntry {
    pub time: u32,
    pub ttl: u32,
    pub rank: Rank,
    pub payload: Vec<u8>,
}

/// The cache handle: one per resolver instance, created at daemon start
/// and dropped at shutdown. All entry points borrow it; there is no
/// ambient global state.
pub struct Cache {
    backend: Box<dyn Backend>,
    config: CacheConfig,
    stats: CacheStats,
    checkpoint: Mutex<Checkpoint>,
}

impl Cache {
    /// Open over a backend, verifying the stored ABI version. A mismatch
    /// purges the store; only backend failures surface as errors.
    pub fn open(backend: Box<dyn Backend>, config: CacheConfig) -> Result<Cache> {
        let cache = Cache {
            backend,
            config,
            stats: CacheStats::new(),
            checkpoint: Mutex::new(Checkpoint::now()),
        };
        cache.assert_right_version()?;
        cache.stats.reset();
        Ok(cache)
    }

    /// Flush and release the backend. Dropping the handle releases it
    /// too; close only adds the final sync.
    pub fn close(self) -> Result<()> {
        self.backend.sync()
    }

    pub fn sync(&self) -> Result<()> {
        self.backend.sync()
    }

    /// Erase everything and re-stamp the version.
    pub fn clear(&self) -> Result<()> {
        self.backend.clear()?;
        self.write_version()?;
        info!("cache cleared");
        Ok(())
    }

    /// Total stored keys, version entry included.
    pub fn count(&self) -> usize {
        self.backend.count()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn checkpoint(&self) -> Checkpoint {
        *self.checkpoint.lock()
    }

    /// Refresh the wall/monotonic pair, e.g. once per request batch.
    pub fn update_checkpoint(&self) {
        *self.checkpoint.lock() = Checkpoint::now();
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Serve the produce phase of a sub-query from cache. Returns `Done`
    /// with `pkt` filled on a hit; the caller's state otherwise.
    pub fn peek(&self, qry: &mut QueryCtx, pkt: &mut Packet) -> QueryState {
        peek::peek(self, qry, pkt)
    }

    /// Ingest a resolved packet. Best-effort: never fails the caller.
    pub fn stash(&self, qry: &QueryCtx, pkt: &Packet) {
        stash::stash(self, qry, pkt);
    }

    /// Direct record insert bypassing the packet flow (prefetch path).
    pub fn insert_rr(&self, rrset: &RrSet, rank: Rank, now: u64) -> Result<()> {
        stash::stash_rrset(self, rrset, rank, now)
    }

    /// Exact lookup for introspection. Refuses packet entries.
    pub fn peek_exact(&self, name: &Dname, rtype: RecordType) -> Result<ExactEntry> {
        let (header, payload) = self.lookup_entry(name, rtype)?;
        if header.is_packet() {
            return Err(MimirError::NotFound);
        }
        Ok(ExactEntry {
            time: header.time,
            ttl: header.ttl,
            rank: header.rank,
            payload,
        })
    }

    /// Read the entry for (name, type), routing xNAME types through the
    /// NS bundle. The payload is copied out so no backend borrow escapes
    /// the call.
    pub(crate) fn lookup_entry(
        &self,
        name: &Dname,
        rtype: RecordType,
    ) -> Result<(EntryHeader, Vec<u8>)> {
        let lf = key::dname_lf(name)?;
        let key_type = key::tunneled_type(rtype);
        let cache_key = key::exact_key(&lf, key_type);
        let value = self.backend.read(&cache_key)?.ok_or(MimirError::NotFound)?;
        let found = if key_type == RecordType::NS {
            entry::seek(&value, rtype)?
        } else {
            entry::single(&value)?
        };
        Ok((found.header, found.payload.to_vec()))
    }

    fn assert_right_version(&self) -> Result<()> {
        let purge_reason = match self.backend.read(VERSION_KEY) {
            Ok(Some(stored)) if stored.len() != 2 => Some("wrong length"),
            Ok(Some(stored)) => {
                if u16::from_be_bytes([stored[0], stored[1]]) == CACHE_VERSION {
                    None
                } else {
                    Some("wrong value")
                }
            }
            Ok(None) => {
                if self.backend.count() == 0 {
                    info!("cache empty, stamping version {}", CACHE_VERSION);
                    self.write_version()?;
                    return Ok(());
                }
                Some("version entry missing")
            }
            Err(_) => Some("read error"),
        };
        match purge_reason {
            None => Ok(()),
            Some(reason) => {
                warn!("cache version check failed ({}); purging", reason);
                self.backend.clear()?;
                self.write_version()
            }
        }
    }

    fn write_version(&self) -> Result<()> {
        self.backend
            .write(VERSION_KEY, &CACHE_VERSION.to_be_bytes())
    }
}
