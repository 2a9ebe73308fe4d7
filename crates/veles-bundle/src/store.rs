//! Chunked compressed store with an LRU cache and single-flight fetches.
//!
//! The store is the only shared mutable state in the asset-access core.
//! Decompressed chunks are handed out as `Arc<Vec<u8>>`, so cache eviction
//! can never free bytes a caller is still copying out of. Concurrent
//! fetches of the same `(volume, chunk)` key decompress exactly once; later
//! callers block on the in-flight entry and read the cached result.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHasher;

use crate::{Error, Result, Volume};

type FxHashMap<K, V> = HashMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

/// Cache key: `(volume id, chunk index)`.
pub type ChunkKey = (u32, u32);

/// Default cache budget: 64 MiB of decompressed chunks.
pub const DEFAULT_CACHE_BUDGET: usize = 64 * 1024 * 1024;

struct CacheEntry {
    data: Arc<Vec<u8>>,
    last_used: u64,
}

struct ChunkCache {
    entries: FxHashMap<ChunkKey, CacheEntry>,
    total_bytes: usize,
    budget: usize,
    tick: u64,
}

impl ChunkCache {
    fn new(budget: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            total_bytes: 0,
            budget,
            tick: 0,
        }
    }

    fn get(&mut self, key: &ChunkKey) -> Option<Arc<Vec<u8>>> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = tick;
            Arc::clone(&entry.data)
        })
    }

    fn insert(&mut self, key: ChunkKey, data: Arc<Vec<u8>>) {
        self.tick += 1;
        self.total_bytes += data.len();
        self.entries.insert(
            key,
            CacheEntry {
                data,
                last_used: self.tick,
            },
        );

        // Evict least-recently-used entries until back under budget.
        // Outstanding Arcs keep evicted buffers alive for their holders.
        while self.total_bytes > self.budget && self.entries.len() > 1 {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| *k);

            match oldest {
                Some(k) if k != key => {
                    if let Some(entry) = self.entries.remove(&k) {
                        self.total_bytes -= entry.data.len();
                    }
                }
                _ => break,
            }
        }
    }
}

/// On-demand chunk decompression over a set of registered volumes.
///
/// `fetch` is safe to call concurrently from any number of threads; the
/// cache structure is mutex-protected and decompression is deduplicated
/// per key. Errors are never retried internally - the underlying bytes are
/// static, so a failed chunk fails the same way every time.
pub struct ChunkStore {
    volumes: RwLock<FxHashMap<u32, Arc<Volume>>>,
    cache: Mutex<ChunkCache>,
    in_flight: Mutex<FxHashMap<ChunkKey, Arc<Mutex<()>>>>,
    decompressions: AtomicU64,
}

impl ChunkStore {
    /// Create a store with the default cache budget.
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_CACHE_BUDGET)
    }

    /// Create a store with an explicit cache budget in bytes.
    pub fn with_budget(budget: usize) -> Self {
        Self {
            volumes: RwLock::new(FxHashMap::default()),
            cache: Mutex::new(ChunkCache::new(budget)),
            in_flight: Mutex::new(FxHashMap::default()),
            decompressions: AtomicU64::new(0),
        }
    }

    /// Register a parsed volume under an id.
    pub fn add_volume(&self, volume_id: u32, volume: Volume) {
        self.volumes.write().insert(volume_id, Arc::new(volume));
    }

    /// Open a volume file and register it under an id.
    pub fn open_volume<P: AsRef<Path>>(&self, volume_id: u32, path: P) -> Result<()> {
        let volume = Volume::open(path)?;
        self.add_volume(volume_id, volume);
        Ok(())
    }

    /// Look up a registered volume.
    pub fn volume(&self, volume_id: u32) -> Result<Arc<Volume>> {
        self.volumes
            .read()
            .get(&volume_id)
            .cloned()
            .ok_or(Error::VolumeNotFound(volume_id))
    }

    /// Ids of all registered volumes.
    pub fn volume_ids(&self) -> Vec<u32> {
        self.volumes.read().keys().copied().collect()
    }

    /// Fetch the decompressed bytes of one chunk.
    ///
    /// Hits return the cached buffer; misses decompress, verify and insert
    /// it. The returned `Arc` stays valid regardless of later evictions.
    pub fn fetch(&self, volume_id: u32, chunk_index: u32) -> Result<Arc<Vec<u8>>> {
        let key = (volume_id, chunk_index);

        if let Some(data) = self.cache.lock().get(&key) {
            return Ok(data);
        }

        // Serialize decompression per key: the first caller through this
        // lock does the work, later callers hit the cache re-check below.
        let flight = {
            let mut in_flight = self.in_flight.lock();
            Arc::clone(in_flight.entry(key).or_default())
        };
        let _guard = flight.lock();

        if let Some(data) = self.cache.lock().get(&key) {
            return Ok(data);
        }

        // The in-flight entry is removed on success and error alike.
        let result = self
            .volume(volume_id)
            .and_then(|volume| volume.decompress_chunk(volume_id, chunk_index))
            .map(|bytes| {
                let data = Arc::new(bytes);
                self.decompressions.fetch_add(1, Ordering::Relaxed);
                self.cache.lock().insert(key, Arc::clone(&data));
                data
            });
        self.in_flight.lock().remove(&key);

        result
    }

    /// Total number of chunk decompressions performed so far.
    pub fn decompression_count(&self) -> u64 {
        self.decompressions.load(Ordering::Relaxed)
    }

    /// Number of chunks currently cached.
    pub fn cached_chunks(&self) -> usize {
        self.cache.lock().entries.len()
    }

    /// Bytes of decompressed chunks currently cached.
    pub fn cached_bytes(&self) -> usize {
        self.cache.lock().total_bytes
    }
}

impl Default for ChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStore")
            .field("volumes", &self.volumes.read().len())
            .field("cached_chunks", &self.cached_chunks())
            .field("cached_bytes", &self.cached_bytes())
            .finish()
    }
}
