//! Content-addressed caching for query results, answers, and other
//! serializable values.
//!
//! A [`Cache`] wraps a [`CacheBackend`] (in-memory LRU, disk, or disabled)
//! behind a typed get-or-compute interface keyed by [`CacheKey`].

pub mod disk;
pub mod key;
pub mod lru;
pub mod memory;
pub mod stats;

pub use disk::DiskCache;
pub use key::CacheKey;
pub use lru::LruMap;
pub use memory::MemoryCache;
pub use stats::CacheStats;

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use docqa_core::Result;

/// Storage behind a [`Cache`].
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;
    fn remove(&self, key: &str);
    fn clear(&self);
    fn len(&self) -> usize;
    fn stats(&self) -> &CacheStats;
}

/// Which backend a cache uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Disk,
    Disabled,
}

/// Cache construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    /// Entry bound for the in-memory backend
    pub capacity: usize,
    /// Directory for the disk backend
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            capacity: 2048,
            dir: "data/cache".to_string(),
        }
    }
}

/// Build a backend from configuration.
pub fn create_backend(config: &CacheConfig) -> Result<Arc<dyn CacheBackend>> {
    let backend: Arc<dyn CacheBackend> = match config.backend {
        CacheBackendKind::Memory => Arc::new(MemoryCache::new(config.capacity)),
        CacheBackendKind::Disk => Arc::new(DiskCache::new(config.dir.clone())?),
        CacheBackendKind::Disabled => Arc::new(DisabledCache::default()),
    };
    Ok(backend)
}

/// Backend that stores nothing.
#[derive(Debug, Default)]
pub struct DisabledCache {
    stats: CacheStats,
}

impl CacheBackend for DisabledCache {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        self.stats.record_miss();
        None
    }

    fn put(&self, _key: &str, _value: Vec<u8>) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) {}

    fn clear(&self) {}

    fn len(&self) -> usize {
        0
    }

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

/// Typed get-or-compute facade over a backend.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Ok(Self::new(create_backend(config)?))
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledCache::default()))
    }

    /// Fetch a cached value, or compute, store, and return it.
    ///
    /// A stored value that no longer deserializes is removed and
    /// recomputed instead of failing the call.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(bytes) = self.backend.get(key) {
            match serde_json::from_slice(&bytes) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(key, error = %err, "discarding cache entry that failed to deserialize");
                    self.backend.remove(key);
                }
            }
        }

        let value = compute().await?;
        let bytes = serde_json::to_vec(&value)?;
        self.backend.put(key, bytes)?;
        Ok(value)
    }

    pub fn stats(&self) -> &CacheStats {
        self.backend.stats()
    }

    pub fn clear(&self) {
        self.backend.clear();
    }

    pub fn len(&self) -> usize {
        self.backend.len()
    }
}
