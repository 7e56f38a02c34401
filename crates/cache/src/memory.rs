//! In-memory LRU cache backend.

use parking_lot::Mutex;

use docqa_core::Result;

use crate::lru::LruMap;
use crate::stats::CacheStats;
use crate::CacheBackend;

/// Backend holding serialized values in a bounded LRU map.
pub struct MemoryCache {
    entries: Mutex<LruMap<String, Vec<u8>>>,
    stats: CacheStats,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruMap::new(capacity)),
            stats: CacheStats::default(),
        }
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let hit = self.entries.lock().get(&key.to_string());
        match hit {
            Some(bytes) => {
                self.stats.record_hit();
                Some(bytes)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        if self.entries.lock().insert(key.to_string(), value) {
            self.stats.record_eviction();
        }
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(&key.to_string());
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_roundtrip() {
        let cache = MemoryCache::new(8);

        assert!(cache.get("k").is_none());
        cache.put("k", b"value".to_vec()).expect("Should store");
        assert_eq!(cache.get("k").as_deref(), Some(b"value".as_slice()));

        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_memory_eviction_recorded() {
        let cache = MemoryCache::new(1);

        cache.put("a", vec![1]).expect("Should store");
        cache.put("b", vec![2]).expect("Should store");

        assert_eq!(cache.stats().evictions(), 1);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_memory_remove() {
        let cache = MemoryCache::new(4);

        cache.put("a", vec![1]).expect("Should store");
        cache.remove("a");
        assert!(cache.get("a").is_none());
        assert_eq!(cache.len(), 0);
    }
}
