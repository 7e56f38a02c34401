//! Least-recently-used map shared by the in-memory backends.

use std::collections::HashMap;
use std::hash::Hash;

/// Fixed-capacity map that evicts the least recently used entry on
/// overflow.
///
/// Recency is a monotonic counter bumped on every access, so lookups
/// stay O(1) and only evictions scan the map.
#[derive(Debug)]
pub struct LruMap<K, V> {
    entries: HashMap<K, LruEntry<V>>,
    capacity: usize,
    clock: u64,
}

#[derive(Debug)]
struct LruEntry<V> {
    value: V,
    last_used: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> LruMap<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    /// Look up a key, marking it as most recently used.
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = clock;
            entry.value.clone()
        })
    }

    /// Insert a value, evicting the least recently used entry when full.
    /// Returns true when an eviction happened.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        self.clock += 1;
        let mut evicted = false;

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&oldest);
                evicted = true;
            }
        }

        self.entries.insert(
            key,
            LruEntry {
                value,
                last_used: self.clock,
            },
        );
        evicted
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_get_insert() {
        let mut map: LruMap<String, u32> = LruMap::new(4);

        assert!(map.get(&"a".to_string()).is_none());
        map.insert("a".to_string(), 1);
        assert_eq!(map.get(&"a".to_string()), Some(1));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_eviction_at_capacity() {
        let mut map: LruMap<String, u32> = LruMap::new(2);

        assert!(!map.insert("a".to_string(), 1));
        assert!(!map.insert("b".to_string(), 2));
        assert!(map.insert("c".to_string(), 3));

        assert_eq!(map.len(), 2);
        assert!(map.get(&"a".to_string()).is_none());
    }

    #[test]
    fn test_lru_order() {
        let mut map: LruMap<String, u32> = LruMap::new(2);

        map.insert("a".to_string(), 1);
        map.insert("b".to_string(), 2);

        // touching "a" makes "b" the eviction candidate
        map.get(&"a".to_string());
        map.insert("c".to_string(), 3);

        assert_eq!(map.get(&"a".to_string()), Some(1));
        assert!(map.get(&"b".to_string()).is_none());
        assert_eq!(map.get(&"c".to_string()), Some(3));
    }

    #[test]
    fn test_reinsert_updates_value() {
        let mut map: LruMap<String, u32> = LruMap::new(2);

        map.insert("a".to_string(), 1);
        assert!(!map.insert("a".to_string(), 9));

        assert_eq!(map.get(&"a".to_string()), Some(9));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut map: LruMap<String, u32> = LruMap::new(4);

        map.insert("a".to_string(), 1);
        map.insert("b".to_string(), 2);
        map.clear();

        assert!(map.is_empty());
        assert!(map.get(&"a".to_string()).is_none());
    }
}
