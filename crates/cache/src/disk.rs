//! Disk-backed cache storing one file per key.

use std::fs;
use std::path::PathBuf;

use docqa_core::Result;

use crate::stats::CacheStats;
use crate::CacheBackend;

/// Backend persisting serialized values under a directory.
///
/// Keys are hex digests, so they map directly to file names.
pub struct DiskCache {
    dir: PathBuf,
    stats: CacheStats,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            stats: CacheStats::default(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CacheBackend for DiskCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => {
                self.stats.record_hit();
                Some(bytes)
            }
            Err(_) => {
                self.stats.record_miss();
                None
            }
        }
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.path_for(key));
    }

    fn clear(&self) {
        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let _ = fs::remove_file(entry.path());
            }
        }
    }

    fn len(&self) -> usize {
        fs::read_dir(&self.dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
