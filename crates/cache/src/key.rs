//! Content-addressed cache keys.

use sha2::{Digest, Sha256};

/// Builds a stable hex key from a namespace and labeled parts.
///
/// Every part is length-prefixed before hashing, so keys built from
/// different part boundaries never agree.
#[derive(Debug)]
pub struct CacheKey {
    hasher: Sha256,
}

impl CacheKey {
    pub fn new(namespace: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(namespace.len().to_le_bytes());
        hasher.update(namespace.as_bytes());
        Self { hasher }
    }

    pub fn push(mut self, part: &str) -> Self {
        self.hasher.update(part.len().to_le_bytes());
        self.hasher.update(part.as_bytes());
        self
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}
