//! Embedding providers and the wrappers that turn a raw client into a
//! production stack (deadline, retry, cache).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use docqa_cache::{CacheStats, LruMap};
use docqa_core::{EmbeddingError, EmbeddingProvider, Result};

/// Connection settings for a remote embedding backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
    /// Largest number of texts sent in one request
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimension: 768,
            batch_size: 32,
        }
    }
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for the Ollama `/api/embed` endpoint.
///
/// Deadlines and retries are the wrapper's job; see [`RetryingEmbedder`].
pub struct OllamaEmbeddings {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl OllamaEmbeddings {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.config.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&OllamaEmbedRequest {
                model: &self.config.model,
                input: batch,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(
                EmbeddingError::Provider(format!("{} returned {}", url, response.status())).into(),
            );
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Provider(format!("invalid response body: {e}")))?;

        if parsed.embeddings.len() != batch.len() {
            return Err(EmbeddingError::Provider(format!(
                "sent {} texts, got {} embeddings",
                batch.len(),
                parsed.embeddings.len()
            ))
            .into());
        }
        for vector in &parsed.embeddings {
            if vector.len() != self.config.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.config.dimension,
                    actual: vector.len(),
                }
                .into());
            }
        }

        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }

    fn identifier(&self) -> String {
        format!("ollama:{}", self.config.model)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

/// Deterministic character-hash embedder for tests and offline smoke
/// runs (no server required).
#[derive(Debug, Clone)]
pub struct SimpleEmbedder {
    dimension: usize,
}

impl SimpleEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for (i, c) in text.chars().enumerate() {
            vector[(c as usize + i) % self.dimension] += 1.0;
        }
        let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for v in &mut vector {
                *v /= magnitude;
            }
        }
        vector
    }
}

impl Default for SimpleEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for SimpleEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn identifier(&self) -> String {
        format!("simple:{}", self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deadline and backoff settings for [`RetryingEmbedder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Per-attempt deadline
    pub timeout_secs: u64,
    pub max_attempts: u32,
    /// Backoff before attempt n is `base_delay_ms << (n - 1)`
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            max_attempts: 3,
            base_delay_ms: 5000,
        }
    }
}

/// Wraps a provider with a per-attempt deadline and exponential backoff.
///
/// Non-retryable errors (bad dimension, usage errors) propagate
/// immediately; transient failures are retried up to `max_attempts`
/// before reporting [`EmbeddingError::Exhausted`].
pub struct RetryingEmbedder<P> {
    inner: P,
    config: RetryConfig,
}

impl<P: EmbeddingProvider> RetryingEmbedder<P> {
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for RetryingEmbedder<P> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let deadline = Duration::from_secs(self.config.timeout_secs);
        let attempts = self.config.max_attempts.max(1);
        let mut last_message = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(deadline, self.inner.embed(texts)).await {
                Ok(Ok(vectors)) => return Ok(vectors),
                Ok(Err(e)) if !e.is_retryable() => return Err(e),
                Ok(Err(e)) => {
                    tracing::warn!(attempt, error = %e, "embedding attempt failed");
                    last_message = e.to_string();
                }
                Err(_) => {
                    let e = EmbeddingError::Timeout(self.config.timeout_secs);
                    tracing::warn!(attempt, error = %e, "embedding attempt timed out");
                    last_message = e.to_string();
                }
            }

            if attempt < attempts {
                let delay = self.config.base_delay_ms << (attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(EmbeddingError::Exhausted {
            attempts,
            message: last_message,
        }
        .into())
    }

    fn identifier(&self) -> String {
        self.inner.identifier()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

/// Content-addressed embedding cache.
///
/// A batch with partial coverage only sends the uncached texts to the
/// inner provider, and a fully covered batch sends nothing at all.
pub struct CachedEmbedder<P> {
    inner: P,
    cache: Mutex<LruMap<u64, Vec<f32>>>,
    stats: CacheStats,
}

impl<P: EmbeddingProvider> CachedEmbedder<P> {
    pub fn new(inner: P, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruMap::new(capacity)),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn hash_key(text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for CachedEmbedder<P> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut uncached_texts = Vec::new();
        let mut uncached_indices = Vec::new();

        {
            let mut cache = self.cache.lock();
            for (i, text) in texts.iter().enumerate() {
                match cache.get(&Self::hash_key(text)) {
                    Some(vector) => {
                        self.stats.record_hit();
                        results[i] = Some(vector);
                    }
                    None => {
                        self.stats.record_miss();
                        uncached_texts.push(text.clone());
                        uncached_indices.push(i);
                    }
                }
            }
        }

        if !uncached_texts.is_empty() {
            let fresh = self.inner.embed(&uncached_texts).await?;
            if fresh.len() != uncached_texts.len() {
                return Err(EmbeddingError::Provider(format!(
                    "sent {} texts, got {} embeddings",
                    uncached_texts.len(),
                    fresh.len()
                ))
                .into());
            }

            let mut cache = self.cache.lock();
            for (slot, vector) in uncached_indices.into_iter().zip(fresh) {
                if cache.insert(Self::hash_key(&texts[slot]), vector.clone()) {
                    self.stats.record_eviction();
                }
                results[slot] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn identifier(&self) -> String {
        self.inner.identifier()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

/// Delegating provider that counts how many embed calls reach the
/// wrapped provider, for asserting cache behavior in tests.
pub struct CountingEmbedder<P> {
    inner: P,
    calls: AtomicU64,
}

impl<P: EmbeddingProvider> CountingEmbedder<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of embed calls forwarded to the wrapped provider.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for CountingEmbedder<P> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.embed(texts).await
    }

    fn identifier(&self) -> String {
        self.inner.identifier()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

/// Which embedding backend to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    Ollama,
    Simple,
}

/// Assemble the standard provider stack for a backend kind.
///
/// Remote providers get deadline and retry handling; every provider is
/// fronted by the embedding cache.
pub fn create_embedding_provider(
    kind: EmbeddingProviderKind,
    config: EmbeddingConfig,
    retry: RetryConfig,
    cache_capacity: usize,
) -> Arc<dyn EmbeddingProvider> {
    match kind {
        EmbeddingProviderKind::Ollama => Arc::new(CachedEmbedder::new(
            RetryingEmbedder::new(OllamaEmbeddings::new(config), retry),
            cache_capacity,
        )),
        EmbeddingProviderKind::Simple => Arc::new(CachedEmbedder::new(
            SimpleEmbedder::new(config.dimension),
            cache_capacity,
        )),
    }
}
