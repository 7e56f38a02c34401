//! Application settings.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Complete application settings, assembled from files and environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub corpus: CorpusSettings,
    #[serde(default)]
    pub chunking: ChunkingSettings,
    #[serde(default)]
    pub hierarchy: HierarchySettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub index: IndexSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

/// Corpus location and loading behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusSettings {
    #[serde(default = "default_corpus_dir")]
    pub dir: String,
    /// File extensions to ingest, lowercase, without the dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Per-file read budget; slower files are skipped with a warning
    #[serde(default = "default_file_timeout")]
    pub file_timeout_secs: u64,
    /// Language the corpus is written and indexed in
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_corpus_dir() -> String {
    "corpus".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["txt".to_string(), "md".to_string()]
}

fn default_file_timeout() -> u64 {
    300
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            dir: default_corpus_dir(),
            extensions: default_extensions(),
            file_timeout_secs: default_file_timeout(),
            language: default_language(),
        }
    }
}

/// Chunking parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    1024
}

fn default_chunk_overlap() -> usize {
    128
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Summary hierarchy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchySettings {
    /// Levels of summarization above the chunks
    #[serde(default = "default_max_levels")]
    pub max_levels: u32,
    /// Stop clustering once a level has this many nodes or fewer
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: usize,
    /// Upper bound on clusters per level
    #[serde(default = "default_max_clusters")]
    pub max_clusters: usize,
    #[serde(default = "default_kmeans_max_iter")]
    pub kmeans_max_iter: usize,
}

fn default_max_levels() -> u32 {
    3
}

fn default_cluster_threshold() -> usize {
    10
}

fn default_max_clusters() -> usize {
    10
}

fn default_kmeans_max_iter() -> usize {
    10
}

impl Default for HierarchySettings {
    fn default() -> Self {
        Self {
            max_levels: default_max_levels(),
            cluster_threshold: default_cluster_threshold(),
            max_clusters: default_max_clusters(),
            kmeans_max_iter: default_kmeans_max_iter(),
        }
    }
}

/// Embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// "ollama" for a local server, "simple" for the offline hash embedder
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Budget for a single provider call
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    /// Attempts before an embedding call is given up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Entries held by the embedding LRU cache
    #[serde(default = "default_embedding_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_dimension() -> usize {
    768
}

fn default_batch_size() -> usize {
    32
}

fn default_embedding_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_embedding_cache_capacity() -> usize {
    10_000
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            endpoint: default_endpoint(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_max_retries(),
            cache_capacity: default_embedding_cache_capacity(),
        }
    }
}

/// Generative model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Sampling temperature for answer generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Sampling temperature for query rewrite prompts
    #[serde(default = "default_transform_temperature")]
    pub transform_temperature: f32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    /// Grapheme budget for the rendered answer prompt
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

fn default_generation_model() -> String {
    "llama3.1".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_transform_temperature() -> f32 {
    0.3
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_max_prompt_chars() -> usize {
    24_000
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            endpoint: default_endpoint(),
            temperature: default_temperature(),
            transform_temperature: default_transform_temperature(),
            timeout_secs: default_generation_timeout(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

/// Retrieval behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Results returned to the caller
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Reciprocal rank fusion dampening constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
    /// Apply the LLM reranking pass
    #[serde(default = "default_rerank")]
    pub rerank: bool,
    /// Cap on query expansion variants
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,
    /// Cap on decomposition sub-questions
    #[serde(default = "default_max_sub_questions")]
    pub max_sub_questions: usize,
}

fn default_top_k() -> usize {
    5
}

fn default_rrf_k() -> f32 {
    60.0
}

fn default_rerank() -> bool {
    true
}

fn default_max_expansions() -> usize {
    3
}

fn default_max_sub_questions() -> usize {
    4
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rrf_k: default_rrf_k(),
            rerank: default_rerank(),
            max_expansions: default_max_expansions(),
            max_sub_questions: default_max_sub_questions(),
        }
    }
}

/// Index construction and persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Keep a BM25 keyword store alongside the dense stores
    #[serde(default = "default_include_sparse")]
    pub include_sparse: bool,
    /// Index every summary level, not just the top one
    #[serde(default = "default_include_intermediate")]
    pub include_intermediate_levels: bool,
    /// Budget for building one representation
    #[serde(default = "default_representation_timeout")]
    pub representation_timeout_secs: u64,
}

fn default_data_dir() -> String {
    "data/index".to_string()
}

fn default_include_sparse() -> bool {
    true
}

fn default_include_intermediate() -> bool {
    true
}

fn default_representation_timeout() -> u64 {
    120
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            include_sparse: default_include_sparse(),
            include_intermediate_levels: default_include_intermediate(),
            representation_timeout_secs: default_representation_timeout(),
        }
    }
}

/// Query and answer cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// "memory", "disk", or "disabled"
    #[serde(default = "default_cache_backend")]
    pub backend: String,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

fn default_cache_backend() -> String {
    "memory".to_string()
}

fn default_cache_capacity() -> usize {
    2048
}

fn default_cache_dir() -> String {
    "data/cache".to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            capacity: default_cache_capacity(),
            dir: default_cache_dir(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Settings {
    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chunking.chunk_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::InvalidValue {
                field: "chunking.chunk_overlap".to_string(),
                message: format!(
                    "overlap {} must be smaller than chunk size {}",
                    self.chunking.chunk_overlap, self.chunking.chunk_size
                ),
            });
        }

        if self.hierarchy.max_clusters == 0 {
            return Err(ConfigError::InvalidValue {
                field: "hierarchy.max_clusters".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.top_k".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.embedding.dimension == 0 || self.embedding.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "embedding".to_string(),
                message: "dimension and batch_size must be greater than zero".to_string(),
            });
        }

        if self.embedding.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "embedding.max_retries".to_string(),
                message: "at least one attempt is required".to_string(),
            });
        }

        match self.embedding.provider.as_str() {
            "ollama" | "simple" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "embedding.provider".to_string(),
                    message: format!("unknown provider \"{other}\""),
                });
            }
        }

        match self.cache.backend.as_str() {
            "memory" | "disk" | "disabled" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "cache.backend".to_string(),
                    message: format!("unknown backend \"{other}\""),
                });
            }
        }

        if self.retrieval.top_k > 20 {
            tracing::warn!(
                top_k = self.retrieval.top_k,
                "large top_k will slow reranking noticeably"
            );
        }

        if self.hierarchy.cluster_threshold < self.hierarchy.max_clusters {
            tracing::warn!(
                threshold = self.hierarchy.cluster_threshold,
                max_clusters = self.hierarchy.max_clusters,
                "cluster threshold below max_clusters keeps top levels at max_clusters nodes"
            );
        }

        Ok(())
    }
}

/// Load settings for the given environment.
///
/// Reads `config/default.toml`, then `config/{env}.toml`, then
/// `DOCQA__SECTION__KEY` environment variables, later sources winning.
pub fn load_settings(env: &str) -> Result<Settings, ConfigError> {
    let settings = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{}", env)).required(false))
        .add_source(
            Environment::with_prefix("DOCQA")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize::<Settings>()?;

    settings.validate()?;
    Ok(settings)
}
