//! Retrieval for document QA: embedding providers, the
//! multi-representation index, and the transform/fuse/rerank pipeline
//! that turns a question into ranked context.

pub mod embeddings;
pub mod fusion;
pub mod hierarchy;
pub mod index;
pub mod reranker;
pub mod retriever;
pub mod sparse;
pub mod transformer;
pub mod vector_store;

pub use embeddings::{
    create_embedding_provider, CachedEmbedder, CountingEmbedder, EmbeddingConfig,
    EmbeddingProviderKind, OllamaEmbeddings, RetryConfig, RetryingEmbedder, SimpleEmbedder,
};
pub use fusion::{reciprocal_rank_fusion, FusedHit, DEFAULT_RRF_K};
pub use hierarchy::{HierarchicalClusterer, HierarchyConfig};
pub use index::{
    BuildReport, IndexConfig, IndexHit, IndexMeta, MultiRepresentationIndex, SearchOutcome,
};
pub use reranker::{LlmReranker, RerankerConfig, RerankerStats};
pub use retriever::{RetrievalConfig, RetrievalOutcome, RetrievalSystem};
pub use sparse::Bm25Index;
pub use transformer::{QueryTransformer, TransformerConfig};
pub use vector_store::{cosine_similarity, Scored, StoreEntry, VectorStore};
