//! Core types and traits shared across the document QA pipeline.
//!
//! Defines the data model (chunks, hierarchy nodes, ranked results), the
//! error taxonomy, and the trait seams behind which embedding, generation,
//! loading, and translation providers are injected.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    CacheError, EmbeddingError, Error, IndexError, IngestError, LlmError, PipelineError, Result,
};
pub use traits::{DocumentLoader, EmbeddingProvider, GenerativeModel, NoopTranslator, Translator};
pub use types::{
    Chunk, GenerationRequest, HierarchyNode, LoadedDocument, Metadata, RankedResult,
    Representation,
};
