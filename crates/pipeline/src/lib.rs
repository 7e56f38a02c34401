//! The document QA pipeline: wires loading, chunking, hierarchical
//! summarization, indexing, retrieval, and answer generation into one
//! build-then-ask surface.

pub mod answer;
pub mod events;
pub mod pipeline;

pub use answer::{Answer, SourceDetail};
pub use events::PipelineEvent;
pub use pipeline::{BuildSummary, PipelineBuilder, PipelineConfig, RagPipeline};
