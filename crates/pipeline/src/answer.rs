//! Answer types returned by the pipeline.

use serde::{Deserialize, Serialize};

use docqa_core::RankedResult;

/// One piece of supporting context behind an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDetail {
    pub source: String,
    pub page: u32,
    pub chunk_id: String,
    pub similarity: f32,
    pub content: String,
}

impl SourceDetail {
    pub fn from_result(result: &RankedResult) -> Self {
        Self {
            source: result.source().unwrap_or("unknown").to_string(),
            page: result.page(),
            chunk_id: result.chunk_id().unwrap_or_default().to_string(),
            similarity: result.similarity(),
            content: result.content.clone(),
        }
    }
}

/// A grounded answer with the sources backing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceDetail>,
    /// Detected language of the question
    pub source_language: String,
    /// True when a retrieval strategy failed and the context may be
    /// narrower than usual
    pub partial: bool,
}
