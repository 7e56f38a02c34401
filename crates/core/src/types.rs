//! Data model for the document QA pipeline.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Free-form metadata attached to documents, chunks, and results.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A document as produced by a loader, before chunking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadedDocument {
    /// Originating document name
    pub source: String,
    pub text: String,
    /// Page number within the source (1-based)
    pub page: u32,
    #[serde(default)]
    pub metadata: Metadata,
}

impl LoadedDocument {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            page: 1,
            metadata: Metadata::new(),
        }
    }
}

/// A contiguous span of source text, the unit of dense indexing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Stable identifier, unique within a corpus
    pub id: String,
    pub text: String,
    pub source: String,
    /// Page number within the source (1-based)
    pub page: u32,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        source: impl Into<String>,
        page: u32,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: source.into(),
            page,
            metadata: Metadata::new(),
        }
    }
}

/// A node in the summary hierarchy built over chunks.
///
/// Level 0 nodes wrap input chunks one-to-one and have no members. A node
/// at level `n + 1` aggregates the texts of its members at level `n`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HierarchyNode {
    pub id: String,
    pub text: String,
    pub source: String,
    pub page: u32,
    /// 0 for wrapped input chunks, increasing toward the root
    pub level: u32,
    /// Ids of the nodes one level down that this node aggregates.
    /// Empty exactly when `level` is 0.
    pub member_ids: BTreeSet<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Which sub-store produced a search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    Dense,
    Sparse,
    Hierarchy,
}

impl std::fmt::Display for Representation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Representation::Dense => write!(f, "dense"),
            Representation::Sparse => write!(f, "sparse"),
            Representation::Hierarchy => write!(f, "hierarchy"),
        }
    }
}

/// A retrieval result after fusion, reranking, and metadata attachment.
///
/// `score` is the fused rank score used for final ordering; the best raw
/// similarity observed for the entry is carried in `metadata` under
/// `"similarity"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub content: String,
    pub score: f32,
    pub representation: Representation,
    pub metadata: Metadata,
}

impl RankedResult {
    /// Source document name, if attached.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|v| v.as_str())
    }

    /// Page number, defaulting to 1 when absent.
    pub fn page(&self) -> u32 {
        self.metadata
            .get("page")
            .and_then(|v| v.as_u64())
            .unwrap_or(1) as u32
    }

    /// Chunk identifier, if attached.
    pub fn chunk_id(&self) -> Option<&str> {
        self.metadata.get("chunk_id").and_then(|v| v.as_str())
    }

    /// Best raw similarity seen for this entry, 0.0 when absent.
    pub fn similarity(&self) -> f32 {
        self.metadata
            .get("similarity")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as f32
    }
}

/// A single completion request to a generative model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: 0.1,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}
