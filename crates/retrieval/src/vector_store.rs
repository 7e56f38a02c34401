//! Dense vector store with cosine search and JSON persistence.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use docqa_core::{EmbeddingError, IndexError, Metadata, Result};

/// One indexed entry: the text, its embedding, and carried metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntry {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A sub-store hit with its raw relevance score.
#[derive(Debug, Clone)]
pub struct Scored {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub metadata: Metadata,
}

/// Brute-force cosine store over full-precision vectors.
///
/// Corpora here are thousands of chunks, not millions, so a linear scan
/// beats maintaining an ANN structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct VectorStore {
    dimension: usize,
    entries: Vec<StoreEntry>,
    #[serde(skip)]
    by_id: HashMap<String, usize>,
}

impl VectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn add(&mut self, entry: StoreEntry) -> Result<()> {
        if entry.vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: entry.vector.len(),
            }
            .into());
        }
        self.by_id.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Top-k entries by cosine similarity to the query, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Scored>> {
        if query.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            }
            .into());
        }

        let mut scored: Vec<Scored> = self
            .entries
            .iter()
            .map(|entry| Scored {
                id: entry.id.clone(),
                text: entry.text.clone(),
                score: cosine_similarity(query, &entry.vector),
                metadata: entry.metadata.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn get_vector(&self, id: &str) -> Option<&[f32]> {
        self.by_id
            .get(id)
            .map(|&i| self.entries[i].vector.as_slice())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes =
            serde_json::to_vec_pretty(self).map_err(|e| IndexError::Persist(e.to_string()))?;
        std::fs::write(path, bytes).map_err(|e| IndexError::Persist(e.to_string()))?;
        Ok(())
    }

    pub fn load(path: &Path, expected_dimension: usize) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| IndexError::Corrupt(e.to_string()))?;
        let mut store: VectorStore =
            serde_json::from_slice(&bytes).map_err(|e| IndexError::Corrupt(e.to_string()))?;
        if store.dimension != expected_dimension {
            return Err(IndexError::Corrupt(format!(
                "stored dimension {} does not match configured {}",
                store.dimension, expected_dimension
            ))
            .into());
        }
        store.rebuild_index();
        Ok(store)
    }

    fn rebuild_index(&mut self) {
        self.by_id = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.id.clone(), i))
            .collect();
    }
}

/// Cosine similarity, 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut mag_a = 0.0f32;
    let mut mag_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a.sqrt() * mag_b.sqrt())
}
