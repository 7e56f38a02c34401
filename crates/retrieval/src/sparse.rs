//! BM25 keyword index complementing the dense store.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use docqa_core::{IndexError, Metadata, Result};

use crate::vector_store::Scored;

const K1: f32 = 1.5;
const B: f32 = 0.75;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SparseDoc {
    id: String,
    text: String,
    #[serde(default)]
    metadata: Metadata,
    term_counts: HashMap<String, u32>,
    length: u32,
}

/// Okapi BM25 index over tokenized chunk texts.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Bm25Index {
    docs: Vec<SparseDoc>,
    doc_frequency: HashMap<String, u32>,
    total_length: u64,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: impl Into<String>, text: impl Into<String>, metadata: Metadata) {
        let text = text.into();
        let terms = tokenize(&text);

        let mut term_counts: HashMap<String, u32> = HashMap::new();
        for term in &terms {
            *term_counts.entry(term.clone()).or_insert(0) += 1;
        }
        for term in term_counts.keys() {
            *self.doc_frequency.entry(term.clone()).or_insert(0) += 1;
        }

        let length = terms.len() as u32;
        self.total_length += u64::from(length);
        self.docs.push(SparseDoc {
            id: id.into(),
            text,
            metadata,
            term_counts,
            length,
        });
    }

    /// Top-k documents by BM25 score, best first. Documents scoring zero
    /// are omitted entirely.
    pub fn search(&self, query: &str, k: usize) -> Vec<Scored> {
        if self.docs.is_empty() {
            return Vec::new();
        }

        let query_terms = tokenize(query);
        let n = self.docs.len() as f32;
        let avg_length = self.total_length as f32 / n;

        let mut scored: Vec<Scored> = self
            .docs
            .iter()
            .filter_map(|doc| {
                let mut score = 0.0f32;
                for term in &query_terms {
                    let df = match self.doc_frequency.get(term) {
                        Some(&df) => df as f32,
                        None => continue,
                    };
                    let tf = doc.term_counts.get(term).copied().unwrap_or(0) as f32;
                    if tf == 0.0 {
                        continue;
                    }
                    let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                    let norm = K1 * (1.0 - B + B * doc.length as f32 / avg_length);
                    score += idf * (tf * (K1 + 1.0)) / (tf + norm);
                }
                (score > 0.0).then(|| Scored {
                    id: doc.id.clone(),
                    text: doc.text.clone(),
                    score,
                    metadata: doc.metadata.clone(),
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes =
            serde_json::to_vec_pretty(self).map_err(|e| IndexError::Persist(e.to_string()))?;
        std::fs::write(path, bytes).map_err(|e| IndexError::Persist(e.to_string()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| IndexError::Corrupt(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| IndexError::Corrupt(e.to_string()).into())
    }
}

/// Lowercased alphanumeric tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}
