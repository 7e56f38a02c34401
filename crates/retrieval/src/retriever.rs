//! Multi-strategy retrieval: transform the query, search every variant,
//! fuse, rerank, and attach presentation metadata.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use docqa_core::{RankedResult, Result};

use crate::fusion::{reciprocal_rank_fusion, FusedHit, DEFAULT_RRF_K};
use crate::index::MultiRepresentationIndex;
use crate::reranker::LlmReranker;
use crate::transformer::QueryTransformer;

/// Settings for [`RetrievalSystem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub rrf_k: f32,
    pub rerank: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            rrf_k: DEFAULT_RRF_K,
            rerank: true,
        }
    }
}

/// Results of one retrieval pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    pub results: Vec<RankedResult>,
    /// True when a query variant or sub-store failed along the way
    pub partial: bool,
    pub queries_searched: usize,
}

/// The retrieval pipeline over a shared index.
///
/// The original query always runs; expansions and sub-questions widen
/// the net and their failures only degrade the outcome. Final ordering
/// is by fused score, with the reranker acting as a selection of which
/// candidates survive.
pub struct RetrievalSystem {
    index: Arc<RwLock<MultiRepresentationIndex>>,
    transformer: QueryTransformer,
    reranker: LlmReranker,
    config: RetrievalConfig,
}

impl RetrievalSystem {
    pub fn new(
        index: Arc<RwLock<MultiRepresentationIndex>>,
        transformer: QueryTransformer,
        reranker: LlmReranker,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            index,
            transformer,
            reranker,
            config,
        }
    }

    pub fn index(&self) -> &Arc<RwLock<MultiRepresentationIndex>> {
        &self.index
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub async fn retrieve(&self, query: &str) -> Result<RetrievalOutcome> {
        let (expansions, sub_questions) = tokio::join!(
            self.transformer.expand(query),
            self.transformer.decompose(query)
        );

        let mut queries = vec![query.to_string()];
        queries.extend(expansions);
        queries.extend(sub_questions);

        let top_k = self.config.top_k;
        let mut partial = false;
        let mut lists = Vec::with_capacity(queries.len());
        {
            let index = self.index.read().await;
            // the original query searches at triple depth, variants at top_k
            let searches = join_all(
                queries
                    .iter()
                    .enumerate()
                    .map(|(i, q)| index.search(q, if i == 0 { top_k * 3 } else { top_k })),
            );
            for (i, outcome) in searches.await.into_iter().enumerate() {
                match outcome {
                    Ok(outcome) => {
                        partial |= outcome.degraded;
                        lists.push(outcome.hits);
                    }
                    // the original query must succeed, variants are best-effort
                    Err(err) if i == 0 => return Err(err),
                    Err(err) => {
                        tracing::warn!(query = %queries[i], error = %err, "variant search failed");
                        // keep the list position so later lists fuse with
                        // the same rank penalty
                        lists.push(Vec::new());
                        partial = true;
                    }
                }
            }
        }

        let mut fused = reciprocal_rank_fusion(&lists, self.config.rrf_k);
        fused.truncate(top_k * 2);

        let selected = if self.config.rerank {
            self.reranker.rerank(query, fused, top_k).await
        } else {
            fused.truncate(top_k);
            fused
        };

        let mut results: Vec<RankedResult> = selected.into_iter().map(attach_metadata).collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);

        tracing::debug!(
            query,
            queries = queries.len(),
            results = results.len(),
            partial,
            "retrieval complete"
        );
        Ok(RetrievalOutcome {
            results,
            partial,
            queries_searched: queries.len(),
        })
    }
}

/// Fill in the metadata every consumer relies on: source, page, chunk
/// id, and the raw similarity backing the entry.
fn attach_metadata(hit: FusedHit) -> RankedResult {
    let mut metadata = hit.metadata;

    let source = metadata
        .get("source")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    metadata.insert("source".to_string(), source.clone().into());

    let page = metadata.get("page").and_then(|v| v.as_u64()).unwrap_or(1);
    metadata.insert("page".to_string(), page.into());

    if metadata.get("chunk_id").and_then(|v| v.as_str()).is_none() {
        let stem = match source.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => source.as_str(),
        };
        metadata.insert("chunk_id".to_string(), format!("{stem}_chunk_0000").into());
    }

    metadata.insert("similarity".to_string(), hit.similarity.into());

    RankedResult {
        content: hit.content,
        score: hit.score,
        representation: hit.representation,
        metadata,
    }
}
