//! LLM reranking of fused candidates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use docqa_core::{GenerationRequest, GenerativeModel};

use crate::fusion::FusedHit;

/// Settings for [`LlmReranker`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Graphemes of each candidate shown to the model
    pub snippet_len: usize,
    pub temperature: f32,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            snippet_len: 500,
            temperature: 0.0,
        }
    }
}

/// Counters exposed for observing reranker behavior.
#[derive(Debug, Default)]
pub struct RerankerStats {
    calls: AtomicU64,
    fallbacks: AtomicU64,
}

impl RerankerStats {
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }
}

/// Asks the model to pick and order the most relevant candidates.
///
/// The model's response is a selection: candidates it ranks come back
/// in its order and unranked ones are dropped. A failed call or an
/// unparseable ranking falls back to the fused order, so reranking can
/// only reorder results, never lose them to a model hiccup.
pub struct LlmReranker {
    model: Arc<dyn GenerativeModel>,
    config: RerankerConfig,
    stats: RerankerStats,
}

impl LlmReranker {
    pub fn new(model: Arc<dyn GenerativeModel>, config: RerankerConfig) -> Self {
        Self {
            model,
            config,
            stats: RerankerStats::default(),
        }
    }

    pub fn stats(&self) -> &RerankerStats {
        &self.stats
    }

    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<FusedHit>,
        top_k: usize,
    ) -> Vec<FusedHit> {
        if candidates.len() <= 1 {
            let mut candidates = candidates;
            candidates.truncate(top_k);
            return candidates;
        }

        self.stats.calls.fetch_add(1, Ordering::Relaxed);
        let prompt = self.build_prompt(query, &candidates);
        let request = GenerationRequest::new(prompt).with_temperature(self.config.temperature);

        let ranking = match self.model.complete(&request).await {
            Ok(response) => parse_ranking(&response, candidates.len()),
            Err(err) => {
                tracing::warn!(error = %err, "rerank call failed, keeping fused order");
                None
            }
        };

        let mut results = match ranking {
            Some(ranking) => {
                let mut taken = vec![false; candidates.len()];
                let mut reordered = Vec::with_capacity(ranking.len());
                for index in ranking {
                    if !taken[index] {
                        taken[index] = true;
                        reordered.push(candidates[index].clone());
                    }
                }
                reordered
            }
            None => {
                self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
                candidates
            }
        };
        results.truncate(top_k);
        results
    }

    fn build_prompt(&self, query: &str, candidates: &[FusedHit]) -> String {
        let mut prompt = format!(
            "Query: {query}\n\nRank these documents by relevance to the query. \
             Return ONLY comma-separated numbers from 1 to {}, best first:\n\n",
            candidates.len()
        );
        for (i, candidate) in candidates.iter().enumerate() {
            let snippet: String = candidate
                .content
                .graphemes(true)
                .take(self.config.snippet_len)
                .collect();
            prompt.push_str(&format!("{}. {}\n", i + 1, snippet));
        }
        prompt
    }
}

/// Parse a "2,1,3" style ranking into 0-based candidate indices.
///
/// A token that is not a number poisons the whole response; parseable
/// but out-of-range numbers are dropped individually.
fn parse_ranking(response: &str, count: usize) -> Option<Vec<usize>> {
    let mut indices = Vec::new();
    for token in response.trim().split(',') {
        let number: usize = token.trim().parse().ok()?;
        if (1..=count).contains(&number) {
            indices.push(number - 1);
        }
    }
    if indices.is_empty() {
        None
    } else {
        Some(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use docqa_core::{Metadata, Representation};
    use docqa_llm::{ScriptedGenerator, StaticGenerator};

    fn candidate(id: &str, score: f32) -> FusedHit {
        FusedHit {
            id: id.to_string(),
            content: format!("content for {id}"),
            score,
            similarity: score,
            representation: Representation::Dense,
            metadata: Metadata::new(),
        }
    }

    fn candidates() -> Vec<FusedHit> {
        vec![candidate("a", 0.3), candidate("b", 0.2), candidate("c", 0.1)]
    }

    fn ids(hits: &[FusedHit]) -> Vec<&str> {
        hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_rerank_applies_model_order() {
        let reranker = LlmReranker::new(
            Arc::new(ScriptedGenerator::new(["2,1,3"])),
            RerankerConfig::default(),
        );

        let results = reranker.rerank("q", candidates(), 3).await;

        assert_eq!(ids(&results), vec!["b", "a", "c"]);
        assert_eq!(reranker.stats().calls(), 1);
        assert_eq!(reranker.stats().fallbacks(), 0);
    }

    #[tokio::test]
    async fn test_garbage_response_keeps_fused_order() {
        let reranker = LlmReranker::new(
            Arc::new(ScriptedGenerator::new(["these all look great to me"])),
            RerankerConfig::default(),
        );

        let results = reranker.rerank("q", candidates(), 3).await;

        assert_eq!(ids(&results), vec!["a", "b", "c"]);
        assert_eq!(reranker.stats().fallbacks(), 1);
    }

    #[tokio::test]
    async fn test_model_error_keeps_fused_order() {
        let reranker = LlmReranker::new(
            Arc::new(ScriptedGenerator::default()),
            RerankerConfig::default(),
        );

        let results = reranker.rerank("q", candidates(), 2).await;

        assert_eq!(ids(&results), vec!["a", "b"]);
        assert_eq!(reranker.stats().fallbacks(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_numbers_are_dropped() {
        let reranker = LlmReranker::new(
            Arc::new(ScriptedGenerator::new(["2, 99, 1"])),
            RerankerConfig::default(),
        );

        let results = reranker.rerank("q", candidates(), 3).await;

        assert_eq!(ids(&results), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_duplicate_numbers_count_once() {
        let reranker = LlmReranker::new(
            Arc::new(ScriptedGenerator::new(["1,1,2"])),
            RerankerConfig::default(),
        );

        let results = reranker.rerank("q", candidates(), 3).await;

        assert_eq!(ids(&results), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_single_candidate_skips_the_model() {
        let model = Arc::new(StaticGenerator::new("1"));
        let reranker = LlmReranker::new(model.clone(), RerankerConfig::default());

        let results = reranker.rerank("q", vec![candidate("only", 0.5)], 3).await;

        assert_eq!(ids(&results), vec!["only"]);
        assert_eq!(model.call_count(), 0);
        assert_eq!(reranker.stats().calls(), 0);
    }

    #[tokio::test]
    async fn test_snippets_are_truncated() {
        let model = Arc::new(StaticGenerator::new("1,2"));
        let reranker = LlmReranker::new(model.clone(), RerankerConfig::default());

        let mut long = candidate("long", 0.5);
        long.content = format!("{}NEVER_SHOWN", "a".repeat(600));

        reranker.rerank("q", vec![long, candidate("b", 0.4)], 2).await;

        let prompt = &model.requests()[0].prompt;
        assert!(!prompt.contains("NEVER_SHOWN"));
        assert!(prompt.contains(&"a".repeat(500)));
        assert!(prompt.contains("numbers from 1 to 2"));
    }

    #[test]
    fn test_parse_ranking() {
        assert_eq!(parse_ranking("2,1,3", 3), Some(vec![1, 0, 2]));
        assert_eq!(parse_ranking(" 3 , 1 ", 3), Some(vec![2, 0]));
        assert_eq!(parse_ranking("4,5", 3), None);
        assert_eq!(parse_ranking("1 and 2", 3), None);
        assert_eq!(parse_ranking("", 3), None);
        assert_eq!(parse_ranking("0,1", 3), Some(vec![0]));
    }
}
