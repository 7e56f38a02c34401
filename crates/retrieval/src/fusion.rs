//! Reciprocal rank fusion across per-query result lists.

use std::collections::HashMap;

use docqa_core::{Metadata, Representation};

use crate::index::IndexHit;

pub const DEFAULT_RRF_K: f32 = 60.0;

/// A result pooled across queries, carrying its fused rank score and
/// the best raw similarity seen for the entry.
#[derive(Debug, Clone)]
pub struct FusedHit {
    pub id: String,
    pub content: String,
    /// Accumulated reciprocal rank score
    pub score: f32,
    /// Best raw similarity across all appearances
    pub similarity: f32,
    pub representation: Representation,
    pub metadata: Metadata,
}

/// Fuse ranked lists with reciprocal rank fusion, best first.
///
/// An entry's score accumulates `1 / (k + position + list + 1)` for
/// every list it appears in, where `position` is its 0-based rank
/// within the list and `list` is the 0-based index of the list itself.
/// Later lists contribute slightly less, which keeps the original
/// query's ranking dominant over its rewrites. Ties keep first-seen
/// order.
pub fn reciprocal_rank_fusion(lists: &[Vec<IndexHit>], k: f32) -> Vec<FusedHit> {
    let mut order: Vec<String> = Vec::new();
    let mut fused: HashMap<String, FusedHit> = HashMap::new();

    for (list_index, list) in lists.iter().enumerate() {
        for (position, hit) in list.iter().enumerate() {
            let contribution = 1.0 / (k + position as f32 + list_index as f32 + 1.0);
            match fused.get_mut(&hit.id) {
                Some(existing) => {
                    existing.score += contribution;
                    if hit.similarity > existing.similarity {
                        existing.similarity = hit.similarity;
                    }
                }
                None => {
                    order.push(hit.id.clone());
                    fused.insert(
                        hit.id.clone(),
                        FusedHit {
                            id: hit.id.clone(),
                            content: hit.content.clone(),
                            score: contribution,
                            similarity: hit.similarity,
                            representation: hit.representation,
                            metadata: hit.metadata.clone(),
                        },
                    );
                }
            }
        }
    }

    let mut results: Vec<FusedHit> = order
        .into_iter()
        .filter_map(|id| fused.remove(&id))
        .collect();
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, similarity: f32) -> IndexHit {
        IndexHit {
            id: id.to_string(),
            content: format!("content for {id}"),
            similarity,
            representation: Representation::Dense,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_scores_accumulate_across_lists() {
        let lists = vec![
            vec![hit("a", 0.9), hit("b", 0.8)],
            vec![hit("b", 0.7), hit("a", 0.6)],
        ];

        let fused = reciprocal_rank_fusion(&lists, DEFAULT_RRF_K);

        assert_eq!(fused.len(), 2);
        // a: 1/(60+0+0+1) + 1/(60+1+1+1) = 1/61 + 1/63
        // b: 1/(60+1+0+1) + 1/(60+0+1+1) = 2/62
        let a = fused.iter().find(|h| h.id == "a").expect("Should contain a");
        let b = fused.iter().find(|h| h.id == "b").expect("Should contain b");
        assert!((a.score - (1.0 / 61.0 + 1.0 / 63.0)).abs() < 1e-6);
        assert!((b.score - 2.0 / 62.0).abs() < 1e-6);
        assert_eq!(fused[0].id, "a");
    }

    #[test]
    fn test_similarity_keeps_the_best() {
        let lists = vec![vec![hit("a", 0.4)], vec![hit("a", 0.9)]];

        let fused = reciprocal_rank_fusion(&lists, DEFAULT_RRF_K);

        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].similarity, 0.9);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        // a and b both contribute exactly 1/62
        let lists = vec![
            vec![hit("top", 1.0), hit("a", 0.5)],
            vec![hit("b", 0.5)],
        ];

        let fused = reciprocal_rank_fusion(&lists, DEFAULT_RRF_K);

        assert_eq!(fused[0].id, "top");
        assert_eq!(fused[1].id, "a");
        assert_eq!(fused[2].id, "b");
        assert_eq!(fused[1].score, fused[2].score);
    }

    #[test]
    fn test_later_lists_contribute_less() {
        let lists = vec![vec![hit("first", 0.5)], vec![hit("second", 0.5)]];

        let fused = reciprocal_rank_fusion(&lists, DEFAULT_RRF_K);

        assert_eq!(fused[0].id, "first");
        assert!(fused[0].score > fused[1].score);
    }

    #[test]
    fn test_empty_input() {
        assert!(reciprocal_rank_fusion(&[], DEFAULT_RRF_K).is_empty());
        assert!(reciprocal_rank_fusion(&[Vec::new(), Vec::new()], DEFAULT_RRF_K).is_empty());
    }
}
