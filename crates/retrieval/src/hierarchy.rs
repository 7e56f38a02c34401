//! Bottom-up summary hierarchy over chunks.
//!
//! Chunks are clustered level by level; each cluster becomes a summary
//! node whose text is the concatenation of its members and whose vector
//! is their centroid. Coarse questions can then match a summary node
//! even when no single chunk covers them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use docqa_core::{Chunk, EmbeddingProvider, HierarchyNode, Result};

use crate::vector_store::cosine_similarity;

/// Clustering bounds for [`HierarchicalClusterer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    pub max_levels: u32,
    /// Stop once a level has at most this many nodes
    pub cluster_threshold: usize,
    pub max_clusters: usize,
    pub kmeans_max_iter: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_levels: 3,
            cluster_threshold: 10,
            max_clusters: 10,
            kmeans_max_iter: 10,
        }
    }
}

struct LevelNode {
    node: HierarchyNode,
    vector: Vec<f32>,
}

/// Builds the summary hierarchy from chunks.
pub struct HierarchicalClusterer {
    config: HierarchyConfig,
}

impl HierarchicalClusterer {
    pub fn new(config: HierarchyConfig) -> Self {
        Self { config }
    }

    /// Cluster chunks into a hierarchy, returning every node of every
    /// level (level 0 wraps the input chunks one-to-one).
    ///
    /// Chunk texts go through the embedding provider exactly once;
    /// summary node vectors are member centroids, so no summary text is
    /// ever embedded.
    pub async fn build(
        &self,
        chunks: &[Chunk],
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<HierarchyNode>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;

        let mut current: Vec<LevelNode> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| LevelNode {
                node: HierarchyNode {
                    id: chunk.id.clone(),
                    text: chunk.text.clone(),
                    source: chunk.source.clone(),
                    page: chunk.page,
                    level: 0,
                    member_ids: BTreeSet::new(),
                    metadata: chunk.metadata.clone(),
                },
                vector,
            })
            .collect();

        let mut all: Vec<HierarchyNode> = current.iter().map(|n| n.node.clone()).collect();

        for level in 1..=self.config.max_levels {
            if current.len() <= self.config.cluster_threshold {
                break;
            }

            let k = self.config.max_clusters.min(current.len());
            let points: Vec<Vec<f32>> = current.iter().map(|n| n.vector.clone()).collect();
            let assignments = k_means(&points, k, self.config.kmeans_max_iter);

            let mut next = Vec::with_capacity(k);
            for cluster in 0..k {
                let members: Vec<&LevelNode> = current
                    .iter()
                    .zip(&assignments)
                    .filter(|(_, a)| **a == cluster)
                    .map(|(n, _)| n)
                    .collect();
                if members.is_empty() {
                    continue;
                }

                let text = members
                    .iter()
                    .map(|m| m.node.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                let member_vectors: Vec<&Vec<f32>> = members.iter().map(|m| &m.vector).collect();
                let centroid = mean_vector(&member_vectors);
                let member_ids: BTreeSet<String> =
                    members.iter().map(|m| m.node.id.clone()).collect();

                let first = members[0];
                let mut metadata = first.node.metadata.clone();
                metadata.insert("level".to_string(), level.into());

                let node = HierarchyNode {
                    id: format!("summary_{}_{:04}", level, next.len()),
                    text,
                    source: first.node.source.clone(),
                    page: first.node.page,
                    level,
                    member_ids,
                    metadata,
                };
                all.push(node.clone());
                next.push(LevelNode {
                    node,
                    vector: centroid,
                });
            }

            current = next;
        }

        tracing::debug!(chunks = chunks.len(), nodes = all.len(), "hierarchy built");
        Ok(all)
    }
}

/// Lloyd's k-means with deterministic evenly-spaced initialization and
/// cosine assignment. Returns one cluster index per point.
///
/// Empty clusters are reseeded from the point least similar to its own
/// centroid, so every cluster index can end up populated but is not
/// guaranteed to.
fn k_means(points: &[Vec<f32>], k: usize, max_iter: usize) -> Vec<usize> {
    let n = points.len();
    let step = n / k;
    let mut centroids: Vec<Vec<f32>> = (0..k).map(|i| points[i * step].clone()).collect();
    let mut assignments = vec![0usize; n];

    for _ in 0..max_iter {
        let mut changed = false;

        for (i, point) in points.iter().enumerate() {
            let mut best = 0usize;
            let mut best_sim = f32::MIN;
            for (c, centroid) in centroids.iter().enumerate() {
                let sim = cosine_similarity(point, centroid);
                if sim > best_sim {
                    best_sim = sim;
                    best = c;
                }
            }
            if assignments[i] != best {
                assignments[i] = best;
                changed = true;
            }
        }

        for cluster in 0..k {
            let members: Vec<&Vec<f32>> = points
                .iter()
                .zip(&assignments)
                .filter(|(_, a)| **a == cluster)
                .map(|(p, _)| p)
                .collect();

            if members.is_empty() {
                let worst = points
                    .iter()
                    .enumerate()
                    .min_by(|(i, a), (j, b)| {
                        let sim_a = cosine_similarity(a, &centroids[assignments[*i]]);
                        let sim_b = cosine_similarity(b, &centroids[assignments[*j]]);
                        sim_a.partial_cmp(&sim_b).unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .map(|(i, _)| i);
                if let Some(worst) = worst {
                    centroids[cluster] = points[worst].clone();
                    assignments[worst] = cluster;
                    changed = true;
                }
            } else {
                centroids[cluster] = mean_vector(&members);
            }
        }

        if !changed {
            break;
        }
    }

    assignments
}

fn mean_vector(members: &[&Vec<f32>]) -> Vec<f32> {
    let dimension = members[0].len();
    let mut mean = vec![0.0f32; dimension];
    for member in members {
        for (m, v) in mean.iter_mut().zip(member.iter()) {
            *m += v;
        }
    }
    let count = members.len() as f32;
    for m in &mut mean {
        *m /= count;
    }
    mean
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    use crate::embeddings::{CountingEmbedder, SimpleEmbedder};

    fn chunks(count: usize) -> Vec<Chunk> {
        (0..count)
            .map(|i| {
                Chunk::new(
                    format!("doc_chunk_{i:04}"),
                    format!("passage number {i} about subject {}", i % 5),
                    "doc.txt",
                    1,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_small_corpus_gets_no_summaries() {
        let clusterer = HierarchicalClusterer::new(HierarchyConfig::default());
        let embedder = SimpleEmbedder::new(32);

        let nodes = clusterer
            .build(&chunks(5), &embedder)
            .await
            .expect("Should build");

        assert_eq!(nodes.len(), 5);
        assert!(nodes.iter().all(|n| n.level == 0));
        assert!(nodes.iter().all(|n| n.member_ids.is_empty()));
    }

    #[tokio::test]
    async fn test_large_corpus_gets_summary_level() {
        let clusterer = HierarchicalClusterer::new(HierarchyConfig::default());
        let embedder = SimpleEmbedder::new(32);
        let input = chunks(25);

        let nodes = clusterer
            .build(&input, &embedder)
            .await
            .expect("Should build");

        let level0: Vec<_> = nodes.iter().filter(|n| n.level == 0).collect();
        let level1: Vec<_> = nodes.iter().filter(|n| n.level == 1).collect();

        assert_eq!(level0.len(), 25);
        assert!(!level1.is_empty());
        assert!(level1.len() <= 10);
        // 25 nodes collapse to at most 10, which is under the threshold
        assert!(nodes.iter().all(|n| n.level <= 1));

        // every chunk belongs to exactly one summary
        let mut covered = BTreeSet::new();
        for summary in &level1 {
            for id in &summary.member_ids {
                assert!(covered.insert(id.clone()), "chunk {id} in two summaries");
            }
            assert!(summary.metadata.get("level").is_some());
        }
        let all_ids: BTreeSet<String> = level0.iter().map(|n| n.id.clone()).collect();
        assert_eq!(covered, all_ids);
    }

    #[tokio::test]
    async fn test_summary_text_concatenates_members() {
        let clusterer = HierarchicalClusterer::new(HierarchyConfig {
            cluster_threshold: 1,
            max_clusters: 1,
            ..HierarchyConfig::default()
        });
        let embedder = SimpleEmbedder::new(32);
        let input = chunks(3);

        let nodes = clusterer
            .build(&input, &embedder)
            .await
            .expect("Should build");

        let summary = nodes
            .iter()
            .find(|n| n.level == 1)
            .expect("Should have a level 1 node");
        for chunk in &input {
            assert!(summary.text.contains(&chunk.text));
        }
        assert_eq!(summary.text.matches("\n\n").count(), 2);
    }

    #[tokio::test]
    async fn test_max_levels_caps_the_hierarchy() {
        let clusterer = HierarchicalClusterer::new(HierarchyConfig {
            max_levels: 1,
            cluster_threshold: 1,
            max_clusters: 2,
            kmeans_max_iter: 10,
        });
        let embedder = SimpleEmbedder::new(32);

        let nodes = clusterer
            .build(&chunks(6), &embedder)
            .await
            .expect("Should build");

        let top = nodes.iter().map(|n| n.level).max().expect("Should have nodes");
        assert_eq!(top, 1);
    }

    #[tokio::test]
    async fn test_build_is_deterministic() {
        let clusterer = HierarchicalClusterer::new(HierarchyConfig::default());
        let embedder = SimpleEmbedder::new(32);
        let input = chunks(25);

        let first = clusterer
            .build(&input, &embedder)
            .await
            .expect("Should build");
        let second = clusterer
            .build(&input, &embedder)
            .await
            .expect("Should build again");

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_chunk_texts_embedded_in_one_call() {
        let counting = Arc::new(CountingEmbedder::new(SimpleEmbedder::new(32)));
        let clusterer = HierarchicalClusterer::new(HierarchyConfig::default());

        clusterer
            .build(&chunks(25), &counting)
            .await
            .expect("Should build");

        assert_eq!(counting.calls(), 1);
    }

    #[test]
    fn test_k_means_separates_obvious_groups() {
        let points = vec![
            vec![1.0, 0.0],
            vec![0.9, 0.1],
            vec![1.0, 0.1],
            vec![0.0, 1.0],
            vec![0.1, 0.9],
            vec![0.1, 1.0],
        ];

        let assignments = k_means(&points, 2, 10);

        assert_eq!(assignments[0], assignments[1]);
        assert_eq!(assignments[1], assignments[2]);
        assert_eq!(assignments[3], assignments[4]);
        assert_eq!(assignments[4], assignments[5]);
        assert_ne!(assignments[0], assignments[3]);
    }

    #[test]
    fn test_k_means_is_deterministic() {
        let points: Vec<Vec<f32>> = (0..20)
            .map(|i| vec![(i as f32).sin(), (i as f32).cos(), i as f32 / 20.0])
            .collect();

        assert_eq!(k_means(&points, 4, 10), k_means(&points, 4, 10));
    }

    #[test]
    fn test_mean_vector() {
        let a = vec![1.0, 3.0];
        let b = vec![3.0, 5.0];
        assert_eq!(mean_vector(&[&a, &b]), vec![2.0, 4.0]);
    }
}
