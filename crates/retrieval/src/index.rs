//! Multi-representation index: dense chunks, BM25 keywords, and the
//! summary hierarchy, built once and persisted for reuse.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use docqa_core::{
    Chunk, EmbeddingError, EmbeddingProvider, HierarchyNode, IndexError, Metadata, Representation,
    Result,
};

use crate::sparse::Bm25Index;
use crate::vector_store::{Scored, StoreEntry, VectorStore};

const DENSE_FILE: &str = "dense.json";
const SPARSE_FILE: &str = "sparse.json";
const HIERARCHY_FILE: &str = "hierarchy.json";
const META_FILE: &str = "meta.json";

/// Build and persistence settings for [`MultiRepresentationIndex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub data_dir: PathBuf,
    pub include_sparse: bool,
    /// Index summary nodes from every level, not only the top one
    pub include_intermediate_levels: bool,
    pub representation_timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/index"),
            include_sparse: true,
            include_intermediate_levels: true,
            representation_timeout_secs: 120,
        }
    }
}

/// Identity of a persisted index, stored next to the stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub fingerprint: String,
    pub dimension: usize,
    pub chunk_count: usize,
    pub node_count: usize,
    pub created_at: DateTime<Utc>,
}

/// What a call to [`MultiRepresentationIndex::build`] did.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub reused: bool,
    pub chunk_count: usize,
    pub hierarchy_count: usize,
    pub sparse_count: usize,
    pub fingerprint: String,
}

/// A hit from one sub-store, before fusion.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub id: String,
    pub content: String,
    pub similarity: f32,
    pub representation: Representation,
    pub metadata: Metadata,
}

/// Pooled hits plus whether any sub-store failed along the way.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub hits: Vec<IndexHit>,
    pub degraded: bool,
}

/// Dense, sparse, and hierarchy stores behind one build/search surface.
///
/// Builds are content-addressed: when the persisted index matches the
/// current chunks, hierarchy, and embedding provider, it is loaded from
/// disk and no text is embedded at all.
pub struct MultiRepresentationIndex {
    config: IndexConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    dense: VectorStore,
    sparse: Option<Bm25Index>,
    hierarchy: VectorStore,
    fingerprint: Option<String>,
}

impl MultiRepresentationIndex {
    pub fn new(config: IndexConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let dimension = embedder.dimension();
        Self {
            config,
            dense: VectorStore::new(dimension),
            sparse: None,
            hierarchy: VectorStore::new(dimension),
            fingerprint: None,
            embedder,
        }
    }

    /// Build the index, or reuse the persisted one when it still matches.
    pub async fn build(
        &mut self,
        chunks: &[Chunk],
        nodes: &[HierarchyNode],
    ) -> Result<BuildReport> {
        if chunks.is_empty() {
            return Err(IndexError::Build("no chunks to index".to_string()).into());
        }

        let fingerprint = compute_fingerprint(chunks, nodes, &self.embedder.identifier());

        if self.try_reuse(&fingerprint) {
            tracing::info!(
                chunks = self.dense.len(),
                hierarchy = self.hierarchy.len(),
                "reusing persisted index"
            );
            return Ok(self.report(true, fingerprint));
        }

        self.build_dense(chunks).await?;
        self.build_hierarchy(nodes)?;
        self.sparse = self.config.include_sparse.then(|| build_sparse(chunks));
        self.fingerprint = Some(fingerprint.clone());
        self.persist(chunks.len(), nodes.len(), &fingerprint)?;

        tracing::info!(
            chunks = self.dense.len(),
            hierarchy = self.hierarchy.len(),
            sparse = self.sparse.as_ref().map_or(0, Bm25Index::len),
            "index built"
        );
        Ok(self.report(false, fingerprint))
    }

    /// Query every representation and pool the hits, deduplicated by id.
    ///
    /// A failing sub-store degrades the outcome instead of failing the
    /// search; only an unbuilt index or every sub-store failing is an
    /// error.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<SearchOutcome> {
        if self.dense.is_empty() {
            return Err(IndexError::NotBuilt.into());
        }

        let query_vector = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Provider("no vector returned for query".to_string()))?;

        let mut outcome = SearchOutcome::default();
        let mut pooled: Vec<IndexHit> = Vec::new();

        match self.dense.search(&query_vector, top_k * 2) {
            Ok(hits) => pooled.extend(hits.into_iter().map(|s| to_hit(s, Representation::Dense))),
            Err(err) => {
                tracing::warn!(error = %err, "dense search failed");
                outcome.degraded = true;
            }
        }

        if let Some(sparse) = &self.sparse {
            pooled.extend(
                sparse
                    .search(query, top_k * 2)
                    .into_iter()
                    .map(|s| to_hit(s, Representation::Sparse)),
            );
        }

        match self.hierarchy.search(&query_vector, top_k) {
            Ok(hits) => {
                pooled.extend(hits.into_iter().map(|s| to_hit(s, Representation::Hierarchy)))
            }
            Err(err) => {
                tracing::warn!(error = %err, "hierarchy search failed");
                outcome.degraded = true;
            }
        }

        if pooled.is_empty() && outcome.degraded {
            return Err(IndexError::Search("every representation failed".to_string()).into());
        }

        let mut seen = HashSet::new();
        pooled.retain(|hit| seen.insert(hit.id.clone()));
        pooled.truncate(top_k * 3);

        outcome.hits = pooled;
        Ok(outcome)
    }

    pub fn is_built(&self) -> bool {
        !self.dense.is_empty()
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn hierarchy_len(&self) -> usize {
        self.hierarchy.len()
    }

    fn report(&self, reused: bool, fingerprint: String) -> BuildReport {
        BuildReport {
            reused,
            chunk_count: self.dense.len(),
            hierarchy_count: self.hierarchy.len(),
            sparse_count: self.sparse.as_ref().map_or(0, Bm25Index::len),
            fingerprint,
        }
    }

    fn try_reuse(&mut self, fingerprint: &str) -> bool {
        let meta_path = self.config.data_dir.join(META_FILE);
        if !meta_path.exists() {
            return false;
        }

        let meta: IndexMeta = match std::fs::read(&meta_path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()))
        {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(error = %err, "stored index metadata unreadable, rebuilding");
                return false;
            }
        };

        if meta.fingerprint != fingerprint || meta.dimension != self.embedder.dimension() {
            tracing::info!("stored index does not match current corpus, rebuilding");
            return false;
        }

        match self.load_stores() {
            Ok(()) if !self.dense.is_empty() => {
                self.fingerprint = Some(fingerprint.to_string());
                true
            }
            Ok(()) => {
                tracing::warn!("stored index is empty, rebuilding");
                false
            }
            Err(err) => {
                tracing::warn!(error = %err, "stored index failed to load, rebuilding");
                false
            }
        }
    }

    fn load_stores(&mut self) -> Result<()> {
        let dimension = self.embedder.dimension();
        self.dense = VectorStore::load(&self.config.data_dir.join(DENSE_FILE), dimension)?;
        self.hierarchy = VectorStore::load(&self.config.data_dir.join(HIERARCHY_FILE), dimension)?;
        self.sparse = if self.config.include_sparse {
            Some(Bm25Index::load(&self.config.data_dir.join(SPARSE_FILE))?)
        } else {
            None
        };
        Ok(())
    }

    async fn build_dense(&mut self, chunks: &[Chunk]) -> Result<()> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let deadline = Duration::from_secs(self.config.representation_timeout_secs);
        let vectors = tokio::time::timeout(deadline, self.embedder.embed(&texts))
            .await
            .map_err(|_| IndexError::Representation {
                name: "dense".to_string(),
                message: format!(
                    "embedding timed out after {}s",
                    self.config.representation_timeout_secs
                ),
            })??;

        let mut dense = VectorStore::new(self.embedder.dimension());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            dense.add(StoreEntry {
                id: chunk.id.clone(),
                text: chunk.text.clone(),
                vector,
                metadata: chunk_entry_metadata(chunk),
            })?;
        }
        self.dense = dense;
        Ok(())
    }

    /// Index summary nodes, deriving each vector as the centroid of its
    /// members one level down. Level 1 members are chunks and resolve
    /// through the dense store, so this embeds nothing.
    fn build_hierarchy(&mut self, nodes: &[HierarchyNode]) -> Result<()> {
        let mut summaries: Vec<&HierarchyNode> = nodes.iter().filter(|n| n.level > 0).collect();
        summaries.sort_by_key(|n| n.level);
        let top_level = summaries.iter().map(|n| n.level).max().unwrap_or(0);

        let mut hierarchy = VectorStore::new(self.embedder.dimension());
        let mut computed: HashMap<String, Vec<f32>> = HashMap::new();

        for node in summaries {
            let centroid = self.centroid_of(node, &computed)?;
            computed.insert(node.id.clone(), centroid.clone());

            if self.config.include_intermediate_levels || node.level == top_level {
                hierarchy.add(StoreEntry {
                    id: node.id.clone(),
                    text: node.text.clone(),
                    vector: centroid,
                    metadata: node_entry_metadata(node),
                })?;
            }
        }

        self.hierarchy = hierarchy;
        Ok(())
    }

    fn centroid_of(
        &self,
        node: &HierarchyNode,
        computed: &HashMap<String, Vec<f32>>,
    ) -> Result<Vec<f32>> {
        let mut sum = vec![0.0f32; self.embedder.dimension()];
        let mut count = 0usize;

        for member_id in &node.member_ids {
            let vector = computed
                .get(member_id)
                .map(|v| v.as_slice())
                .or_else(|| self.dense.get_vector(member_id))
                .ok_or_else(|| {
                    IndexError::Build(format!(
                        "summary {} references unknown member {member_id}",
                        node.id
                    ))
                })?;
            for (s, v) in sum.iter_mut().zip(vector) {
                *s += v;
            }
            count += 1;
        }

        if count == 0 {
            return Err(IndexError::Build(format!("summary {} has no members", node.id)).into());
        }
        for s in &mut sum {
            *s /= count as f32;
        }
        Ok(sum)
    }

    fn persist(&self, chunk_count: usize, node_count: usize, fingerprint: &str) -> Result<()> {
        std::fs::create_dir_all(&self.config.data_dir)
            .map_err(|e| IndexError::Persist(e.to_string()))?;

        self.dense.save(&self.config.data_dir.join(DENSE_FILE))?;
        self.hierarchy.save(&self.config.data_dir.join(HIERARCHY_FILE))?;
        if let Some(sparse) = &self.sparse {
            sparse.save(&self.config.data_dir.join(SPARSE_FILE))?;
        }

        let meta = IndexMeta {
            fingerprint: fingerprint.to_string(),
            dimension: self.embedder.dimension(),
            chunk_count,
            node_count,
            created_at: Utc::now(),
        };
        let bytes =
            serde_json::to_vec_pretty(&meta).map_err(|e| IndexError::Persist(e.to_string()))?;
        std::fs::write(self.config.data_dir.join(META_FILE), bytes)
            .map_err(|e| IndexError::Persist(e.to_string()))?;
        Ok(())
    }
}

/// Content identity of an index: chunk texts, node texts, and the
/// embedding provider that vectorized them.
fn compute_fingerprint(chunks: &[Chunk], nodes: &[HierarchyNode], embedder_id: &str) -> String {
    let mut chunk_hasher = Sha256::new();
    for chunk in chunks {
        chunk_hasher.update((chunk.text.len() as u64).to_le_bytes());
        chunk_hasher.update(chunk.text.as_bytes());
    }
    let mut node_hasher = Sha256::new();
    for node in nodes {
        node_hasher.update((node.text.len() as u64).to_le_bytes());
        node_hasher.update(node.text.as_bytes());
    }
    format!(
        "{:x}-{:x}-{}",
        chunk_hasher.finalize(),
        node_hasher.finalize(),
        embedder_id
    )
}

fn build_sparse(chunks: &[Chunk]) -> Bm25Index {
    let mut sparse = Bm25Index::new();
    for chunk in chunks {
        sparse.add(chunk.id.clone(), chunk.text.clone(), chunk_entry_metadata(chunk));
    }
    sparse
}

fn chunk_entry_metadata(chunk: &Chunk) -> Metadata {
    let mut metadata = chunk.metadata.clone();
    metadata.insert("source".to_string(), chunk.source.clone().into());
    metadata.insert("page".to_string(), chunk.page.into());
    metadata.insert("chunk_id".to_string(), chunk.id.clone().into());
    metadata
}

fn node_entry_metadata(node: &HierarchyNode) -> Metadata {
    let mut metadata = node.metadata.clone();
    metadata.insert("source".to_string(), node.source.clone().into());
    metadata.insert("page".to_string(), node.page.into());
    metadata
}

fn to_hit(scored: Scored, representation: Representation) -> IndexHit {
    IndexHit {
        id: scored.id,
        content: scored.text,
        similarity: scored.score,
        representation,
        metadata: scored.metadata,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    use docqa_core::Error;

    use crate::embeddings::{CountingEmbedder, SimpleEmbedder};

    fn sample_chunks() -> Vec<Chunk> {
        [
            "the warranty covers manufacturing defects for two years",
            "refunds are issued within thirty days of purchase",
            "shipping to most regions takes five business days",
            "support is reachable around the clock by email",
        ]
        .iter()
        .enumerate()
        .map(|(i, text)| Chunk::new(format!("guide_chunk_{i:04}"), *text, "guide.txt", 1))
        .collect()
    }

    fn wrap_level0(chunks: &[Chunk]) -> Vec<HierarchyNode> {
        chunks
            .iter()
            .map(|c| HierarchyNode {
                id: c.id.clone(),
                text: c.text.clone(),
                source: c.source.clone(),
                page: c.page,
                level: 0,
                member_ids: BTreeSet::new(),
                metadata: c.metadata.clone(),
            })
            .collect()
    }

    fn summary(id: &str, level: u32, members: &[&str], text: &str) -> HierarchyNode {
        HierarchyNode {
            id: id.to_string(),
            text: text.to_string(),
            source: "guide.txt".to_string(),
            page: 1,
            level,
            member_ids: members.iter().map(|m| m.to_string()).collect(),
            metadata: Metadata::new(),
        }
    }

    fn sample_nodes(chunks: &[Chunk]) -> Vec<HierarchyNode> {
        let mut nodes = wrap_level0(chunks);
        nodes.push(summary(
            "summary_1_0000",
            1,
            &["guide_chunk_0000", "guide_chunk_0001"],
            "warranty and refund policies",
        ));
        nodes.push(summary(
            "summary_1_0001",
            1,
            &["guide_chunk_0002", "guide_chunk_0003"],
            "shipping and support",
        ));
        nodes
    }

    fn test_config(dir: &std::path::Path) -> IndexConfig {
        IndexConfig {
            data_dir: dir.join("index"),
            ..IndexConfig::default()
        }
    }

    #[tokio::test]
    async fn test_build_and_search() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let chunks = sample_chunks();
        let nodes = sample_nodes(&chunks);

        let mut index = MultiRepresentationIndex::new(
            test_config(dir.path()),
            Arc::new(SimpleEmbedder::new(32)),
        );
        let report = index.build(&chunks, &nodes).await.expect("Should build");

        assert!(!report.reused);
        assert_eq!(report.chunk_count, 4);
        assert_eq!(report.hierarchy_count, 2);
        assert_eq!(report.sparse_count, 4);

        let outcome = index
            .search("how long do refunds take", 2)
            .await
            .expect("Should search");

        assert!(!outcome.degraded);
        assert!(!outcome.hits.is_empty());
        assert!(outcome.hits.len() <= 6);
        assert!(outcome
            .hits
            .iter()
            .any(|h| h.representation == Representation::Hierarchy));

        let mut seen = HashSet::new();
        for hit in &outcome.hits {
            assert!(seen.insert(hit.id.clone()), "duplicate id {}", hit.id);
            assert!(hit.metadata.get("source").is_some());
        }
    }

    #[tokio::test]
    async fn test_search_before_build_errors() {
        let index = MultiRepresentationIndex::new(
            IndexConfig::default(),
            Arc::new(SimpleEmbedder::new(32)),
        );

        let err = index.search("anything", 3).await.expect_err("Should fail");
        assert!(matches!(err, Error::Index(IndexError::NotBuilt)));
    }

    #[tokio::test]
    async fn test_empty_chunks_error() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let mut index = MultiRepresentationIndex::new(
            test_config(dir.path()),
            Arc::new(SimpleEmbedder::new(32)),
        );

        let err = index.build(&[], &[]).await.expect_err("Should fail");
        assert!(matches!(err, Error::Index(IndexError::Build(_))));
    }

    #[tokio::test]
    async fn test_reuse_skips_embedding() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let chunks = sample_chunks();
        let nodes = sample_nodes(&chunks);
        let embedder = Arc::new(CountingEmbedder::new(SimpleEmbedder::new(32)));

        let mut first =
            MultiRepresentationIndex::new(test_config(dir.path()), embedder.clone());
        let report = first.build(&chunks, &nodes).await.expect("Should build");
        assert!(!report.reused);
        assert_eq!(embedder.calls(), 1);

        let mut second =
            MultiRepresentationIndex::new(test_config(dir.path()), embedder.clone());
        let report = second.build(&chunks, &nodes).await.expect("Should reuse");

        assert!(report.reused);
        assert_eq!(report.chunk_count, 4);
        assert_eq!(report.hierarchy_count, 2);
        assert_eq!(embedder.calls(), 1, "reuse must not embed anything");
    }

    #[tokio::test]
    async fn test_changed_corpus_rebuilds() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let mut chunks = sample_chunks();
        let nodes = sample_nodes(&chunks);

        let mut first = MultiRepresentationIndex::new(
            test_config(dir.path()),
            Arc::new(SimpleEmbedder::new(32)),
        );
        let before = first.build(&chunks, &nodes).await.expect("Should build");

        chunks[0].text = "the warranty was extended to three years".to_string();
        let nodes = sample_nodes(&chunks);
        let mut second = MultiRepresentationIndex::new(
            test_config(dir.path()),
            Arc::new(SimpleEmbedder::new(32)),
        );
        let after = second.build(&chunks, &nodes).await.expect("Should rebuild");

        assert!(!after.reused);
        assert_ne!(before.fingerprint, after.fingerprint);
    }

    #[tokio::test]
    async fn test_corrupt_store_rebuilds() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let chunks = sample_chunks();
        let nodes = sample_nodes(&chunks);
        let config = test_config(dir.path());

        let mut first =
            MultiRepresentationIndex::new(config.clone(), Arc::new(SimpleEmbedder::new(32)));
        first.build(&chunks, &nodes).await.expect("Should build");

        std::fs::write(config.data_dir.join(DENSE_FILE), b"{half a store")
            .expect("Should overwrite");

        let mut second =
            MultiRepresentationIndex::new(config, Arc::new(SimpleEmbedder::new(32)));
        let report = second.build(&chunks, &nodes).await.expect("Should rebuild");

        assert!(!report.reused);
        assert!(second.is_built());
        let outcome = second.search("refunds", 2).await.expect("Should search");
        assert!(!outcome.hits.is_empty());
    }

    #[tokio::test]
    async fn test_sparse_can_be_disabled() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let chunks = sample_chunks();
        let nodes = sample_nodes(&chunks);
        let config = IndexConfig {
            include_sparse: false,
            ..test_config(dir.path())
        };

        let mut index =
            MultiRepresentationIndex::new(config.clone(), Arc::new(SimpleEmbedder::new(32)));
        let report = index.build(&chunks, &nodes).await.expect("Should build");

        assert_eq!(report.sparse_count, 0);
        assert!(!config.data_dir.join(SPARSE_FILE).exists());

        let outcome = index.search("refunds", 2).await.expect("Should search");
        assert!(outcome
            .hits
            .iter()
            .all(|h| h.representation != Representation::Sparse));
    }

    #[tokio::test]
    async fn test_intermediate_levels_toggle() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let chunks = sample_chunks();
        let mut nodes = sample_nodes(&chunks);
        nodes.push(summary(
            "summary_2_0000",
            2,
            &["summary_1_0000", "summary_1_0001"],
            "customer policies overview",
        ));

        let with_intermediate = IndexConfig {
            data_dir: dir.path().join("all-levels"),
            ..IndexConfig::default()
        };
        let mut index = MultiRepresentationIndex::new(
            with_intermediate,
            Arc::new(SimpleEmbedder::new(32)),
        );
        index.build(&chunks, &nodes).await.expect("Should build");
        assert_eq!(index.hierarchy_len(), 3);

        let top_only = IndexConfig {
            data_dir: dir.path().join("top-level"),
            include_intermediate_levels: false,
            ..IndexConfig::default()
        };
        let mut index =
            MultiRepresentationIndex::new(top_only, Arc::new(SimpleEmbedder::new(32)));
        index.build(&chunks, &nodes).await.expect("Should build");
        assert_eq!(index.hierarchy_len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_member_errors() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let chunks = sample_chunks();
        let mut nodes = wrap_level0(&chunks);
        nodes.push(summary("summary_1_0000", 1, &["missing_chunk"], "broken"));

        let mut index = MultiRepresentationIndex::new(
            test_config(dir.path()),
            Arc::new(SimpleEmbedder::new(32)),
        );
        let err = index.build(&chunks, &nodes).await.expect_err("Should fail");
        assert!(matches!(err, Error::Index(IndexError::Build(_))));
    }
}
