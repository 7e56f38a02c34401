//! End-to-end orchestration: load, chunk, cluster, index, answer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use docqa_cache::{Cache, CacheKey};
use docqa_core::{
    DocumentLoader, EmbeddingProvider, Error, GenerationRequest, GenerativeModel, IngestError,
    NoopTranslator, PipelineError, Result, Translator,
};
use docqa_ingest::{ChunkerConfig, TextChunker};
use docqa_llm::AnswerPromptBuilder;
use docqa_retrieval::{
    HierarchicalClusterer, HierarchyConfig, IndexConfig, LlmReranker, MultiRepresentationIndex,
    QueryTransformer, RerankerConfig, RetrievalConfig, RetrievalOutcome, RetrievalSystem,
    TransformerConfig,
};

use crate::answer::{Answer, SourceDetail};
use crate::events::PipelineEvent;

/// Answering behavior of [`RagPipeline`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Language the corpus is indexed in
    pub index_language: String,
    pub answer_temperature: f32,
    /// Grapheme budget for the answer prompt
    pub max_prompt_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            index_language: "en".to_string(),
            answer_temperature: 0.1,
            max_prompt_chars: 24_000,
        }
    }
}

/// What the last build produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSummary {
    pub documents: usize,
    pub chunks: usize,
    pub hierarchy_nodes: usize,
    pub index_reused: bool,
    pub built_at: DateTime<Utc>,
}

#[derive(Default)]
struct PipelineState {
    built: bool,
    summary: Option<BuildSummary>,
}

/// The document QA pipeline: a corpus in, grounded answers out.
///
/// Built from injected providers so the same orchestration runs against
/// a local model server or against in-process test doubles.
pub struct RagPipeline {
    loader: Arc<dyn DocumentLoader>,
    chunker: TextChunker,
    clusterer: HierarchicalClusterer,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerativeModel>,
    translator: Arc<dyn Translator>,
    retrieval: RetrievalSystem,
    cache: Cache,
    config: PipelineConfig,
    state: RwLock<PipelineState>,
    events: broadcast::Sender<PipelineEvent>,
}

/// Assembles a [`RagPipeline`] from providers and settings.
///
/// Loader, embedder, and generator are required; everything else has a
/// sensible default (no translation, no caching).
#[derive(Default)]
pub struct PipelineBuilder {
    loader: Option<Arc<dyn DocumentLoader>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn GenerativeModel>>,
    translator: Option<Arc<dyn Translator>>,
    cache: Option<Cache>,
    chunker: ChunkerConfig,
    hierarchy: HierarchyConfig,
    index: IndexConfig,
    transformer: TransformerConfig,
    reranker: RerankerConfig,
    retrieval: RetrievalConfig,
    pipeline: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn GenerativeModel>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn chunker_config(mut self, config: ChunkerConfig) -> Self {
        self.chunker = config;
        self
    }

    pub fn hierarchy_config(mut self, config: HierarchyConfig) -> Self {
        self.hierarchy = config;
        self
    }

    pub fn index_config(mut self, config: IndexConfig) -> Self {
        self.index = config;
        self
    }

    pub fn transformer_config(mut self, config: TransformerConfig) -> Self {
        self.transformer = config;
        self
    }

    pub fn reranker_config(mut self, config: RerankerConfig) -> Self {
        self.reranker = config;
        self
    }

    pub fn retrieval_config(mut self, config: RetrievalConfig) -> Self {
        self.retrieval = config;
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline = config;
        self
    }

    pub fn build(self) -> Result<RagPipeline> {
        let loader = self
            .loader
            .ok_or_else(|| Error::config("pipeline needs a document loader"))?;
        let embedder = self
            .embedder
            .ok_or_else(|| Error::config("pipeline needs an embedding provider"))?;
        let generator = self
            .generator
            .ok_or_else(|| Error::config("pipeline needs a generative model"))?;
        let translator = self
            .translator
            .unwrap_or_else(|| Arc::new(NoopTranslator));
        let cache = self.cache.unwrap_or_else(Cache::disabled);

        let index = MultiRepresentationIndex::new(self.index, embedder.clone());
        let retrieval = RetrievalSystem::new(
            Arc::new(RwLock::new(index)),
            QueryTransformer::new(generator.clone(), self.transformer),
            LlmReranker::new(generator.clone(), self.reranker),
            self.retrieval,
        );
        let (events, _) = broadcast::channel(64);

        Ok(RagPipeline {
            loader,
            chunker: TextChunker::new(self.chunker),
            clusterer: HierarchicalClusterer::new(self.hierarchy),
            embedder,
            generator,
            translator,
            retrieval,
            cache,
            config: self.pipeline,
            state: RwLock::new(PipelineState::default()),
            events,
        })
    }
}

impl RagPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Subscribe to progress events. Safe to call at any time; events
    /// sent before the first subscriber are dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: PipelineEvent) {
        let _ = self.events.send(event);
    }

    /// Load the corpus, build the summary hierarchy, and index
    /// everything. Must run before [`retrieve`](Self::retrieve) or
    /// [`answer`](Self::answer).
    pub async fn build(&self) -> Result<BuildSummary> {
        let mut state = self.state.write().await;
        self.emit(PipelineEvent::BuildStarted);

        let documents = self.loader.load().await?;
        if documents.is_empty() {
            return Err(IngestError::EmptyCorpus("no loadable documents".to_string()).into());
        }
        self.emit(PipelineEvent::DocumentsLoaded {
            count: documents.len(),
        });
        tracing::info!(documents = documents.len(), "corpus loaded");

        let chunks = self.chunker.chunk_documents(&documents);
        if chunks.is_empty() {
            return Err(IngestError::EmptyCorpus("corpus produced no chunks".to_string()).into());
        }
        self.emit(PipelineEvent::ChunksCreated {
            count: chunks.len(),
        });
        tracing::info!(chunks = chunks.len(), "corpus chunked");

        let nodes = self.clusterer.build(&chunks, &self.embedder).await?;
        let summaries = nodes.iter().filter(|n| n.level > 0).count();
        self.emit(PipelineEvent::HierarchyBuilt { nodes: summaries });

        let report = {
            let mut index = self.retrieval.index().write().await;
            index.build(&chunks, &nodes).await?
        };
        self.emit(PipelineEvent::IndexReady {
            reused: report.reused,
        });

        let summary = BuildSummary {
            documents: documents.len(),
            chunks: chunks.len(),
            hierarchy_nodes: summaries,
            index_reused: report.reused,
            built_at: Utc::now(),
        };
        state.built = true;
        state.summary = Some(summary.clone());
        tracing::info!(
            documents = summary.documents,
            chunks = summary.chunks,
            hierarchy_nodes = summary.hierarchy_nodes,
            index_reused = summary.index_reused,
            "pipeline ready"
        );
        Ok(summary)
    }

    /// Retrieve ranked supporting context for a question.
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalOutcome> {
        self.ensure_built().await?;
        self.cached_retrieve(question).await
    }

    async fn cached_retrieve(&self, query: &str) -> Result<RetrievalOutcome> {
        let key = CacheKey::new("retrieve")
            .push(query)
            .push(&self.retrieval.config().top_k.to_string())
            .push(&self.embedder.identifier())
            .push(&self.generator.identifier())
            .finish();
        self.cache
            .get_or_compute(&key, || async { self.retrieval.retrieve(query).await })
            .await
    }

    /// Answer a question from the indexed corpus.
    ///
    /// `target_language` overrides the detected question language for
    /// the answer itself. Answers are cached by question, answer
    /// language, and result count.
    pub async fn answer(&self, question: &str, target_language: Option<&str>) -> Result<Answer> {
        self.ensure_built().await?;

        let detected = self.translator.detect_language(question);
        let target = target_language.unwrap_or(&detected).to_string();

        let key = CacheKey::new("answer")
            .push(question)
            .push(&target)
            .push(&self.retrieval.config().top_k.to_string())
            .push(&self.embedder.identifier())
            .push(&self.generator.identifier())
            .finish();

        let computed = AtomicBool::new(false);
        let answer = self
            .cache
            .get_or_compute(&key, || async {
                computed.store(true, Ordering::Relaxed);
                self.answer_uncached(question, &detected, &target).await
            })
            .await?;

        self.emit(PipelineEvent::AnswerProduced {
            cached: !computed.load(Ordering::Relaxed),
        });
        Ok(answer)
    }

    async fn answer_uncached(&self, question: &str, detected: &str, target: &str) -> Result<Answer> {
        // search in the corpus language, answer in the caller's
        let search_query = if detected != self.config.index_language {
            self.translator
                .translate(question, &self.config.index_language)
                .await?
        } else {
            question.to_string()
        };

        let outcome = self.cached_retrieve(&search_query).await?;

        let mut builder = AnswerPromptBuilder::new(&search_query).with_results(&outcome.results);
        if target != self.config.index_language {
            builder = builder.with_language(target);
        }
        let prompt = builder.build_with_limit(self.config.max_prompt_chars);

        let request =
            GenerationRequest::new(prompt).with_temperature(self.config.answer_temperature);
        let text = self.generator.complete(&request).await?;

        Ok(Answer {
            text,
            sources: outcome.results.iter().map(SourceDetail::from_result).collect(),
            source_language: detected.to_string(),
            partial: outcome.partial,
        })
    }

    /// Summary of the last successful build, if any.
    pub async fn summary(&self) -> Option<BuildSummary> {
        self.state.read().await.summary.clone()
    }

    async fn ensure_built(&self) -> Result<()> {
        if self.state.read().await.built {
            Ok(())
        } else {
            Err(PipelineError::NotInitialized.into())
        }
    }
}
