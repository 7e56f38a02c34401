//! docqa entry point.
//!
//! Subcommands:
//!
//! - `build`: load the corpus and build (or reuse) the index
//! - `ask`: answer a question from the indexed corpus
//! - `info`: print the effective configuration

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use docqa_cache::{Cache, CacheBackendKind, CacheConfig};
use docqa_config::{load_settings, Settings};
use docqa_core::Result;
use docqa_ingest::{ChunkerConfig, FsLoader, LoaderConfig};
use docqa_llm::{GeneratorConfig, OllamaGenerator};
use docqa_pipeline::{PipelineConfig, RagPipeline};
use docqa_retrieval::{
    create_embedding_provider, EmbeddingConfig, EmbeddingProviderKind, HierarchyConfig,
    IndexConfig, RetrievalConfig, RetryConfig, TransformerConfig,
};

#[derive(Parser)]
#[command(name = "docqa")]
#[command(version)]
#[command(about = "Question answering over a private document corpus")]
struct Cli {
    /// Configuration environment; reads config/{env}.toml over the defaults
    #[arg(long, global = true, default_value = "default")]
    env: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the corpus and build or reuse the index
    Build,
    /// Answer a question from the indexed corpus
    Ask {
        question: String,
        /// Answer language, defaults to the question's language
        #[arg(long)]
        language: Option<String>,
    },
    /// Print the effective configuration as JSON
    Info,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match load_settings(&cli.env) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(2);
        }
    };

    init_tracing(&settings);

    if let Err(err) = run(cli.command, settings).await {
        tracing::error!(error = %err, "command failed");
        std::process::exit(1);
    }
}

fn init_tracing(settings: &Settings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.observability.log_level));

    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn run(command: Command, settings: Settings) -> Result<()> {
    match command {
        Command::Build => {
            let pipeline = assemble(&settings)?;
            let summary = pipeline.build().await?;
            println!(
                "indexed {} documents as {} chunks and {} summary nodes{}",
                summary.documents,
                summary.chunks,
                summary.hierarchy_nodes,
                if summary.index_reused {
                    " (reused persisted index)"
                } else {
                    ""
                },
            );
        }
        Command::Ask { question, language } => {
            let pipeline = assemble(&settings)?;
            pipeline.build().await?;

            let answer = pipeline.answer(&question, language.as_deref()).await?;
            println!("{}", answer.text);
            if !answer.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &answer.sources {
                    println!(
                        "  {} (page {}, similarity {:.3})",
                        source.source, source.page, source.similarity
                    );
                }
            }
            if answer.partial {
                eprintln!("note: some retrieval strategies failed, context may be incomplete");
            }
        }
        Command::Info => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }
    Ok(())
}

/// Wire a pipeline from settings: real HTTP providers, filesystem
/// corpus, and the configured cache backend.
fn assemble(settings: &Settings) -> Result<RagPipeline> {
    let kind = match settings.embedding.provider.as_str() {
        "simple" => EmbeddingProviderKind::Simple,
        _ => EmbeddingProviderKind::Ollama,
    };
    let embedder = create_embedding_provider(
        kind,
        EmbeddingConfig {
            endpoint: settings.embedding.endpoint.clone(),
            model: settings.embedding.model.clone(),
            dimension: settings.embedding.dimension,
            batch_size: settings.embedding.batch_size,
        },
        RetryConfig {
            timeout_secs: settings.embedding.timeout_secs,
            max_attempts: settings.embedding.max_retries,
            ..RetryConfig::default()
        },
        settings.embedding.cache_capacity,
    );

    let generator = Arc::new(OllamaGenerator::new(GeneratorConfig {
        endpoint: settings.generation.endpoint.clone(),
        model: settings.generation.model.clone(),
        timeout_secs: settings.generation.timeout_secs,
    })?);

    let loader = Arc::new(FsLoader::with_config(
        settings.corpus.dir.clone(),
        LoaderConfig {
            extensions: settings.corpus.extensions.clone(),
            file_timeout_secs: settings.corpus.file_timeout_secs,
        },
    ));

    let backend = match settings.cache.backend.as_str() {
        "disk" => CacheBackendKind::Disk,
        "disabled" => CacheBackendKind::Disabled,
        _ => CacheBackendKind::Memory,
    };
    let cache = Cache::from_config(&CacheConfig {
        backend,
        capacity: settings.cache.capacity,
        dir: settings.cache.dir.clone(),
    })?;

    RagPipeline::builder()
        .loader(loader)
        .embedder(embedder)
        .generator(generator)
        .cache(cache)
        .chunker_config(ChunkerConfig {
            chunk_size: settings.chunking.chunk_size,
            chunk_overlap: settings.chunking.chunk_overlap,
        })
        .hierarchy_config(HierarchyConfig {
            max_levels: settings.hierarchy.max_levels,
            cluster_threshold: settings.hierarchy.cluster_threshold,
            max_clusters: settings.hierarchy.max_clusters,
            kmeans_max_iter: settings.hierarchy.kmeans_max_iter,
        })
        .index_config(IndexConfig {
            data_dir: PathBuf::from(&settings.index.data_dir),
            include_sparse: settings.index.include_sparse,
            include_intermediate_levels: settings.index.include_intermediate_levels,
            representation_timeout_secs: settings.index.representation_timeout_secs,
        })
        .transformer_config(TransformerConfig {
            temperature: settings.generation.transform_temperature,
            max_expansions: settings.retrieval.max_expansions,
            max_sub_questions: settings.retrieval.max_sub_questions,
        })
        .retrieval_config(RetrievalConfig {
            top_k: settings.retrieval.top_k,
            rrf_k: settings.retrieval.rrf_k,
            rerank: settings.retrieval.rerank,
        })
        .pipeline_config(PipelineConfig {
            index_language: settings.corpus.language.clone(),
            answer_temperature: settings.generation.temperature,
            max_prompt_chars: settings.generation.max_prompt_chars,
        })
        .build()
}
