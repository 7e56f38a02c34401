//! Configuration loading for docqa.
//!
//! Settings are layered: `config/default.toml`, then `config/{env}.toml`,
//! then `DOCQA__SECTION__KEY` environment variables.

pub mod settings;

pub use settings::{
    load_settings, CacheSettings, ChunkingSettings, CorpusSettings, EmbeddingSettings,
    GenerationSettings, HierarchySettings, IndexSettings, ObservabilitySettings,
    RetrievalSettings, Settings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
