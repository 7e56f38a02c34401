//! Trait seams for injected providers.
//!
//! Components depend on these traits rather than concrete clients, so a
//! pipeline can be assembled from remote services or from in-process
//! test doubles:
//!
//! - [`EmbeddingProvider`]: text to dense vectors
//! - [`GenerativeModel`]: prompt to completion
//! - [`DocumentLoader`]: corpus enumeration
//! - [`Translator`]: language detection and translation

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{GenerationRequest, LoadedDocument};

/// Turns texts into dense vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Stable identity for fingerprinting indexes built with this provider.
    fn identifier(&self) -> String;

    /// Output vector dimension.
    fn dimension(&self) -> usize;
}

#[async_trait]
impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<T> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed(texts).await
    }

    fn identifier(&self) -> String {
        (**self).identifier()
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

/// Produces completions for prompts.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn complete(&self, request: &GenerationRequest) -> Result<String>;

    /// Stable identity of the underlying model.
    fn identifier(&self) -> String;
}

#[async_trait]
impl<T: GenerativeModel + ?Sized> GenerativeModel for Arc<T> {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        (**self).complete(request).await
    }

    fn identifier(&self) -> String {
        (**self).identifier()
    }
}

/// Enumerates the documents of a corpus.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self) -> Result<Vec<LoadedDocument>>;
}

/// Detects languages and translates text between them.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Best-effort language detection, returning an ISO 639-1 code.
    fn detect_language(&self, text: &str) -> String;

    async fn translate(&self, text: &str, target: &str) -> Result<String>;
}

/// Translator that reports English and passes text through unchanged.
#[derive(Debug, Default, Clone)]
pub struct NoopTranslator;

#[async_trait]
impl Translator for NoopTranslator {
    fn detect_language(&self, _text: &str) -> String {
        "en".to_string()
    }

    async fn translate(&self, text: &str, _target: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_translator_passthrough() {
        let translator = NoopTranslator;

        assert_eq!(translator.detect_language("Bonjour"), "en");

        let translated = translator
            .translate("hello world", "fr")
            .await
            .expect("Should translate");
        assert_eq!(translated, "hello world");
    }
}
