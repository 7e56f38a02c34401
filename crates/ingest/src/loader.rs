//! Corpus loading from the filesystem.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use docqa_core::{DocumentLoader, IngestError, LoadedDocument, Result};

/// Loader settings.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// File extensions to ingest, lowercase, without the dot
    pub extensions: Vec<String>,
    /// Per-file read budget; slower files are skipped
    pub file_timeout_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["txt".to_string(), "md".to_string()],
            file_timeout_secs: 300,
        }
    }
}

/// Reads UTF-8 text documents from a directory tree.
///
/// Files are visited in path order, so repeated loads of the same corpus
/// produce identical document sequences. Unreadable, empty, or slow files
/// are skipped with a warning instead of failing the load.
pub struct FsLoader {
    root: PathBuf,
    config: LoaderConfig,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config: LoaderConfig::default(),
        }
    }

    pub fn with_config(root: impl Into<PathBuf>, config: LoaderConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    fn collect_files(&self, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        for path in entries {
            if path.is_dir() {
                self.collect_files(&path, out)?;
            } else if self.wants(&path) {
                out.push(path);
            }
        }
        Ok(())
    }

    fn wants(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.config.extensions.iter().any(|wanted| wanted == &ext)
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl DocumentLoader for FsLoader {
    async fn load(&self) -> Result<Vec<LoadedDocument>> {
        if !self.root.is_dir() {
            return Err(IngestError::CorpusNotFound(self.root.display().to_string()).into());
        }

        let mut files = Vec::new();
        self.collect_files(&self.root, &mut files)?;

        let timeout = Duration::from_secs(self.config.file_timeout_secs);
        let mut documents = Vec::with_capacity(files.len());

        for path in files {
            let source = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("unknown")
                .to_string();

            match tokio::time::timeout(timeout, tokio::fs::read_to_string(&path)).await {
                Ok(Ok(text)) => {
                    if text.trim().is_empty() {
                        tracing::warn!(path = %path.display(), "skipping empty document");
                        continue;
                    }
                    documents.push(LoadedDocument::new(source, text));
                }
                Ok(Err(err)) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable document");
                }
                Err(_) => {
                    tracing::warn!(
                        path = %path.display(),
                        timeout_secs = self.config.file_timeout_secs,
                        "skipping document that took too long to read"
                    );
                }
            }
        }

        tracing::info!(count = documents.len(), root = %self.root.display(), "loaded corpus");
        Ok(documents)
    }
}

/// Loader over in-memory documents, for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    documents: Vec<LoadedDocument>,
}

impl MemoryLoader {
    pub fn new(documents: Vec<LoadedDocument>) -> Self {
        Self { documents }
    }

    pub fn from_texts(texts: &[(&str, &str)]) -> Self {
        Self {
            documents: texts
                .iter()
                .map(|(source, text)| LoadedDocument::new(*source, *text))
                .collect(),
        }
    }
}

#[async_trait]
impl DocumentLoader for MemoryLoader {
    async fn load(&self) -> Result<Vec<LoadedDocument>> {
        Ok(self.documents.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Should create parent dirs");
        }
        std::fs::write(path, content).expect("Should write fixture");
    }

    #[tokio::test]
    async fn test_loads_matching_files_in_path_order() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        write(dir.path(), "b.md", "markdown body");
        write(dir.path(), "a.txt", "plain body");
        write(dir.path(), "c.pdf", "binaryish");
        write(dir.path(), "sub/d.txt", "nested body");

        let loader = FsLoader::new(dir.path());
        let documents = loader.load().await.expect("Should load corpus");

        let sources: Vec<&str> = documents.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["a.txt", "b.md", "d.txt"]);
        assert_eq!(documents[0].text, "plain body");
        assert_eq!(documents[0].page, 1);
    }

    #[tokio::test]
    async fn test_empty_files_are_skipped() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        write(dir.path(), "empty.txt", "   \n");
        write(dir.path(), "real.txt", "content");

        let loader = FsLoader::new(dir.path());
        let documents = loader.load().await.expect("Should load corpus");

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].source, "real.txt");
    }

    #[tokio::test]
    async fn test_missing_directory_errors() {
        let loader = FsLoader::new("/nonexistent/docqa-corpus");
        let err = loader.load().await.expect_err("Should fail on missing dir");
        assert!(matches!(
            err,
            docqa_core::Error::Ingest(IngestError::CorpusNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_loader() {
        let loader = MemoryLoader::from_texts(&[("a.txt", "alpha"), ("b.txt", "beta")]);
        let documents = loader.load().await.expect("Should load");
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1].source, "b.txt");
    }
}
