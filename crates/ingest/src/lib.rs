//! Corpus ingestion: loading documents and splitting them into chunks.

pub mod chunker;
pub mod loader;

pub use chunker::{ChunkerConfig, TextChunker};
pub use loader::{FsLoader, LoaderConfig, MemoryLoader};
