//! Document ingestion: file discovery, change detection, presentation
//! conversion, reading, chunking and indexing.

pub mod convert;
pub mod hash_store;
pub mod hashing;
pub mod indexer;
pub mod loader;
pub mod metadata;
pub mod reader;
pub mod scraper;
pub mod web_loader;

use std::path::PathBuf;

use thiserror::Error;

use crate::llm::LlmError;
use crate::rag::VectorStoreError;
use crate::web::FetchError;

pub use convert::{ConversionError, ConversionResult, PptxConverter};
pub use hash_store::FileHashStore;
pub use hashing::{hash_file, hash_file_async};
pub use indexer::{IndexReport, Indexer, Node};
pub use loader::{DocumentLoader, LoadOptions, ProcessedFiles, REPROCESS_SENTINEL};
pub use metadata::MetadataExtractor;
pub use reader::{read_file, Document};
pub use scraper::Scraper;
pub use web_loader::{WebDocumentLoader, WebLoadReport};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("vector store error: {0}")]
    Store(#[from] VectorStoreError),

    #[error("embedding failed: {0}")]
    Embedding(#[source] LlmError),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("web fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl IngestError {
    /// Short category used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Store(_) => "vector_store",
            IngestError::Embedding(_) => "embedding",
            IngestError::Io { .. } => "io",
            IngestError::Parse { .. } => "parse",
            IngestError::Fetch(_) => "fetch",
            IngestError::Task(_) => "task",
        }
    }
}
