//! Vector storage and retrieval.
//!
//! This module provides:
//! - `VectorStore`: collection-scoped vector database interface
//! - `QdrantStore` / `SqliteVectorStore`: remote and embedded backends
//! - `TextSplitter`: chunking ahead of embedding
//! - `DocumentSearch`: retrieval with LLM reranking

pub mod chunking;
pub mod math;
pub mod qdrant;
pub mod search;
pub mod sqlite;
pub mod store;

use thiserror::Error;

pub use chunking::{SplitterConfig, TextChunk, TextSplitter};
pub use qdrant::QdrantStore;
pub use search::{DocumentSearch, RankedDocument, SearchError};
pub use sqlite::SqliteVectorStore;
pub use store::{wait_until_available, PayloadFilter, SearchHit, VectorPoint, VectorStore};

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector store request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("vector store returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("vector database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("collection '{0}' does not exist")]
    CollectionNotFound(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid vector: {0}")]
    InvalidVector(String),

    #[error("unexpected vector store response: {0}")]
    InvalidResponse(String),

    #[error("vector store unavailable after {attempts} attempts: {message}")]
    Unavailable { attempts: u32, message: String },

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
