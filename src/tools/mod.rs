//! Agent-callable tools and the registry the agent selects from.

pub mod documents;
pub mod jargon;
pub mod registry;
pub mod search;
pub mod wikipedia;

use async_trait::async_trait;
use thiserror::Error;

use crate::ingest::IngestError;
use crate::llm::LlmError;
use crate::rag::SearchError;

pub use documents::{DocumentSearchTool, LoadWebDocumentTool};
pub use jargon::JargonTool;
pub use registry::{ToolDeps, ToolRegistry};
pub use search::{DuckDuckGoSource, DuckDuckGoTool, SerpApiTool};
pub use wikipedia::WikipediaTool;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid tool input: {0}")]
    InvalidInput(String),

    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("{service} returned {status}")]
    Upstream { service: String, status: u16 },

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Shown to the model verbatim in the tool list.
    fn description(&self) -> &str;

    async fn invoke(&self, input: &str) -> Result<String, ToolError>;
}

pub(crate) fn require_input(input: &str) -> Result<&str, ToolError> {
    let trimmed = input.trim().trim_matches('"').trim();
    if trimmed.is_empty() {
        return Err(ToolError::InvalidInput("input is empty".to_string()));
    }
    Ok(trimmed)
}
