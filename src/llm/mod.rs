pub mod azure;
pub mod provider;
pub mod types;

use thiserror::Error;

pub use azure::AzureOpenAiProvider;
pub use provider::{EmbeddingProvider, LlmProvider};
pub use types::{ChatMessage, ChatRequest, LlmKind};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured for the LLM provider")]
    MissingApiKey,

    #[error("LLM request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("LLM provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("unexpected LLM response: {0}")]
    InvalidResponse(String),
}
