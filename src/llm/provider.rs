use async_trait::async_trait;

use super::types::{ChatRequest, LlmKind};
use super::LlmError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "azure_openai")
    fn name(&self) -> &str;

    /// chat completion routed to the deployment behind `kind`
    async fn chat(&self, request: ChatRequest, kind: LlmKind) -> Result<String, LlmError>;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// length of every vector returned by `embed`
    fn dimension(&self) -> usize;

    /// one vector per input, in input order
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}
