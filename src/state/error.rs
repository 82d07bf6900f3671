use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to initialize vector store: {0}")]
    VectorStore(#[source] anyhow::Error),

    #[error("Failed to initialize LLM provider: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("Failed to initialize web fetcher: {0}")]
    Web(#[source] anyhow::Error),

    #[error("Failed to load agent templates: {0}")]
    Templates(#[source] anyhow::Error),
}
