//! Agent Framework backend: document ingestion into a vector store, retrieval
//! tools and a ReAct chat agent served over HTTP.

pub mod agent;
pub mod core;
pub mod history;
pub mod ingest;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
pub mod tools;
pub mod web;

#[cfg(test)]
mod test_support;
