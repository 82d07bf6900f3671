//! Deterministic stand-ins for the LLM and embedding services.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::llm::{ChatRequest, EmbeddingProvider, LlmError, LlmKind, LlmProvider};

/// Hashes each lowercase word into a bucket; texts sharing words end up close.
pub struct FakeEmbedder {
    dimension: usize,
    fail: bool,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
        }
    }

    pub fn failing(dimension: usize) -> Self {
        Self {
            dimension,
            fail: true,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if self.fail {
            return Err(LlmError::Provider {
                status: 503,
                message: "embedding service down".to_string(),
            });
        }

        Ok(inputs
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.dimension];
                for word in text.split_whitespace() {
                    let digest = Sha256::digest(word.to_lowercase().as_bytes());
                    vector[digest[0] as usize % self.dimension] += 1.0;
                }
                if vector.iter().all(|v| *v == 0.0) {
                    vector[0] = 1.0;
                }
                vector
            })
            .collect())
    }
}

/// Replays queued answers in order, then repeats the fallback.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    fallback: String,
    requests: Mutex<Vec<(ChatRequest, LlmKind)>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: "Final Answer: done".to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, fallback: &str) -> Self {
        self.fallback = fallback.to_string();
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<(ChatRequest, LlmKind)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest, kind: LlmKind) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push((request, kind));
        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Serves fixed HTML bodies by path on an ephemeral local port and returns
/// the base URL. Unknown paths answer 404.
pub async fn serve_pages(pages: Vec<(&'static str, &'static str)>) -> String {
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::http::{header, StatusCode, Uri};
    use axum::response::IntoResponse;

    let pages = Arc::new(pages.into_iter().collect::<HashMap<_, _>>());
    let app = axum::Router::new().fallback(move |uri: Uri| {
        let pages = pages.clone();
        async move {
            match pages.get(uri.path()) {
                Some(body) => (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    *body,
                )
                    .into_response(),
                None => StatusCode::NOT_FOUND.into_response(),
            }
        }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}
