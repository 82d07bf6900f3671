use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use agent_framework::core::config::{AppPaths, Settings};
use agent_framework::llm::{ChatRequest, EmbeddingProvider, LlmError, LlmKind, LlmProvider};
use agent_framework::rag::SqliteVectorStore;
use agent_framework::server::router::router;
use agent_framework::state::AppState;

const DIMENSION: usize = 8;

/// Character-bucket embedding: similar texts land near each other.
struct BucketEmbedder;

#[async_trait]
impl EmbeddingProvider for BucketEmbedder {
    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(inputs
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; DIMENSION];
                for byte in text.bytes() {
                    vector[byte as usize % DIMENSION] += 1.0;
                }
                vector[0] += 1.0;
                vector
            })
            .collect())
    }
}

/// Answers every agent prompt with the same final answer.
struct CannedLlm {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LlmProvider for CannedLlm {
    fn name(&self) -> &str {
        "canned"
    }

    async fn chat(&self, request: ChatRequest, _kind: LlmKind) -> Result<String, LlmError> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt);
        Ok("Final Answer: Hello from the agent.".to_string())
    }
}

async fn app(root: &Path) -> Router {
    let paths = Arc::new(AppPaths::from_dirs(root.join("project"), root.join("data")));
    let mut settings = Settings::default();
    settings.ingest.extract_metadata = false;
    settings.ingest.output_dir = root.join("out").display().to_string();

    let store = Arc::new(
        SqliteVectorStore::with_path(root.join("vectors.db"))
            .await
            .unwrap(),
    );
    let llm = Arc::new(CannedLlm {
        prompts: Mutex::new(Vec::new()),
    });
    let state = AppState::build(paths, settings, store, llm, Arc::new(BucketEmbedder)).unwrap();
    router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn chat_assigns_guid_and_history_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let (status, body) = send(&app, post("/chat/", json!({ "user_input": "hello" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Hello from the agent.");
    assert_eq!(body["agent_name"], "AgentFramework");
    assert_eq!(
        body["agent_tools"],
        json!(["search_techdocs", "translate_to_jargon"])
    );
    let guid = body["chat_history_guid"].as_str().unwrap().to_string();
    assert_eq!(guid.len(), 36);

    let (status, history) = send(
        &app,
        get(&format!("/chat/history/?chat_history_guid={}", guid)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["chat_history_metadata"], json!([guid]));
    let contents = history["chat_history_contents"].as_array().unwrap();
    assert_eq!(contents.len(), 2);
    assert_eq!(contents[0]["type"], "human");
    assert_eq!(contents[0]["data"]["content"], "hello");
    assert_eq!(contents[1]["data"]["content"], "Hello from the agent.");

    let (status, listing) = send(&app, get("/chat/history/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        listing["chat_history_metadata"][0]["chat_history_guid"],
        guid.as_str()
    );
}

#[tokio::test]
async fn unknown_history_guid_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let (status, body) = send(&app, get("/chat/history/?chat_history_guid=nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "GUID not found, are you sure that exists?");
}

#[tokio::test]
async fn processed_documents_are_searchable() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;
    let source = dir.path().join("source");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("tokio.txt"), "Tokio is an asynchronous runtime for Rust.").unwrap();
    std::fs::write(source.join("notes.csv"), "a,b").unwrap();

    let request = json!({
        "source_dir": source.display().to_string(),
        "collection_name": "manuals",
        "move_after_processing": false,
        "re_process_files": false,
        "extensions_to_process": [".txt"]
    });
    let (status, body) = send(&app, post("/process-documents/", request.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Documents processed successfully");
    let tokio_path = source.join("tokio.txt").display().to_string();
    assert_eq!(body["successfully_processed_files"], json!([tokio_path]));
    assert_eq!(
        body["failed_to_process_files"],
        json!([source.join("notes.csv").display().to_string()])
    );

    let (_, again) = send(&app, post("/process-documents/", request)).await;
    assert_eq!(again["already_processed_files"], json!([tokio_path]));
    assert_eq!(again["successfully_processed_files"], json!([]));

    let (status, found) = send(
        &app,
        post(
            "/document-search/",
            json!({ "collection_name": "manuals", "user_input": "async runtime" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = found["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0]["text"].as_str().unwrap().contains("Tokio"));
}

#[tokio::test]
async fn searching_a_missing_collection_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let (status, body) = send(
        &app,
        post(
            "/document-search/",
            json!({ "collection_name": "absent", "user_input": "anything" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("absent"));
}

#[tokio::test]
async fn web_endpoints_reject_private_targets() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let (status, _) = send(
        &app,
        post("/load-web-document/", json!({ "url": "http://127.0.0.1:9/" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, post("/scrape/", json!({ "url": "ftp://example.com" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
