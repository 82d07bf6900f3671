use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, documents, health, history, web};
use crate::state::AppState;

/// Creates the application router: chat, history, document ingestion and
/// search, web loading and scraping, wrapped in CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.settings.server.cors_allowed_origins);
    Router::new()
        .route("/health", get(health::health))
        .route("/chat/", post(chat::chat))
        .route("/chat/history/", get(history::chat_history))
        .route("/process-documents/", post(documents::process_documents))
        .route("/document-search/", post(documents::document_search))
        .route("/load-web-document/", post(web::load_web_document))
        .route("/scrape/", post(web::scrape))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(configured: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(resolve_allow_origin(configured))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

/// `"*"` anywhere in the list allows every origin. An empty or unusable
/// list falls back to the local development origins.
fn resolve_allow_origin(configured: &[String]) -> AllowOrigin {
    let origins = configured
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .collect::<Vec<_>>();

    if origins.iter().any(|origin| *origin == "*") {
        return AllowOrigin::any();
    }

    let parsed = origins
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    if parsed.is_empty() {
        return AllowOrigin::list(
            default_local_origins()
                .into_iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        );
    }
    AllowOrigin::list(parsed)
}

fn default_local_origins() -> Vec<&'static str> {
    vec![
        "http://localhost",
        "http://localhost:3000",
        "http://localhost:8000",
        "http://127.0.0.1",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8000",
    ]
}
