use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub message: String,
    pub full_file_path: Option<String>,
}

pub async fn load_web_document(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UrlRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    tracing::info!("Load Web Doc endpoint triggered");
    let collection = &state.settings.tools.web_document_collection;
    let report = state
        .web_loader
        .load(body.url.trim(), collection, false)
        .await?;

    let message = if report.skipped {
        format!("{} is already loaded into '{}'", body.url.trim(), collection)
    } else {
        "Web document loaded successfully".to_string()
    };
    Ok(Json(MessageResponse { message }))
}

pub async fn scrape(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UrlRequest>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    tracing::info!("Scrape endpoint triggered");
    let path = state.scraper.scrape(body.url.trim()).await?;
    Ok(Json(ScrapeResponse {
        message: "Scraping completed successfully".to_string(),
        full_file_path: Some(path.display().to_string()),
    }))
}
