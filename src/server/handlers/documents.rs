use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::errors::{error_chain, ApiError};
use crate::ingest::LoadOptions;
use crate::rag::RankedDocument;
use crate::state::AppState;

/// Every field is optional; omitted ones come from the `ingest` settings.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessDocumentsRequest {
    pub source_dir: Option<String>,
    pub collection_name: Option<String>,
    pub move_after_processing: Option<bool>,
    pub re_process_files: Option<bool>,
    pub extensions_to_process: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ProcessDocumentsResponse {
    pub status: String,
    pub message: String,
    pub successfully_processed_files: Vec<String>,
    pub failed_to_process_files: Vec<String>,
    pub already_processed_files: Vec<String>,
}

impl ProcessDocumentsRequest {
    fn into_options(self, state: &AppState) -> LoadOptions {
        let defaults = &state.settings.ingest;
        let source_dir = self.source_dir.unwrap_or_else(|| defaults.source_dir.clone());
        LoadOptions {
            source_dir: state.paths.resolve(&source_dir),
            collection_name: self
                .collection_name
                .unwrap_or_else(|| defaults.collection_name.clone()),
            move_after_processing: self
                .move_after_processing
                .unwrap_or(defaults.move_after_processing),
            re_process_files: self.re_process_files.unwrap_or(defaults.re_process_files),
            extensions_to_process: self
                .extensions_to_process
                .unwrap_or_else(|| defaults.extensions_to_process.clone()),
        }
    }
}

pub async fn process_documents(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProcessDocumentsRequest>,
) -> Result<Json<ProcessDocumentsResponse>, ApiError> {
    let options = body.into_options(&state);
    tracing::info!(
        "Processing documents from {} into '{}'",
        options.source_dir.display(),
        options.collection_name
    );

    let processed = state.loader.load_documents(&options).await.map_err(|err| {
        tracing::error!("Error processing documents: {}", error_chain(&err));
        ApiError::from(err)
    })?;

    Ok(Json(ProcessDocumentsResponse {
        status: "success".to_string(),
        message: "Documents processed successfully".to_string(),
        successfully_processed_files: processed.successfully_processed,
        failed_to_process_files: processed.failed_to_process,
        already_processed_files: processed.already_processed,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DocumentSearchRequest {
    pub collection_name: String,
    pub user_input: String,
}

pub async fn document_search(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DocumentSearchRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.user_input.trim().is_empty() {
        return Err(ApiError::BadRequest("user_input must not be empty".to_string()));
    }
    let results: Vec<RankedDocument> = state
        .search
        .search_documents(&body.collection_name, &body.user_input)
        .await
        .map_err(|err| {
            tracing::error!("Error searching documents: {}", error_chain(&err));
            ApiError::BadRequest(error_chain(&err))
        })?;
    Ok(Json(json!({ "results": results })))
}
