use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

pub const GUID_NOT_FOUND: &str = "GUID not found, are you sure that exists?";

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub chat_history_guid: Option<String>,
}

/// Lists every conversation's metadata, or returns one conversation when a
/// guid is given.
pub async fn chat_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let store = state.agent.history();
    let guid = query
        .chat_history_guid
        .map(|guid| guid.trim().to_string())
        .filter(|guid| !guid.is_empty());

    let Some(guid) = guid else {
        let metadata = store.list().await?;
        return Ok(Json(json!({ "chat_history_metadata": metadata })));
    };

    match store.contents(&guid).await {
        Ok(Some(contents)) => Ok(Json(json!({
            "chat_history_metadata": [guid],
            "chat_history_contents": contents,
        }))),
        Ok(None) | Err(crate::history::HistoryError::InvalidGuid(_)) => {
            Err(ApiError::NotFound(GUID_NOT_FOUND.to_string()))
        }
        Err(err) => Err(err.into()),
    }
}
