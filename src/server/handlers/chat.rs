use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::agent::{ChatInput, ChatOutcome};
use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub user_input: String,
    #[serde(default)]
    pub chat_agent: Option<String>,
    #[serde(default)]
    pub chat_history_guid: Option<String>,
    #[serde(default)]
    pub custom_tools: Option<Vec<String>>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatOutcome>, ApiError> {
    let input = ChatInput {
        user_input: body.user_input,
        chat_agent: body
            .chat_agent
            .filter(|agent| !agent.trim().is_empty())
            .unwrap_or_else(|| state.settings.agent.default_agent.clone()),
        chat_history_guid: body
            .chat_history_guid
            .filter(|guid| !guid.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        custom_tools: body.custom_tools.unwrap_or_default(),
    };

    let outcome = state.agent.chat(input).await?;
    Ok(Json(outcome))
}
