use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{EmbeddingProvider, LlmProvider};
use super::types::{ChatRequest, LlmKind};
use super::LlmError;
use crate::core::config::settings::OpenAiSettings;

/// Azure OpenAI deployments reached through the REST API.
#[derive(Clone)]
pub struct AzureOpenAiProvider {
    base_url: String,
    api_version: String,
    api_key: String,
    deployment_gpt4: String,
    deployment_gpt4_32k: String,
    deployment_gpt35: String,
    deployment_embeddings: String,
    embedding_dimension: usize,
    temperature: f64,
    max_tokens: u32,
    client: Client,
}

impl AzureOpenAiProvider {
    pub fn new(settings: &OpenAiSettings) -> Result<Self, LlmError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(settings.request_timeout_secs.min(30)))
            .build()
            .map_err(LlmError::Http)?;

        Ok(Self {
            base_url: settings.openai_api_base.trim_end_matches('/').to_string(),
            api_version: settings.openai_api_version.clone(),
            api_key,
            deployment_gpt4: settings.deployment_name.clone(),
            deployment_gpt4_32k: settings.deployment_name_32k.clone(),
            deployment_gpt35: settings.text_summary_deployment_name.clone(),
            deployment_embeddings: settings.embedding_model_deployment_name.clone(),
            embedding_dimension: settings.embedding_dimension,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            client,
        })
    }

    fn deployment(&self, kind: LlmKind) -> &str {
        match kind {
            LlmKind::Gpt4 => &self.deployment_gpt4,
            LlmKind::Gpt4_32k => &self.deployment_gpt4_32k,
            LlmKind::Gpt35Turbo => &self.deployment_gpt35,
        }
    }

    fn endpoint(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.base_url,
            urlencoding::encode(deployment),
            operation,
            self.api_version
        )
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, LlmError> {
        let res = self
            .client
            .post(url)
            .header("api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(LlmError::Http)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(LlmError::Provider {
                status: status.as_u16(),
                message: text,
            });
        }

        res.json().await.map_err(LlmError::Http)
    }
}

#[async_trait]
impl LlmProvider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        "azure_openai"
    }

    async fn chat(&self, request: ChatRequest, kind: LlmKind) -> Result<String, LlmError> {
        let url = self.endpoint(self.deployment(kind), "chat/completions");

        let mut body = json!({
            "messages": request.messages,
            "temperature": request.temperature.unwrap_or(self.temperature),
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
        });
        if let (Some(obj), Some(stop)) = (body.as_object_mut(), request.stop) {
            obj.insert("stop".to_string(), json!(stop));
        }

        tracing::debug!("Azure OpenAI chat request to {} ({})", self.deployment(kind), kind);
        let payload = self.post(&url, &body).await?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|content| content.to_string())
            .ok_or_else(|| LlmError::InvalidResponse("chat response has no content".to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for AzureOpenAiProvider {
    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint(&self.deployment_embeddings, "embeddings");
        let payload = self.post(&url, &json!({ "input": inputs })).await?;
        parse_embeddings(&payload, inputs.len())
    }
}

/// Orders embeddings by their `index` field; the API does not promise input order.
fn parse_embeddings(payload: &Value, expected: usize) -> Result<Vec<Vec<f32>>, LlmError> {
    let data = payload
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| LlmError::InvalidResponse("embedding response has no data".to_string()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(position);
        let vector = item
            .get("embedding")
            .and_then(|v| v.as_array())
            .ok_or_else(|| LlmError::InvalidResponse("embedding item has no vector".to_string()))?
            .iter()
            .map(|x| x.as_f64().unwrap_or_default() as f32)
            .collect::<Vec<f32>>();
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(index, _)| *index);

    if indexed.len() != expected {
        return Err(LlmError::InvalidResponse(format!(
            "expected {} embeddings, got {}",
            expected,
            indexed.len()
        )));
    }

    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}
