//! Qdrant REST client implementing [`VectorStore`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Map, Value};

use super::store::{PayloadFilter, SearchHit, VectorPoint, VectorStore};
use super::VectorStoreError;

#[derive(Clone)]
pub struct QdrantStore {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl QdrantStore {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, VectorStoreError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(VectorStoreError::Http)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
        })
    }

    fn collection_url(&self, collection: &str, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.base_url,
            urlencoding::encode(collection),
            suffix
        )
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value), VectorStoreError> {
        let mut request = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let res = request.send().await.map_err(VectorStoreError::Http)?;
        let status = res.status();
        let text = res.text().await.map_err(VectorStoreError::Http)?;
        let payload = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, payload))
    }

    async fn send_ok(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
        collection: &str,
    ) -> Result<Value, VectorStoreError> {
        let (status, payload) = self.send(method, url, body).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(VectorStoreError::CollectionNotFound(collection.to_string()));
        }
        if !status.is_success() {
            return Err(VectorStoreError::Backend {
                status: status.as_u16(),
                message: describe_error(&payload),
            });
        }
        Ok(payload)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn health_check(&self) -> Result<(), VectorStoreError> {
        let url = format!("{}/collections", self.base_url);
        let (status, payload) = self.send(Method::GET, &url, None).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(VectorStoreError::Backend {
                status: status.as_u16(),
                message: describe_error(&payload),
            })
        }
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, VectorStoreError> {
        let url = self.collection_url(collection, "");
        let (status, payload) = self.send(Method::GET, &url, None).await?;
        match status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(VectorStoreError::Backend {
                status: s.as_u16(),
                message: describe_error(&payload),
            }),
        }
    }

    async fn create_collection(
        &self,
        collection: &str,
        dimension: usize,
    ) -> Result<(), VectorStoreError> {
        let url = self.collection_url(collection, "");
        let body = json!({ "vectors": { "size": dimension, "distance": "Cosine" } });
        self.send_ok(Method::PUT, &url, Some(body), collection).await?;
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> Result<(), VectorStoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let url = self.collection_url(collection, "/points?wait=true");
        let body = json!({
            "points": points
                .into_iter()
                .map(|p| json!({ "id": p.id, "vector": p.vector, "payload": p.payload }))
                .collect::<Vec<_>>()
        });
        self.send_ok(Method::PUT, &url, Some(body), collection).await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        let url = self.collection_url(collection, "/points/search");
        let mut body = json!({
            "vector": vector,
            "limit": limit.max(1),
            "with_payload": true,
        });
        if let (Some(obj), Some(filter)) = (body.as_object_mut(), filter) {
            obj.insert("filter".to_string(), filter.to_qdrant());
        }

        let payload = self.send_ok(Method::POST, &url, Some(body), collection).await?;
        parse_search_hits(&payload)
    }

    async fn count(
        &self,
        collection: &str,
        filter: Option<&PayloadFilter>,
    ) -> Result<usize, VectorStoreError> {
        let url = self.collection_url(collection, "/points/count");
        let mut body = json!({ "exact": true });
        if let (Some(obj), Some(filter)) = (body.as_object_mut(), filter) {
            obj.insert("filter".to_string(), filter.to_qdrant());
        }

        let payload = self.send_ok(Method::POST, &url, Some(body), collection).await?;
        payload["result"]["count"]
            .as_u64()
            .map(|count| count as usize)
            .ok_or_else(|| VectorStoreError::InvalidResponse("count has no result".to_string()))
    }
}

fn parse_search_hits(payload: &Value) -> Result<Vec<SearchHit>, VectorStoreError> {
    let items = payload
        .get("result")
        .and_then(|v| v.as_array())
        .ok_or_else(|| VectorStoreError::InvalidResponse("search has no result".to_string()))?;

    Ok(items
        .iter()
        .map(|item| SearchHit {
            id: match &item["id"] {
                Value::String(id) => id.clone(),
                other => other.to_string(),
            },
            score: item["score"].as_f64().unwrap_or_default() as f32,
            payload: item
                .get("payload")
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_else(Map::new),
        })
        .collect())
}

fn describe_error(payload: &Value) -> String {
    payload
        .get("status")
        .and_then(|s| s.get("error"))
        .and_then(|e| e.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| payload.to_string())
}
