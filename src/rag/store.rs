//! Collection-scoped vector database interface shared by every backend.
//!
//! Implementations: `QdrantStore` (REST) and `SqliteVectorStore` (embedded).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::VectorStoreError;

/// A vector with its payload. `payload["text"]` holds the chunk text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Map<String, Value>,
}

/// A scored match returned by `search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    /// Similarity score (higher = better).
    pub score: f32,
    pub payload: Map<String, Value>,
}

impl SearchHit {
    pub fn text(&self) -> &str {
        self.payload
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    /// Payload without the chunk text.
    pub fn metadata(&self) -> Map<String, Value> {
        let mut metadata = self.payload.clone();
        metadata.remove("text");
        metadata
    }
}

/// Conjunction of exact payload matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadFilter {
    pub must: Vec<(String, Value)>,
}

impl PayloadFilter {
    pub fn matching(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            must: vec![(key.into(), value.into())],
        }
    }

    pub fn matches(&self, payload: &Map<String, Value>) -> bool {
        self.must
            .iter()
            .all(|(key, expected)| payload.get(key) == Some(expected))
    }

    pub fn to_qdrant(&self) -> Value {
        let conditions = self
            .must
            .iter()
            .map(|(key, value)| json!({ "key": key, "match": { "value": value } }))
            .collect::<Vec<_>>();
        json!({ "must": conditions })
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// backend name for logs ("qdrant", "sqlite")
    fn name(&self) -> &str;

    /// fails when the backend cannot be reached
    async fn health_check(&self) -> Result<(), VectorStoreError>;

    async fn collection_exists(&self, collection: &str) -> Result<bool, VectorStoreError>;

    /// Creates a cosine-distance collection for vectors of `dimension`.
    async fn create_collection(
        &self,
        collection: &str,
        dimension: usize,
    ) -> Result<(), VectorStoreError>;

    /// Inserts or replaces points by id.
    async fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> Result<(), VectorStoreError>;

    /// Nearest points to `vector`, best first, at most `limit`.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<SearchHit>, VectorStoreError>;

    /// Number of points, optionally restricted by `filter`.
    async fn count(
        &self,
        collection: &str,
        filter: Option<&PayloadFilter>,
    ) -> Result<usize, VectorStoreError>;

    /// Creates the collection when missing. Returns whether it was created.
    async fn ensure_collection(
        &self,
        collection: &str,
        dimension: usize,
    ) -> Result<bool, VectorStoreError> {
        if self.collection_exists(collection).await? {
            return Ok(false);
        }
        tracing::info!(
            "Creating collection '{}' ({} dims) in {}",
            collection,
            dimension,
            self.name()
        );
        self.create_collection(collection, dimension).await?;
        Ok(true)
    }

    async fn file_in_collection(
        &self,
        collection: &str,
        file_path: &str,
    ) -> Result<bool, VectorStoreError> {
        let filter = PayloadFilter::matching("file_path", file_path);
        Ok(self.count(collection, Some(&filter)).await? > 0)
    }

    async fn url_in_collection(&self, collection: &str, url: &str) -> Result<bool, VectorStoreError> {
        let filter = PayloadFilter::matching("url", url);
        Ok(self.count(collection, Some(&filter)).await? > 0)
    }
}

/// Polls `health_check` with exponential backoff (1s, 2s, 4s, ...) until the
/// store answers or `attempts` are used up.
pub async fn wait_until_available(
    store: &dyn VectorStore,
    attempts: u32,
    base_delay: Duration,
) -> Result<(), VectorStoreError> {
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 0..attempts {
        match store.health_check().await {
            Ok(()) => {
                tracing::info!("{} is available", store.name());
                return Ok(());
            }
            Err(err) => {
                last_error = err.to_string();
                if attempt + 1 < attempts {
                    let delay = base_delay * 2u32.saturating_pow(attempt);
                    tracing::warn!(
                        "{} not reachable (attempt {}/{}): {}; retrying in {:?}",
                        store.name(),
                        attempt + 1,
                        attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(VectorStoreError::Unavailable {
        attempts,
        message: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_every_condition() {
        let mut payload = Map::new();
        payload.insert("file_path".to_string(), json!("/docs/a.md"));
        payload.insert("file_type".to_string(), json!("text/markdown"));

        assert!(PayloadFilter::matching("file_path", "/docs/a.md").matches(&payload));
        assert!(!PayloadFilter::matching("file_path", "/docs/b.md").matches(&payload));

        let both = PayloadFilter {
            must: vec![
                ("file_path".to_string(), json!("/docs/a.md")),
                ("url".to_string(), json!("https://example.com")),
            ],
        };
        assert!(!both.matches(&payload));
    }

    #[test]
    fn filter_renders_qdrant_conditions() {
        let filter = PayloadFilter::matching("url", "https://example.com");
        assert_eq!(
            filter.to_qdrant(),
            json!({ "must": [ { "key": "url", "match": { "value": "https://example.com" } } ] })
        );
    }
}
