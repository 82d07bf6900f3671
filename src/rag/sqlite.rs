//! SQLite-backed vector store.
//!
//! In-process store using SQLite for payloads and brute-force cosine
//! similarity for search. Used when no Qdrant server is configured.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::math::{cosine_similarity, deserialize_embedding, serialize_embedding};
use super::store::{PayloadFilter, SearchHit, VectorPoint, VectorStore};
use super::VectorStoreError;

pub struct SqliteVectorStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteVectorStore {
    pub async fn with_path(db_path: PathBuf) -> Result<Self, VectorStoreError> {
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), VectorStoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS points (
                collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
                point_id TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                PRIMARY KEY (collection, point_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn dimension(&self, collection: &str) -> Result<usize, VectorStoreError> {
        let row = sqlx::query("SELECT dimension FROM collections WHERE name = ?1")
            .bind(collection)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.get::<i64, _>("dimension") as usize),
            None => Err(VectorStoreError::CollectionNotFound(collection.to_string())),
        }
    }

    fn row_payload(row: &sqlx::sqlite::SqliteRow) -> Map<String, Value> {
        let payload: String = row.get("payload");
        serde_json::from_str::<Value>(&payload)
            .ok()
            .and_then(|value| value.as_object().cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn health_check(&self) -> Result<(), VectorStoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, VectorStoreError> {
        let row = sqlx::query("SELECT 1 FROM collections WHERE name = ?1")
            .bind(collection)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn create_collection(
        &self,
        collection: &str,
        dimension: usize,
    ) -> Result<(), VectorStoreError> {
        sqlx::query("INSERT OR IGNORE INTO collections (name, dimension) VALUES (?1, ?2)")
            .bind(collection)
            .bind(dimension as i64)
            .execute(&self.pool)
            .await?;
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

        let dimension = self.dimension(collection).await?;
        let mut tx = self.pool.begin().await?;

        for point in &points {
            if point.vector.len() != dimension {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: dimension,
                    actual: point.vector.len(),
                });
            }
            let payload = serde_json::to_string(&point.payload)?;

            sqlx::query(
                "INSERT OR REPLACE INTO points (collection, point_id, payload, embedding)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(collection)
            .bind(&point.id)
            .bind(&payload)
            .bind(serialize_embedding(&point.vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        let dimension = self.dimension(collection).await?;
        if vector.len() != dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }

        let rows = sqlx::query(
            "SELECT point_id, payload, embedding FROM points WHERE collection = ?1",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let payload = Self::row_payload(row);
            if filter.is_some_and(|f| !f.matches(&payload)) {
                continue;
            }
            let embedding: Vec<u8> = row.get("embedding");
            let score = cosine_similarity(vector, &deserialize_embedding(&embedding))?;
            scored.push(SearchHit {
                id: row.get("point_id"),
                score,
                payload,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit.max(1));

        Ok(scored)
    }

    async fn count(
        &self,
        collection: &str,
        filter: Option<&PayloadFilter>,
    ) -> Result<usize, VectorStoreError> {
        if !self.collection_exists(collection).await? {
            return Err(VectorStoreError::CollectionNotFound(collection.to_string()));
        }

        let Some(filter) = filter else {
            let row = sqlx::query("SELECT COUNT(*) AS total FROM points WHERE collection = ?1")
                .bind(collection)
                .fetch_one(&self.pool)
                .await?;
            return Ok(row.get::<i64, _>("total") as usize);
        };

        let rows = sqlx::query("SELECT payload FROM points WHERE collection = ?1")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .filter(|row| filter.matches(&Self::row_payload(row)))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn create_store() -> (tempfile::TempDir, SqliteVectorStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::with_path(dir.path().join("vectors.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn point(id: &str, vector: Vec<f32>, file_path: &str) -> VectorPoint {
        let mut payload = Map::new();
        payload.insert("text".to_string(), json!(format!("text of {}", id)));
        payload.insert("file_path".to_string(), json!(file_path));
        VectorPoint {
            id: id.to_string(),
            vector,
            payload,
        }
    }

    #[tokio::test]
    async fn ensure_collection_creates_once() {
        let (_dir, store) = create_store().await;

        assert!(!store.collection_exists("techdocs").await.unwrap());
        assert!(store.ensure_collection("techdocs", 3).await.unwrap());
        assert!(!store.ensure_collection("techdocs", 3).await.unwrap());
        assert!(store.collection_exists("techdocs").await.unwrap());
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_within_collection() {
        let (_dir, store) = create_store().await;
        store.create_collection("techdocs", 2).await.unwrap();
        store.create_collection("other", 2).await.unwrap();

        store
            .upsert(
                "techdocs",
                vec![
                    point("a", vec![1.0, 0.0], "/docs/a.md"),
                    point("b", vec![0.0, 1.0], "/docs/b.md"),
                    point("c", vec![0.7, 0.7], "/docs/c.md"),
                ],
            )
            .await
            .unwrap();
        store
            .upsert("other", vec![point("z", vec![1.0, 0.0], "/docs/z.md")])
            .await
            .unwrap();

        let hits = store.search("techdocs", &[1.0, 0.1], 2, None).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "c");
        assert_eq!(hits[0].text(), "text of a");
    }

    #[tokio::test]
    async fn count_and_file_lookup_use_payload_filter() {
        let (_dir, store) = create_store().await;
        store.create_collection("techdocs", 2).await.unwrap();
        store
            .upsert(
                "techdocs",
                vec![
                    point("a1", vec![1.0, 0.0], "/docs/a.md"),
                    point("a2", vec![0.5, 0.5], "/docs/a.md"),
                    point("b1", vec![0.0, 1.0], "/docs/b.md"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(store.count("techdocs", None).await.unwrap(), 3);
        assert!(store.file_in_collection("techdocs", "/docs/a.md").await.unwrap());
        assert!(!store.file_in_collection("techdocs", "/docs/x.md").await.unwrap());
        assert!(!store
            .url_in_collection("techdocs", "https://example.com")
            .await
            .unwrap());

        let filter = PayloadFilter::matching("file_path", "/docs/a.md");
        let hits = store
            .search("techdocs", &[0.0, 1.0], 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension_and_missing_collection() {
        let (_dir, store) = create_store().await;

        let missing = store
            .upsert("nope", vec![point("a", vec![1.0], "/a")])
            .await;
        assert!(matches!(missing, Err(VectorStoreError::CollectionNotFound(_))));

        store.create_collection("techdocs", 3).await.unwrap();
        let wrong = store
            .upsert("techdocs", vec![point("a", vec![1.0, 0.0], "/a")])
            .await;
        assert!(matches!(
            wrong,
            Err(VectorStoreError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }
}
