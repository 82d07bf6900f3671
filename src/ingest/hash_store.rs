//! Per-collection SQLite cache of file path -> content hash.
//!
//! Each database lives at `<root>/<collection>_file_hashes.db` and is opened
//! for the duration of a single operation.

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Row};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS file_hashes (
    file_path TEXT PRIMARY KEY,
    file_hash TEXT
)";

#[derive(Debug, Clone)]
pub struct FileHashStore {
    root: PathBuf,
}

impl FileHashStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Database file name used for a collection.
    pub fn db_name(collection: &str) -> String {
        format!("{}_file_hashes.db", collection)
    }

    pub fn db_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Ensures the database and its table exist. Safe to call repeatedly.
    pub async fn create(&self, name: &str) -> Result<(), sqlx::Error> {
        let conn = self.open(name).await?;
        conn.close().await?;
        Ok(())
    }

    pub async fn upsert(&self, name: &str, file_path: &str, file_hash: &str) -> Result<(), sqlx::Error> {
        let mut conn = self.open(name).await?;
        sqlx::query("INSERT OR REPLACE INTO file_hashes (file_path, file_hash) VALUES (?1, ?2)")
            .bind(file_path)
            .bind(file_hash)
            .execute(&mut conn)
            .await?;
        conn.close().await?;
        Ok(())
    }

    /// Stored hash for `file_path`. Lookup failures are logged and read as a
    /// miss so the file is reprocessed rather than skipped.
    pub async fn get(&self, name: &str, file_path: &str) -> Option<String> {
        match self.lookup(name, file_path).await {
            Ok(hash) => hash,
            Err(err) => {
                tracing::error!(
                    "Failed to read stored hash for {} from {}: {}",
                    file_path,
                    name,
                    err
                );
                None
            }
        }
    }

    async fn lookup(&self, name: &str, file_path: &str) -> Result<Option<String>, sqlx::Error> {
        let mut conn = self.open(name).await?;
        let row = sqlx::query("SELECT file_hash FROM file_hashes WHERE file_path = ?1")
            .bind(file_path)
            .fetch_optional(&mut conn)
            .await?;
        conn.close().await?;
        Ok(row.and_then(|row| row.get::<Option<String>, _>("file_hash")))
    }

    async fn open(&self, name: &str) -> Result<SqliteConnection, sqlx::Error> {
        let path = self.db_path(name);
        ensure_parent(&path)?;

        let mut conn = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .connect()
            .await?;
        sqlx::query(SCHEMA).execute(&mut conn).await?;
        Ok(conn)
    }
}

fn ensure_parent(path: &Path) -> Result<(), sqlx::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
