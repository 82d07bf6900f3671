//! File-backed chat history.
//!
//! Each conversation is `<guid>.json` (a JSON array of messages in the
//! LangChain `message_to_dict` shape) plus `<guid>.metadata.json`. Writers
//! hold an exclusive advisory lock on the message file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid chat history guid '{0}'")]
    InvalidGuid(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed chat history {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("history task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Human,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    pub content: String,
    #[serde(default)]
    pub additional_kwargs: Map<String, Value>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub example: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub data: MessageData,
}

impl StoredMessage {
    fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            data: MessageData {
                content: content.into(),
                additional_kwargs: Map::new(),
                kind,
                example: false,
            },
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Human, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Ai, content)
    }

    pub fn content(&self) -> &str {
        &self.data.content
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMetadata {
    pub date: String,
    pub chat_agent: String,
    pub chat_history_guid: String,
}

#[derive(Debug, Clone)]
pub struct ChatHistoryStore {
    dir: PathBuf,
}

impl ChatHistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn messages_path(&self, guid: &str) -> Result<PathBuf, HistoryError> {
        validate_guid(guid)?;
        Ok(self.dir.join(format!("{}.json", guid)))
    }

    fn metadata_path(&self, guid: &str) -> Result<PathBuf, HistoryError> {
        validate_guid(guid)?;
        Ok(self.dir.join(format!("{}.metadata.json", guid)))
    }

    /// Creates the message file (`[]`) and the metadata file when missing.
    pub async fn ensure(&self, guid: &str, chat_agent: &str) -> Result<(), HistoryError> {
        let messages = self.messages_path(guid)?;
        let metadata_path = self.metadata_path(guid)?;
        let metadata = ChatMetadata {
            date: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            chat_agent: chat_agent.to_string(),
            chat_history_guid: guid.to_string(),
        };
        let dir = self.dir.clone();

        blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|source| HistoryError::Io {
                path: dir.clone(),
                source,
            })?;
            if !messages.exists() {
                write_new(&messages, b"[]")?;
            }
            if !metadata_path.exists() {
                let body = serde_json::to_vec(&metadata).map_err(|source| HistoryError::Json {
                    path: metadata_path.clone(),
                    source,
                })?;
                write_new(&metadata_path, &body)?;
            }
            Ok(())
        })
        .await
    }

    /// Messages of a conversation. Missing or empty files read as no messages.
    pub async fn messages(&self, guid: &str) -> Result<Vec<StoredMessage>, HistoryError> {
        let path = self.messages_path(guid)?;
        blocking(move || {
            if !path.exists() {
                return Ok(Vec::new());
            }
            let mut file = File::open(&path).map_err(|source| HistoryError::Io {
                path: path.clone(),
                source,
            })?;
            FileExt::lock_shared(&file).map_err(|source| HistoryError::Io {
                path: path.clone(),
                source,
            })?;
            let result = read_messages(&mut file, &path);
            let _ = FileExt::unlock(&file);
            result
        })
        .await
    }

    /// Appends under an exclusive lock so concurrent turns on one guid do not
    /// interleave or drop messages.
    pub async fn append(&self, guid: &str, new: Vec<StoredMessage>) -> Result<(), HistoryError> {
        let path = self.messages_path(guid)?;
        let dir = self.dir.clone();
        blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|source| HistoryError::Io {
                path: dir.clone(),
                source,
            })?;
            let io_err = |source: std::io::Error| HistoryError::Io {
                path: path.clone(),
                source,
            };
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .map_err(io_err)?;
            FileExt::lock_exclusive(&file).map_err(io_err)?;

            let result = (|| {
                let mut messages = read_messages(&mut file, &path)?;
                messages.extend(new);
                let body = serde_json::to_vec(&messages).map_err(|source| HistoryError::Json {
                    path: path.clone(),
                    source,
                })?;
                file.set_len(0).map_err(io_err)?;
                file.seek(SeekFrom::Start(0)).map_err(io_err)?;
                file.write_all(&body).map_err(io_err)?;
                file.sync_data().map_err(io_err)
            })();

            let _ = FileExt::unlock(&file);
            result
        })
        .await
    }

    /// Raw stored contents of a conversation, `None` when the guid is unknown.
    pub async fn contents(&self, guid: &str) -> Result<Option<Value>, HistoryError> {
        let path = self.messages_path(guid)?;
        blocking(move || {
            if !path.exists() {
                tracing::warn!("Chat history file does not exist: {}", path.display());
                return Ok(None);
            }
            let raw = std::fs::read_to_string(&path).map_err(|source| HistoryError::Io {
                path: path.clone(),
                source,
            })?;
            if raw.trim().is_empty() {
                return Ok(Some(Value::Array(Vec::new())));
            }
            serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| HistoryError::Json { path, source })
        })
        .await
    }

    /// Metadata of every conversation, newest first. Unreadable metadata
    /// files are skipped.
    pub async fn list(&self) -> Result<Vec<ChatMetadata>, HistoryError> {
        let dir = self.dir.clone();
        blocking(move || {
            if !dir.exists() {
                tracing::warn!("Chat history directory does not exist: {}", dir.display());
                return Ok(Vec::new());
            }
            let entries = std::fs::read_dir(&dir).map_err(|source| HistoryError::Io {
                path: dir.clone(),
                source,
            })?;

            let mut all = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                let is_metadata = path
                    .file_name()
                    .map(|n| n.to_string_lossy().ends_with(".metadata.json"))
                    .unwrap_or(false);
                if !is_metadata {
                    continue;
                }
                match std::fs::read(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|b| serde_json::from_slice::<ChatMetadata>(&b).map_err(|e| e.to_string()))
                {
                    Ok(meta) => all.push(meta),
                    Err(err) => tracing::warn!("Skipping metadata {}: {}", path.display(), err),
                }
            }

            all.sort_by(|a, b| b.date.cmp(&a.date));
            Ok(all)
        })
        .await
    }
}

/// `Human: ...` / `AI: ...` lines, the buffer format agent prompts expect.
pub fn render_buffer(messages: &[StoredMessage]) -> String {
    messages
        .iter()
        .map(|m| match m.kind {
            MessageKind::Human => format!("Human: {}", m.content()),
            MessageKind::Ai => format!("AI: {}", m.content()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn validate_guid(guid: &str) -> Result<(), HistoryError> {
    let valid = !guid.is_empty()
        && guid.len() <= 128
        && guid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(HistoryError::InvalidGuid(guid.to_string()))
    }
}

fn read_messages(file: &mut File, path: &Path) -> Result<Vec<StoredMessage>, HistoryError> {
    let mut raw = String::new();
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_string(&mut raw))
        .map_err(|source| HistoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let trimmed = raw.trim();
    // legacy files were initialised as an empty object
    if trimmed.is_empty() || trimmed == "{}" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).map_err(|source| HistoryError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_new(path: &Path, body: &[u8]) -> Result<(), HistoryError> {
    std::fs::write(path, body).map_err(|source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

async fn blocking<T, F>(f: F) -> Result<T, HistoryError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, HistoryError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| HistoryError::Task(err.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn ensure_initialises_files_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatHistoryStore::new(dir.path().join("chat/memory"));

        store.ensure("abc-1", "AgentFramework").await.unwrap();
        store.append("abc-1", vec![StoredMessage::human("hi")]).await.unwrap();
        store.ensure("abc-1", "Other").await.unwrap();

        assert_eq!(store.messages("abc-1").await.unwrap().len(), 1);
        let meta = store.list().await.unwrap();
        assert_eq!(meta[0].chat_agent, "AgentFramework");
        assert_eq!(meta[0].chat_history_guid, "abc-1");
    }

    #[tokio::test]
    async fn messages_use_langchain_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatHistoryStore::new(dir.path());
        store.ensure("g", "AgentFramework").await.unwrap();

        store
            .append("g", vec![StoredMessage::human("hello"), StoredMessage::ai("hi there")])
            .await
            .unwrap();

        let contents = store.contents("g").await.unwrap().unwrap();
        assert_eq!(
            contents,
            json!([
                {"type": "human", "data": {"content": "hello", "additional_kwargs": {}, "type": "human", "example": false}},
                {"type": "ai", "data": {"content": "hi there", "additional_kwargs": {}, "type": "ai", "example": false}}
            ])
        );
        assert_eq!(
            render_buffer(&store.messages("g").await.unwrap()),
            "Human: hello\nAI: hi there"
        );
    }

    #[tokio::test]
    async fn listing_sorts_newest_first_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        for (guid, date) in [("old", "2024-01-01T00:00:00Z"), ("new", "2024-06-01T00:00:00Z")] {
            let meta = ChatMetadata {
                date: date.to_string(),
                chat_agent: "AgentFramework".to_string(),
                chat_history_guid: guid.to_string(),
            };
            std::fs::write(
                dir.path().join(format!("{}.metadata.json", guid)),
                serde_json::to_vec(&meta).unwrap(),
            )
            .unwrap();
        }
        std::fs::write(dir.path().join("bad.metadata.json"), "not json").unwrap();

        let listed = ChatHistoryStore::new(dir.path()).list().await.unwrap();

        let guids = listed.iter().map(|m| m.chat_history_guid.as_str()).collect::<Vec<_>>();
        assert_eq!(guids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn unknown_guid_and_missing_dir_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatHistoryStore::new(dir.path().join("missing"));

        assert_eq!(store.contents("nope").await.unwrap(), None);
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.messages("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn path_like_guids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatHistoryStore::new(dir.path());

        assert!(matches!(
            store.contents("../etc/passwd").await,
            Err(HistoryError::InvalidGuid(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_appends_keep_every_message() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatHistoryStore::new(dir.path());
        store.ensure("busy", "AgentFramework").await.unwrap();

        let handles = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append("busy", vec![StoredMessage::human(format!("m{}", i))])
                        .await
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.messages("busy").await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn legacy_empty_object_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("legacy.json"), "{}").unwrap();
        let store = ChatHistoryStore::new(dir.path());

        assert!(store.messages("legacy").await.unwrap().is_empty());
        store.append("legacy", vec![StoredMessage::ai("ok")]).await.unwrap();
        assert_eq!(store.messages("legacy").await.unwrap().len(), 1);
    }
}
