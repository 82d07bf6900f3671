//! File loading: text extraction plus file metadata.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::IngestError;

/// A loaded document ahead of chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn file_path(&self) -> Option<&str> {
        self.metadata.get("file_path").and_then(|v| v.as_str())
    }
}

/// Lowercase extension with its leading dot, e.g. `.pdf`.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

pub fn mime_type(extension: &str) -> &'static str {
    match extension {
        ".md" => "text/markdown",
        ".txt" => "text/plain",
        ".pdf" => "application/pdf",
        ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => "application/octet-stream",
    }
}

/// Reads one file into a [`Document`]. Extraction runs on the blocking pool.
pub async fn read_file(path: &Path) -> Result<Document, IngestError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_file_blocking(&owned))
        .await
        .map_err(|err| IngestError::Task(err.to_string()))?
}

fn read_file_blocking(path: &Path) -> Result<Document, IngestError> {
    let extension = extension_of(path).unwrap_or_default();
    let bytes = std::fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let text = match extension.as_str() {
        ".txt" | ".md" => String::from_utf8_lossy(&bytes).to_string(),
        ".pdf" => pdf_extract::extract_text_from_mem(&bytes).map_err(|err| IngestError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?,
        ".docx" => extract_docx_text(&bytes).map_err(|message| IngestError::Parse {
            path: path.to_path_buf(),
            message,
        })?,
        other => {
            return Err(IngestError::Parse {
                path: path.to_path_buf(),
                message: format!("unsupported file type '{}'", other),
            })
        }
    };

    let metadata = std::fs::metadata(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut meta = Map::new();
    meta.insert("file_path".to_string(), json!(path.to_string_lossy()));
    meta.insert(
        "file_name".to_string(),
        json!(path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()),
    );
    meta.insert("file_type".to_string(), json!(mime_type(&extension)));
    meta.insert("file_size".to_string(), json!(metadata.len()));
    if let Some(date) = format_date(metadata.created().ok()) {
        meta.insert("creation_date".to_string(), json!(date));
    }
    if let Some(date) = format_date(metadata.modified().ok()) {
        meta.insert("last_modified_date".to_string(), json!(date));
    }
    if let Some(date) = format_date(metadata.accessed().ok()) {
        meta.insert("last_accessed_date".to_string(), json!(date));
    }

    Ok(Document { text, metadata: meta })
}

fn extract_docx_text(bytes: &[u8]) -> Result<String, String> {
    let doc = docx_rs::read_docx(bytes).map_err(|e| e.to_string())?;

    let mut content = String::new();
    for child in doc.document.children {
        if let docx_rs::DocumentChild::Paragraph(p) = child {
            for child in p.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(t) = child {
                            content.push_str(&t.text);
                        }
                    }
                }
            }
            content.push('\n');
        }
    }

    Ok(content)
}

fn format_date(time: Option<SystemTime>) -> Option<String> {
    time.map(|t| DateTime::<Utc>::from(t).format("%Y-%m-%d").to_string())
}
