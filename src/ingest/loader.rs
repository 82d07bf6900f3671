//! Directory ingestion with a content-hash cache so unchanged files are not
//! re-embedded on every run.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::convert::{PptxConverter, CONVERTED_DIR};
use super::hash_store::FileHashStore;
use super::hashing::hash_file_async;
use super::indexer::Indexer;
use super::reader::{extension_of, read_file, Document};
use super::IngestError;
use crate::core::config::HashCheckScope;
use crate::core::errors::error_chain;

/// Reported as the only "already processed" entry when every file is
/// reprocessed regardless of its stored hash.
pub const REPROCESS_SENTINEL: &str = "Re-processing all files";

const PPTX: &str = ".pptx";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadOptions {
    pub source_dir: PathBuf,
    pub collection_name: String,
    pub move_after_processing: bool,
    pub re_process_files: bool,
    pub extensions_to_process: Vec<String>,
}

impl LoadOptions {
    /// Extensions as `.ext`, lowercased.
    fn extensions(&self) -> BTreeSet<String> {
        self.extensions_to_process
            .iter()
            .map(|ext| {
                let ext = ext.trim().to_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{}", ext)
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedFiles {
    pub successfully_processed: Vec<String>,
    pub failed_to_process: Vec<String>,
    pub already_processed: Vec<String>,
}

pub struct DocumentLoader {
    indexer: Arc<Indexer>,
    hashes: FileHashStore,
    converter: Arc<PptxConverter>,
    output_dir: PathBuf,
    hash_check_scope: HashCheckScope,
}

impl DocumentLoader {
    pub fn new(
        indexer: Arc<Indexer>,
        hashes: FileHashStore,
        converter: Arc<PptxConverter>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            indexer,
            hashes,
            converter,
            output_dir: output_dir.into(),
            hash_check_scope: HashCheckScope::default(),
        }
    }

    pub fn with_hash_check_scope(mut self, scope: HashCheckScope) -> Self {
        self.hash_check_scope = scope;
        self
    }

    pub async fn load_documents(&self, options: &LoadOptions) -> Result<ProcessedFiles, IngestError> {
        let collection = options.collection_name.as_str();
        let db_name = FileHashStore::db_name(collection);
        if let Err(err) = self.hashes.create(&db_name).await {
            tracing::error!("Failed to prepare hash store {}: {}", db_name, err);
        }
        self.indexer
            .store()
            .ensure_collection(collection, self.indexer.dimension())
            .await?;

        let extensions = options.extensions();
        let discovered = discover_files(&options.source_dir);
        tracing::info!(
            "Found {} files under {}",
            discovered.len(),
            options.source_dir.display()
        );

        let mut already_processed = BTreeSet::new();
        let mut to_process = Vec::new();
        if options.re_process_files {
            tracing::info!("Re-processing all files in {}", options.source_dir.display());
            to_process = discovered.clone();
        } else {
            for path in &discovered {
                if self.is_unchanged(&db_name, path).await {
                    tracing::info!("Skipping {}, already processed", path.display());
                    already_processed.insert(path_key(path));
                } else {
                    to_process.push(path.clone());
                }
            }
        }

        // converted pdf -> original presentation
        let mut converted = HashMap::new();
        let mut conversion_outputs = Vec::new();
        if extensions.contains(PPTX) {
            let presentations = to_process
                .iter()
                .filter(|p| extension_of(p).as_deref() == Some(PPTX))
                .cloned()
                .collect::<Vec<_>>();
            if !presentations.is_empty() {
                tracing::info!("Converting {} presentations to PDF", presentations.len());
                for result in self.converter.convert_all(presentations).await {
                    conversion_outputs.push(result.output_path.clone());
                    if result.success {
                        converted.insert(path_key(&result.output_path), result.source);
                    }
                }
            }
        }

        let mut inputs = to_process
            .iter()
            .filter(|p| {
                extension_of(p)
                    .map(|ext| ext != PPTX && extensions.contains(&ext))
                    .unwrap_or(false)
            })
            .cloned()
            .collect::<Vec<_>>();
        let mut pdfs = converted.keys().map(PathBuf::from).collect::<Vec<_>>();
        pdfs.sort();
        inputs.extend(pdfs);

        let documents = read_documents(&inputs).await;
        let mut successful = BTreeSet::new();
        if documents.is_empty() {
            tracing::info!("No documents found to index in {}", options.source_dir.display());
        } else {
            if let Err(err) = self.indexer.index(collection, &documents).await {
                tracing::error!(
                    "Indexing into '{}' failed ({}): {}",
                    collection,
                    err.kind(),
                    error_chain(&err)
                );
                remove_conversion_outputs(&conversion_outputs).await;
                return Err(err);
            }
            for document in &documents {
                if let Some(path) = document.file_path() {
                    let original = converted
                        .get(path)
                        .cloned()
                        .unwrap_or_else(|| PathBuf::from(path));
                    successful.insert(original);
                }
            }
        }

        for path in &successful {
            self.record_hash(&db_name, path).await;
        }

        remove_conversion_outputs(&conversion_outputs).await;

        let successful = successful.iter().map(|p| path_key(p)).collect::<BTreeSet<_>>();
        let failed = discovered
            .iter()
            .map(|p| path_key(p))
            .filter(|p| !successful.contains(p) && !already_processed.contains(p))
            .collect::<Vec<_>>();

        if options.move_after_processing {
            move_files(&options.source_dir, &self.output_dir).await;
        }

        let already_processed = if options.re_process_files {
            vec![REPROCESS_SENTINEL.to_string()]
        } else {
            already_processed.into_iter().collect()
        };

        tracing::info!(
            "Processed {}: {} succeeded, {} failed, {} already processed",
            options.source_dir.display(),
            successful.len(),
            failed.len(),
            already_processed.len()
        );

        Ok(ProcessedFiles {
            successfully_processed: successful.into_iter().collect(),
            failed_to_process: failed,
            already_processed,
        })
    }

    async fn is_unchanged(&self, db_name: &str, path: &Path) -> bool {
        if self.hash_check_scope == HashCheckScope::PresentationsOnly
            && extension_of(path).as_deref() != Some(PPTX)
        {
            return false;
        }

        let current = match hash_file_async(path.to_path_buf()).await {
            Ok(hash) => hash,
            Err(err) => {
                tracing::warn!("Failed to hash {}: {}", path.display(), err);
                return false;
            }
        };
        self.hashes.get(db_name, &path_key(path)).await.as_deref() == Some(current.as_str())
    }

    async fn record_hash(&self, db_name: &str, path: &Path) {
        let hash = match hash_file_async(path.to_path_buf()).await {
            Ok(hash) => hash,
            Err(err) => {
                tracing::error!("Failed to hash {} after indexing: {}", path.display(), err);
                return;
            }
        };
        if let Err(err) = self.hashes.upsert(db_name, &path_key(path), &hash).await {
            tracing::error!("Failed to store hash for {}: {}", path.display(), err);
        }
    }
}

/// Removes conversion output, failed attempts included, then the output
/// directories once they are empty.
async fn remove_conversion_outputs(outputs: &[PathBuf]) {
    let mut dirs = BTreeSet::new();
    for pdf in outputs {
        match tokio::fs::remove_file(pdf).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!("Failed to remove converted file {}: {}", pdf.display(), err)
            }
        }
        if let Some(dir) = pdf.parent() {
            dirs.insert(dir.to_path_buf());
        }
    }
    for dir in dirs {
        // only succeeds once the directory is empty
        if tokio::fs::remove_dir(&dir).await.is_err() {
            tracing::debug!("Keeping directory {}", dir.display());
        }
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Every regular file below `root`, sorted, skipping conversion output.
/// A missing root yields nothing.
fn discover_files(root: &Path) -> Vec<PathBuf> {
    if !root.is_dir() {
        tracing::warn!("Source directory {} does not exist", root.display());
        return Vec::new();
    }

    let mut files = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && entry.file_name() == CONVERTED_DIR))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();
    files.sort();
    files
}

async fn read_documents(paths: &[PathBuf]) -> Vec<Document> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        match read_file(path).await {
            Ok(document) => documents.push(document),
            Err(err) => tracing::error!("Failed to read {}: {}", path.display(), error_chain(&err)),
        }
    }
    documents
}

/// Moves the regular files directly inside `source` into `destination`,
/// replacing files of the same name.
async fn move_files(source: &Path, destination: &Path) {
    if let Err(err) = tokio::fs::create_dir_all(destination).await {
        tracing::error!("Failed to create {}: {}", destination.display(), err);
        return;
    }

    let mut entries = match tokio::fs::read_dir(source).await {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!("Cannot list {} for moving: {}", source.display(), err);
            return;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!("Stopped listing {}: {}", source.display(), err);
                break;
            }
        };
        match entry.file_type().await {
            Ok(kind) if kind.is_file() => {}
            _ => continue,
        }

        let from = entry.path();
        let to = destination.join(entry.file_name());
        match move_file(&from, &to).await {
            Ok(()) => tracing::info!("Moved {} to {}", from.display(), to.display()),
            Err(err) => tracing::error!("Failed to move {}: {}", from.display(), err),
        }
    }
}

async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    // rename fails across filesystems
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}
