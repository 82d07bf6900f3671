//! Presentation to PDF conversion through a headless office suite.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::process::Command;

pub const CONVERTED_DIR: &str = "converted_from_pptx";

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("failed to start converter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("converter exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("converter produced no output at {0}")]
    MissingOutput(PathBuf),

    #[error("converter produced an empty file at {0}")]
    EmptyOutput(PathBuf),

    #[error("conversion task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub source: PathBuf,
    pub output_path: PathBuf,
    pub success: bool,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct PptxConverter {
    program: String,
    base_args: Vec<String>,
    max_retries: u32,
    profile_root: PathBuf,
}

impl PptxConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            max_retries: 5,
            profile_root: std::env::temp_dir(),
        }
    }

    /// Resolves `program` on `PATH`, falling back to `soffice` when the
    /// configured name is missing.
    pub fn discover(program: &str, max_retries: u32) -> Self {
        let resolved = which::which(program)
            .or_else(|_| which::which("soffice"))
            .map(|path| path.to_string_lossy().to_string())
            .unwrap_or_else(|_| {
                tracing::warn!(
                    "Converter '{}' not found on PATH; presentation conversion will fail",
                    program
                );
                program.to_string()
            });
        Self::new(resolved).with_max_retries(max_retries)
    }

    /// Arguments placed before the conversion flags (e.g. a wrapper script).
    pub fn with_base_args(mut self, args: Vec<String>) -> Self {
        self.base_args = args;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_profile_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.profile_root = root.into();
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// `<dir of source>/converted_from_pptx/<stem>.pdf`
    pub fn output_path_for(source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        source
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONVERTED_DIR)
            .join(format!("{}.pdf", stem))
    }

    /// Converts one file, retrying until an attempt yields a non-empty PDF
    /// or `max_retries` attempts have failed.
    pub async fn convert(&self, source: &Path) -> ConversionResult {
        let output_path = Self::output_path_for(source);
        let mut attempts = 0;

        while attempts < self.max_retries {
            attempts += 1;
            match self.attempt(source, &output_path).await {
                Ok(()) => {
                    tracing::info!(
                        "Converted {} to {} (attempt {})",
                        source.display(),
                        output_path.display(),
                        attempts
                    );
                    return ConversionResult {
                        source: source.to_path_buf(),
                        output_path,
                        success: true,
                        attempts,
                    };
                }
                Err(err) => {
                    tracing::warn!(
                        "Conversion attempt {}/{} for {} failed: {}",
                        attempts,
                        self.max_retries,
                        source.display(),
                        err
                    );
                }
            }
        }

        tracing::error!(
            "Giving up on {} after {} attempts",
            source.display(),
            attempts
        );
        ConversionResult {
            source: source.to_path_buf(),
            output_path,
            success: false,
            attempts,
        }
    }

    /// Converts every source concurrently, one task per file. Results come
    /// back in input order; a task that dies counts as a failed conversion.
    pub async fn convert_all(self: &Arc<Self>, sources: Vec<PathBuf>) -> Vec<ConversionResult> {
        let handles = sources
            .iter()
            .cloned()
            .map(|source| {
                let converter = Arc::clone(self);
                tokio::spawn(async move { converter.convert(&source).await })
            })
            .collect::<Vec<_>>();

        join_all(handles)
            .await
            .into_iter()
            .zip(sources)
            .map(|(joined, source)| {
                joined.unwrap_or_else(|err| {
                    let err = ConversionError::Task(err.to_string());
                    tracing::error!("Conversion of {} aborted: {}", source.display(), err);
                    ConversionResult {
                        output_path: Self::output_path_for(&source),
                        source,
                        success: false,
                        attempts: 0,
                    }
                })
            })
            .collect()
    }

    async fn attempt(&self, source: &Path, output_path: &Path) -> Result<(), ConversionError> {
        let outdir = output_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONVERTED_DIR));
        let _ = tokio::fs::create_dir_all(&outdir).await;
        if tokio::fs::metadata(output_path).await.is_ok() {
            let _ = tokio::fs::remove_file(output_path).await;
        }

        let profile_dir = self
            .profile_root
            .join(format!("libreoffice_user_{}", uuid::Uuid::new_v4()));
        let profile_url = format!("file://{}", profile_dir.to_string_lossy());

        let output = Command::new(&self.program)
            .args(&self.base_args)
            .arg(format!("-env:UserInstallation={}", profile_url))
            .args(["--headless", "--norestore", "--convert-to", "pdf"])
            .arg(source)
            .arg("--outdir")
            .arg(&outdir)
            .env("UserInstallation", &profile_url)
            .kill_on_drop(true)
            .output()
            .await;

        let _ = tokio::fs::remove_dir_all(&profile_dir).await;

        let output = output.map_err(|source| ConversionError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        tracing::debug!(
            "Converter stdout for {}: {}",
            source.display(),
            String::from_utf8_lossy(&output.stdout).trim()
        );

        if !output.status.success() {
            return Err(ConversionError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match tokio::fs::metadata(output_path).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            Ok(_) => Err(ConversionError::EmptyOutput(output_path.to_path_buf())),
            Err(_) => Err(ConversionError::MissingOutput(output_path.to_path_buf())),
        }
    }
}
