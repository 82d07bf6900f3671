//! Saves the text of a web page as markdown into the scraped-data directory,
//! where the next document run picks it up.

use std::path::{Path, PathBuf};

use super::web_loader::page_document;
use super::IngestError;
use crate::web::WebFetcher;

pub struct Scraper {
    fetcher: WebFetcher,
    output_dir: PathBuf,
}

impl Scraper {
    pub fn new(fetcher: WebFetcher, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns the path of the written file.
    pub async fn scrape(&self, url: &str) -> Result<PathBuf, IngestError> {
        let page = self.fetcher.fetch(url).await?;
        let document = page_document(&page);

        let title = document
            .metadata
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or(page.url.as_str());
        let markdown = format!("# {}\n\nSource: {}\n\n{}\n", title, page.url, document.text);

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| IngestError::Io {
                path: self.output_dir.clone(),
                source,
            })?;
        let path = self.output_dir.join(file_name_for(page.url.as_str()));
        tokio::fs::write(&path, markdown)
            .await
            .map_err(|source| IngestError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::info!("Scraped {} into {}", page.url, path.display());
        Ok(path)
    }
}

/// `https://docs.rs/tokio/latest/` -> `docs.rs_tokio_latest.md`
fn file_name_for(url: &str) -> String {
    let trimmed = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let mut name = trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect::<String>();
    while name.contains("__") {
        name = name.replace("__", "_");
    }
    let name = name.trim_matches('_');
    let name = if name.is_empty() { "page" } else { name };
    format!("{}.md", name.chars().take(150).collect::<String>())
}
