//! Fetch a page (and optionally same-site pages it links to) into a collection.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map};

use super::indexer::Indexer;
use super::reader::Document;
use super::IngestError;
use crate::core::errors::error_chain;
use crate::web::fetch::parse_http_url;
use crate::web::{extract_links, html_to_text, page_metadata, FetchedPage, WebFetcher};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebLoadReport {
    pub pages: usize,
    pub chunks: usize,
    /// The URL was already indexed and nothing was fetched.
    pub skipped: bool,
}

pub struct WebDocumentLoader {
    fetcher: WebFetcher,
    indexer: Arc<Indexer>,
}

impl WebDocumentLoader {
    pub fn new(fetcher: WebFetcher, indexer: Arc<Indexer>) -> Self {
        Self { fetcher, indexer }
    }

    pub async fn load(
        &self,
        url: &str,
        collection: &str,
        re_process: bool,
    ) -> Result<WebLoadReport, IngestError> {
        let url = parse_http_url(url.trim())?.to_string();
        let store = self.indexer.store();
        store
            .ensure_collection(collection, self.indexer.dimension())
            .await?;

        if !re_process && store.url_in_collection(collection, &url).await? {
            tracing::info!("Url({}) already in collection '{}'", url, collection);
            return Ok(WebLoadReport {
                skipped: true,
                ..WebLoadReport::default()
            });
        }

        let documents = self.crawl(&url).await?;
        let mut report = WebLoadReport::default();
        for document in &documents {
            match self.indexer.index(collection, std::slice::from_ref(document)).await {
                Ok(indexed) => {
                    report.pages += 1;
                    report.chunks += indexed.chunks;
                }
                Err(err) => tracing::error!(
                    "Failed to index {} ({}): {}",
                    document.metadata.get("url").and_then(|v| v.as_str()).unwrap_or(&url),
                    err.kind(),
                    error_chain(&err)
                ),
            }
        }

        tracing::info!(
            "Loaded {} of {} pages from {} into '{}'",
            report.pages,
            documents.len(),
            url,
            collection
        );
        Ok(report)
    }

    /// Breadth-first over same-host links. A depth of 1 loads only the start
    /// page. The start page must load; linked pages that fail are skipped.
    async fn crawl(&self, start: &str) -> Result<Vec<Document>, IngestError> {
        let settings = self.fetcher.settings();
        let max_depth = settings.max_depth.max(1);
        let max_documents = settings.max_documents.max(1);

        let first = self.fetcher.fetch(start).await?;
        let host = first.url.host_str().map(str::to_string);

        let mut seen = HashSet::new();
        seen.insert(first.url.to_string());
        let mut queue = VecDeque::new();
        queue.push_back((first, 1usize));
        let mut documents = Vec::new();

        while let Some((page, depth)) = queue.pop_front() {
            if depth < max_depth && page.is_html() {
                for link in extract_links(&page.body, &page.url) {
                    if link.host_str().map(str::to_string) != host {
                        continue;
                    }
                    if seen.insert(link.to_string()) {
                        match self.fetcher.fetch(link.as_str()).await {
                            Ok(child) => queue.push_back((child, depth + 1)),
                            Err(err) => tracing::warn!("Skipping {}: {}", link, err),
                        }
                    }
                    if seen.len() >= max_documents {
                        break;
                    }
                }
            }

            documents.push(page_document(&page));
            if documents.len() >= max_documents {
                break;
            }
        }

        Ok(documents)
    }
}

pub(crate) fn page_document(page: &FetchedPage) -> Document {
    let mut metadata = Map::new();
    metadata.insert("url".to_string(), json!(page.url.to_string()));
    metadata.insert(
        "last_accessed_date".to_string(),
        json!(Utc::now().format("%Y-%m-%d").to_string()),
    );

    let text = if page.is_html() {
        let meta = page_metadata(&page.body);
        for (key, value) in [
            ("title", meta.title),
            ("description", meta.description),
            ("keywords", meta.keywords),
            ("language", meta.language),
        ] {
            if let Some(value) = value {
                metadata.insert(key.to_string(), json!(value));
            }
        }
        html_to_text(&page.body)
    } else {
        page.body.clone()
    };

    Document { text, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::settings::WebSettings;
    use crate::rag::{SplitterConfig, SqliteVectorStore, TextSplitter, VectorStore};
    use crate::test_support::{serve_pages, FakeEmbedder};

    async fn loader(dir: &tempfile::TempDir, max_depth: usize) -> (WebDocumentLoader, Arc<SqliteVectorStore>) {
        let store = Arc::new(
            SqliteVectorStore::with_path(dir.path().join("v.db"))
                .await
                .unwrap(),
        );
        let indexer = Indexer::new(
            store.clone(),
            Arc::new(FakeEmbedder::new(8)),
            TextSplitter::new(SplitterConfig {
                chunk_size: 500,
                chunk_overlap: 50,
            }),
        );
        let fetcher = WebFetcher::new(WebSettings {
            allow_private_networks: true,
            max_depth,
            ..WebSettings::default()
        })
        .unwrap();
        (WebDocumentLoader::new(fetcher, Arc::new(indexer)), store)
    }

    fn pages() -> Vec<(&'static str, &'static str)> {
        vec![
            (
                "/",
                r#"<html lang="en"><head><title>Home</title></head>
                   <body><p>Welcome home.</p><a href="/next">next</a></body></html>"#,
            ),
            ("/next", "<html><head><title>Next</title></head><body><p>Second page.</p></body></html>"),
        ]
    }

    #[tokio::test]
    async fn loads_start_page_with_metadata_then_skips_it() {
        let base = serve_pages(pages()).await;
        let dir = tempfile::tempdir().unwrap();
        let (loader, store) = loader(&dir, 1).await;
        let url = format!("{}/", base);

        let report = loader.load(&url, "techdocs", false).await.unwrap();
        assert_eq!(report.pages, 1);
        assert!(!report.skipped);

        let hits = store.search("techdocs", &[1.0; 8], 5, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload["title"], "Home");
        assert_eq!(hits[0].payload["language"], "en");
        assert!(hits[0].text().contains("Welcome home."));

        let again = loader.load(&url, "techdocs", false).await.unwrap();
        assert!(again.skipped);
    }

    #[tokio::test]
    async fn follows_same_host_links_to_depth() {
        let base = serve_pages(pages()).await;
        let dir = tempfile::tempdir().unwrap();
        let (loader, store) = loader(&dir, 2).await;

        let report = loader.load(&format!("{}/", base), "web", false).await.unwrap();

        assert_eq!(report.pages, 2);
        assert!(store
            .url_in_collection("web", &format!("{}/next", base))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unreachable_start_page_is_an_error() {
        let base = serve_pages(pages()).await;
        let dir = tempfile::tempdir().unwrap();
        let (loader, _) = loader(&dir, 1).await;

        let result = loader.load(&format!("{}/missing", base), "techdocs", false).await;
        assert!(matches!(result, Err(IngestError::Fetch(_))));
    }
}
