//! Tools backed by the document index: collection search and web loading.

use std::sync::Arc;

use async_trait::async_trait;

use super::{require_input, Tool, ToolError};
use crate::ingest::WebDocumentLoader;
use crate::rag::{DocumentSearch, RankedDocument};

pub struct DocumentSearchTool {
    name: String,
    description: String,
    collection: String,
    search: Arc<DocumentSearch>,
}

impl DocumentSearchTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        collection: impl Into<String>,
        search: Arc<DocumentSearch>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            collection: collection.into(),
            search,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl Tool for DocumentSearchTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        let query = require_input(input)?;
        let results = self.search.search_documents(&self.collection, query).await?;
        if results.is_empty() {
            return Ok(format!("No documents found in '{}'", self.collection));
        }
        Ok(render_results(&results))
    }
}

fn render_results(results: &[RankedDocument]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(idx, doc)| {
            let source = ["file_name", "url", "file_path"]
                .iter()
                .find_map(|key| doc.metadata.get(*key).and_then(|v| v.as_str()))
                .unwrap_or("unknown");
            format!("[{}] {} (score {:.3})\n{}", idx + 1, source, doc.score, doc.text.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct LoadWebDocumentTool {
    loader: Arc<WebDocumentLoader>,
    collection: String,
}

impl LoadWebDocumentTool {
    pub fn new(loader: Arc<WebDocumentLoader>, collection: impl Into<String>) -> Self {
        Self {
            loader,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl Tool for LoadWebDocumentTool {
    fn name(&self) -> &str {
        "load_web_document"
    }

    fn description(&self) -> &str {
        "This is a tool that takes a single valid url string as input and retrieve the web page or \
         other document and process it for storage in the vector store named 'TechDocs'. Once \
         loaded it can be accessed with the search_techdocs tool"
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        let url = require_input(input)?;
        let report = self.loader.load(url, &self.collection, false).await?;
        if report.skipped {
            return Ok(format!("{} is already loaded into '{}'", url, self.collection));
        }
        Ok(format!(
            "Loaded {} page(s) from {} into '{}'",
            report.pages, url, self.collection
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::{SqliteVectorStore, VectorPoint, VectorStore};
    use crate::test_support::{FakeEmbedder, ScriptedLlm};
    use crate::llm::EmbeddingProvider;
    use serde_json::{json, Map};

    #[tokio::test]
    async fn renders_ranked_results_with_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            SqliteVectorStore::with_path(dir.path().join("v.db"))
                .await
                .unwrap(),
        );
        store.create_collection("techdocs", 8).await.unwrap();
        let embedder = Arc::new(FakeEmbedder::new(8));
        let vector = embedder.embed(&["tokio runtime".to_string()]).await.unwrap().remove(0);
        let mut payload = Map::new();
        payload.insert("text".to_string(), json!("Tokio is an async runtime."));
        payload.insert("file_name".to_string(), json!("tokio.md"));
        store
            .upsert(
                "techdocs",
                vec![VectorPoint {
                    id: "1".to_string(),
                    vector,
                    payload,
                }],
            )
            .await
            .unwrap();

        let search = Arc::new(DocumentSearch::new(
            store,
            embedder,
            Arc::new(ScriptedLlm::new(vec![])),
            8,
            3,
        ));
        let tool = DocumentSearchTool::new("search_techdocs", "desc", "techdocs", search);

        let output = tool.invoke("tokio runtime").await.unwrap();

        assert!(output.starts_with("[1] tokio.md (score "));
        assert!(output.ends_with("Tokio is an async runtime."));
    }

    #[test]
    fn results_without_source_read_as_unknown() {
        let docs = vec![RankedDocument {
            text: " body ".to_string(),
            score: 0.5,
            metadata: Map::new(),
        }];
        assert_eq!(render_results(&docs), "[1] unknown (score 0.500)\nbody");
    }
}
