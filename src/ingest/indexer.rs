//! Chunk, optionally enrich, embed and upsert documents into a collection.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::metadata::MetadataExtractor;
use super::reader::Document;
use super::IngestError;
use crate::llm::{EmbeddingProvider, LlmError};
use crate::rag::{TextSplitter, VectorPoint, VectorStore};

/// The unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
}

pub struct Indexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    splitter: TextSplitter,
    extractor: Option<MetadataExtractor>,
    batch_size: usize,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        splitter: TextSplitter,
    ) -> Self {
        Self {
            store,
            embedder,
            splitter,
            extractor: None,
            batch_size: 16,
        }
    }

    pub fn with_extractor(mut self, extractor: MetadataExtractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Indexes `documents` into `collection`. Metadata extraction failures
    /// fall back to plain chunks; embedding and store failures abort.
    pub async fn index(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<IndexReport, IngestError> {
        let mut nodes = Vec::new();
        for document in documents {
            let mut doc_nodes = self.split(document);
            if let Some(extractor) = &self.extractor {
                let mut enriched = doc_nodes.clone();
                match extractor.enrich(&mut enriched).await {
                    Ok(()) => doc_nodes = enriched,
                    Err(err) => tracing::warn!(
                        "Metadata extraction failed for {}, indexing without it: {}",
                        document.file_path().unwrap_or("<unknown>"),
                        err
                    ),
                }
            }
            nodes.extend(doc_nodes);
        }

        let chunks = nodes.len();
        for batch in nodes.chunks(self.batch_size) {
            let texts = batch.iter().map(|n| n.text.clone()).collect::<Vec<_>>();
            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .map_err(IngestError::Embedding)?;
            if vectors.len() != batch.len() {
                return Err(IngestError::Embedding(LlmError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                ))));
            }

            let points = batch
                .iter()
                .zip(vectors)
                .map(|(node, vector)| {
                    let mut payload = node.metadata.clone();
                    payload.insert("text".to_string(), json!(node.text));
                    VectorPoint {
                        id: node.id.clone(),
                        vector,
                        payload,
                    }
                })
                .collect::<Vec<_>>();
            self.store.upsert(collection, points).await?;
        }

        tracing::info!(
            "Indexed {} documents as {} chunks into '{}'",
            documents.len(),
            chunks,
            collection
        );
        Ok(IndexReport {
            documents: documents.len(),
            chunks,
        })
    }

    fn split(&self, document: &Document) -> Vec<Node> {
        let doc_id = uuid::Uuid::new_v4().to_string();
        self.splitter
            .split(&document.text)
            .into_iter()
            .map(|chunk| {
                let mut metadata = document.metadata.clone();
                metadata.insert("doc_id".to_string(), json!(doc_id));
                metadata.insert("chunk_index".to_string(), json!(chunk.chunk_index));
                metadata.insert("start_offset".to_string(), json!(chunk.start_offset));
                Node {
                    id: uuid::Uuid::new_v4().to_string(),
                    text: chunk.text,
                    metadata,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatRequest, LlmKind, LlmProvider};
    use crate::rag::{SplitterConfig, SqliteVectorStore};
    use crate::test_support::{FakeEmbedder, ScriptedLlm};
    use async_trait::async_trait;

    struct DownLlm;

    #[async_trait]
    impl LlmProvider for DownLlm {
        fn name(&self) -> &str {
            "down"
        }

        async fn chat(&self, _: ChatRequest, _: LlmKind) -> Result<String, LlmError> {
            Err(LlmError::Provider {
                status: 500,
                message: "boom".to_string(),
            })
        }
    }

    fn document(path: &str, text: &str) -> Document {
        let mut metadata = Map::new();
        metadata.insert("file_path".to_string(), json!(path));
        Document {
            text: text.to_string(),
            metadata,
        }
    }

    async fn store(dir: &tempfile::TempDir) -> Arc<SqliteVectorStore> {
        let store = SqliteVectorStore::with_path(dir.path().join("v.db"))
            .await
            .unwrap();
        store.create_collection("techdocs", 8).await.unwrap();
        Arc::new(store)
    }

    fn splitter() -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size: 40,
            chunk_overlap: 5,
        })
    }

    #[tokio::test]
    async fn chunks_are_embedded_and_stored_with_file_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let indexer = Indexer::new(store.clone(), Arc::new(FakeEmbedder::new(8)), splitter())
            .with_batch_size(2);

        let report = indexer
            .index(
                "techdocs",
                &[
                    document("/docs/a.md", "Alpha is first. Alpha has more words here. And more."),
                    document("/docs/b.md", "Beta."),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.documents, 2);
        assert!(report.chunks >= 3);
        assert_eq!(store.count("techdocs", None).await.unwrap(), report.chunks);
        assert!(store.file_in_collection("techdocs", "/docs/b.md").await.unwrap());
    }

    #[tokio::test]
    async fn extractor_failure_falls_back_to_plain_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let indexer = Indexer::new(store.clone(), Arc::new(FakeEmbedder::new(8)), splitter())
            .with_extractor(MetadataExtractor::new(Arc::new(DownLlm), 6, 3));

        let report = indexer
            .index("techdocs", &[document("/docs/a.md", "Plain text.")])
            .await
            .unwrap();

        assert_eq!(report.chunks, 1);
        let hits = store.search("techdocs", &[1.0; 8], 1, None).await.unwrap();
        assert!(!hits[0].payload.contains_key("document_title"));
    }

    #[tokio::test]
    async fn extractor_success_adds_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let llm = Arc::new(ScriptedLlm::new(vec!["Plain Title".to_string()]));
        let indexer = Indexer::new(store.clone(), Arc::new(FakeEmbedder::new(8)), splitter())
            .with_extractor(MetadataExtractor::new(llm, 6, 3));

        indexer
            .index("techdocs", &[document("/docs/a.md", "Plain text.")])
            .await
            .unwrap();

        let hits = store.search("techdocs", &[1.0; 8], 1, None).await.unwrap();
        assert_eq!(hits[0].payload["document_title"], "Plain Title");
    }

    #[tokio::test]
    async fn embedding_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let indexer = Indexer::new(store, Arc::new(FakeEmbedder::failing(8)), splitter());

        let result = indexer
            .index("techdocs", &[document("/docs/a.md", "Plain text.")])
            .await;

        assert!(matches!(result, Err(IngestError::Embedding(_))));
    }

    /// Drops the last vector of every batch.
    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ShortEmbedder {
        fn dimension(&self) -> usize {
            8
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            Ok(vec![vec![1.0; 8]; inputs.len().saturating_sub(1)])
        }
    }

    #[tokio::test]
    async fn missing_embeddings_abort_instead_of_dropping_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let indexer = Indexer::new(store.clone(), Arc::new(ShortEmbedder), splitter());

        let result = indexer
            .index(
                "techdocs",
                &[
                    document("/docs/a.md", "Alpha."),
                    document("/docs/b.md", "Beta."),
                ],
            )
            .await;

        assert!(matches!(
            result,
            Err(IngestError::Embedding(LlmError::InvalidResponse(_)))
        ));
        assert_eq!(store.count("techdocs", None).await.unwrap(), 0);
    }
}
