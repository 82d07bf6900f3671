//! Collection search: vector retrieval followed by an LLM listwise rerank.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::store::{SearchHit, VectorStore};
use super::VectorStoreError;
use crate::llm::{ChatMessage, ChatRequest, EmbeddingProvider, LlmError, LlmKind, LlmProvider};

const PASSAGE_CHAR_LIMIT: usize = 1_200;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to embed query: {0}")]
    Embedding(#[source] LlmError),

    #[error("vector search failed: {0}")]
    Store(#[from] VectorStoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedDocument {
    pub text: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

impl From<SearchHit> for RankedDocument {
    fn from(hit: SearchHit) -> Self {
        Self {
            text: hit.text().to_string(),
            score: hit.score,
            metadata: hit.metadata(),
        }
    }
}

#[derive(Clone)]
pub struct DocumentSearch {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    top_k: usize,
    top_n: usize,
    rerank_kind: LlmKind,
}

impl DocumentSearch {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        top_k: usize,
        top_n: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            top_k: top_k.max(1),
            top_n: top_n.max(1),
            rerank_kind: LlmKind::Gpt4_32k,
        }
    }

    /// Retrieves `top_k` chunks for `query` and returns the best `top_n`
    /// after reranking. A failed rerank keeps vector order.
    pub async fn search_documents(
        &self,
        collection: &str,
        query: &str,
    ) -> Result<Vec<RankedDocument>, SearchError> {
        tracing::debug!("Searching documents in collection '{}'", collection);

        let mut vectors = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(SearchError::Embedding)?;
        let query_vector = vectors.pop().ok_or_else(|| {
            SearchError::Embedding(LlmError::InvalidResponse(
                "no embedding returned for query".to_string(),
            ))
        })?;

        let hits = self
            .store
            .search(collection, &query_vector, self.top_k, None)
            .await?;

        if hits.len() <= 1 {
            return Ok(hits.into_iter().map(RankedDocument::from).collect());
        }

        let order = match self.rerank(query, &hits).await {
            Ok(order) => order,
            Err(err) => {
                tracing::warn!("Rerank failed, keeping vector order: {}", err);
                (0..hits.len()).collect()
            }
        };

        let mut slots: Vec<Option<SearchHit>> = hits.into_iter().map(Some).collect();
        Ok(order
            .into_iter()
            .filter_map(|idx| slots.get_mut(idx).and_then(Option::take))
            .take(self.top_n)
            .map(RankedDocument::from)
            .collect())
    }

    async fn rerank(&self, query: &str, hits: &[SearchHit]) -> Result<Vec<usize>, LlmError> {
        let mut prompt = format!(
            "I will provide you with {} passages, each indicated by a numerical identifier []. \
             Rank the passages based on their relevance to the search query: {}.\n\n",
            hits.len(),
            query
        );
        for (idx, hit) in hits.iter().enumerate() {
            let passage: String = hit.text().chars().take(PASSAGE_CHAR_LIMIT).collect();
            prompt.push_str(&format!("[{}] {}\n", idx + 1, passage));
        }
        prompt.push_str(&format!(
            "\nSearch Query: {}.\nRank the {} passages above based on their relevance to the \
             search query. All the passages should be included and listed using identifiers, \
             in descending order of relevance. The output format should be [] > [], e.g., \
             [1] > [2]. Only respond with the ranking results, do not say any word or explain.",
            query,
            hits.len()
        ));

        let request = ChatRequest::new(vec![
            ChatMessage::system(
                "You are RankGPT, an intelligent assistant that can rank passages based on \
                 their relevancy to the query.",
            ),
            ChatMessage::user(prompt),
        ]);
        let answer = self.llm.chat(request, self.rerank_kind).await?;
        Ok(parse_ranking(&answer, hits.len()))
    }
}

/// Turns `[3] > [1] > [2]` into zero-based indices, dropping duplicates and
/// out-of-range ids and appending anything the model left out.
pub fn parse_ranking(answer: &str, len: usize) -> Vec<usize> {
    let Ok(pattern) = Regex::new(r"\[(\d+)\]") else {
        return (0..len).collect();
    };

    let mut seen = HashSet::new();
    let mut order = Vec::with_capacity(len);
    for capture in pattern.captures_iter(answer) {
        let Ok(id) = capture[1].parse::<usize>() else {
            continue;
        };
        if id >= 1 && id <= len && seen.insert(id - 1) {
            order.push(id - 1);
        }
    }
    order.extend((0..len).filter(|idx| !seen.contains(idx)));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::sqlite::SqliteVectorStore;
    use crate::rag::store::VectorPoint;
    use crate::test_support::{FakeEmbedder, ScriptedLlm};
    use serde_json::json;

    #[test]
    fn ranking_parser_handles_noise() {
        assert_eq!(parse_ranking("[3] > [1] > [2]", 3), vec![2, 0, 1]);
        assert_eq!(parse_ranking("[2] > [2] > [9]", 3), vec![1, 0, 2]);
        assert_eq!(parse_ranking("no idea", 2), vec![0, 1]);
    }

    #[tokio::test]
    async fn search_returns_top_n_in_reranked_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            SqliteVectorStore::with_path(dir.path().join("v.db"))
                .await
                .unwrap(),
        );
        store.create_collection("techdocs", 3).await.unwrap();

        let embedder = Arc::new(FakeEmbedder::new(3));
        let texts = ["rust ownership", "rust borrowing", "python typing"];
        let vectors = embedder
            .embed(&texts.iter().map(|t| t.to_string()).collect::<Vec<_>>())
            .await
            .unwrap();
        let points = texts
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| {
                let mut payload = Map::new();
                payload.insert("text".to_string(), json!(text));
                payload.insert("file_name".to_string(), json!(format!("{}.md", i)));
                VectorPoint {
                    id: format!("p{}", i),
                    vector,
                    payload,
                }
            })
            .collect();
        store.upsert("techdocs", points).await.unwrap();

        let llm = Arc::new(ScriptedLlm::new(vec!["[3] > [2] > [1]".to_string()]));
        let search = DocumentSearch::new(store, embedder, llm.clone(), 8, 2);

        let results = search.search_documents("techdocs", "rust").await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.metadata.contains_key("text")));
        assert_eq!(llm.calls(), 1);
    }
}
