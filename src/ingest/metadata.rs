//! LLM-generated chunk metadata: document title, keywords, section
//! summaries (own, previous, next) and answerable questions.

use std::sync::Arc;

use serde_json::json;

use super::indexer::Node;
use crate::llm::{ChatRequest, LlmError, LlmKind, LlmProvider};

const TITLE_CONTEXT_NODES: usize = 5;

#[derive(Clone)]
pub struct MetadataExtractor {
    llm: Arc<dyn LlmProvider>,
    kind: LlmKind,
    keywords: usize,
    questions: usize,
}

impl MetadataExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>, keywords: usize, questions: usize) -> Self {
        Self {
            llm,
            kind: LlmKind::Gpt35Turbo,
            keywords: keywords.max(1),
            questions: questions.max(1),
        }
    }

    /// Enriches the chunks of one document in place.
    pub async fn enrich(&self, nodes: &mut [Node]) -> Result<(), LlmError> {
        if nodes.is_empty() {
            return Ok(());
        }

        let title = self.title(nodes).await?;
        let mut summaries = Vec::with_capacity(nodes.len());
        for node in nodes.iter() {
            summaries.push(self.summary(&node.text).await?);
        }

        for idx in 0..nodes.len() {
            let keywords = self.keywords(&nodes[idx].text).await?;
            let questions = self.questions(&nodes[idx].text).await?;

            let meta = &mut nodes[idx].metadata;
            meta.insert("document_title".to_string(), json!(title));
            meta.insert("excerpt_keywords".to_string(), json!(keywords));
            meta.insert("section_summary".to_string(), json!(summaries[idx]));
            if idx > 0 {
                meta.insert("prev_section_summary".to_string(), json!(summaries[idx - 1]));
            }
            if let Some(next) = summaries.get(idx + 1) {
                meta.insert("next_section_summary".to_string(), json!(next));
            }
            meta.insert("questions_this_excerpt_can_answer".to_string(), json!(questions));
        }

        Ok(())
    }

    async fn title(&self, nodes: &[Node]) -> Result<String, LlmError> {
        let mut candidates = Vec::new();
        for node in nodes.iter().take(TITLE_CONTEXT_NODES) {
            let prompt = format!(
                "{}\nGive a title that summarizes all of the unique entities, titles or themes \
                 found in the context. Title: ",
                node.text
            );
            candidates.push(self.ask(prompt).await?);
        }

        if candidates.len() == 1 {
            return Ok(candidates.remove(0));
        }

        let prompt = format!(
            "{}\nBased on the above candidate titles and content, what is the comprehensive \
             title for this document? Title: ",
            candidates.join(", ")
        );
        self.ask(prompt).await
    }

    async fn keywords(&self, text: &str) -> Result<String, LlmError> {
        self.ask(format!(
            "{}. Give {} unique keywords for this document. Format as comma separated. Keywords: ",
            text, self.keywords
        ))
        .await
    }

    async fn summary(&self, text: &str) -> Result<String, LlmError> {
        self.ask(format!(
            "Here is the content of the section:\n{}\n\nSummarize the key topics and entities \
             of the section. \nSummary: ",
            text
        ))
        .await
    }

    async fn questions(&self, text: &str) -> Result<String, LlmError> {
        self.ask(format!(
            "Here is the context:\n{}\n\nGiven the contextual information, generate {} \
             questions this context can provide specific answers to which are unlikely to be \
             found elsewhere.",
            text, self.questions
        ))
        .await
    }

    async fn ask(&self, prompt: String) -> Result<String, LlmError> {
        let answer = self.llm.chat(ChatRequest::prompt(prompt), self.kind).await?;
        Ok(answer.trim().trim_matches('"').to_string())
    }
}
