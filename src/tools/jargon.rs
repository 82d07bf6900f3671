use std::sync::Arc;

use async_trait::async_trait;

use super::{require_input, Tool, ToolError};
use crate::llm::{ChatRequest, LlmKind, LlmProvider};

const EXAMPLES: &str = "\
1. Synergistic Value Co-Creation - Facilitating a multi-lateral, dynamic synergy interface to exponentially enhance shared outcomes and cross-functional team deliverables.
2. Paradigm Diversification Strategy - Architecting a robust framework for outside-the-conventional-boundary ideation, fostering a culture of continuous innovation and strategic blue-sky thinking.
3. Low-Effort, High-Impact Trajectory Optimization - Streamlining the identification and cultivation of accessible, yet strategically significant, targets to maximize return on effort and resource investment.
4. Quantitative Needle Movement Analytics - Employing advanced metrics and analytics to identify and leverage key drivers that materially shift performance indicators and organizational benchmarks.
5. Revolutionary Paradigm Architecture - Systematically deconstructing and reassembling foundational business models to initiate a groundbreaking shift in operational, cultural, and market engagement methodologies.";

/// Rewrites plain English as corporate jargon. Delegates the whole rule set
/// to a single prompt.
pub struct JargonTool {
    llm: Arc<dyn LlmProvider>,
}

impl JargonTool {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

pub fn jargon_prompt(text: &str) -> String {
    format!(
        "You are a corporate jargon translator, you translate regular English into corporate jargon.\n\
         Make it the most egregious corporate jargon possible.\n\
         Also include tech, devops, and venture capital type jargon.\n\n\
         Here are some examples of corporate jargon:\n{}\n\n\n\
         Here is the regular text to translate: [{}]",
        EXAMPLES, text
    )
}

#[async_trait]
impl Tool for JargonTool {
    fn name(&self) -> &str {
        "translate_to_jargon"
    }

    fn description(&self) -> &str {
        "This tool uses the OpenAI model to translate the user input into corporate jargon."
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        let text = require_input(input)?;
        tracing::info!("Initiating jargon translation");
        let answer = self
            .llm
            .chat(ChatRequest::prompt(jargon_prompt(text)), LlmKind::Gpt4)
            .await?;
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedLlm;

    #[tokio::test]
    async fn sends_input_inside_prompt() {
        let llm = Arc::new(ScriptedLlm::new(vec!["  Leverage the synergy.  ".to_string()]));
        let tool = JargonTool::new(llm.clone());

        let answer = tool.invoke("\"let's work together\"").await.unwrap();

        assert_eq!(answer, "Leverage the synergy.");
        let (request, kind) = llm.requests().remove(0);
        assert_eq!(kind, LlmKind::Gpt4);
        assert!(request.messages[0]
            .content
            .ends_with("Here is the regular text to translate: [let's work together]"));
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let tool = JargonTool::new(Arc::new(ScriptedLlm::new(vec![])));
        assert!(matches!(tool.invoke("  ").await, Err(ToolError::InvalidInput(_))));
    }
}
