//! Conversational ReAct agent: prompt templates, output parsing, the tool
//! loop and per-conversation memory.

pub mod executor;
pub mod parser;
pub mod templates;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::defaults::fallback_agent_tools;
use crate::core::config::settings::AgentSettings;
use crate::history::{render_buffer, ChatHistoryStore, HistoryError, StoredMessage};
use crate::llm::{LlmError, LlmKind, LlmProvider};
use crate::tools::ToolRegistry;

pub use executor::{AgentExecutor, ExecutorOutput, IntermediateStep, ITERATION_LIMIT_MESSAGE};
pub use parser::{AgentStep, ParseError};
pub use templates::{AgentConfig, PromptTemplate, TemplateRegistry, DEFAULT_TEMPLATE};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to load template {path}: {message}")]
    Template { path: PathBuf, message: String },
}

/// One chat turn as requested by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatInput {
    pub user_input: String,
    pub chat_agent: String,
    pub chat_history_guid: String,
    #[serde(default)]
    pub custom_tools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub response: String,
    pub chat_history_guid: String,
    pub agent_name: String,
    pub agent_tools: Vec<String>,
}

pub struct AgentService {
    llm: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    templates: TemplateRegistry,
    history: ChatHistoryStore,
    settings: AgentSettings,
}

impl AgentService {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        templates: TemplateRegistry,
        history: ChatHistoryStore,
        settings: AgentSettings,
    ) -> Self {
        Self {
            llm,
            tools,
            templates,
            history,
            settings,
        }
    }

    pub fn history(&self) -> &ChatHistoryStore {
        &self.history
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Names of the tools enabled for `chat_agent`. Custom tools win, then
    /// the agent's config, then the default agent's, then a fixed pair.
    pub fn enabled_tools(&self, chat_agent: &str, custom_tools: &[String]) -> Vec<String> {
        if !custom_tools.is_empty() {
            tracing::info!("Using custom tools: {:?}", custom_tools);
            return custom_tools.to_vec();
        }
        if let Some(names) = self
            .templates
            .config(chat_agent)
            .and_then(|c| c.agent_tools_names.clone())
        {
            tracing::info!("Using {}'s tools: {:?}", chat_agent, names);
            return names;
        }
        let names = self
            .templates
            .config(DEFAULT_TEMPLATE)
            .and_then(|c| c.agent_tools_names.clone())
            .unwrap_or_else(fallback_agent_tools);
        tracing::info!(
            "Config for {} not found. Using default tools: {:?}",
            chat_agent,
            names
        );
        names
    }

    /// The agent's configured `llm_type`. Unknown values fall back to GPT-4
    /// with a warning.
    pub fn llm_kind(&self, chat_agent: &str) -> LlmKind {
        let Some(raw) = self.templates.config(chat_agent).and_then(|c| c.llm_type.as_deref())
        else {
            return LlmKind::default();
        };
        raw.parse::<LlmKind>().unwrap_or_else(|err| {
            tracing::warn!("{} for agent {}; using {}", err, chat_agent, LlmKind::default());
            LlmKind::default()
        })
    }

    pub async fn chat(&self, input: ChatInput) -> Result<ChatOutcome, AgentError> {
        if input.user_input.trim().is_empty() {
            return Err(AgentError::InvalidInput("user_input must not be empty".to_string()));
        }
        let chat_agent = if input.chat_agent.trim().is_empty() {
            self.settings.default_agent.clone()
        } else {
            input.chat_agent.clone()
        };
        tracing::info!(
            "Received {} chat (guid: {}) request",
            chat_agent,
            input.chat_history_guid
        );

        self.history
            .ensure(&input.chat_history_guid, &chat_agent)
            .await?;
        let past = self.history.messages(&input.chat_history_guid).await?;

        let agent_tools = self.enabled_tools(&chat_agent, &input.custom_tools);
        let executor = AgentExecutor::new(
            self.llm.clone(),
            self.llm_kind(&chat_agent),
            self.tools.select(&agent_tools),
            self.templates.prompt(&chat_agent),
            self.settings.max_iterations,
        );

        let run = executor
            .run(&input.user_input, &render_buffer(&past))
            .await
            .map_err(|err| {
                tracing::error!("Agent {} failed: {}", chat_agent, err);
                err
            })?;

        self.history
            .append(
                &input.chat_history_guid,
                vec![
                    StoredMessage::human(input.user_input.clone()),
                    StoredMessage::ai(run.output.clone()),
                ],
            )
            .await?;
        tracing::info!(
            "Successful chat response after {} tool step(s)",
            run.steps.len()
        );

        Ok(ChatOutcome {
            response: run.output,
            chat_history_guid: input.chat_history_guid,
            agent_name: chat_agent,
            agent_tools,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedLlm;
    use crate::tools::registry::tests::EchoTool;
    use std::fs;
    use std::path::Path;

    fn registry() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        for name in ["search_google", "search_techdocs", "translate_to_jargon"] {
            tools.register(Arc::new(EchoTool { name, fail: false }));
        }
        tools
    }

    fn write_config(root: &Path, agent: &str, body: &str) {
        fs::create_dir_all(root.join(agent)).unwrap();
        fs::write(root.join(agent).join("config.json"), body).unwrap();
    }

    fn service(root: &Path, llm: Arc<ScriptedLlm>) -> AgentService {
        AgentService::new(
            llm,
            registry(),
            TemplateRegistry::load(&root.join("templates")).unwrap(),
            ChatHistoryStore::new(root.join("memory")),
            AgentSettings::default(),
        )
    }

    fn input(text: &str, guid: &str) -> ChatInput {
        ChatInput {
            user_input: text.to_string(),
            chat_agent: "AgentFramework".to_string(),
            chat_history_guid: guid.to_string(),
            custom_tools: Vec::new(),
        }
    }

    #[test]
    fn tool_selection_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        let llm = Arc::new(ScriptedLlm::new(vec![]));

        let bare = service(dir.path(), llm.clone());
        assert_eq!(bare.enabled_tools("AgentFramework", &[]), fallback_agent_tools());

        write_config(&templates, "default", r#"{"agent_tools_names": ["search_google"]}"#);
        write_config(
            &templates,
            "Jargon",
            r#"{"agent_tools_names": ["translate_to_jargon"], "llm_type": "AZURE_OPENAI_GPT4_32K"}"#,
        );
        let configured = service(dir.path(), llm);
        assert_eq!(configured.enabled_tools("Jargon", &[]), vec!["translate_to_jargon"]);
        assert_eq!(configured.enabled_tools("Other", &[]), vec!["search_google"]);
        assert_eq!(
            configured.enabled_tools("Jargon", &["search_techdocs".to_string()]),
            vec!["search_techdocs"]
        );
        assert_eq!(configured.llm_kind("Jargon"), LlmKind::Gpt4_32k);
        assert_eq!(configured.llm_kind("Other"), LlmKind::Gpt4);
    }

    #[tokio::test]
    async fn chat_runs_agent_and_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new(vec![
            "Action: search_techdocs\nAction Input: tokio".to_string(),
            "Final Answer: Tokio is a runtime.".to_string(),
            "Final Answer: You asked about tokio.".to_string(),
        ]));
        let service = service(dir.path(), llm.clone());

        let first = service.chat(input("what is tokio?", "conv-1")).await.unwrap();
        assert_eq!(first.response, "Tokio is a runtime.");
        assert_eq!(first.agent_name, "AgentFramework");
        assert_eq!(first.agent_tools, fallback_agent_tools());

        service.chat(input("what did I ask?", "conv-1")).await.unwrap();
        let last_prompt = &llm.requests()[2].0.messages[0].content;
        assert!(last_prompt.contains("Human: what is tokio?\nAI: Tokio is a runtime."));

        let messages = service.history().messages("conv-1").await.unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3].content(), "You asked about tokio.");
    }

    #[tokio::test]
    async fn blank_input_and_bad_guid_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Arc::new(ScriptedLlm::new(vec![])));

        assert!(matches!(
            service.chat(input("  ", "conv-1")).await,
            Err(AgentError::InvalidInput(_))
        ));
        assert!(matches!(
            service.chat(input("hi", "../escape")).await,
            Err(AgentError::History(HistoryError::InvalidGuid(_)))
        ));
    }
}
