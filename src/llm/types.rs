use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
            stop: None,
        }
    }

    /// Single user-turn request, the shape every prompt-style call uses.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::new(vec![ChatMessage::user(text)])
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }
}

/// Deployment family a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LlmKind {
    #[default]
    Gpt4,
    Gpt4_32k,
    Gpt35Turbo,
}

impl LlmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmKind::Gpt4 => "azure_openai_gpt4",
            LlmKind::Gpt4_32k => "azure_openai_gpt4_32k",
            LlmKind::Gpt35Turbo => "azure_openai_35_turbo",
        }
    }
}

impl fmt::Display for LlmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmKind {
    type Err = String;

    /// Accepts enum-style names (`AZURE_OPENAI_GPT4_32K`), their lowercase
    /// values and the `LLAMA_` prefixed variants used by agent configs.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        let normalized = normalized.strip_prefix("llama_").unwrap_or(&normalized);
        match normalized {
            "azure_openai_gpt4" | "gpt4" | "gpt-4" => Ok(LlmKind::Gpt4),
            "azure_openai_gpt4_32k" | "gpt4_32k" | "gpt-4-32k" => Ok(LlmKind::Gpt4_32k),
            "azure_openai_gpt_35_turbo" | "azure_openai_35_turbo" | "gpt35_turbo"
            | "gpt-35-turbo" => Ok(LlmKind::Gpt35Turbo),
            _ => Err(format!("unknown llm type '{}'", raw)),
        }
    }
}
