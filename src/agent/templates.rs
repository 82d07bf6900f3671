//! Prompt templates and per-agent configuration loaded from
//! `templates/<agent>/`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::AgentError;

pub const DEFAULT_TEMPLATE: &str = "default";

const BUILTIN_PREFIX: &str = "You are a helpful assistant. Answer the following questions as best \
you can. You have access to the following tools:";

const BUILTIN_REACT_COT: &str = "Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question";

const BUILTIN_SUFFIX: &str = "Begin!

Previous conversation history:
{chat_history}

Question: {input}
Thought:{agent_scratchpad}";

/// Contents of `templates/<agent>/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent_tools_names: Option<Vec<String>>,
    #[serde(default)]
    pub llm_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct AgentTemplates {
    prefix: Option<String>,
    react_cot: Option<String>,
    suffix: Option<String>,
    config: Option<AgentConfig>,
}

/// The three prompt sections resolved for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub prefix: String,
    pub react_cot: String,
    pub suffix: String,
}

/// Values substituted into a rendered prompt.
pub struct PromptVars<'a> {
    pub tools: &'a str,
    pub tool_names: &'a str,
    pub chat_history: &'a str,
    pub input: &'a str,
    pub agent_scratchpad: &'a str,
}

impl PromptTemplate {
    pub fn template_string(&self) -> String {
        format!(
            "{}\n{{tools}}\n{}\n{}",
            self.prefix, self.react_cot, self.suffix
        )
    }

    /// Single-pass substitution: values that themselves contain `{input}`
    /// and friends are never expanded again.
    pub fn render(&self, vars: &PromptVars<'_>) -> String {
        let template = self.template_string();
        let mut out = String::with_capacity(template.len() + vars.agent_scratchpad.len());
        let mut rest = template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let replaced = after.find('}').and_then(|close| {
                let value = match &after[..close] {
                    "tools" => vars.tools,
                    "tool_names" => vars.tool_names,
                    "chat_history" => vars.chat_history,
                    "input" => vars.input,
                    "agent_scratchpad" => vars.agent_scratchpad,
                    _ => return None,
                };
                Some((value, close))
            });
            match replaced {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Every agent directory found below the template root, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    agents: HashMap<String, AgentTemplates>,
}

impl TemplateRegistry {
    /// Reads every subdirectory of `root`. A missing root yields an empty
    /// registry that serves the built-in prompt.
    pub fn load(root: &Path) -> Result<Self, AgentError> {
        let mut agents = HashMap::new();
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Template directory {} not found", root.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(AgentError::Template {
                    path: root.to_path_buf(),
                    message: source.to_string(),
                })
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            agents.insert(name.to_string(), load_agent(&path)?);
        }
        tracing::info!("Loaded prompt templates for {} agent(s)", agents.len());
        Ok(Self { agents })
    }

    pub fn agent_names(&self) -> Vec<String> {
        let mut names = self.agents.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn config(&self, agent: &str) -> Option<&AgentConfig> {
        self.agents.get(agent).and_then(|t| t.config.as_ref())
    }

    /// Resolves each section from the agent, then `default`, then built-in text.
    pub fn prompt(&self, agent: &str) -> PromptTemplate {
        let own = self.agents.get(agent);
        let fallback = self.agents.get(DEFAULT_TEMPLATE);
        let pick = |select: fn(&AgentTemplates) -> Option<&String>, builtin: &str| {
            own.and_then(select)
                .or_else(|| fallback.and_then(select))
                .cloned()
                .unwrap_or_else(|| builtin.to_string())
        };
        PromptTemplate {
            prefix: pick(|t| t.prefix.as_ref(), BUILTIN_PREFIX),
            react_cot: pick(|t| t.react_cot.as_ref(), BUILTIN_REACT_COT),
            suffix: pick(|t| t.suffix.as_ref(), BUILTIN_SUFFIX),
        }
    }
}

fn load_agent(dir: &Path) -> Result<AgentTemplates, AgentError> {
    let read = |name: &str| -> Result<Option<String>, AgentError> {
        let path = dir.join(name);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AgentError::Template {
                path,
                message: err.to_string(),
            }),
        }
    };

    let config = match read("config.json")? {
        Some(raw) => Some(serde_json::from_str::<AgentConfig>(&raw).map_err(|err| {
            AgentError::Template {
                path: dir.join("config.json"),
                message: format!("agent_tools_names must be a list of strings: {}", err),
            }
        })?),
        None => None,
    };

    Ok(AgentTemplates {
        prefix: read("prefix.txt")?,
        react_cot: read("react_cot.txt")?,
        suffix: read("suffix.txt")?,
        config,
    })
}
