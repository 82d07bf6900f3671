use std::sync::Arc;

use super::parser::{self, AgentStep, INVALID_RESPONSE};
use super::templates::{PromptTemplate, PromptVars};
use super::AgentError;
use crate::llm::{ChatRequest, LlmKind, LlmProvider};
use crate::tools::Tool;

pub const STOP_SEQUENCE: &str = "\nObservation:";
pub const ITERATION_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

/// One completed reasoning step: the model's raw output and what came back.
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateStep {
    pub tool: String,
    pub input: String,
    pub log: String,
    pub observation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorOutput {
    pub output: String,
    pub steps: Vec<IntermediateStep>,
}

/// Runs the ReAct loop: prompt, parse, call a tool, feed back the
/// observation, until a final answer or the iteration cap.
pub struct AgentExecutor {
    llm: Arc<dyn LlmProvider>,
    kind: LlmKind,
    tools: Vec<Arc<dyn Tool>>,
    prompt: PromptTemplate,
    max_iterations: usize,
}

impl AgentExecutor {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        kind: LlmKind,
        tools: Vec<Arc<dyn Tool>>,
        prompt: PromptTemplate,
        max_iterations: usize,
    ) -> Self {
        Self {
            llm,
            kind,
            tools,
            prompt,
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub async fn run(&self, input: &str, chat_history: &str) -> Result<ExecutorOutput, AgentError> {
        let tools = self
            .tools
            .iter()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let tool_names = self.tool_names().join(", ");
        let mut steps: Vec<IntermediateStep> = Vec::new();

        for iteration in 0..self.max_iterations {
            let scratchpad = render_scratchpad(&steps);
            let prompt = self.prompt.render(&PromptVars {
                tools: &tools,
                tool_names: &tool_names,
                chat_history,
                input,
                agent_scratchpad: &scratchpad,
            });
            let request = ChatRequest::prompt(prompt).with_stop(vec![STOP_SEQUENCE.to_string()]);
            let completion = self.llm.chat(request, self.kind).await?;

            let step = match parser::parse(&completion) {
                Ok(AgentStep::Finish { output, .. }) => {
                    tracing::info!(
                        "Agent finished after {} step(s)",
                        iteration + 1
                    );
                    return Ok(ExecutorOutput { output, steps });
                }
                Ok(AgentStep::Action { tool, input, log }) => {
                    let observation = self.call_tool(&tool, &input, &tool_names).await;
                    IntermediateStep {
                        tool,
                        input,
                        log,
                        observation,
                    }
                }
                Err(err) => {
                    tracing::warn!("Unparseable agent output: {}", err);
                    IntermediateStep {
                        tool: "_Exception".to_string(),
                        input: INVALID_RESPONSE.to_string(),
                        log: err.log,
                        observation: INVALID_RESPONSE.to_string(),
                    }
                }
            };
            tracing::debug!(
                "Step {}/{}: {} -> {} chars",
                iteration + 1,
                self.max_iterations,
                step.tool,
                step.observation.len()
            );
            steps.push(step);
        }

        tracing::warn!("Agent hit the iteration cap of {}", self.max_iterations);
        Ok(ExecutorOutput {
            output: ITERATION_LIMIT_MESSAGE.to_string(),
            steps,
        })
    }

    async fn call_tool(&self, name: &str, input: &str, tool_names: &str) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            return format!("{} is not a valid tool, try one of [{}].", name, tool_names);
        };
        tracing::info!("Invoking tool {}", name);
        match tool.invoke(input).await {
            Ok(observation) => observation,
            Err(err) => {
                tracing::warn!("Tool {} failed: {}", name, err);
                format!("Error: {}", err)
            }
        }
    }
}

pub fn render_scratchpad(steps: &[IntermediateStep]) -> String {
    let mut thoughts = String::new();
    for step in steps {
        thoughts.push_str(&step.log);
        thoughts.push_str("\nObservation: ");
        thoughts.push_str(&step.observation);
        thoughts.push_str("\nThought: ");
    }
    thoughts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedLlm;
    use crate::tools::registry::tests::EchoTool;

    fn prompt() -> PromptTemplate {
        PromptTemplate {
            prefix: "Tools:".to_string(),
            react_cot: "Names: {tool_names}".to_string(),
            suffix: "History: {chat_history}\nQuestion: {input}\nThought:{agent_scratchpad}"
                .to_string(),
        }
    }

    fn executor(llm: Arc<ScriptedLlm>, fail: bool, max_iterations: usize) -> AgentExecutor {
        AgentExecutor::new(
            llm,
            LlmKind::Gpt4,
            vec![Arc::new(EchoTool {
                name: "search_techdocs",
                fail,
            })],
            prompt(),
            max_iterations,
        )
    }

    #[tokio::test]
    async fn tool_observation_is_fed_back() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            " I should look.\nAction: search_techdocs\nAction Input: tokio".to_string(),
            " I now know.\nFinal Answer: Tokio is a runtime.".to_string(),
        ]));
        let run = executor(llm.clone(), false, 5)
            .run("what is tokio?", "Human: hi\nAI: hello")
            .await
            .unwrap();

        assert_eq!(run.output, "Tokio is a runtime.");
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].observation, "search_techdocs saw tokio");

        let requests = llm.requests();
        let (first, kind) = &requests[0];
        assert_eq!(*kind, LlmKind::Gpt4);
        assert_eq!(first.stop.as_deref(), Some(&[STOP_SEQUENCE.to_string()][..]));
        assert!(first.messages[0].content.contains("search_techdocs: echoes input"));
        assert!(first.messages[0].content.contains("History: Human: hi\nAI: hello"));
        assert!(requests[1].0.messages[0].content.ends_with(
            "Thought: I should look.\nAction: search_techdocs\nAction Input: tokio\nObservation: search_techdocs saw tokio\nThought: "
        ));
    }

    #[tokio::test]
    async fn unknown_tool_and_parse_errors_become_observations() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "Action: search_bing\nAction Input: x".to_string(),
            "just rambling".to_string(),
            "Final Answer: ok".to_string(),
        ]));
        let run = executor(llm, false, 5).run("q", "").await.unwrap();

        assert_eq!(run.output, "ok");
        assert_eq!(
            run.steps[0].observation,
            "search_bing is not a valid tool, try one of [search_techdocs]."
        );
        assert_eq!(run.steps[1].observation, INVALID_RESPONSE);
    }

    #[tokio::test]
    async fn tool_errors_are_reported_to_the_model() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "Action: search_techdocs\nAction Input: x".to_string(),
        ]));
        let run = executor(llm, true, 5).run("q", "").await.unwrap();
        assert!(run.steps[0].observation.starts_with("Error: "));
        assert_eq!(run.output, "done");
    }

    #[tokio::test]
    async fn stops_at_iteration_cap() {
        let llm = Arc::new(
            ScriptedLlm::new(vec![]).with_fallback("Action: search_techdocs\nAction Input: again"),
        );
        let run = executor(llm.clone(), false, 3).run("q", "").await.unwrap();

        assert_eq!(run.output, ITERATION_LIMIT_MESSAGE);
        assert_eq!(run.steps.len(), 3);
        assert_eq!(llm.calls(), 3);
    }
}
