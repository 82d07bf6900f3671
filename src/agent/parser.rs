//! Parses ReAct-formatted completions into actions or final answers.

use regex::Regex;

const FINAL_ANSWER: &str = "Final Answer:";

/// Observation fed back to the model when its output cannot be parsed.
pub const INVALID_RESPONSE: &str = "Invalid or incomplete response";

#[derive(Debug, Clone, PartialEq)]
pub enum AgentStep {
    Action {
        tool: String,
        input: String,
        log: String,
    },
    Finish {
        output: String,
        log: String,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub log: String,
}

const ACTION: &str = r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)";
const ACTION_LABEL: &str = r"Action\s*\d*\s*:";
const ACTION_INPUT_LABEL: &str = r"Action\s*\d*\s*Input\s*\d*\s*:";

fn has_match(pattern: &str, text: &str) -> bool {
    Regex::new(pattern).map(|re| re.is_match(text)).unwrap_or(false)
}

/// A final answer takes precedence over any action in the same completion.
pub fn parse(text: &str) -> Result<AgentStep, ParseError> {
    if let Some(idx) = text.rfind(FINAL_ANSWER) {
        return Ok(AgentStep::Finish {
            output: text[idx + FINAL_ANSWER.len()..].trim().to_string(),
            log: text.to_string(),
        });
    }

    let action = Regex::new(ACTION).ok();
    if let Some(caps) = action.as_ref().and_then(|re| re.captures(text)) {
        let tool = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let input = caps
            .get(2)
            .map(|m| m.as_str().trim_matches(' ').trim_matches('"'))
            .unwrap_or_default();
        if !tool.is_empty() {
            return Ok(AgentStep::Action {
                tool: tool.to_string(),
                input: input.to_string(),
                log: text.to_string(),
            });
        }
    }

    let message = if !has_match(ACTION_LABEL, text) {
        "Invalid Format: Missing 'Action:' after 'Thought:'".to_string()
    } else if !has_match(ACTION_INPUT_LABEL, text) {
        "Invalid Format: Missing 'Action Input:' after 'Action:'".to_string()
    } else {
        format!("Could not parse LLM output: `{}`", text)
    };
    Err(ParseError {
        message,
        log: text.to_string(),
    })
}
