//! The tagged tool-call protocol spoken by the decision service.
//!
//! A response carries one block such as
//! `<tool_call>{"name":"computer_use","arguments":{...}}</tool_call>`,
//! or a bare sentinel (`<terminate/>`) once the goal is reached.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// The only function the executor knows how to dispatch.
pub const SUPPORTED_FUNCTION: &str = "computer_use";

/// Compared against the sanitized text, lowercase.
pub const TERMINATION_SENTINELS: [&str; 2] = ["<bye/>", "<terminate/>"];

/// Signature used when no tagged block is present.
pub const INVALID_SIGNATURE: &str = "invalid";

#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("no <tool_call> block found")]
    Missing,

    #[error("tool call body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("tool call body is not a JSON object")]
    NotAnObject,

    #[error("tool call `arguments` is not a JSON object")]
    MalformedArguments,

    #[error("unsupported function: {0}")]
    UnsupportedCall(String),
}

/// A parsed tool call. `arguments` is passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

fn block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<tool_call>.*?</tool_call>").expect("static regex")
    })
}

fn body_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<tool_call>\s*(\{.*?\})\s*</tool_call>").expect("static regex")
    })
}

/// Strips markdown code fences and surrounding whitespace.
pub fn sanitize(text: &str) -> String {
    text.replace("```", "").trim().to_string()
}

pub fn is_termination_sentinel(sanitized: &str) -> bool {
    let lowered = sanitized.trim().to_lowercase();
    TERMINATION_SENTINELS.contains(&lowered.as_str())
}

/// The raw tagged block, used only for repeat detection. Formatting
/// differences produce different signatures.
pub fn signature(sanitized: &str) -> String {
    block_regex()
        .find(sanitized)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| INVALID_SIGNATURE.to_string())
}

pub fn parse_tool_call(sanitized: &str) -> Result<ToolCall, ToolCallError> {
    let captures = body_regex()
        .captures(sanitized)
        .ok_or(ToolCallError::Missing)?;
    let body = captures.get(1).map(|m| m.as_str()).ok_or(ToolCallError::Missing)?;

    let value: Value = serde_json::from_str(body)?;
    let Value::Object(mut object) = value else {
        return Err(ToolCallError::NotAnObject);
    };

    let name = match object.get("name") {
        Some(Value::String(name)) => name.clone(),
        Some(other) => return Err(ToolCallError::UnsupportedCall(other.to_string())),
        None => return Err(ToolCallError::UnsupportedCall("<missing>".into())),
    };
    if name != SUPPORTED_FUNCTION {
        return Err(ToolCallError::UnsupportedCall(name));
    }

    let arguments = match object.remove("arguments") {
        None => Map::new(),
        Some(Value::Object(arguments)) => arguments,
        Some(_) => return Err(ToolCallError::MalformedArguments),
    };

    Ok(ToolCall { name, arguments })
}
