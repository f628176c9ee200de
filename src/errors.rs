use thiserror::Error;

use crate::llm::tool_call::ToolCallError;

#[derive(Debug, Error)]
pub enum GridPilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Planner error: {0}")]
    Planner(String),

    #[error("Tool call error: {0}")]
    ToolCall(#[from] ToolCallError),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Run aborted: {0}")]
    Aborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type GridPilotResult<T> = Result<T, GridPilotError>;
