use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{GridPilotError, GridPilotResult};

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub perception: PerceptionConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Base URL of the decision service, e.g. a tunnel in front of the model host.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
    /// Remote inference can take minutes; keep this generous.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional bearer token (falls back to env var GRIDPILOT_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

impl PlannerConfig {
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            self.endpoint_path.trim_start_matches('/')
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            endpoint_path: default_endpoint_path(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:8000".into()
}

fn default_endpoint_path() -> String {
    "/act".into()
}

fn default_timeout_secs() -> u64 {
    400
}

/// What the loop does when the planner's tool-call text cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailurePolicy {
    /// Record the failure marker in history and move on to the next step.
    #[default]
    Record,
    /// Back off and retry, leaving history untouched (same as a planner failure).
    Retry,
    /// End the run with an error.
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_max_repeat")]
    pub max_repeat: usize,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default)]
    pub on_parse_error: ParseFailurePolicy,
    #[serde(default)]
    pub max_steps: Option<u64>,
    #[serde(default)]
    pub max_duration_minutes: Option<u64>,
}

impl AgentConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            max_repeat: default_max_repeat(),
            retry_backoff_ms: default_retry_backoff_ms(),
            cooldown_ms: default_cooldown_ms(),
            step_delay_ms: default_step_delay_ms(),
            on_parse_error: ParseFailurePolicy::default(),
            max_steps: None,
            max_duration_minutes: None,
        }
    }
}

fn default_history_window() -> usize {
    5
}

fn default_max_repeat() -> usize {
    2
}

fn default_retry_backoff_ms() -> u64 {
    3000
}

fn default_cooldown_ms() -> u64 {
    2000
}

fn default_step_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionConfig {
    /// Longest edge of the uploaded screenshot, in pixels.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Diagnostic copies of every capture. Empty string disables.
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: Option<PathBuf>,
}

impl PerceptionConfig {
    pub fn screenshot_dir(&self) -> Option<&Path> {
        self.screenshot_dir
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
            screenshot_dir: default_screenshot_dir(),
        }
    }
}

fn default_max_dimension() -> u32 {
    1024
}

fn default_jpeg_quality() -> u8 {
    70
}

fn default_screenshot_dir() -> Option<PathBuf> {
    Some(PathBuf::from("./client_screenshots"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Moving the pointer to the top-left corner aborts the run.
    #[serde(default = "default_true")]
    pub failsafe: bool,
    #[serde(default = "default_action_pause_ms")]
    pub action_pause_ms: u64,
    #[serde(default = "default_type_interval_ms")]
    pub type_interval_ms: u64,
    #[serde(default = "default_drag_duration_ms")]
    pub drag_duration_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            failsafe: true,
            action_pause_ms: default_action_pause_ms(),
            type_interval_ms: default_type_interval_ms(),
            drag_duration_ms: default_drag_duration_ms(),
        }
    }
}

fn default_action_pause_ms() -> u64 {
    100
}

fn default_type_interval_ms() -> u64 {
    20
}

fn default_drag_duration_ms() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overrides the platform data directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn validate(&self) -> GridPilotResult<()> {
        if self.planner.server_url.trim().is_empty() {
            return Err(GridPilotError::Config("planner.server_url is empty".into()));
        }
        if self.agent.max_repeat < 2 {
            return Err(GridPilotError::Config(format!(
                "agent.max_repeat must be at least 2 (got {})",
                self.agent.max_repeat
            )));
        }
        if self.perception.max_dimension == 0 {
            return Err(GridPilotError::Config(
                "perception.max_dimension must be positive".into(),
            ));
        }
        if !(1..=100).contains(&self.perception.jpeg_quality) {
            return Err(GridPilotError::Config(format!(
                "perception.jpeg_quality must be within 1..=100 (got {})",
                self.perception.jpeg_quality
            )));
        }
        Ok(())
    }

    /// Environment variables win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("GRIDPILOT_SERVER_URL") {
            if !url.trim().is_empty() {
                self.planner.server_url = url;
            }
        }
        if let Ok(key) = std::env::var("GRIDPILOT_API_KEY") {
            if !key.trim().is_empty() {
                self.planner.api_key = Some(key);
            }
        }
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> GridPilotResult<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(GridPilotError::Config(format!(
            "config file {} does not exist",
            path.display()
        )));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(Some(candidate));
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join(CONFIG_FILE);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(Some(candidate));
    }

    Ok(None)
}

pub fn parse_config(content: &str) -> GridPilotResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    Ok(config)
}

/// Loads the config file (or defaults when none is found), applies env
/// overrides and validates the result.
pub fn load_config(explicit: Option<&Path>) -> GridPilotResult<AppConfig> {
    let mut config = match resolve_config_path(explicit)? {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            let config = parse_config(&content)?;
            tracing::info!(path = %path.display(), "config loaded");
            config
        }
        None => {
            tracing::info!("no config.toml found; using built-in defaults");
            AppConfig::default()
        }
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}
