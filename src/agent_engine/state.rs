use crate::agent_engine::history::SemanticHistory;
use crate::agent_engine::repeat_guard::RepeatGuard;
use crate::errors::{GridPilotError, GridPilotResult};

/// Lifecycle states of the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentState {
    Running,
    Cooldown,
    Terminated { success: bool },
}

/// The automation goal. Fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goal(String);

impl Goal {
    pub fn new(text: impl AsRef<str>) -> GridPilotResult<Self> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(GridPilotError::Config("goal is empty".into()));
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a run mutates between steps, threaded explicitly through
/// the loop.
#[derive(Debug, Clone)]
pub struct LoopState {
    pub step: u64,
    pub history: SemanticHistory,
    pub repeat_guard: RepeatGuard,
}

impl LoopState {
    pub fn new(history_window: usize, max_repeat: usize) -> Self {
        Self {
            step: 0,
            history: SemanticHistory::new(history_window),
            repeat_guard: RepeatGuard::new(max_repeat),
        }
    }
}

/// What a single step did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Screen capture failed; backing off.
    PerceptionFailed(String),
    /// Planner unreachable or answered unsuccessfully; backing off.
    PlannerUnavailable,
    /// Sentinel text received.
    Finished,
    /// Same tool-call block repeated; execution skipped.
    Cooldown,
    /// Tool-call text could not be parsed (policy already applied).
    ParseFailed(String),
    /// The executor reported a recoverable failure.
    ActionFailed(String),
    /// Action ran; carries the summary appended to history.
    Executed(String),
    /// The model issued `terminate`.
    TerminatedByAction(Option<String>),
}

impl StepOutcome {
    /// Short event name used in the step journal.
    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::PerceptionFailed(_) => "perception_failed",
            StepOutcome::PlannerUnavailable => "planner_unavailable",
            StepOutcome::Finished => "finished",
            StepOutcome::Cooldown => "cooldown",
            StepOutcome::ParseFailed(_) => "parse_failed",
            StepOutcome::ActionFailed(_) => "action_failed",
            StepOutcome::Executed(_) => "executed",
            StepOutcome::TerminatedByAction(_) => "terminated",
        }
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            StepOutcome::PerceptionFailed(d)
            | StepOutcome::ParseFailed(d)
            | StepOutcome::ActionFailed(d)
            | StepOutcome::Executed(d) => Some(d.clone()),
            StepOutcome::TerminatedByAction(status) => status.clone(),
            _ => None,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub success: bool,
    pub steps: u64,
    pub reason: String,
    pub history: Vec<String>,
}
