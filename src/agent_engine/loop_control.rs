// Optional run limits. Unlimited unless configured.
use std::time::{Duration, Instant};

use crate::config::AgentConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    StepLimit(u64),
    TimeLimit(Duration),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::StepLimit(n) => write!(f, "step limit of {n} reached"),
            StopReason::TimeLimit(d) => write!(f, "time limit of {}s reached", d.as_secs()),
        }
    }
}

pub struct LoopController {
    max_steps: Option<u64>,
    max_duration: Option<Duration>,
    start_time: Instant,
}

impl LoopController {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            max_duration: config
                .max_duration_minutes
                .map(|m| Duration::from_secs(m.saturating_mul(60))),
            start_time: Instant::now(),
        }
    }

    /// Checked before starting step `next_step` (1-based).
    pub fn should_stop(&self, next_step: u64) -> Option<StopReason> {
        if let Some(max) = self.max_steps {
            if next_step > max {
                return Some(StopReason::StepLimit(max));
            }
        }
        if let Some(max) = self.max_duration {
            if self.start_time.elapsed() >= max {
                return Some(StopReason::TimeLimit(max));
            }
        }
        None
    }
}
