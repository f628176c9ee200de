// Dispatches a parsed tool call to the input driver.
use std::time::Duration;

use crate::config::InputConfig;
use crate::errors::{GridPilotError, GridPilotResult};
use crate::executor::action::{decode_action, ActionFailure, ActionResult, ComputerAction};
use crate::executor::coordinator::{virtual_to_screen, ScreenCoordinate, VirtualCoordinate};
use crate::executor::input::{InputDriver, InputError, MouseButton, ScrollAxis};
use crate::executor::keys::normalize_chord;
use crate::llm::tool_call::ToolCall;

pub struct Executor {
    driver: Box<dyn InputDriver>,
    type_interval: Duration,
    drag_duration: Duration,
}

impl Executor {
    pub fn new(driver: Box<dyn InputDriver>, config: &InputConfig) -> Self {
        Self {
            driver,
            type_interval: Duration::from_millis(config.type_interval_ms),
            drag_duration: Duration::from_millis(config.drag_duration_ms),
        }
    }

    /// Decodes and runs one tool call.
    ///
    /// Only the fail-safe abort comes back as `Err`; every other problem is
    /// reported as `ActionResult::Failed` for the loop to record.
    pub async fn run_tool_call(&mut self, call: &ToolCall) -> GridPilotResult<ActionResult> {
        match decode_action(&call.arguments) {
            Ok(action) => self.execute(action).await,
            Err(failure) => {
                tracing::warn!(%failure, "tool call rejected");
                Ok(ActionResult::Failed(failure))
            }
        }
    }

    pub async fn execute(&mut self, action: ComputerAction) -> GridPilotResult<ActionResult> {
        let kind = action.kind().as_str();
        tracing::info!(action = kind, ?action, "executing");

        match action {
            ComputerAction::MouseMove { coordinate } => {
                self.with_point(kind, coordinate, |d, at| d.move_to(at))
            }
            ComputerAction::LeftClick { coordinate } => {
                self.with_point(kind, coordinate, |d, at| d.click(at, MouseButton::Left, 1))
            }
            ComputerAction::RightClick { coordinate } => {
                self.with_point(kind, coordinate, |d, at| d.click(at, MouseButton::Right, 1))
            }
            ComputerAction::MiddleClick { coordinate } => {
                self.with_point(kind, coordinate, |d, at| d.click(at, MouseButton::Middle, 1))
            }
            ComputerAction::DoubleClick { coordinate } => {
                self.with_point(kind, coordinate, |d, at| d.click(at, MouseButton::Left, 2))
            }
            ComputerAction::LeftClickDrag { coordinate } => {
                let duration = self.drag_duration;
                self.with_point(kind, coordinate, move |d, at| {
                    d.drag_to(at, MouseButton::Left, duration)
                })
            }
            ComputerAction::Type { text } => {
                let interval = self.type_interval;
                let outcome = self.driver.type_text(&text, interval);
                settle(kind, outcome)
            }
            ComputerAction::Key { keys } => {
                let chord = normalize_chord(&keys);
                tracing::debug!(?keys, ?chord, "key chord after aliasing");
                let outcome = self.driver.hotkey(&chord);
                settle(kind, outcome)
            }
            ComputerAction::Scroll { pixels } => {
                let outcome = self.driver.scroll(pixels.trunc() as i32, ScrollAxis::Vertical);
                settle(kind, outcome)
            }
            ComputerAction::Hscroll { pixels } => {
                let outcome = self.driver.scroll(pixels.trunc() as i32, ScrollAxis::Horizontal);
                settle(kind, outcome)
            }
            ComputerAction::Wait { time } => {
                let Ok(delay) = Duration::try_from_secs_f64(time) else {
                    return Ok(ActionResult::Failed(ActionFailure::InvalidArguments {
                        action: kind.to_string(),
                        reason: format!("`time` out of range: {time}"),
                    }));
                };
                tracing::info!(seconds = time, "waiting");
                tokio::time::sleep(delay).await;
                Ok(ActionResult::Continue)
            }
            ComputerAction::Terminate { status } => {
                let status = status.map(|s| match s {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                });
                tracing::info!(status = status.as_deref().unwrap_or("<none>"), "terminate requested");
                Ok(ActionResult::Terminated { status })
            }
            ComputerAction::Answer { text } => {
                tracing::info!(answer = %text, "answer");
                Ok(ActionResult::Continue)
            }
        }
    }

    fn with_point<F>(
        &mut self,
        kind: &str,
        coordinate: VirtualCoordinate,
        op: F,
    ) -> GridPilotResult<ActionResult>
    where
        F: FnOnce(&mut dyn InputDriver, ScreenCoordinate) -> Result<(), InputError>,
    {
        let screen = match self.driver.screen_size() {
            Ok(size) => size,
            Err(e) => return settle(kind, Err(e)),
        };
        let Some(at) = virtual_to_screen(coordinate, screen) else {
            tracing::warn!(action = kind, vx = coordinate.x, vy = coordinate.y, "coordinate beyond addressable range");
            return Ok(ActionResult::Failed(ActionFailure::InvalidArguments {
                action: kind.to_string(),
                reason: format!(
                    "coordinate [{}, {}] maps outside the addressable pixel range",
                    coordinate.x, coordinate.y
                ),
            }));
        };
        tracing::info!(
            action = kind,
            vx = coordinate.x,
            vy = coordinate.y,
            x = at.x,
            y = at.y,
            "virtual → screen"
        );
        let outcome = op(self.driver.as_mut(), at);
        settle(kind, outcome)
    }
}

/// Classifies a driver outcome. The fail-safe is the one fatal case.
fn settle(kind: &str, outcome: Result<(), InputError>) -> GridPilotResult<ActionResult> {
    match outcome {
        Ok(()) => Ok(ActionResult::Continue),
        Err(InputError::FailSafe) => Err(GridPilotError::Aborted(
            "fail-safe corner reached during input injection".into(),
        )),
        Err(InputError::UnknownKey(key)) => Ok(ActionResult::Failed(ActionFailure::InvalidArguments {
            action: kind.to_string(),
            reason: format!("unsupported key `{key}`"),
        })),
        Err(InputError::Backend(msg)) => {
            tracing::warn!(action = kind, error = %msg, "input backend failed");
            Ok(ActionResult::Failed(ActionFailure::Input(msg)))
        }
    }
}
