use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::executor::coordinator::VirtualCoordinate;

/// Closed set of action types the executor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    MouseMove,
    LeftClick,
    RightClick,
    MiddleClick,
    DoubleClick,
    LeftClickDrag,
    Type,
    Key,
    Scroll,
    Hscroll,
    Wait,
    Terminate,
    Answer,
}

impl ActionKind {
    pub const ALL: [ActionKind; 13] = [
        ActionKind::MouseMove,
        ActionKind::LeftClick,
        ActionKind::RightClick,
        ActionKind::MiddleClick,
        ActionKind::DoubleClick,
        ActionKind::LeftClickDrag,
        ActionKind::Type,
        ActionKind::Key,
        ActionKind::Scroll,
        ActionKind::Hscroll,
        ActionKind::Wait,
        ActionKind::Terminate,
        ActionKind::Answer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::MouseMove => "mouse_move",
            ActionKind::LeftClick => "left_click",
            ActionKind::RightClick => "right_click",
            ActionKind::MiddleClick => "middle_click",
            ActionKind::DoubleClick => "double_click",
            ActionKind::LeftClickDrag => "left_click_drag",
            ActionKind::Type => "type",
            ActionKind::Key => "key",
            ActionKind::Scroll => "scroll",
            ActionKind::Hscroll => "hscroll",
            ActionKind::Wait => "wait",
            ActionKind::Terminate => "terminate",
            ActionKind::Answer => "answer",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

/// A validated `computer_use` action, one variant per action type with its
/// own argument schema.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ComputerAction {
    MouseMove { coordinate: VirtualCoordinate },
    LeftClick { coordinate: VirtualCoordinate },
    RightClick { coordinate: VirtualCoordinate },
    MiddleClick { coordinate: VirtualCoordinate },
    DoubleClick { coordinate: VirtualCoordinate },
    LeftClickDrag { coordinate: VirtualCoordinate },
    Type { text: String },
    Key { keys: Vec<String> },
    /// Signed; positive scrolls up.
    Scroll { pixels: f64 },
    /// Signed; positive scrolls right.
    Hscroll { pixels: f64 },
    /// Seconds.
    Wait { time: f64 },
    Terminate {
        #[serde(default)]
        status: Option<Value>,
    },
    Answer { text: String },
}

impl ComputerAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            ComputerAction::MouseMove { .. } => ActionKind::MouseMove,
            ComputerAction::LeftClick { .. } => ActionKind::LeftClick,
            ComputerAction::RightClick { .. } => ActionKind::RightClick,
            ComputerAction::MiddleClick { .. } => ActionKind::MiddleClick,
            ComputerAction::DoubleClick { .. } => ActionKind::DoubleClick,
            ComputerAction::LeftClickDrag { .. } => ActionKind::LeftClickDrag,
            ComputerAction::Type { .. } => ActionKind::Type,
            ComputerAction::Key { .. } => ActionKind::Key,
            ComputerAction::Scroll { .. } => ActionKind::Scroll,
            ComputerAction::Hscroll { .. } => ActionKind::Hscroll,
            ComputerAction::Wait { .. } => ActionKind::Wait,
            ComputerAction::Terminate { .. } => ActionKind::Terminate,
            ComputerAction::Answer { .. } => ActionKind::Answer,
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            ComputerAction::Key { keys } if keys.is_empty() => Err("`keys` is empty".into()),
            ComputerAction::Key { keys } if keys.iter().any(|k| k.trim().is_empty()) => {
                Err("`keys` contains a blank key name".into())
            }
            ComputerAction::Scroll { pixels } | ComputerAction::Hscroll { pixels }
                if !pixels.is_finite() || pixels.abs() > i32::MAX as f64 =>
            {
                Err(format!("`pixels` out of range: {pixels}"))
            }
            ComputerAction::Wait { time } if Duration::try_from_secs_f64(*time).is_err() => {
                Err(format!("`time` must be a representable non-negative number of seconds, got {time}"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionFailure {
    UnsupportedAction(String),
    InvalidArguments { action: String, reason: String },
    Input(String),
}

impl std::fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionFailure::UnsupportedAction(name) => write!(f, "unsupported action: {name}"),
            ActionFailure::InvalidArguments { action, reason } => {
                write!(f, "invalid arguments for {action}: {reason}")
            }
            ActionFailure::Input(msg) => write!(f, "input injection failed: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Continue,
    Terminated { status: Option<String> },
    Failed(ActionFailure),
}

/// Resolves the `action` discriminator against the closed set first so an
/// unknown type and a bad argument set are reported differently.
pub fn decode_action(arguments: &Map<String, Value>) -> Result<ComputerAction, ActionFailure> {
    let name = match arguments.get("action") {
        Some(Value::String(name)) => name.as_str(),
        Some(other) => {
            return Err(ActionFailure::InvalidArguments {
                action: other.to_string(),
                reason: "`action` is not a string".into(),
            })
        }
        None => {
            return Err(ActionFailure::InvalidArguments {
                action: "<missing>".into(),
                reason: "`action` is missing".into(),
            })
        }
    };

    let kind = ActionKind::from_name(name)
        .ok_or_else(|| ActionFailure::UnsupportedAction(name.to_string()))?;

    let invalid = |reason: String| ActionFailure::InvalidArguments {
        action: kind.as_str().to_string(),
        reason,
    };

    let action: ComputerAction =
        serde_json::from_value(Value::Object(arguments.clone())).map_err(|e| invalid(e.to_string()))?;
    action.validate().map_err(invalid)?;
    Ok(action)
}
