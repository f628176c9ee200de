// Physical input injection.
use std::time::Duration;

use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use thiserror::Error;

use crate::config::InputConfig;
use crate::errors::{GridPilotError, GridPilotResult};
use crate::executor::coordinator::{ScreenCoordinate, ScreenSize};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("fail-safe triggered: pointer is in the top-left corner")]
    FailSafe,

    #[error("unsupported key: {0}")]
    UnknownKey(String),

    #[error("input backend error: {0}")]
    Backend(String),
}

pub type InputResult<T> = Result<T, InputError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAxis {
    Vertical,
    Horizontal,
}

/// The move/click/type/scroll primitives the executor drives.
///
/// Scroll amounts follow the usual desktop convention: positive scrolls
/// up (vertical) or right (horizontal).
pub trait InputDriver {
    fn screen_size(&mut self) -> InputResult<ScreenSize>;
    fn move_to(&mut self, at: ScreenCoordinate) -> InputResult<()>;
    fn click(&mut self, at: ScreenCoordinate, button: MouseButton, count: u32) -> InputResult<()>;
    fn drag_to(&mut self, to: ScreenCoordinate, button: MouseButton, duration: Duration) -> InputResult<()>;
    fn type_text(&mut self, text: &str, interval: Duration) -> InputResult<()>;
    /// Presses `keys` in order, releases in reverse.
    fn hotkey(&mut self, keys: &[String]) -> InputResult<()>;
    fn scroll(&mut self, amount: i32, axis: ScrollAxis) -> InputResult<()>;
}

fn backend<E: std::fmt::Debug>(e: E) -> InputError {
    InputError::Backend(format!("{e:?}"))
}

/// Point `i` of `steps` on the segment `from..=to`, computed in i64 so far
/// apart endpoints cannot overflow.
fn interpolate(from: i32, to: i32, i: i32, steps: i32) -> i32 {
    let (from, to) = (from as i64, to as i64);
    (from + (to - from) * i as i64 / steps as i64) as i32
}

pub struct EnigoDriver {
    enigo: Enigo,
    failsafe: bool,
    pause: Duration,
}

impl EnigoDriver {
    pub fn new(config: &InputConfig) -> GridPilotResult<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| GridPilotError::Input(format!("failed to initialize enigo: {e:?}")))?;
        Ok(Self {
            enigo,
            failsafe: config.failsafe,
            pause: Duration::from_millis(config.action_pause_ms),
        })
    }

    fn check_failsafe(&self) -> InputResult<()> {
        if !self.failsafe {
            return Ok(());
        }
        let (x, y) = self.enigo.location().map_err(backend)?;
        if x <= 0 && y <= 0 {
            tracing::error!(x, y, "pointer in fail-safe corner");
            return Err(InputError::FailSafe);
        }
        Ok(())
    }

    fn settle(&self) {
        if !self.pause.is_zero() {
            std::thread::sleep(self.pause);
        }
    }

    fn map_button(button: MouseButton) -> Button {
        match button {
            MouseButton::Left => Button::Left,
            MouseButton::Right => Button::Right,
            MouseButton::Middle => Button::Middle,
        }
    }

    fn map_key(key: &str) -> InputResult<Key> {
        let mapped = match key {
            "command" | "winleft" | "super" => Key::Meta,
            "enter" => Key::Return,
            "tab" => Key::Tab,
            "esc" => Key::Escape,
            "backspace" => Key::Backspace,
            "ctrl" => Key::Control,
            "shift" => Key::Shift,
            "alt" => Key::Alt,
            "delete" => Key::Delete,
            "space" => Key::Space,
            "up" => Key::UpArrow,
            "down" => Key::DownArrow,
            "left" => Key::LeftArrow,
            "right" => Key::RightArrow,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" => Key::PageUp,
            "pagedown" => Key::PageDown,
            "capslock" => Key::CapsLock,
            "f1" => Key::F1,
            "f2" => Key::F2,
            "f3" => Key::F3,
            "f4" => Key::F4,
            "f5" => Key::F5,
            "f6" => Key::F6,
            "f7" => Key::F7,
            "f8" => Key::F8,
            "f9" => Key::F9,
            "f10" => Key::F10,
            "f11" => Key::F11,
            "f12" => Key::F12,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Unicode(c),
                    _ => return Err(InputError::UnknownKey(other.to_string())),
                }
            }
        };
        Ok(mapped)
    }
}

impl InputDriver for EnigoDriver {
    fn screen_size(&mut self) -> InputResult<ScreenSize> {
        let (w, h) = self.enigo.main_display().map_err(backend)?;
        Ok(ScreenSize {
            width: w.max(0) as u32,
            height: h.max(0) as u32,
        })
    }

    fn move_to(&mut self, at: ScreenCoordinate) -> InputResult<()> {
        self.check_failsafe()?;
        self.enigo
            .move_mouse(at.x, at.y, Coordinate::Abs)
            .map_err(backend)?;
        self.settle();
        Ok(())
    }

    fn click(&mut self, at: ScreenCoordinate, button: MouseButton, count: u32) -> InputResult<()> {
        self.check_failsafe()?;
        self.enigo
            .move_mouse(at.x, at.y, Coordinate::Abs)
            .map_err(backend)?;
        let btn = Self::map_button(button);
        for _ in 0..count.max(1) {
            self.enigo.button(btn, Direction::Click).map_err(backend)?;
        }
        self.settle();
        Ok(())
    }

    fn drag_to(&mut self, to: ScreenCoordinate, button: MouseButton, duration: Duration) -> InputResult<()> {
        self.check_failsafe()?;
        let (sx, sy) = self.enigo.location().map_err(backend)?;
        let btn = Self::map_button(button);

        // ~10ms per intermediate move.
        let steps = (duration.as_millis() / 10).max(1) as i32;
        let step_pause = duration / steps as u32;

        self.enigo.button(btn, Direction::Press).map_err(backend)?;
        for i in 1..=steps {
            let x = interpolate(sx, to.x, i, steps);
            let y = interpolate(sy, to.y, i, steps);
            if let Err(e) = self.enigo.move_mouse(x, y, Coordinate::Abs) {
                if let Err(release) = self.enigo.button(btn, Direction::Release) {
                    tracing::warn!(error = ?release, button = ?button, "failed to release button after aborted drag");
                }
                return Err(backend(e));
            }
            std::thread::sleep(step_pause);
        }
        self.enigo.button(btn, Direction::Release).map_err(backend)?;
        self.settle();
        Ok(())
    }

    fn type_text(&mut self, text: &str, interval: Duration) -> InputResult<()> {
        self.check_failsafe()?;
        let mut buf = [0u8; 4];
        for c in text.chars() {
            self.enigo.text(c.encode_utf8(&mut buf)).map_err(backend)?;
            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        }
        self.settle();
        Ok(())
    }

    fn hotkey(&mut self, keys: &[String]) -> InputResult<()> {
        self.check_failsafe()?;
        let mapped = keys
            .iter()
            .map(|k| Self::map_key(k))
            .collect::<InputResult<Vec<_>>>()?;

        let mut pressed = Vec::with_capacity(mapped.len());
        let mut failure = None;
        for key in &mapped {
            match self.enigo.key(*key, Direction::Press) {
                Ok(()) => pressed.push(*key),
                Err(e) => {
                    failure = Some(backend(e));
                    break;
                }
            }
        }
        for key in pressed.iter().rev() {
            if let Err(e) = self.enigo.key(*key, Direction::Release) {
                failure.get_or_insert(backend(e));
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }
        self.settle();
        Ok(())
    }

    fn scroll(&mut self, amount: i32, axis: ScrollAxis) -> InputResult<()> {
        self.check_failsafe()?;
        // enigo scrolls down/right for positive lengths.
        let (length, axis) = match axis {
            ScrollAxis::Vertical => (-amount, Axis::Vertical),
            ScrollAxis::Horizontal => (amount, Axis::Horizontal),
        };
        self.enigo.scroll(length, axis).map_err(backend)?;
        self.settle();
        Ok(())
    }
}
