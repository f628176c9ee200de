// Virtual grid → physical screen mapping.
use serde::Deserialize;

/// Side length of the square grid the decision service reasons in.
pub const VIRTUAL_GRID: i64 = 1000;

/// A point on the 1000×1000 virtual grid. Non-integral inputs are floored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "[f64; 2]")]
pub struct VirtualCoordinate {
    pub x: i32,
    pub y: i32,
}

impl VirtualCoordinate {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl TryFrom<[f64; 2]> for VirtualCoordinate {
    type Error = String;

    fn try_from([x, y]: [f64; 2]) -> Result<Self, Self::Error> {
        if !x.is_finite() || !y.is_finite() {
            return Err(format!("coordinate must be finite, got [{x}, {y}]"));
        }
        let limit = i32::MAX as f64;
        if x.abs() > limit || y.abs() > limit {
            return Err(format!("coordinate out of range: [{x}, {y}]"));
        }
        Ok(Self {
            x: x.floor() as i32,
            y: y.floor() as i32,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenCoordinate {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Per-axis linear scale with floor semantics. No aspect correction and no
/// clamping: out-of-grid points land off-screen and are passed on as-is.
///
/// `None` when the scaled point does not fit a pixel coordinate.
pub fn virtual_to_screen(point: VirtualCoordinate, screen: ScreenSize) -> Option<ScreenCoordinate> {
    let scale = |v: i32, extent: u32| -> Option<i32> {
        i32::try_from((v as i64 * extent as i64).div_euclid(VIRTUAL_GRID)).ok()
    };
    Some(ScreenCoordinate {
        x: scale(point.x, screen.width)?,
        y: scale(point.y, screen.height)?,
    })
}
