use serde::{Deserialize, Serialize};

use super::geometry::{Point, Rect};

type CGDirectDisplayID = u32;

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScreenId(CGDirectDisplayID);

impl ScreenId {
    pub fn new(id: u32) -> Self { ScreenId(id) }

    pub fn as_u32(&self) -> u32 { self.0 }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    pub id: ScreenId,
    /// Full bounds in global top-left-origin coordinates.
    pub frame: Rect,
}

pub trait DisplayList: Send + Sync {
    /// The active displays. The main display (origin at zero) comes first
    /// when there is one.
    fn displays(&self) -> Vec<DisplayInfo>;
}

/// Returns the display containing `point`.
///
/// Points that fall in the gaps between displays (or off every display, as a
/// half-offscreen window's center can) resolve to the nearest one.
pub fn display_for_point(displays: &[DisplayInfo], point: Point) -> Option<ScreenId> {
    if let Some(display) = displays.iter().find(|d| d.frame.contains(point)) {
        return Some(display.id);
    }
    displays
        .iter()
        .min_by(|a, b| a.frame.distance_sq_to(point).total_cmp(&b.frame.distance_sq_to(point)))
        .map(|d| d.id)
}

/// Moves the main display (the one with its origin at zero) to the front.
pub fn main_display_first(mut displays: Vec<DisplayInfo>) -> Vec<DisplayInfo> {
    if let Some(idx) = displays.iter().position(|d| d.frame.origin == Point::ZERO) {
        displays.swap(0, idx);
    }
    displays
}
