//! The compositor's window list.

use serde::{Deserialize, Serialize};

use super::app::pid_t;
use super::geometry::Rect;

/// The compositor's identifier for a window surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct WindowServerId(u32);

impl WindowServerId {
    pub fn new(id: u32) -> Self { WindowServerId(id) }

    pub fn as_u32(&self) -> u32 { self.0 }

    pub fn is_valid(&self) -> bool { self.0 != 0 }
}

impl From<WindowServerId> for u32 {
    fn from(id: WindowServerId) -> u32 { id.0 }
}

/// One entry of the compositor window list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowServerInfo {
    pub id: WindowServerId,
    pub pid: pid_t,
    pub title: String,
    pub layer: i32,
    pub on_screen: bool,
    pub bounds: Rect,
}

pub trait WindowList: Send + Sync {
    /// A snapshot of all on-screen windows in front-to-back order.
    fn on_screen_windows(&self) -> Vec<WindowServerInfo>;
}
