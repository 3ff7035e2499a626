//! Snapshot records produced by a discovery pass.
//!
//! Records are rebuilt from scratch on every pass and never mutated; a
//! snapshot lives exactly as long as the session that displays it.

use serde::{Deserialize, Serialize};

use crate::sys::app::pid_t;
use crate::sys::geometry::Rect;
use crate::sys::window_server::WindowServerId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub window_id: WindowServerId,
    pub title: String,
    /// The short label shown in the overlay.
    pub derived_label: String,
    pub owner_app_name: String,
    pub owner_pid: pid_t,
    /// Position of this window in its owner's accessibility window list at
    /// enumeration time. This is the join key between the two lists.
    pub automation_index: usize,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub bundle_id: Option<String>,
    pub pid: pid_t,
    pub display_name: String,
    pub windows: Vec<WindowRecord>,
    pub is_foreground: bool,
}

impl ApplicationRecord {
    /// The window to raise when the application is chosen.
    pub fn front_window(&self) -> Option<&WindowRecord> { self.windows.first() }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "items")]
pub enum Snapshot {
    Windows(Vec<WindowRecord>),
    Applications(Vec<ApplicationRecord>),
}

impl Snapshot {
    pub fn len(&self) -> usize {
        match self {
            Snapshot::Windows(windows) => windows.len(),
            Snapshot::Applications(apps) => apps.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn label(&self, idx: usize) -> Option<&str> {
        match self {
            Snapshot::Windows(windows) => windows.get(idx).map(|w| w.derived_label.as_str()),
            Snapshot::Applications(apps) => apps.get(idx).map(|a| a.display_name.as_str()),
        }
    }

    pub fn labels(&self) -> Vec<&str> { (0..self.len()).filter_map(|idx| self.label(idx)).collect() }
}
