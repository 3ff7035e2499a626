use serde::{Deserialize, Serialize};
use strum::Display;

use super::records::{ApplicationRecord, Snapshot, WindowRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionKind {
    /// Cycle the windows of the foreground application.
    SameAppWindows,
    /// Cycle applications that have on-screen windows.
    CrossApp,
}

/// What a committed session activates.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Window(WindowRecord),
    Application(ApplicationRecord),
}

/// Moves `current` by `delta` positions around a ring of `len` items.
pub fn wrap_index(current: usize, len: usize, delta: isize) -> usize {
    if len == 0 {
        return 0;
    }
    (current as isize + delta).rem_euclid(len as isize) as usize
}

/// State of one open overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitcherSession {
    kind: SessionKind,
    items: Snapshot,
    selected: usize,
    active: bool,
}

impl SwitcherSession {
    /// Opens a session over `items`, or returns `None` when there is nothing
    /// to switch to.
    ///
    /// The initial selection skips the first item, which is whatever is
    /// already in front.
    pub fn open(kind: SessionKind, items: Snapshot) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        debug_assert_eq!(
            matches!(items, Snapshot::Windows(_)),
            kind == SessionKind::SameAppWindows,
            "snapshot shape does not match session kind"
        );
        let selected = if items.len() > 1 { 1 } else { 0 };
        Some(Self { kind, items, selected, active: true })
    }

    pub fn kind(&self) -> SessionKind { self.kind }

    pub fn items(&self) -> &Snapshot { &self.items }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn selected_index(&self) -> usize { self.selected }

    pub fn is_active(&self) -> bool { self.active }

    pub fn deactivate(&mut self) { self.active = false; }

    /// Returns true if the selection moved.
    pub fn select_next(&mut self) -> bool { self.step(1) }

    pub fn select_prev(&mut self) -> bool { self.step(-1) }

    fn step(&mut self, delta: isize) -> bool {
        let next = wrap_index(self.selected, self.items.len(), delta);
        let moved = next != self.selected;
        self.selected = next;
        moved
    }

    pub fn selection(&self) -> Option<Selection> {
        match &self.items {
            Snapshot::Windows(windows) => windows.get(self.selected).cloned().map(Selection::Window),
            Snapshot::Applications(apps) => {
                apps.get(self.selected).cloned().map(Selection::Application)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sys::geometry::Rect;
    use crate::sys::window_server::WindowServerId;

    fn window(id: u32) -> WindowRecord {
        WindowRecord {
            window_id: WindowServerId::new(id),
            title: format!("window {id}"),
            derived_label: format!("window {id}"),
            owner_app_name: "App".into(),
            owner_pid: 1,
            automation_index: id as usize,
            bounds: Rect::from_xywh(0.0, 0.0, 400.0, 300.0),
        }
    }

    fn windows(n: u32) -> Snapshot { Snapshot::Windows((1..=n).map(window).collect()) }

    #[test]
    fn empty_snapshot_opens_nothing() {
        assert!(SwitcherSession::open(SessionKind::SameAppWindows, windows(0)).is_none());
    }

    #[test]
    fn initial_selection_skips_the_front_item() {
        let session = SwitcherSession::open(SessionKind::SameAppWindows, windows(3)).unwrap();
        assert_eq!(session.selected_index(), 1);
        assert!(session.is_active());

        let single = SwitcherSession::open(SessionKind::SameAppWindows, windows(1)).unwrap();
        assert_eq!(single.selected_index(), 0);
    }

    #[test]
    fn selection_wraps_both_ways() {
        let mut session = SwitcherSession::open(SessionKind::SameAppWindows, windows(3)).unwrap();
        assert!(session.select_next());
        assert_eq!(session.selected_index(), 2);
        assert!(session.select_next());
        assert_eq!(session.selected_index(), 0);
        assert!(session.select_prev());
        assert_eq!(session.selected_index(), 2);
    }

    #[test]
    fn single_item_selection_never_moves() {
        let mut session = SwitcherSession::open(SessionKind::SameAppWindows, windows(1)).unwrap();
        assert!(!session.select_next());
        assert_eq!(session.selected_index(), 0);
        assert!(!session.select_prev());
        assert_eq!(session.selected_index(), 0);
    }

    #[test]
    fn selection_returns_the_record_under_the_cursor() {
        let session = SwitcherSession::open(SessionKind::SameAppWindows, windows(3)).unwrap();
        assert_eq!(session.selection(), Some(Selection::Window(window(2))));
    }

    #[test]
    fn wrap_index_handles_large_deltas() {
        assert_eq!(wrap_index(0, 3, -1), 2);
        assert_eq!(wrap_index(2, 3, 1), 0);
        assert_eq!(wrap_index(1, 3, -7), 0);
        assert_eq!(wrap_index(0, 0, 1), 0);
    }
}
