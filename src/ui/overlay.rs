//! The switcher overlay seam.
//!
//! Rendering is platform work; the switcher only needs to show a snapshot,
//! move the highlight, hide, and release whatever the view held on to.

use tracing::{debug, info};

use crate::model::records::Snapshot;
use crate::model::session::SessionKind;

pub trait Overlay: Send {
    fn show(&mut self, kind: SessionKind, items: &Snapshot, selected: usize);

    fn select(&mut self, selected: usize);

    fn hide(&mut self);

    /// Frees rendering resources. The next `show` starts from scratch.
    fn teardown(&mut self);
}

/// Writes the overlay contents to the log instead of drawing them.
#[derive(Debug, Default)]
pub struct LogOverlay {
    labels: Vec<String>,
    selected: Option<usize>,
}

impl LogOverlay {
    pub fn new() -> Self { Self::default() }

    fn selected_label(&self) -> &str {
        self.selected.and_then(|idx| self.labels.get(idx)).map_or("", String::as_str)
    }
}

fn format_label(label: &str, idx: usize) -> String {
    let label = label.trim();
    if label.is_empty() { format!("Item {}", idx + 1) } else { label.to_string() }
}

impl Overlay for LogOverlay {
    fn show(&mut self, kind: SessionKind, items: &Snapshot, selected: usize) {
        self.labels =
            items.labels().into_iter().enumerate().map(|(idx, l)| format_label(l, idx)).collect();
        self.selected = Some(selected);
        info!(%kind, items = ?self.labels, selected = self.selected_label(), "overlay shown");
    }

    fn select(&mut self, selected: usize) {
        if selected < self.labels.len() {
            self.selected = Some(selected);
            info!(selected = self.selected_label(), "overlay selection");
        }
    }

    fn hide(&mut self) {
        if self.selected.take().is_some() {
            debug!("overlay hidden");
        }
    }

    fn teardown(&mut self) { self.labels = Vec::new(); }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::records::ApplicationRecord;

    fn apps(names: &[&str]) -> Snapshot {
        Snapshot::Applications(
            names
                .iter()
                .enumerate()
                .map(|(pid, name)| ApplicationRecord {
                    bundle_id: None,
                    pid: pid as i32 + 1,
                    display_name: name.to_string(),
                    windows: vec![],
                    is_foreground: false,
                })
                .collect(),
        )
    }

    #[test]
    fn tracks_selection_and_clears_on_teardown() {
        let mut overlay = LogOverlay::new();
        overlay.show(SessionKind::CrossApp, &apps(&["Mail", " ", "Notes"]), 1);
        assert_eq!(overlay.labels, vec!["Mail", "Item 2", "Notes"]);
        assert_eq!(overlay.selected_label(), "Item 2");

        overlay.select(7);
        assert_eq!(overlay.selected, Some(1));
        overlay.select(2);
        assert_eq!(overlay.selected_label(), "Notes");

        overlay.hide();
        assert_eq!(overlay.selected, None);
        overlay.teardown();
        assert!(overlay.labels.is_empty());
    }
}
