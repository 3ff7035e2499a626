//! Raising and focusing the chosen window.
//!
//! Three strategies are tried in order. The enhanced path moves the pointer
//! onto the window's display when it is elsewhere, raises the window, and
//! reads back main/focused to confirm. The legacy path does the same raise
//! without confirmation. The process-only path activates the owning
//! application and leaves window order to the system. Only when even that
//! fails is the switch considered lost.

use std::sync::Arc;
use std::thread;

use parking_lot::RwLock;
use serde::Serialize;
use strum::Display;
use tracing::{debug, info, instrument, warn};

use crate::common::config::ActivationSettings;
use crate::model::handle_cache::{AxHandleCache, CachedAxHandle};
use crate::model::records::{ApplicationRecord, WindowRecord};
use crate::model::session::Selection;
use crate::sys::Platform;
use crate::sys::app::pid_t;
use crate::sys::axuielement::{AxError, AxWindow, AxWindowRef};
use crate::sys::event::PointerError;
use crate::sys::screen::display_for_point;

use super::discovery::FRAME_TOLERANCE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivationOutcome {
    /// Raised, focused and verified.
    Enhanced,
    /// Raised without verification.
    Legacy,
    /// Only the owning application was activated.
    ProcessOnly,
    Failed,
}

impl ActivationOutcome {
    pub fn succeeded(self) -> bool { self != ActivationOutcome::Failed }
}

#[derive(Debug, thiserror::Error)]
enum ActivationError {
    #[error(transparent)]
    Ax(#[from] AxError),
    #[error(transparent)]
    Pointer(#[from] PointerError),
    #[error("no display to place the window on")]
    NoDisplay,
    #[error("process {0} refused activation")]
    ProcessRefused(pid_t),
    #[error("window did not become main and focused")]
    NotVerified,
}

pub struct ActivationEngine {
    platform: Platform,
    ax_cache: Arc<AxHandleCache>,
    settings: RwLock<ActivationSettings>,
}

impl ActivationEngine {
    pub fn new(
        platform: Platform,
        ax_cache: Arc<AxHandleCache>,
        settings: ActivationSettings,
    ) -> Self {
        Self {
            platform,
            ax_cache,
            settings: RwLock::new(settings),
        }
    }

    pub fn set_settings(&self, settings: ActivationSettings) { *self.settings.write() = settings; }

    /// Returns whether anything at all could be activated.
    pub fn activate(&self, window: &WindowRecord) -> bool { self.activate_window(window).succeeded() }

    pub fn activate_selection(&self, selection: &Selection) -> ActivationOutcome {
        match selection {
            Selection::Window(window) => self.activate_window(window),
            Selection::Application(app) => self.activate_application(app),
        }
    }

    #[instrument(skip_all, fields(wid = window.window_id.as_u32(), pid = window.owner_pid))]
    pub fn activate_window(&self, window: &WindowRecord) -> ActivationOutcome {
        if let Some(handle) = self.resolve_handle(window) {
            match self.enhanced(window, &*handle) {
                Ok(()) => return ActivationOutcome::Enhanced,
                Err(err) => debug!(%err, "enhanced activation failed"),
            }
            match self.legacy(window, &*handle) {
                Ok(()) => return ActivationOutcome::Legacy,
                Err(err) => debug!(%err, "legacy activation failed"),
            }
            // Resolve afresh next time.
            self.ax_cache.remove(&window.window_id);
        }
        self.process_only(window.owner_pid, &window.owner_app_name)
    }

    #[instrument(skip_all, fields(pid = app.pid))]
    pub fn activate_application(&self, app: &ApplicationRecord) -> ActivationOutcome {
        match app.front_window() {
            Some(window) => self.activate_window(window),
            None => self.process_only(app.pid, &app.display_name),
        }
    }

    fn process_only(&self, pid: pid_t, name: &str) -> ActivationOutcome {
        if self.platform.apps.activate(pid) {
            info!(app = name, "activated application only; window order left to the system");
            ActivationOutcome::ProcessOnly
        } else {
            warn!(app = name, pid, "could not activate application");
            ActivationOutcome::Failed
        }
    }

    /// The cached element for the window, or a fresh lookup on a miss.
    fn resolve_handle(&self, window: &WindowRecord) -> Option<AxWindowRef> {
        if let Some(cached) = self.ax_cache.get(&window.window_id) {
            if cached.pid == window.owner_pid {
                return Some(cached.handle);
            }
            self.ax_cache.remove(&window.window_id);
        }
        let handles = match self.platform.ax.windows(window.owner_pid) {
            Ok(handles) => handles,
            Err(err) => {
                debug!(%err, "could not list accessibility windows");
                return None;
            }
        };
        let by_frame = handles.iter().find(|handle| {
            handle.frame().is_ok_and(|frame| frame.approx_eq(&window.bounds, FRAME_TOLERANCE))
        });
        let handle = by_frame.or_else(|| handles.get(window.automation_index)).cloned()?;
        self.ax_cache.put(window.window_id, CachedAxHandle {
            handle: Arc::clone(&handle),
            pid: window.owner_pid,
        });
        Some(handle)
    }

    fn enhanced(&self, window: &WindowRecord, handle: &dyn AxWindow) -> Result<(), ActivationError> {
        let settings = self.settings.read().clone();
        let frame = handle.frame()?;
        if settings.focus_transfer {
            let displays = self.platform.displays.displays();
            let target = display_for_point(&displays, frame.center())
                .ok_or(ActivationError::NoDisplay)?;
            let current = self
                .platform
                .input
                .pointer_location()
                .and_then(|point| display_for_point(&displays, point));
            if current != Some(target) {
                debug!(?current, ?target, "moving pointer to the window's display");
                self.platform.input.warp_pointer(frame.center())?;
                thread::sleep(settings.focus_settle);
            }
        }
        self.raise(window.owner_pid, handle)?;
        if handle.is_main()? && handle.is_focused()? {
            Ok(())
        } else {
            Err(ActivationError::NotVerified)
        }
    }

    fn legacy(&self, window: &WindowRecord, handle: &dyn AxWindow) -> Result<(), ActivationError> {
        let settings = self.settings.read().clone();
        let bounds = window.bounds;
        let known = bounds.size.width > 0.0 && bounds.size.height > 0.0;
        let inside = self.platform.input.pointer_location().is_some_and(|p| bounds.contains(p));
        if settings.focus_transfer && known && !inside {
            match self.platform.input.warp_pointer(bounds.center()) {
                Ok(()) => thread::sleep(settings.focus_settle),
                Err(err) => debug!(%err, "pointer relocation failed"),
            }
        }
        self.raise(window.owner_pid, handle)
    }

    fn raise(&self, pid: pid_t, handle: &dyn AxWindow) -> Result<(), ActivationError> {
        if !self.platform.apps.activate(pid) {
            return Err(ActivationError::ProcessRefused(pid));
        }
        handle.raise()?;
        handle.set_main(true)?;
        handle.set_focused(true)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::model::handle_cache::CacheLimits;
    use crate::sys::geometry::{Point, Rect};
    use crate::sys::testing::{AxCall, FakeAxWindow, FakePlatform, app};
    use crate::sys::window_server::WindowServerId;

    fn settings() -> ActivationSettings {
        ActivationSettings {
            focus_transfer: true,
            focus_settle: Duration::ZERO,
        }
    }

    fn engine(fake: &FakePlatform) -> ActivationEngine {
        ActivationEngine::new(
            fake.platform(),
            Arc::new(AxHandleCache::new("ax", CacheLimits::default())),
            settings(),
        )
    }

    fn record(id: u32, pid: pid_t, index: usize, bounds: Rect) -> WindowRecord {
        WindowRecord {
            window_id: WindowServerId::new(id),
            title: format!("window {id}"),
            derived_label: format!("window {id}"),
            owner_app_name: "Editor".into(),
            owner_pid: pid,
            automation_index: index,
            bounds,
        }
    }

    // On the external display of `FakeDisplays::dual`.
    fn external() -> Rect { Rect::from_xywh(2000.0, 100.0, 800.0, 600.0) }

    #[test]
    fn enhanced_path_transfers_focus_across_displays() {
        let fake = FakePlatform::new();
        fake.apps.set(vec![app(10, "Editor")]);
        fake.input.set_pointer(Point::new(100.0, 100.0));
        let windows = fake.ax.set_windows(10, vec![FakeAxWindow::new("a").with_frame(external())]);

        let outcome = engine(&fake).activate_window(&record(1, 10, 0, external()));
        assert_eq!(outcome, ActivationOutcome::Enhanced);
        assert_eq!(fake.input.warps(), vec![external().center()]);
        assert_eq!(fake.apps.activated(), vec![10]);
        assert_eq!(windows[0].calls(), vec![
            AxCall::Raise,
            AxCall::SetMain(true),
            AxCall::SetFocused(true)
        ]);
    }

    #[test]
    fn pointer_on_the_same_display_stays_put() {
        let fake = FakePlatform::new();
        fake.apps.set(vec![app(10, "Editor")]);
        fake.input.set_pointer(Point::new(1600.0, 50.0));
        fake.ax.set_windows(10, vec![FakeAxWindow::new("a").with_frame(external())]);

        let outcome = engine(&fake).activate_window(&record(1, 10, 0, external()));
        assert_eq!(outcome, ActivationOutcome::Enhanced);
        assert!(fake.input.warps().is_empty());
    }

    #[test]
    fn focus_transfer_can_be_disabled() {
        let fake = FakePlatform::new();
        fake.apps.set(vec![app(10, "Editor")]);
        fake.input.set_pointer(Point::new(100.0, 100.0));
        fake.ax.set_windows(10, vec![FakeAxWindow::new("a").with_frame(external())]);
        let engine = engine(&fake);
        engine.set_settings(ActivationSettings {
            focus_transfer: false,
            ..settings()
        });

        assert_eq!(
            engine.activate_window(&record(1, 10, 0, external())),
            ActivationOutcome::Enhanced
        );
        assert!(fake.input.warps().is_empty());
    }

    #[test]
    fn unverified_raise_falls_back_to_legacy() {
        let fake = FakePlatform::new();
        fake.apps.set(vec![app(10, "Editor")]);
        fake.input.set_pointer(Point::new(100.0, 100.0));
        fake.ax.set_windows(10, vec![
            FakeAxWindow::new("a").with_frame(external()).ignoring_writes(),
        ]);

        let outcome = engine(&fake).activate_window(&record(1, 10, 0, external()));
        assert_eq!(outcome, ActivationOutcome::Legacy);
        assert_eq!(fake.apps.activated(), vec![10, 10]);
    }

    #[test]
    fn legacy_path_runs_when_the_frame_is_unreadable() {
        let fake = FakePlatform::new();
        fake.apps.set(vec![app(10, "Editor")]);
        fake.input.set_pointer(Point::new(100.0, 100.0));
        let windows = fake.ax.set_windows(10, vec![FakeAxWindow::new("a")]);

        let outcome = engine(&fake).activate_window(&record(1, 10, 0, external()));
        assert_eq!(outcome, ActivationOutcome::Legacy);
        // Coarse relocation to the recorded bounds.
        assert_eq!(fake.input.warps(), vec![external().center()]);
        assert_eq!(windows[0].calls().first(), Some(&AxCall::Raise));
    }

    #[test]
    fn broken_element_degrades_to_process_only() {
        let fake = FakePlatform::new();
        fake.apps.set(vec![app(10, "Editor")]);
        fake.ax.set_windows(10, vec![FakeAxWindow::new("a").broken()]);

        let outcome = engine(&fake).activate_window(&record(1, 10, 0, external()));
        assert_eq!(outcome, ActivationOutcome::ProcessOnly);
        assert!(outcome.succeeded());
    }

    #[test]
    fn failed_element_is_evicted_from_the_cache() {
        let fake = FakePlatform::new();
        fake.apps.set(vec![app(10, "Editor")]);
        fake.ax.set_windows(10, vec![FakeAxWindow::new("a").broken()]);
        let engine = engine(&fake);
        let window = record(1, 10, 0, external());

        assert_eq!(engine.activate_window(&window), ActivationOutcome::ProcessOnly);
        assert!(!engine.ax_cache.contains_key(&window.window_id));

        fake.ax.set_windows(10, vec![FakeAxWindow::new("a").with_frame(external())]);
        assert_eq!(engine.activate_window(&window), ActivationOutcome::Enhanced);
        assert!(engine.ax_cache.contains_key(&window.window_id));
    }

    #[test]
    fn no_element_at_all_is_process_only() {
        let fake = FakePlatform::new();
        fake.apps.set(vec![app(10, "Editor")]);
        fake.ax.set_trusted(false);

        let engine = engine(&fake);
        assert!(engine.activate(&record(1, 10, 0, external())));
        assert_eq!(fake.apps.activated(), vec![10]);
    }

    #[test]
    fn exited_process_fails() {
        let fake = FakePlatform::new();
        fake.apps.set(vec![app(10, "Editor")]);
        fake.apps.kill(10);

        let engine = engine(&fake);
        assert_eq!(
            engine.activate_window(&record(1, 10, 0, external())),
            ActivationOutcome::Failed
        );
        assert!(!engine.activate(&record(1, 10, 0, external())));
    }

    #[test]
    fn cache_miss_resolves_by_frame_and_fills_the_cache() {
        let fake = FakePlatform::new();
        fake.apps.set(vec![app(10, "Editor")]);
        fake.input.set_pointer(Point::new(2100.0, 200.0));
        let other = Rect::from_xywh(10.0, 10.0, 300.0, 300.0);
        let windows = fake.ax.set_windows(10, vec![
            FakeAxWindow::new("other").with_frame(other),
            FakeAxWindow::new("target").with_frame(external()),
        ]);
        let engine = engine(&fake);

        // The recorded index is stale; the frame still identifies the window.
        let outcome = engine.activate_window(&record(1, 10, 0, external()));
        assert_eq!(outcome, ActivationOutcome::Enhanced);
        assert!(windows[0].calls().is_empty());
        assert_eq!(windows[1].calls().len(), 3);

        let cached = engine.ax_cache.get(&WindowServerId::new(1)).unwrap();
        assert_eq!(cached.handle.title().unwrap(), "target");
        assert_eq!(fake.ax.queries(), 1);

        engine.activate_window(&record(1, 10, 0, external()));
        assert_eq!(fake.ax.queries(), 1);
    }

    #[test]
    fn cached_handle_of_another_process_is_discarded() {
        let fake = FakePlatform::new();
        fake.apps.set(vec![app(10, "Editor"), app(11, "Other")]);
        fake.input.set_pointer(Point::new(2100.0, 200.0));
        let stale = fake.ax.set_windows(11, vec![FakeAxWindow::new("stale").with_frame(external())]);
        let fresh = fake.ax.set_windows(10, vec![FakeAxWindow::new("fresh").with_frame(external())]);
        let engine = engine(&fake);
        engine.ax_cache.put(WindowServerId::new(1), CachedAxHandle {
            handle: stale[0].clone(),
            pid: 11,
        });

        engine.activate_window(&record(1, 10, 0, external()));
        assert!(stale[0].calls().is_empty());
        assert!(!fresh[0].calls().is_empty());
    }

    #[test]
    fn application_selection_raises_its_front_window() {
        let fake = FakePlatform::new();
        fake.apps.set(vec![app(10, "Editor"), app(11, "Empty")]);
        fake.input.set_pointer(Point::new(2100.0, 200.0));
        fake.ax.set_windows(10, vec![FakeAxWindow::new("a").with_frame(external())]);
        let engine = engine(&fake);

        let editor = ApplicationRecord {
            bundle_id: None,
            pid: 10,
            display_name: "Editor".into(),
            windows: vec![record(1, 10, 0, external())],
            is_foreground: false,
        };
        assert_eq!(
            engine.activate_selection(&Selection::Application(editor)),
            ActivationOutcome::Enhanced
        );

        let empty = ApplicationRecord {
            bundle_id: None,
            pid: 11,
            display_name: "Empty".into(),
            windows: vec![],
            is_foreground: false,
        };
        assert_eq!(
            engine.activate_selection(&Selection::Application(empty)),
            ActivationOutcome::ProcessOnly
        );
    }
}
