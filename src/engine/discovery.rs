//! Building switcher snapshots from the live window list.
//!
//! The window server reports windows in true front-to-back order but knows
//! nothing about accessibility elements; the accessibility layer knows titles
//! and can raise windows but exposes no window id. The two are joined by
//! position within each process: the n-th qualifying window-server window of
//! a process is paired with the n-th accessibility window of that process.
//! When both sides report a frame and they disagree, an unclaimed element
//! whose frame does match is preferred, so a reordered accessibility list
//! does not attach titles to the wrong windows.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, instrument, trace};

use crate::common::collections::{HashMap, HashSet};
use crate::model::handle_cache::{AxHandleCache, CachedAxHandle, CachedIcon, IconCache};
use crate::model::records::{ApplicationRecord, Snapshot, WindowRecord};
use crate::model::session::SessionKind;
use crate::model::title::TitleExtractor;
use crate::sys::Platform;
use crate::sys::app::{ActivationPolicy, IconBitmap, RunningApp, pid_t};
use crate::sys::axuielement::{Accessibility, AxWindowRef};
use crate::sys::geometry::{Rect, Size};
use crate::sys::window_server::WindowServerInfo;

/// Frames closer than this on every edge describe the same window.
pub const FRAME_TOLERANCE: f64 = 2.0;

pub struct Discovery {
    platform: Platform,
    ax_cache: Arc<AxHandleCache>,
    icon_cache: Arc<IconCache>,
    titles: RwLock<Arc<dyn TitleExtractor>>,
    min_size: RwLock<Size>,
    own_pid: pid_t,
}

impl Discovery {
    pub fn new(
        platform: Platform,
        ax_cache: Arc<AxHandleCache>,
        icon_cache: Arc<IconCache>,
        titles: Arc<dyn TitleExtractor>,
        min_size: Size,
        own_pid: pid_t,
    ) -> Self {
        Self {
            platform,
            ax_cache,
            icon_cache,
            titles: RwLock::new(titles),
            min_size: RwLock::new(min_size),
            own_pid,
        }
    }

    pub fn set_title_extractor(&self, titles: Arc<dyn TitleExtractor>) { *self.titles.write() = titles; }

    pub fn set_min_size(&self, min_size: Size) { *self.min_size.write() = min_size; }

    pub fn snapshot(&self, kind: SessionKind) -> Snapshot {
        match kind {
            SessionKind::SameAppWindows => {
                Snapshot::Windows(self.discover_windows_for_foreground_app())
            }
            SessionKind::CrossApp => {
                let apps = self.discover_all_apps_with_windows();
                self.warm_icons(&apps);
                Snapshot::Applications(apps)
            }
        }
    }

    /// The windows of the frontmost application, front to back.
    #[instrument(skip(self))]
    pub fn discover_windows_for_foreground_app(&self) -> Vec<WindowRecord> {
        if !self.platform.ax.is_trusted() {
            info!("accessibility access not granted; nothing to discover");
            return Vec::new();
        }
        let windows = self.platform.windows.on_screen_windows();
        if windows.is_empty() {
            info!("window server reported no on-screen windows");
            return Vec::new();
        }
        let apps = self.platform.apps.running_apps();
        let Some(pid) = self.foreground_pid(&apps, &windows) else {
            info!("no foreground application");
            return Vec::new();
        };
        let app = apps.iter().find(|app| app.pid == pid);
        let name = app.map_or_else(|| format!("pid {pid}"), |app| app.name.clone());
        let bundle_id = app.and_then(|app| app.bundle_id.as_deref());

        let titles = self.titles.read().clone();
        let mut pass = JoinPass::new(&*self.platform.ax, &self.ax_cache);
        let records: Vec<WindowRecord> = windows
            .iter()
            .filter(|w| w.pid == pid && self.is_candidate(w))
            .map(|w| pass.record(w, &name, bundle_id, &*titles))
            .collect();
        if records.is_empty() {
            info!(pid, app = %name, "foreground application has no switchable windows");
        }
        records
    }

    /// Applications with at least one qualifying window, ordered by where
    /// each application's first window sits in the z-order.
    #[instrument(skip(self))]
    pub fn discover_all_apps_with_windows(&self) -> Vec<ApplicationRecord> {
        if !self.platform.ax.is_trusted() {
            info!("accessibility access not granted; nothing to discover");
            return Vec::new();
        }
        let windows = self.platform.windows.on_screen_windows();
        let running = self.platform.apps.running_apps();
        let apps: HashMap<pid_t, &RunningApp> = running
            .iter()
            .filter(|app| {
                app.pid != self.own_pid && app.activation_policy == ActivationPolicy::Regular
            })
            .map(|app| (app.pid, app))
            .collect();

        let titles = self.titles.read().clone();
        let mut pass = JoinPass::new(&*self.platform.ax, &self.ax_cache);
        let mut records: Vec<ApplicationRecord> = Vec::new();
        let mut slot_of: HashMap<pid_t, usize> = HashMap::default();
        for window in windows.iter().filter(|w| self.is_candidate(w)) {
            let Some(app) = apps.get(&window.pid) else {
                continue;
            };
            let slot = *slot_of.entry(app.pid).or_insert_with(|| {
                records.push(ApplicationRecord {
                    bundle_id: app.bundle_id.clone(),
                    pid: app.pid,
                    display_name: app.name.clone(),
                    windows: Vec::new(),
                    is_foreground: app.is_active,
                });
                records.len() - 1
            });
            let record = pass.record(window, &app.name, app.bundle_id.as_deref(), &*titles);
            records[slot].windows.push(record);
        }
        if records.is_empty() {
            info!("no applications with switchable windows");
        }
        records
    }

    /// The icon of `pid`, from the cache when possible.
    pub fn icon_for(&self, pid: pid_t) -> Option<IconBitmap> {
        if let Some(cached) = self.icon_cache.get(&pid) {
            return Some(cached.bitmap);
        }
        let bitmap = self.platform.apps.icon(pid)?;
        self.icon_cache.put(pid, CachedIcon { pid, bitmap: bitmap.clone() });
        Some(bitmap)
    }

    fn warm_icons(&self, apps: &[ApplicationRecord]) {
        let missing = apps.iter().filter(|app| self.icon_for(app.pid).is_none()).count();
        if missing > 0 {
            debug!(missing, "some applications have no icon");
        }
    }

    /// The active application, or failing that the owner of the frontmost
    /// normal window. Never this process.
    fn foreground_pid(&self, apps: &[RunningApp], windows: &[WindowServerInfo]) -> Option<pid_t> {
        if let Some(app) = apps.iter().find(|app| app.is_active && app.pid != self.own_pid) {
            return Some(app.pid);
        }
        let fallback = windows
            .iter()
            .find(|w| w.on_screen && w.layer == 0 && w.pid != self.own_pid && w.id.is_valid())
            .map(|w| w.pid);
        if let Some(pid) = fallback {
            debug!(pid, "no active application; using owner of frontmost window");
        }
        fallback
    }

    fn is_candidate(&self, window: &WindowServerInfo) -> bool {
        let min = *self.min_size.read();
        window.id.is_valid()
            && window.on_screen
            && window.layer >= 0
            && window.pid != self.own_pid
            && window.bounds.size.width >= min.width
            && window.bounds.size.height >= min.height
    }
}

/// Per-pass join state. Counters restart on every pass.
struct JoinPass<'a> {
    ax: &'a dyn Accessibility,
    cache: &'a AxHandleCache,
    handles: HashMap<pid_t, Vec<AxWindowRef>>,
    matched: HashMap<pid_t, usize>,
    claimed: HashMap<pid_t, HashSet<usize>>,
    placeholders: usize,
}

impl<'a> JoinPass<'a> {
    fn new(ax: &'a dyn Accessibility, cache: &'a AxHandleCache) -> Self {
        Self {
            ax,
            cache,
            handles: HashMap::default(),
            matched: HashMap::default(),
            claimed: HashMap::default(),
            placeholders: 0,
        }
    }

    fn record(
        &mut self,
        window: &WindowServerInfo,
        app_name: &str,
        bundle_id: Option<&str>,
        titles: &dyn TitleExtractor,
    ) -> WindowRecord {
        let (automation_index, handle) = self.join(window);
        if let Some(handle) = &handle {
            self.cache.put(window.id, CachedAxHandle {
                handle: Arc::clone(handle),
                pid: window.pid,
            });
        }

        let ax_title = handle.as_ref().and_then(|h| h.title().ok()).filter(|t| !t.trim().is_empty());
        let title = match ax_title {
            Some(title) => title,
            None if !window.title.trim().is_empty() => window.title.clone(),
            None => {
                self.placeholders += 1;
                format!("{app_name} window {}", self.placeholders)
            }
        };
        let derived_label = titles.extract(&title, bundle_id);

        WindowRecord {
            window_id: window.id,
            title,
            derived_label,
            owner_app_name: app_name.to_string(),
            owner_pid: window.pid,
            automation_index,
            bounds: window.bounds,
        }
    }

    /// Picks the accessibility element for `window`.
    fn join(&mut self, window: &WindowServerInfo) -> (usize, Option<AxWindowRef>) {
        let pid = window.pid;
        let counter = self.matched.entry(pid).or_insert(0);
        let positional = *counter;
        *counter += 1;

        let ax = self.ax;
        let handles = self.handles.entry(pid).or_insert_with(|| match ax.windows(pid) {
            Ok(handles) => handles,
            Err(err) => {
                debug!(pid, %err, "could not list accessibility windows");
                Vec::new()
            }
        });
        let claimed = self.claimed.entry(pid).or_default();

        match choose_handle(handles, claimed, positional, &window.bounds) {
            Some(index) => {
                if index != positional {
                    debug!(
                        wid = window.id.as_u32(),
                        pid,
                        positional,
                        matched = index,
                        "accessibility order diverged from window server order"
                    );
                }
                claimed.insert(index);
                (index, Some(Arc::clone(&handles[index])))
            }
            None => {
                trace!(wid = window.id.as_u32(), pid, positional, "no accessibility element");
                (positional, None)
            }
        }
    }
}

/// Returns the index of the element to pair with a window whose position
/// among its process's windows is `positional`.
fn choose_handle(
    handles: &[AxWindowRef],
    claimed: &HashSet<usize>,
    positional: usize,
    bounds: &Rect,
) -> Option<usize> {
    let matches_bounds = |handle: &AxWindowRef| {
        handle.frame().is_ok_and(|frame| frame.approx_eq(bounds, FRAME_TOLERANCE))
    };
    if let Some(handle) = handles.get(positional)
        && !claimed.contains(&positional)
    {
        match handle.frame() {
            Ok(frame) if !frame.approx_eq(bounds, FRAME_TOLERANCE) => {}
            // An unknown frame cannot contradict the position.
            _ => return Some(positional),
        }
    }
    let by_bounds = handles
        .iter()
        .enumerate()
        .find(|(index, handle)| !claimed.contains(index) && matches_bounds(*handle))
        .map(|(index, _)| index);
    let unclaimed = |index: &usize| !claimed.contains(index);
    by_bounds
        .or_else(|| Some(positional).filter(|&p| p < handles.len() && unclaimed(&p)))
        .or_else(|| (0..handles.len()).find(unclaimed))
}
