//! In-memory platform for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::Platform;
use super::app::{ActivationPolicy, AppRegistry, IconBitmap, RunningApp, pid_t};
use super::axuielement::{Accessibility, AxError, AxWindow, AxWindowRef, Result as AxResult};
use super::event::{InputListeners, InputSinkRef, InputState, PointerError};
use super::geometry::{Point, Rect};
use super::hotkey::{Hotkey, HotkeyCallback, HotkeyError, HotkeyId, HotkeyRegistrar, Modifiers};
use super::screen::{DisplayInfo, DisplayList, ScreenId};
use super::window_server::{WindowList, WindowServerId, WindowServerInfo};
use crate::common::collections::{HashMap, HashSet};

pub fn window(id: u32, pid: pid_t, bounds: Rect) -> WindowServerInfo {
    WindowServerInfo {
        id: WindowServerId::new(id),
        pid,
        title: String::new(),
        layer: 0,
        on_screen: true,
        bounds,
    }
}

pub fn app(pid: pid_t, name: &str) -> RunningApp {
    RunningApp {
        pid,
        bundle_id: Some(format!("com.example.{}", name.to_ascii_lowercase())),
        name: name.to_string(),
        is_active: false,
        activation_policy: ActivationPolicy::Regular,
    }
}

#[derive(Default)]
pub struct FakeWindowList {
    windows: Mutex<Vec<WindowServerInfo>>,
}

impl FakeWindowList {
    pub fn set(&self, windows: Vec<WindowServerInfo>) { *self.windows.lock() = windows; }
}

impl WindowList for FakeWindowList {
    fn on_screen_windows(&self) -> Vec<WindowServerInfo> { self.windows.lock().clone() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxCall {
    Raise,
    SetMain(bool),
    SetFocused(bool),
}

#[derive(Debug, Default)]
struct AxWindowState {
    main: bool,
    focused: bool,
    calls: Vec<AxCall>,
}

#[derive(Debug, Default)]
pub struct FakeAxWindow {
    title: Option<String>,
    frame: Option<Rect>,
    /// Actions fail with `CannotComplete`.
    broken: bool,
    /// Attribute writes are accepted but never take effect.
    ignores_writes: bool,
    state: Mutex<AxWindowState>,
}

impl FakeAxWindow {
    pub fn new(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    pub fn untitled() -> Self { Self::default() }

    pub fn with_frame(mut self, frame: Rect) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    pub fn ignoring_writes(mut self) -> Self {
        self.ignores_writes = true;
        self
    }

    pub fn calls(&self) -> Vec<AxCall> { self.state.lock().calls.clone() }

    fn act(&self, call: AxCall) -> AxResult<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if self.broken {
            return Err(AxError::CannotComplete);
        }
        if !self.ignores_writes {
            match call {
                AxCall::Raise => {}
                AxCall::SetMain(main) => state.main = main,
                AxCall::SetFocused(focused) => state.focused = focused,
            }
        }
        Ok(())
    }
}

impl AxWindow for FakeAxWindow {
    fn title(&self) -> AxResult<String> {
        self.title.clone().ok_or(AxError::Unsupported("AXTitle"))
    }

    fn frame(&self) -> AxResult<Rect> {
        if self.broken {
            return Err(AxError::CannotComplete);
        }
        self.frame.ok_or(AxError::Unsupported("AXFrame"))
    }

    fn raise(&self) -> AxResult<()> { self.act(AxCall::Raise) }

    fn set_main(&self, main: bool) -> AxResult<()> { self.act(AxCall::SetMain(main)) }

    fn set_focused(&self, focused: bool) -> AxResult<()> { self.act(AxCall::SetFocused(focused)) }

    fn is_main(&self) -> AxResult<bool> { Ok(self.state.lock().main) }

    fn is_focused(&self) -> AxResult<bool> { Ok(self.state.lock().focused) }
}

pub struct FakeAccessibility {
    trusted: AtomicBool,
    prompts: AtomicUsize,
    windows: Mutex<HashMap<pid_t, Vec<Arc<FakeAxWindow>>>>,
    queries: AtomicUsize,
}

impl Default for FakeAccessibility {
    fn default() -> Self {
        Self {
            trusted: AtomicBool::new(true),
            prompts: AtomicUsize::new(0),
            windows: Mutex::default(),
            queries: AtomicUsize::new(0),
        }
    }
}

impl FakeAccessibility {
    pub fn set_trusted(&self, trusted: bool) { self.trusted.store(trusted, Ordering::SeqCst); }

    pub fn prompts(&self) -> usize { self.prompts.load(Ordering::SeqCst) }

    pub fn queries(&self) -> usize { self.queries.load(Ordering::SeqCst) }

    pub fn set_windows(&self, pid: pid_t, windows: Vec<FakeAxWindow>) -> Vec<Arc<FakeAxWindow>> {
        let windows: Vec<_> = windows.into_iter().map(Arc::new).collect();
        self.windows.lock().insert(pid, windows.clone());
        windows
    }
}

impl Accessibility for FakeAccessibility {
    fn is_trusted(&self) -> bool { self.trusted.load(Ordering::SeqCst) }

    fn request_trust(&self) -> bool {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.is_trusted()
    }

    fn windows(&self, pid: pid_t) -> AxResult<Vec<AxWindowRef>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if !self.is_trusted() {
            return Err(AxError::NotTrusted);
        }
        let windows = self.windows.lock();
        let list = windows.get(&pid).ok_or(AxError::InvalidHandle)?;
        Ok(list.iter().map(|w| Arc::clone(w) as AxWindowRef).collect())
    }
}

#[derive(Default)]
pub struct FakeApps {
    apps: Mutex<Vec<RunningApp>>,
    icons: Mutex<HashMap<pid_t, IconBitmap>>,
    dead: Mutex<HashSet<pid_t>>,
    refuses: Mutex<HashSet<pid_t>>,
    activated: Mutex<Vec<pid_t>>,
    icon_requests: AtomicUsize,
}

impl FakeApps {
    pub fn set(&self, apps: Vec<RunningApp>) { *self.apps.lock() = apps; }

    pub fn set_icon(&self, pid: pid_t, bitmap: IconBitmap) { self.icons.lock().insert(pid, bitmap); }

    pub fn kill(&self, pid: pid_t) { self.dead.lock().insert(pid); }

    pub fn refuse_activation(&self, pid: pid_t) { self.refuses.lock().insert(pid); }

    pub fn activated(&self) -> Vec<pid_t> { self.activated.lock().clone() }

    pub fn icon_requests(&self) -> usize { self.icon_requests.load(Ordering::SeqCst) }
}

impl AppRegistry for FakeApps {
    fn running_apps(&self) -> Vec<RunningApp> { self.apps.lock().clone() }

    fn activate(&self, pid: pid_t) -> bool {
        if self.refuses.lock().contains(&pid) || !self.is_running(pid) {
            return false;
        }
        self.activated.lock().push(pid);
        true
    }

    fn icon(&self, pid: pid_t) -> Option<IconBitmap> {
        self.icon_requests.fetch_add(1, Ordering::SeqCst);
        self.icons.lock().get(&pid).cloned()
    }

    fn is_running(&self, pid: pid_t) -> bool {
        !self.dead.lock().contains(&pid) && self.apps.lock().iter().any(|app| app.pid == pid)
    }
}

#[derive(Default)]
pub struct FakeDisplays {
    displays: Mutex<Vec<DisplayInfo>>,
}

impl FakeDisplays {
    /// A laptop panel with an external display to its right.
    pub fn dual() -> Self {
        Self {
            displays: Mutex::new(vec![
                DisplayInfo {
                    id: ScreenId::new(1),
                    frame: Rect::from_xywh(0.0, 0.0, 1512.0, 982.0),
                },
                DisplayInfo {
                    id: ScreenId::new(2),
                    frame: Rect::from_xywh(1512.0, 0.0, 2560.0, 1440.0),
                },
            ]),
        }
    }
}

impl DisplayList for FakeDisplays {
    fn displays(&self) -> Vec<DisplayInfo> { self.displays.lock().clone() }
}

#[derive(Default)]
pub struct FakeInput {
    pointer: Mutex<Option<Point>>,
    modifiers: Mutex<Modifiers>,
    warps: Mutex<Vec<Point>>,
    modifier_reads: AtomicUsize,
}

impl FakeInput {
    pub fn set_pointer(&self, point: Point) { *self.pointer.lock() = Some(point); }

    pub fn set_modifiers(&self, modifiers: Modifiers) { *self.modifiers.lock() = modifiers; }

    pub fn warps(&self) -> Vec<Point> { self.warps.lock().clone() }

    pub fn modifier_reads(&self) -> usize { self.modifier_reads.load(Ordering::SeqCst) }
}

impl InputState for FakeInput {
    fn pointer_location(&self) -> Option<Point> { *self.pointer.lock() }

    fn warp_pointer(&self, point: Point) -> Result<(), PointerError> {
        self.warps.lock().push(point);
        *self.pointer.lock() = Some(point);
        Ok(())
    }

    fn modifiers(&self) -> Modifiers {
        self.modifier_reads.fetch_add(1, Ordering::SeqCst);
        *self.modifiers.lock()
    }
}

/// Every fake, kept concrete so tests can script and inspect them.
#[derive(Clone)]
pub struct FakePlatform {
    pub windows: Arc<FakeWindowList>,
    pub ax: Arc<FakeAccessibility>,
    pub apps: Arc<FakeApps>,
    pub displays: Arc<FakeDisplays>,
    pub input: Arc<FakeInput>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            windows: Arc::default(),
            ax: Arc::default(),
            apps: Arc::default(),
            displays: Arc::new(FakeDisplays::dual()),
            input: Arc::default(),
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            windows: self.windows.clone(),
            ax: self.ax.clone(),
            apps: self.apps.clone(),
            displays: self.displays.clone(),
            input: self.input.clone(),
        }
    }
}

/// Records registrations and lets tests fire them.
#[derive(Clone, Default)]
pub struct FakeHotkeys {
    inner: Arc<Mutex<FakeHotkeysInner>>,
}

#[derive(Default)]
struct FakeHotkeysInner {
    next_id: u32,
    registered: HashMap<HotkeyId, (Hotkey, Arc<HotkeyCallback>)>,
    taken: HashSet<Hotkey>,
}

impl FakeHotkeys {
    /// Makes `hotkey` look owned by another process.
    pub fn take(&self, hotkey: Hotkey) { self.inner.lock().taken.insert(hotkey); }

    pub fn registered(&self) -> Vec<Hotkey> {
        let mut keys: Vec<Hotkey> =
            self.inner.lock().registered.values().map(|(hotkey, _)| *hotkey).collect();
        keys.sort_by_key(|h| h.to_string());
        keys
    }

    /// Invokes the callback of `hotkey`. Returns false if it is not armed.
    pub fn fire(&self, hotkey: Hotkey) -> bool {
        let callback = self
            .inner
            .lock()
            .registered
            .values()
            .find(|(h, _)| *h == hotkey)
            .map(|(_, cb)| Arc::clone(cb));
        match callback {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }
}

impl HotkeyRegistrar for FakeHotkeys {
    fn register(
        &mut self,
        hotkey: Hotkey,
        callback: HotkeyCallback,
    ) -> Result<HotkeyId, HotkeyError> {
        let mut inner = self.inner.lock();
        if inner.taken.contains(&hotkey) {
            return Err(HotkeyError::Conflict(hotkey));
        }
        inner.next_id += 1;
        let id = HotkeyId(inner.next_id);
        inner.registered.insert(id, (hotkey, Arc::new(callback)));
        Ok(id)
    }

    fn unregister(&mut self, id: HotkeyId) { self.inner.lock().registered.remove(&id); }
}

#[derive(Default)]
struct FakeListenersInner {
    sink: Option<InputSinkRef>,
    starts: usize,
    stops: usize,
}

/// Listeners that hold on to the sink so tests can inject events.
#[derive(Clone, Default)]
pub struct FakeListeners {
    inner: Arc<Mutex<FakeListenersInner>>,
}

impl FakeListeners {
    pub fn sink(&self) -> Option<InputSinkRef> { self.inner.lock().sink.clone() }

    pub fn is_running(&self) -> bool { self.inner.lock().sink.is_some() }

    pub fn starts(&self) -> usize { self.inner.lock().starts }

    pub fn stops(&self) -> usize { self.inner.lock().stops }
}

impl InputListeners for FakeListeners {
    fn start(&mut self, sink: InputSinkRef) -> bool {
        let mut inner = self.inner.lock();
        inner.sink = Some(sink);
        inner.starts += 1;
        true
    }

    fn stop(&mut self) {
        let mut inner = self.inner.lock();
        inner.sink = None;
        inner.stops += 1;
    }
}
