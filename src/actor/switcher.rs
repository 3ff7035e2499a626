//! The switcher state machine.
//!
//! A hotkey opens a session: discovery runs on the worker while the key
//! listeners and the watchdog start feeding the [`Multiplexer`]. The
//! multiplexer turns raw key events from every source into at most one
//! action per physical key action and forwards it here. Closing a session
//! happens in two phases: everything the user can see (overlay, listeners,
//! watchdog, hotkeys) is settled synchronously, then activation and cache
//! pruning are handed to the worker.

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace, warn};

use super::broadcast::{BroadcastEvent, Broadcaster};
use super::cache_sweeper::Caches;
use super::watchdog::Watchdog;
use super::worker::Worker;
use crate::actor;
use crate::common::config::Config;
use crate::engine::{ActivationEngine, Discovery};
use crate::model::records::Snapshot;
use crate::model::session::{SessionKind, SwitcherSession};
use crate::sys::Platform;
use crate::sys::event::{Disposition, EventSource, InputEvent, InputListeners, InputSink};
use crate::sys::geometry::Size;
use crate::sys::hotkey::{Hotkey, HotkeyId, HotkeyRegistrar, KeyCode, Modifiers};
use crate::ui::overlay::Overlay;

/// What a key event means to an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Advance { backward: bool },
    Commit,
    Cancel,
}

#[derive(Debug)]
pub enum Event {
    HotkeyFired(SessionKind),
    SnapshotReady {
        generation: u64,
        kind: SessionKind,
        snapshot: Snapshot,
    },
    Input(Action),
    MemoryPressure,
    ConfigUpdated(Box<Config>),
    PermissionChanged { granted: bool },
    Shutdown,
}

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

struct Armed {
    trigger: Hotkey,
    held: Modifiers,
}

/// The last event that produced an action.
struct Accepted {
    source: EventSource,
    event: InputEvent,
    at: Instant,
}

struct MuxState {
    armed: Option<Armed>,
    last: Option<Accepted>,
    debounce: Duration,
}

/// Merges the local, global and watchdog event streams.
///
/// Both listeners usually report the same physical key action, one after the
/// other. An event identical to the last accepted one but from another source
/// inside the debounce window is that same action and is dropped. A commit or
/// cancel also disarms the multiplexer before it is forwarded, so every key
/// action is acted on at most once however many sources report it.
pub struct Multiplexer {
    state: Mutex<MuxState>,
    busy: AtomicBool,
    tx: Sender,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        (!flag.swap(true, Ordering::AcqRel)).then_some(BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

impl Multiplexer {
    pub fn new(tx: Sender, debounce: Duration) -> Self {
        Self {
            state: Mutex::new(MuxState {
                armed: None,
                last: None,
                debounce,
            }),
            busy: AtomicBool::new(false),
            tx,
        }
    }

    pub fn arm(&self, trigger: Hotkey) {
        let mut state = self.state.lock();
        state.armed = Some(Armed {
            trigger,
            held: trigger.held_modifiers(),
        });
        state.last = None;
    }

    pub fn disarm(&self) { self.state.lock().armed = None; }

    pub fn is_armed(&self) -> bool { self.state.lock().armed.is_some() }

    pub fn set_debounce(&self, debounce: Duration) { self.state.lock().debounce = debounce; }

    fn handle_at(&self, source: EventSource, event: InputEvent, now: Instant) -> Disposition {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            trace!(?source, %event, "event arrived while another was in flight; dropped");
            return Disposition::PassThrough;
        };
        let mut state = self.state.lock();
        let Some(armed) = &state.armed else {
            return Disposition::PassThrough;
        };
        let (action, disposition) = classify(armed, event);
        let Some(action) = action else {
            return disposition;
        };
        if let Some(last) = &state.last
            && last.source != source
            && last.event == event
            && now.saturating_duration_since(last.at) < state.debounce
        {
            trace!(?source, first = ?last.source, %event, "duplicate report suppressed");
            return disposition;
        }
        state.last = Some(Accepted { source, event, at: now });
        if matches!(action, Action::Commit | Action::Cancel) {
            state.armed = None;
        }
        drop(state);
        debug!(?source, %event, ?action, "input");
        self.tx.send(Event::Input(action));
        disposition
    }
}

impl InputSink for Multiplexer {
    fn deliver(&self, source: EventSource, event: InputEvent) -> Disposition {
        self.handle_at(source, event, Instant::now())
    }
}

fn classify(armed: &Armed, event: InputEvent) -> (Option<Action>, Disposition) {
    use Disposition::*;
    let trigger = armed.trigger.key_code;
    match event {
        InputEvent::KeyDown { key, modifiers, .. }
            if key == trigger && modifiers.contains(armed.held) =>
        {
            let backward = modifiers.contains(Modifiers::SHIFT)
                && !armed.trigger.modifiers.contains(Modifiers::SHIFT);
            (Some(Action::Advance { backward }), Swallow)
        }
        InputEvent::KeyUp { key, .. } if key == trigger => (None, Swallow),
        InputEvent::KeyDown { key: KeyCode::Escape, .. } => (None, Swallow),
        InputEvent::KeyUp { key: KeyCode::Escape, .. } => (Some(Action::Cancel), Swallow),
        InputEvent::FlagsChanged { modifiers } if !modifiers.contains(armed.held) => {
            (Some(Action::Commit), PassThrough)
        }
        _ => (None, PassThrough),
    }
}

/// Owns the global hotkey registrations.
///
/// Hotkeys are suspended while a session is open so the trigger key reaches
/// the listeners instead, and re-armed when it closes.
pub struct HotkeyController {
    registrar: Box<dyn HotkeyRegistrar>,
    tx: Sender,
    bindings: Vec<(SessionKind, Hotkey)>,
    registered: Vec<HotkeyId>,
    armed: bool,
}

impl HotkeyController {
    pub fn new(registrar: Box<dyn HotkeyRegistrar>, tx: Sender, config: &Config) -> Self {
        Self {
            registrar,
            tx,
            bindings: bindings(config),
            registered: Vec::new(),
            armed: false,
        }
    }

    pub fn hotkey_for(&self, kind: SessionKind) -> Option<Hotkey> {
        self.bindings.iter().find(|(k, _)| *k == kind).map(|(_, hotkey)| *hotkey)
    }

    pub fn is_armed(&self) -> bool { self.armed }

    pub fn arm(&mut self) {
        if self.armed {
            return;
        }
        for (kind, hotkey) in self.bindings.clone() {
            let tx = self.tx.clone();
            match self.registrar.register(hotkey, Box::new(move || tx.send(Event::HotkeyFired(kind)))) {
                Ok(id) => self.registered.push(id),
                Err(err) => warn!(%hotkey, %err, "could not register hotkey"),
            }
        }
        self.armed = true;
    }

    pub fn suspend(&mut self) {
        for id in self.registered.drain(..) {
            self.registrar.unregister(id);
        }
        self.armed = false;
    }

    /// Replaces the bindings, re-registering right away if armed.
    pub fn set_bindings(&mut self, config: &Config) {
        let bindings = bindings(config);
        if bindings == self.bindings {
            return;
        }
        self.bindings = bindings;
        if self.armed {
            self.suspend();
            self.arm();
        }
    }
}

fn bindings(config: &Config) -> Vec<(SessionKind, Hotkey)> {
    vec![
        (SessionKind::SameAppWindows, config.settings.hotkeys.windows),
        (SessionKind::CrossApp, config.settings.hotkeys.applications),
    ]
}

/// Everything the switcher drives, built by the composition root.
pub struct Services {
    pub platform: Platform,
    pub discovery: Arc<Discovery>,
    pub activation: Arc<ActivationEngine>,
    pub caches: Caches,
    pub worker: Worker,
    pub overlay: Box<dyn Overlay>,
    pub listeners: Box<dyn InputListeners>,
    pub hotkeys: Box<dyn HotkeyRegistrar>,
    pub broadcaster: Broadcaster,
}

#[derive(Debug)]
struct Opening {
    generation: u64,
    kind: SessionKind,
    /// Advances seen before the snapshot arrived.
    steps: isize,
    /// The modifier was released before the snapshot arrived.
    released: bool,
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    Opening(Opening),
    Active(SwitcherSession),
}

pub struct SwitcherActor {
    config: Config,
    rx: Receiver,
    tx: Sender,
    platform: Platform,
    discovery: Arc<Discovery>,
    activation: Arc<ActivationEngine>,
    caches: Caches,
    worker: Worker,
    overlay: Box<dyn Overlay>,
    listeners: Box<dyn InputListeners>,
    hotkeys: HotkeyController,
    mux: Arc<Multiplexer>,
    broadcaster: Broadcaster,
    watchdog: Option<Watchdog>,
    phase: Phase,
    generation: u64,
}

impl SwitcherActor {
    pub fn new(config: Config, services: Services, tx: Sender, rx: Receiver) -> Self {
        let mux = Arc::new(Multiplexer::new(tx.clone(), config.settings.input.debounce));
        let mut hotkeys = HotkeyController::new(services.hotkeys, tx.clone(), &config);
        hotkeys.arm();
        Self {
            config,
            rx,
            tx,
            platform: services.platform,
            discovery: services.discovery,
            activation: services.activation,
            caches: services.caches,
            worker: services.worker,
            overlay: services.overlay,
            listeners: services.listeners,
            hotkeys,
            mux,
            broadcaster: services.broadcaster,
            watchdog: None,
            phase: Phase::Idle,
            generation: 0,
        }
    }

    pub async fn run(mut self) {
        while let Some((span, event)) = self.rx.recv().await {
            let _guard = span.enter();
            if !self.handle_event(event) {
                break;
            }
        }
        self.shutdown();
    }

    /// Handles everything already queued without waiting.
    pub fn pump(&mut self) -> bool {
        while let Ok((span, event)) = self.rx.try_recv() {
            let _guard = span.enter();
            if !self.handle_event(event) {
                return false;
            }
        }
        true
    }

    #[instrument(skip(self))]
    fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::HotkeyFired(kind) => self.on_hotkey(kind),
            Event::SnapshotReady { generation, kind, snapshot } => {
                self.on_snapshot(generation, kind, snapshot)
            }
            Event::Input(Action::Advance { backward }) => self.advance(backward),
            Event::Input(Action::Commit) => self.close(true),
            Event::Input(Action::Cancel) => self.close(false),
            Event::MemoryPressure => {
                let evicted = self.caches.handle_memory_pressure();
                info!(evicted, "memory pressure");
            }
            Event::ConfigUpdated(config) => self.apply_config(*config),
            Event::PermissionChanged { granted } => {
                info!(granted, "accessibility permission changed");
            }
            Event::Shutdown => return false,
        }
        true
    }

    fn on_hotkey(&mut self, kind: SessionKind) {
        if !matches!(self.phase, Phase::Idle) {
            debug!(%kind, "switcher already open");
            return;
        }
        let Some(trigger) = self.hotkeys.hotkey_for(kind) else {
            return;
        };
        self.generation += 1;
        let generation = self.generation;
        self.phase = Phase::Opening(Opening {
            generation,
            kind,
            steps: 0,
            released: false,
        });
        self.hotkeys.suspend();
        self.start_input(trigger);

        let discovery = Arc::clone(&self.discovery);
        let tx = self.tx.clone();
        self.worker.submit(move || {
            let snapshot = discovery.snapshot(kind);
            tx.send(Event::SnapshotReady { generation, kind, snapshot });
        });
    }

    fn on_snapshot(&mut self, generation: u64, kind: SessionKind, snapshot: Snapshot) {
        let opening = match mem::take(&mut self.phase) {
            Phase::Opening(opening) if opening.generation == generation => opening,
            other => {
                trace!(generation, "stale snapshot");
                self.phase = other;
                return;
            }
        };
        let Some(mut session) = SwitcherSession::open(kind, snapshot) else {
            info!(%kind, "nothing to switch to");
            self.settle();
            return;
        };
        for _ in 0..opening.steps.unsigned_abs() {
            if opening.steps > 0 {
                session.select_next();
            } else {
                session.select_prev();
            }
        }
        if opening.released {
            debug!(%kind, "released before the overlay opened; committing");
            self.finish(session, true);
            return;
        }
        self.overlay.show(kind, session.items(), session.selected_index());
        self.broadcaster.publish(BroadcastEvent::SessionOpened {
            kind,
            item_count: session.len(),
        });
        self.phase = Phase::Active(session);
    }

    fn advance(&mut self, backward: bool) {
        match &mut self.phase {
            Phase::Idle => {}
            Phase::Opening(opening) => opening.steps += if backward { -1 } else { 1 },
            Phase::Active(session) => {
                let moved = if backward { session.select_prev() } else { session.select_next() };
                if moved {
                    self.overlay.select(session.selected_index());
                }
            }
        }
    }

    fn close(&mut self, commit: bool) {
        match mem::take(&mut self.phase) {
            Phase::Idle => trace!("no session to close"),
            Phase::Opening(mut opening) => {
                self.settle();
                if commit {
                    opening.released = true;
                    self.phase = Phase::Opening(opening);
                }
            }
            Phase::Active(mut session) => {
                session.deactivate();
                self.settle();
                self.finish(session, commit);
            }
        }
    }

    fn start_input(&mut self, trigger: Hotkey) {
        self.mux.arm(trigger);
        if !self.listeners.start(self.mux.clone()) {
            warn!("could not start key listeners; relying on the watchdog");
        }
        let settings = &self.config.settings.watchdog;
        if settings.enabled {
            self.watchdog = Watchdog::spawn(
                settings.clone(),
                Arc::clone(&self.platform.input),
                trigger.held_modifiers(),
                self.mux.clone(),
            );
        }
    }

    /// The synchronous half of closing: nothing after this can be attributed
    /// to the session.
    fn settle(&mut self) {
        self.overlay.hide();
        self.mux.disarm();
        self.listeners.stop();
        self.watchdog = None;
        self.overlay.teardown();
        self.hotkeys.arm();
    }

    /// The deferred half of closing.
    fn finish(&mut self, session: SwitcherSession, commit: bool) {
        let kind = session.kind();
        self.broadcaster.publish(BroadcastEvent::SessionClosed { kind, committed: commit });
        let selection = if commit { session.selection() } else { None };
        drop(session);

        let activation = Arc::clone(&self.activation);
        let caches = self.caches.clone();
        let apps = Arc::clone(&self.platform.apps);
        self.worker.submit(move || {
            if let Some(selection) = selection {
                let outcome = activation.activate_selection(&selection);
                debug!(%outcome, "activation finished");
            }
            caches.prune_dead(&*apps);
        });
    }

    fn apply_config(&mut self, config: Config) {
        let s = &config.settings;
        self.hotkeys.set_bindings(&config);
        self.mux.set_debounce(s.input.debounce);
        self.discovery.set_title_extractor(Arc::new(config.title_rules()));
        self.discovery
            .set_min_size(Size::new(s.discovery.min_window_width, s.discovery.min_window_height));
        self.activation.set_settings(s.activation.clone());
        self.caches.ax.set_limits(s.cache.ax_handles);
        self.caches.icons.set_limits(s.cache.icons);
        info!("applied new configuration");
        self.config = config;
    }

    fn shutdown(&mut self) {
        self.close(false);
        self.hotkeys.suspend();
    }
}
