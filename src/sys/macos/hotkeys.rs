use std::sync::Arc;

use objc2_core_graphics::{CGEvent, CGEventTapOptions, CGEventType};
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::event_tap::{Tap, TapHandler, TapTarget, translate};
use crate::sys::event::InputEvent;
use crate::sys::hotkey::{Hotkey, HotkeyCallback, HotkeyError, HotkeyId, HotkeyRegistrar};

#[derive(Default)]
struct Bindings {
    next_id: u32,
    entries: Vec<(HotkeyId, Hotkey, Arc<HotkeyCallback>)>,
}

struct HotkeyHandler {
    bindings: Arc<Mutex<Bindings>>,
}

impl TapHandler for HotkeyHandler {
    fn handle(&self, etype: CGEventType, event: &CGEvent) -> bool {
        let Some(InputEvent::KeyDown { key, modifiers, repeat }) = translate(etype, event) else {
            return false;
        };
        let callback = self
            .bindings
            .lock()
            .entries
            .iter()
            .find(|(_, hotkey, _)| hotkey.key_code == key && hotkey.modifiers == modifiers)
            .map(|(_, _, callback)| Arc::clone(callback));
        let Some(callback) = callback else {
            return false;
        };
        if !repeat {
            trace!(%key, %modifiers, "hotkey");
            callback();
        }
        true
    }
}

/// Global hotkeys implemented with a session event tap.
///
/// The tap is created on first registration and disabled while nothing is
/// registered.
#[derive(Default)]
pub struct EventTapHotkeys {
    bindings: Arc<Mutex<Bindings>>,
    tap: Option<Tap<HotkeyHandler>>,
}

impl EventTapHotkeys {
    pub fn new() -> Self { Self::default() }

    fn ensure_tap(&mut self) -> Result<&Tap<HotkeyHandler>, HotkeyError> {
        if self.tap.is_none() {
            let handler = HotkeyHandler { bindings: Arc::clone(&self.bindings) };
            let mask = 1 << CGEventType::KeyDown.0 as u64;
            self.tap = Tap::new(TapTarget::Session, CGEventTapOptions::Default, mask, handler);
        }
        self.tap.as_ref().ok_or_else(|| {
            HotkeyError::Platform("could not create the hotkey event tap".to_string())
        })
    }
}

impl HotkeyRegistrar for EventTapHotkeys {
    fn register(
        &mut self,
        hotkey: Hotkey,
        callback: HotkeyCallback,
    ) -> Result<HotkeyId, HotkeyError> {
        self.ensure_tap()?;
        let mut bindings = self.bindings.lock();
        if bindings.entries.iter().any(|(_, existing, _)| *existing == hotkey) {
            return Err(HotkeyError::Platform(format!("{hotkey} is already registered")));
        }
        bindings.next_id += 1;
        let id = HotkeyId(bindings.next_id);
        bindings.entries.push((id, hotkey, Arc::new(callback)));
        drop(bindings);
        if let Some(tap) = &self.tap {
            tap.set_enabled(true);
        }
        debug!(%hotkey, "registered hotkey");
        Ok(id)
    }

    fn unregister(&mut self, id: HotkeyId) {
        let mut bindings = self.bindings.lock();
        bindings.entries.retain(|(entry, ..)| *entry != id);
        let empty = bindings.entries.is_empty();
        drop(bindings);
        if empty && let Some(tap) = &self.tap {
            tap.set_enabled(false);
        }
    }
}
