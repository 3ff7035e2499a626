//! Keyboard and pointer input.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::geometry::Point;
pub use super::hotkey::{Hotkey, KeyCode, Modifiers};

/// Which listener delivered an event.
///
/// The same physical key action is usually reported by both the process-local
/// and the system-wide listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSource {
    Local,
    Global,
    Watchdog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown {
        key: KeyCode,
        modifiers: Modifiers,
        repeat: bool,
    },
    KeyUp {
        key: KeyCode,
        modifiers: Modifiers,
    },
    FlagsChanged {
        modifiers: Modifiers,
    },
}

/// What a listener should do with the event it just delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    PassThrough,
    Swallow,
}

/// Receives events from the platform listeners. Must answer synchronously
/// because the listener callback decides whether to swallow the event.
pub trait InputSink: Send + Sync {
    fn deliver(&self, source: EventSource, event: InputEvent) -> Disposition;
}

pub type InputSinkRef = Arc<dyn InputSink>;

/// The pair of key listeners that feed a session.
pub trait InputListeners: Send {
    fn start(&mut self, sink: InputSinkRef) -> bool;

    fn stop(&mut self);
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
#[error("could not move the pointer to {point:?}")]
pub struct PointerError {
    pub point: Point,
}

/// Live input state, read without going through the event stream.
pub trait InputState: Send + Sync {
    fn pointer_location(&self) -> Option<Point>;

    /// Synthesizes a pointer move to `point`.
    fn warp_pointer(&self, point: Point) -> Result<(), PointerError>;

    fn modifiers(&self) -> Modifiers;
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputEvent::KeyDown { key, modifiers, .. } => write!(f, "down({modifiers}+{key})"),
            InputEvent::KeyUp { key, modifiers } => write!(f, "up({modifiers}+{key})"),
            InputEvent::FlagsChanged { modifiers } => write!(f, "flags({modifiers})"),
        }
    }
}
