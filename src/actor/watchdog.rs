//! Polls the live modifier state while a session is open.
//!
//! Event taps can stop delivering modifier releases, for example when another
//! process grabs focus mid-session. The watchdog re-reads the modifiers on a
//! timer and, once the held modifier is gone, reports the release through the
//! same sink the listeners use. The sink may turn a report away while another
//! event is in flight, so the release is reported again on every poll until
//! the session closes and drops the watchdog. Polling starts fast, slows down
//! after a burst, and gives up after a fixed number of polls.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, TryRecvError, bounded};
use tracing::{Span, debug, trace, warn};

use crate::common::config::WatchdogSettings;
use crate::sys::event::{EventSource, InputEvent, InputSinkRef, InputState};
use crate::sys::hotkey::Modifiers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Poll again after the given delay.
    Continue(Duration),
    Released,
    Expired,
}

/// The poll schedule, independent of any thread.
#[derive(Debug, Clone)]
pub struct WatchdogState {
    settings: WatchdogSettings,
    polls: u32,
}

impl WatchdogState {
    pub fn new(settings: WatchdogSettings) -> Self { Self { settings, polls: 0 } }

    pub fn polls(&self) -> u32 { self.polls }

    /// Delay before the first poll, and between reports of a release.
    pub fn first_interval(&self) -> Duration { self.settings.fast_interval }

    /// A release seen on the last allowed poll is still reported; after that
    /// the watchdog expires whatever the modifiers say.
    pub fn poll(&mut self, still_held: bool) -> Verdict {
        self.polls += 1;
        if !still_held && self.polls <= self.settings.max_polls {
            return Verdict::Released;
        }
        if self.polls >= self.settings.max_polls {
            return Verdict::Expired;
        }
        if self.polls < self.settings.fast_polls {
            Verdict::Continue(self.settings.fast_interval)
        } else {
            Verdict::Continue(self.settings.slow_interval)
        }
    }
}

/// A running watchdog. Dropping it stops the poll thread before its next
/// report; a report already under way is ignored by the disarmed sink.
pub struct Watchdog {
    _stop: Sender<()>,
}

impl Watchdog {
    pub fn spawn(
        settings: WatchdogSettings,
        input: std::sync::Arc<dyn InputState>,
        held: Modifiers,
        sink: InputSinkRef,
    ) -> Option<Watchdog> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let span = Span::current();
        let spawned = thread::Builder::new().name("modifier-watchdog".into()).spawn(move || {
            let _guard = span.enter();
            let mut state = WatchdogState::new(settings);
            let mut interval = state.first_interval();
            let mut reports = 0u32;
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    // Stopped.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
                let modifiers = input.modifiers();
                match state.poll(modifiers.contains(held)) {
                    Verdict::Continue(next) => interval = next,
                    Verdict::Released => {
                        if stop_rx.try_recv() != Err(TryRecvError::Empty) {
                            return;
                        }
                        if reports == 0 {
                            debug!(polls = state.polls(), %modifiers, "watchdog saw modifier release");
                        }
                        reports += 1;
                        sink.deliver(EventSource::Watchdog, InputEvent::FlagsChanged { modifiers });
                        interval = state.first_interval();
                        continue;
                    }
                    Verdict::Expired => {
                        warn!(polls = state.polls(), reports, "watchdog gave up");
                        return;
                    }
                }
                trace!(polls = state.polls(), "modifier still held");
            }
        });
        match spawned {
            Ok(_) => Some(Watchdog { _stop: stop_tx }),
            Err(err) => {
                warn!(%err, "could not start watchdog thread");
                None
            }
        }
    }
}
