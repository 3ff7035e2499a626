//! Long-running pieces of the switcher and the channels between them.
//!
//! Every message carries the [`tracing::Span`] that was current when it was
//! sent, so a commit handled on the switcher thread still shows up under the
//! key event that caused it.

pub mod broadcast;
pub mod cache_sweeper;
pub mod config_watcher;
pub mod permission;
pub mod switcher;
pub mod watchdog;
pub mod worker;

use tokio::sync::mpsc;
use tracing::Span;

pub struct Sender<Event>(mpsc::UnboundedSender<(Span, Event)>);

pub type Receiver<Event> = mpsc::UnboundedReceiver<(Span, Event)>;

pub fn channel<Event>() -> (Sender<Event>, Receiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Sender(tx), rx)
}

impl<Event> Sender<Event> {
    /// Sends `event` under the current span. A closed receiver means the
    /// actor has shut down, which is not the sender's problem.
    pub fn send(&self, event: Event) { _ = self.0.send((Span::current(), event)); }

    /// Like [`Sender::send`], but reports whether the actor is still there.
    pub fn try_send(&self, event: Event) -> bool { self.0.send((Span::current(), event)).is_ok() }
}

impl<Event> Clone for Sender<Event> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Event> std::fmt::Debug for Sender<Event> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Sender").finish_non_exhaustive()
    }
}
