//! Accessibility permission: checked at startup, prompted for once, then
//! polled until the user grants it.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use tracing::{info, warn};

use super::broadcast::{BroadcastEvent, Broadcaster};
use crate::sys::axuielement::Accessibility;

pub struct PermissionPoll {
    _stop: Sender<()>,
}

/// Returns true if access is already granted. Otherwise shows the system
/// prompt once and, if still not granted, starts a poll that publishes
/// [`BroadcastEvent::PermissionChanged`] when access arrives.
pub fn ensure_trusted(
    ax: Arc<dyn Accessibility>,
    interval: Duration,
    broadcaster: Broadcaster,
) -> (bool, Option<PermissionPoll>) {
    if ax.is_trusted() {
        return (true, None);
    }
    if ax.request_trust() {
        info!("accessibility access granted");
        broadcaster.publish(BroadcastEvent::PermissionChanged { granted: true });
        return (true, None);
    }
    info!("waiting for accessibility access; switching is disabled until it is granted");
    (false, PermissionPoll::spawn(ax, interval, broadcaster))
}

impl PermissionPoll {
    pub fn spawn(
        ax: Arc<dyn Accessibility>,
        interval: Duration,
        broadcaster: Broadcaster,
    ) -> Option<PermissionPoll> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let spawned = thread::Builder::new().name("permission-poll".into()).spawn(move || {
            while let Err(RecvTimeoutError::Timeout) = stop_rx.recv_timeout(interval) {
                if ax.is_trusted() {
                    info!("accessibility access granted");
                    broadcaster.publish(BroadcastEvent::PermissionChanged { granted: true });
                    return;
                }
            }
        });
        match spawned {
            Ok(_) => Some(PermissionPoll { _stop: stop_tx }),
            Err(err) => {
                warn!(%err, "could not start permission poll");
                None
            }
        }
    }
}
