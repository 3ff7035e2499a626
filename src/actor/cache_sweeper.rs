//! Periodic liveness sweep of the handle caches.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use tracing::{debug, warn};

use crate::model::handle_cache::{AxHandleCache, IconCache};
use crate::sys::app::AppRegistry;

#[derive(Clone)]
pub struct Caches {
    pub ax: Arc<AxHandleCache>,
    pub icons: Arc<IconCache>,
}

impl Caches {
    /// Drops entries of exited processes from both caches.
    pub fn prune_dead(&self, apps: &dyn AppRegistry) -> usize {
        let is_alive = |pid| apps.is_running(pid);
        let removed = self.ax.prune_dead(is_alive) + self.icons.prune_dead(is_alive);
        if removed > 0 {
            debug!(removed, "swept entries of exited processes");
        }
        removed
    }

    pub fn handle_memory_pressure(&self) -> usize {
        self.ax.handle_memory_pressure() + self.icons.handle_memory_pressure()
    }
}

/// Sweeps on a fixed interval until dropped.
pub struct CacheSweeper {
    _stop: Sender<()>,
}

impl CacheSweeper {
    pub fn spawn(
        interval: Duration,
        caches: Caches,
        apps: Arc<dyn AppRegistry>,
    ) -> Option<CacheSweeper> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let spawned = thread::Builder::new().name("cache-sweeper".into()).spawn(move || {
            while let Err(RecvTimeoutError::Timeout) = stop_rx.recv_timeout(interval) {
                caches.prune_dead(&*apps);
            }
        });
        match spawned {
            Ok(_) => Some(CacheSweeper { _stop: stop_tx }),
            Err(err) => {
                warn!(%err, "could not start cache sweeper");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::handle_cache::{CacheLimits, CachedAxHandle, CachedIcon};
    use crate::sys::app::IconBitmap;
    use crate::sys::testing::{FakeApps, FakeAxWindow, app};
    use crate::sys::window_server::WindowServerId;

    fn caches() -> Caches {
        Caches {
            ax: Arc::new(AxHandleCache::new("ax", CacheLimits::default())),
            icons: Arc::new(IconCache::new("icons", CacheLimits::default())),
        }
    }

    fn icon(pid: i32) -> CachedIcon {
        CachedIcon {
            pid,
            bitmap: IconBitmap {
                width: 1,
                height: 1,
                data: Arc::from(vec![0u8; 4]),
            },
        }
    }

    fn handle(pid: i32) -> CachedAxHandle {
        CachedAxHandle { handle: Arc::new(FakeAxWindow::new("w")), pid }
    }

    fn populated(apps: &FakeApps) -> Caches {
        apps.set(vec![app(1, "Live"), app(2, "Doomed")]);
        let caches = caches();
        caches.ax.put(WindowServerId::new(10), handle(1));
        caches.ax.put(WindowServerId::new(20), handle(2));
        caches.icons.put(1, icon(1));
        caches.icons.put(2, icon(2));
        caches
    }

    #[test]
    fn sweep_removes_exited_processes_from_both_caches() {
        let apps = FakeApps::default();
        let caches = populated(&apps);
        apps.kill(2);

        assert_eq!(caches.prune_dead(&apps), 2);
        assert!(caches.ax.contains_key(&WindowServerId::new(10)));
        assert!(!caches.ax.contains_key(&WindowServerId::new(20)));
        assert!(caches.icons.contains_key(&1));
        assert!(!caches.icons.contains_key(&2));
    }

    #[test]
    fn background_sweep_runs_on_its_interval() {
        let apps = Arc::new(FakeApps::default());
        let caches = populated(&apps);
        apps.kill(2);

        let sweeper = CacheSweeper::spawn(Duration::from_millis(5), caches.clone(), apps.clone());
        assert!(sweeper.is_some());
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while caches.icons.len() > 1 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(caches.icons.len(), 1);
        assert_eq!(caches.ax.len(), 1);
    }
}
