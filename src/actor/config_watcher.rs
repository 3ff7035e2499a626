//! Reloads the configuration file when it changes on disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use tracing::{debug, info, warn};

use super::broadcast::{BroadcastEvent, Broadcaster};
use crate::common::config::{Config, ConfigError};

const DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("config path {} has no parent directory", .0.display())]
    NoParent(PathBuf),
    #[error(transparent)]
    Notify(#[from] notify::Error),
}

/// Keeps the file watch alive until dropped.
pub struct ConfigWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl ConfigWatcher {
    /// Watches the directory containing `path`, since editors often replace
    /// the file rather than writing it in place.
    pub fn spawn(path: PathBuf, broadcaster: Broadcaster) -> Result<ConfigWatcher, WatchError> {
        let parent = path.parent().ok_or_else(|| WatchError::NoParent(path.clone()))?.to_owned();
        let target = path.clone();
        let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| {
            match result {
                Ok(events) if events.iter().any(|e| is_target(&e.path, &target)) => {
                    if let Some(config) = reload(&target) {
                        broadcaster.publish(BroadcastEvent::ConfigChanged { config: Box::new(config) });
                    }
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "config watch error"),
            }
        })?;
        debouncer.watcher().watch(&parent, RecursiveMode::NonRecursive)?;
        info!(dir = %parent.display(), "watching for config changes");
        Ok(ConfigWatcher { _debouncer: debouncer })
    }
}

fn is_target(changed: &Path, target: &Path) -> bool {
    changed == target || (changed.file_name().is_some() && changed.file_name() == target.file_name())
}

/// Reads and validates the file, logging instead of failing.
pub fn reload(path: &Path) -> Option<Config> {
    match Config::read(path) {
        Ok(config) => {
            info!(path = %path.display(), "reloaded configuration");
            Some(config)
        }
        Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file removed; keeping current settings");
            None
        }
        Err(err) => {
            warn!(%err, "ignoring invalid configuration");
            None
        }
    }
}
