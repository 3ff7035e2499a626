//! The running-application registry.

use std::sync::Arc;

pub use nix::libc::pid_t;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivationPolicy {
    /// Ordinary apps that appear in the Dock.
    Regular,
    Accessory,
    Prohibited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningApp {
    pub pid: pid_t,
    pub bundle_id: Option<String>,
    pub name: String,
    pub is_active: bool,
    pub activation_policy: ActivationPolicy,
}

/// A rendered application icon. The bytes are never mutated once created,
/// so clones share the allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconBitmap {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
}

pub trait AppRegistry: Send + Sync {
    fn running_apps(&self) -> Vec<RunningApp>;

    /// Brings every window of `pid` forward. Returns false if the process
    /// could not be found or refused.
    fn activate(&self, pid: pid_t) -> bool;

    fn icon(&self, pid: pid_t) -> Option<IconBitmap>;

    fn is_running(&self, pid: pid_t) -> bool { process_exists(pid) }
}

/// Probes `pid` with signal 0.
pub fn process_exists(pid: pid_t) -> bool {
    if pid <= 0 {
        return false;
    }
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

pub fn current_pid() -> pid_t { nix::unistd::getpid().as_raw() }
