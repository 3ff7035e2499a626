use std::sync::Arc;

use objc2::rc::Retained;
use objc2_app_kit::{
    NSApplicationActivationOptions, NSApplicationActivationPolicy, NSRunningApplication,
    NSWorkspace,
};
use tracing::{debug, trace};

use crate::sys::app::{ActivationPolicy, AppRegistry, IconBitmap, RunningApp, pid_t};

/// The running applications as seen by `NSWorkspace`.
pub struct Workspace;

pub trait NSRunningApplicationExt {
    fn with_pid(pid: pid_t) -> Option<Retained<Self>>;

    fn to_running_app(&self) -> RunningApp;
}

impl NSRunningApplicationExt for NSRunningApplication {
    fn with_pid(pid: pid_t) -> Option<Retained<Self>> {
        NSRunningApplication::runningApplicationWithProcessIdentifier(pid)
    }

    fn to_running_app(&self) -> RunningApp {
        let policy = self.activationPolicy();
        let activation_policy = if policy == NSApplicationActivationPolicy::Regular {
            ActivationPolicy::Regular
        } else if policy == NSApplicationActivationPolicy::Accessory {
            ActivationPolicy::Accessory
        } else {
            ActivationPolicy::Prohibited
        };
        RunningApp {
            pid: self.processIdentifier(),
            bundle_id: self.bundleIdentifier().map(|id| id.to_string()),
            name: self.localizedName().map(|name| name.to_string()).unwrap_or_default(),
            is_active: self.isActive(),
            activation_policy,
        }
    }
}

impl AppRegistry for Workspace {
    fn running_apps(&self) -> Vec<RunningApp> {
        let workspace = NSWorkspace::sharedWorkspace();
        workspace
            .runningApplications()
            .iter()
            .filter(|app| !app.isTerminated())
            .map(|app| app.to_running_app())
            .collect()
    }

    fn activate(&self, pid: pid_t) -> bool {
        let Some(app) = NSRunningApplication::with_pid(pid) else {
            debug!(pid, "no running application to activate");
            return false;
        };
        app.activateWithOptions(NSApplicationActivationOptions::ActivateAllWindows)
    }

    fn icon(&self, pid: pid_t) -> Option<IconBitmap> {
        let app = NSRunningApplication::with_pid(pid)?;
        let image = app.icon()?;
        let size = image.size();
        let tiff = image.TIFFRepresentation()?;
        let data: Arc<[u8]> = tiff.to_vec().into();
        trace!(pid, bytes = data.len(), "loaded application icon");
        Some(IconBitmap {
            width: size.width.round() as u32,
            height: size.height.round() as u32,
            data,
        })
    }

    fn is_running(&self, pid: pid_t) -> bool {
        NSRunningApplication::with_pid(pid).is_some_and(|app| !app.isTerminated())
    }
}
