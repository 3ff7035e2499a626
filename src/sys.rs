//! The platform boundary.
//!
//! Everything the switcher needs from the operating system is expressed as a
//! trait in one of these modules. The macOS implementations live in
//! [`macos`]; tests run against the fakes in `testing`.

pub mod app;
pub mod axuielement;
pub mod event;
pub mod geometry;
pub mod hotkey;
pub mod screen;
pub mod window_server;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use self::app::AppRegistry;
use self::axuielement::Accessibility;
use self::event::InputState;
use self::screen::DisplayList;
use self::window_server::WindowList;

/// The set of platform services shared by discovery and activation.
///
/// Built once by the composition root and handed out by reference; nothing
/// in the engine reaches for global state.
#[derive(Clone)]
pub struct Platform {
    pub windows: Arc<dyn WindowList>,
    pub ax: Arc<dyn Accessibility>,
    pub apps: Arc<dyn AppRegistry>,
    pub displays: Arc<dyn DisplayList>,
    pub input: Arc<dyn InputState>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}
