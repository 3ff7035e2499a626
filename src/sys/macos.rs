//! macOS implementations of the platform traits.
//!
//! Event taps and the memory-pressure source are attached to the main run
//! loop, which the binary parks on with [`run_main_loop`]. Everything else
//! is safe to call from the switcher and worker threads.

mod app;
mod axuielement;
mod event_tap;
mod ffi;
mod hotkeys;
mod input;
mod memory_pressure;
mod screen;
mod window_server;

use std::sync::Arc;

use objc2_core_foundation::{CGPoint, CGRect};

pub use self::app::Workspace;
pub use self::axuielement::SystemAccessibility;
pub use self::event_tap::EventTapListeners;
pub use self::hotkeys::EventTapHotkeys;
pub use self::input::SystemInput;
pub use self::memory_pressure::MemoryPressureMonitor;
pub use self::screen::CgDisplays;
pub use self::window_server::CgWindowList;
use super::Platform;
use super::geometry::{Point, Rect, Size};

pub fn platform() -> Platform {
    Platform {
        windows: Arc::new(CgWindowList),
        ax: Arc::new(SystemAccessibility),
        apps: Arc::new(Workspace),
        displays: Arc::new(CgDisplays),
        input: Arc::new(SystemInput),
    }
}

/// Blocks the calling thread, which must be the main thread, running the
/// main run loop.
pub fn run_main_loop() { unsafe { ffi::CFRunLoopRun() } }

fn to_point(p: CGPoint) -> Point { Point::new(p.x, p.y) }

fn to_cg_point(p: Point) -> CGPoint { CGPoint::new(p.x, p.y) }

fn to_rect(r: CGRect) -> Rect {
    Rect::new(to_point(r.origin), Size::new(r.size.width, r.size.height))
}
