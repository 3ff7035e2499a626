use std::ffi::c_void;
use std::ptr;

use tracing::{debug, warn};

use super::ffi;

type Callback = Box<dyn Fn() + Send + Sync>;

/// Calls back when the system reports memory pressure (warning or critical).
pub struct MemoryPressureMonitor {
    source: ffi::DispatchObject,
}

// SAFETY: dispatch sources are thread-safe objects.
unsafe impl Send for MemoryPressureMonitor {}

impl MemoryPressureMonitor {
    pub fn start(callback: impl Fn() + Send + Sync + 'static) -> Option<Self> {
        let ctx = Box::into_raw(Box::new(Box::new(callback) as Callback));
        unsafe {
            let queue = ffi::dispatch_get_global_queue(0, 0);
            let source = ffi::dispatch_source_create(
                ptr::addr_of!(ffi::_dispatch_source_type_memorypressure),
                0,
                ffi::DISPATCH_MEMORYPRESSURE_WARN | ffi::DISPATCH_MEMORYPRESSURE_CRITICAL,
                queue,
            );
            if source.is_null() {
                warn!("memory pressure source unavailable");
                drop(Box::from_raw(ctx));
                return None;
            }
            ffi::dispatch_set_context(source, ctx.cast());
            ffi::dispatch_source_set_event_handler_f(source, on_pressure);
            ffi::dispatch_source_set_cancel_handler_f(source, free_ctx);
            ffi::dispatch_resume(source);
            debug!("watching memory pressure");
            Some(MemoryPressureMonitor { source })
        }
    }
}

impl Drop for MemoryPressureMonitor {
    fn drop(&mut self) {
        unsafe {
            ffi::dispatch_source_cancel(self.source);
            ffi::dispatch_release(self.source);
        }
    }
}

unsafe extern "C" fn on_pressure(ctx: *mut c_void) {
    let callback = unsafe { &*(ctx as *const Callback) };
    callback();
}

unsafe extern "C" fn free_ctx(ctx: *mut c_void) {
    drop(unsafe { Box::from_raw(ctx as *mut Callback) });
}
