//! CoreGraphics event taps.
//!
//! A tap is created from whatever thread asks for it but always runs on the
//! main run loop. Its context is freed on the main queue so that a callback
//! in flight never sees it disappear.

use std::ffi::c_void;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use objc2_core_foundation::{
    CFMachPort, CFRetained, CFRunLoop, CFRunLoopSource, kCFRunLoopCommonModes,
};
use objc2_core_graphics::{
    CGEvent, CGEventField, CGEventMask, CGEventTapCallBack, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventTapProxy, CGEventType,
};
use tracing::{debug, warn};

use super::ffi;
use crate::sys::app::{current_pid, pid_t};
use crate::sys::event::{
    Disposition, EventSource, InputEvent, InputListeners, InputSinkRef, KeyCode, Modifiers,
};

pub(super) const KEY_MASK: CGEventMask = (1 << CGEventType::KeyDown.0 as u64)
    | (1 << CGEventType::KeyUp.0 as u64)
    | (1 << CGEventType::FlagsChanged.0 as u64);

pub(super) trait TapHandler: Send + Sync + 'static {
    /// Returns true to swallow the event.
    fn handle(&self, etype: CGEventType, event: &CGEvent) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub(super) enum TapTarget {
    Session,
    Process(pid_t),
}

struct TapCtx<H> {
    port: AtomicPtr<CFMachPort>,
    handler: H,
}

pub(super) struct Tap<H: TapHandler> {
    port: CFRetained<CFMachPort>,
    source: CFRetained<CFRunLoopSource>,
    ctx: NonNull<TapCtx<H>>,
}

// SAFETY: the port and source are CoreFoundation objects usable from any
// thread; the context is only dereferenced by the callback on the main
// thread and freed there.
unsafe impl<H: TapHandler> Send for Tap<H> {}

impl<H: TapHandler> Tap<H> {
    pub(super) fn new(
        target: TapTarget,
        options: CGEventTapOptions,
        mask: CGEventMask,
        handler: H,
    ) -> Option<Self> {
        let ctx = Box::into_raw(Box::new(TapCtx {
            port: AtomicPtr::new(ptr::null_mut()),
            handler,
        }));
        let place = CGEventTapPlacement::HeadInsertEventTap;
        let callback: CGEventTapCallBack = Some(tap_callback::<H>);
        let raw = unsafe {
            match target {
                TapTarget::Session => ffi::CGEventTapCreate(
                    CGEventTapLocation::SessionEventTap,
                    place,
                    options,
                    mask,
                    callback,
                    ctx.cast(),
                ),
                TapTarget::Process(pid) => {
                    ffi::CGEventTapCreateForPid(pid, place, options, mask, callback, ctx.cast())
                }
            }
        };
        let Some(port) = NonNull::new(raw) else {
            debug!(?target, "event tap creation refused");
            drop(unsafe { Box::from_raw(ctx) });
            return None;
        };
        let port = unsafe { CFRetained::from_raw(port) };
        let source = unsafe { ffi::CFMachPortCreateRunLoopSource(ptr::null(), &port, 0) };
        let (Some(source), Some(main)) = (NonNull::new(source), CFRunLoop::main()) else {
            unsafe { ffi::CFMachPortInvalidate(&port) };
            drop(unsafe { Box::from_raw(ctx) });
            return None;
        };
        let source = unsafe { CFRetained::from_raw(source) };
        unsafe { (*ctx).port.store(CFRetained::as_ptr(&port).as_ptr(), Ordering::Release) };
        main.add_source(Some(&source), unsafe { kCFRunLoopCommonModes });
        unsafe { ffi::CGEventTapEnable(&port, true) };
        Some(Tap {
            port,
            source,
            // SAFETY: from Box::into_raw above.
            ctx: unsafe { NonNull::new_unchecked(ctx) },
        })
    }

    pub(super) fn set_enabled(&self, enabled: bool) {
        unsafe { ffi::CGEventTapEnable(&self.port, enabled) };
    }
}

impl<H: TapHandler> Drop for Tap<H> {
    fn drop(&mut self) {
        unsafe { ffi::CGEventTapEnable(&self.port, false) };
        if let Some(main) = CFRunLoop::main() {
            main.remove_source(Some(&self.source), unsafe { kCFRunLoopCommonModes });
        }
        unsafe { ffi::CFMachPortInvalidate(&self.port) };

        unsafe extern "C" fn free_ctx<H>(ctx: *mut c_void) {
            drop(unsafe { Box::from_raw(ctx as *mut TapCtx<H>) });
        }
        unsafe {
            ffi::dispatch_async_f(
                ptr::addr_of!(ffi::_dispatch_main_q),
                self.ctx.as_ptr().cast(),
                free_ctx::<H>,
            );
        }
    }
}

unsafe extern "C-unwind" fn tap_callback<H: TapHandler>(
    _proxy: CGEventTapProxy,
    etype: CGEventType,
    event: NonNull<CGEvent>,
    user_info: *mut c_void,
) -> *mut CGEvent {
    let ctx = unsafe { &*(user_info as *const TapCtx<H>) };
    if etype == CGEventType::TapDisabledByTimeout || etype == CGEventType::TapDisabledByUserInput {
        if let Some(port) = unsafe { ctx.port.load(Ordering::Acquire).as_ref() } {
            warn!(?etype, "event tap was disabled; re-enabling");
            unsafe { ffi::CGEventTapEnable(port, true) };
        }
        return event.as_ptr();
    }
    if ctx.handler.handle(etype, unsafe { event.as_ref() }) {
        ptr::null_mut()
    } else {
        event.as_ptr()
    }
}

pub(super) fn translate(etype: CGEventType, event: &CGEvent) -> Option<InputEvent> {
    let modifiers = Modifiers::from_cg_flags(unsafe { ffi::CGEventGetFlags(event) }.0);
    let field = |field| unsafe { ffi::CGEventGetIntegerValueField(event, field) };
    let key = || {
        let code = u16::try_from(field(CGEventField::KeyboardEventKeycode)).ok()?;
        KeyCode::try_from(code).ok()
    };
    if etype == CGEventType::KeyDown {
        Some(InputEvent::KeyDown {
            key: key()?,
            modifiers,
            repeat: field(CGEventField::KeyboardEventAutorepeat) != 0,
        })
    } else if etype == CGEventType::KeyUp {
        Some(InputEvent::KeyUp { key: key()?, modifiers })
    } else if etype == CGEventType::FlagsChanged {
        Some(InputEvent::FlagsChanged { modifiers })
    } else {
        None
    }
}

struct ListenerHandler {
    source: EventSource,
    sink: InputSinkRef,
    can_swallow: bool,
}

impl TapHandler for ListenerHandler {
    fn handle(&self, etype: CGEventType, event: &CGEvent) -> bool {
        let Some(input) = translate(etype, event) else {
            return false;
        };
        self.sink.deliver(self.source, input) == Disposition::Swallow && self.can_swallow
    }
}

/// The process-local and session-wide key listeners.
///
/// The session tap is created active so it can swallow the trigger key; if
/// the system refuses, it falls back to listening only.
#[derive(Default)]
pub struct EventTapListeners {
    local: Option<Tap<ListenerHandler>>,
    global: Option<Tap<ListenerHandler>>,
}

impl EventTapListeners {
    pub fn new() -> Self { Self::default() }
}

impl InputListeners for EventTapListeners {
    fn start(&mut self, sink: InputSinkRef) -> bool {
        self.stop();
        let handler = |source, can_swallow| ListenerHandler {
            source,
            sink: sink.clone(),
            can_swallow,
        };
        self.local = Tap::new(
            TapTarget::Process(current_pid()),
            CGEventTapOptions::ListenOnly,
            KEY_MASK,
            handler(EventSource::Local, false),
        );
        self.global = Tap::new(
            TapTarget::Session,
            CGEventTapOptions::Default,
            KEY_MASK,
            handler(EventSource::Global, true),
        )
        .or_else(|| {
            warn!("active key tap unavailable; the trigger key will reach other apps");
            Tap::new(
                TapTarget::Session,
                CGEventTapOptions::ListenOnly,
                KEY_MASK,
                handler(EventSource::Global, false),
            )
        });
        if self.local.is_none() {
            debug!("process-local key tap unavailable");
        }
        self.local.is_some() || self.global.is_some()
    }

    fn stop(&mut self) {
        self.local = None;
        self.global = None;
    }
}
