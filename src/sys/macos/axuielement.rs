use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use objc2::rc::Retained;
use objc2_application_services::{AXUIElement, AXValue};
use objc2_core_foundation::{
    CFArray, CFDictionary, CFRetained, CFString, CFType, CGPoint, CGSize,
};
use objc2_foundation::{NSDictionary, NSNumber, NSString};
use tracing::debug;

use super::ffi;
use crate::sys::app::pid_t;
use crate::sys::axuielement::{Accessibility, AxError, AxWindow, AxWindowRef, Result};
use crate::sys::geometry::{Point, Rect, Size};

/// Seconds an unresponsive application may block an attribute read.
const MESSAGING_TIMEOUT: f32 = 1.0;

pub struct SystemAccessibility;

impl Accessibility for SystemAccessibility {
    fn is_trusted(&self) -> bool { unsafe { ffi::AXIsProcessTrusted() } }

    fn request_trust(&self) -> bool {
        let key = NSString::from_str("AXTrustedCheckOptionPrompt");
        let prompt = NSNumber::new_bool(true);
        let options = NSDictionary::from_slices(&[&*key], &[&*prompt]);
        // NSDictionary is toll-free bridged to CFDictionary.
        let options = Retained::as_ptr(&options).cast::<CFDictionary>();
        unsafe { ffi::AXIsProcessTrustedWithOptions(options) }
    }

    fn windows(&self, pid: pid_t) -> Result<Vec<AxWindowRef>> {
        let app = NonNull::new(unsafe { ffi::AXUIElementCreateApplication(pid) })
            .ok_or(AxError::InvalidHandle)?;
        let app: CFRetained<AXUIElement> = unsafe { CFRetained::from_raw(app) };
        unsafe { ffi::AXUIElementSetMessagingTimeout(&app, MESSAGING_TIMEOUT) };

        let value = copy_attribute(&app, "AXWindows")?;
        if unsafe { ffi::CFGetTypeID(&*value) != ffi::CFArrayGetTypeID() } {
            return Err(AxError::Unsupported("AXWindows"));
        }
        let array = unsafe { &*(ptr::from_ref(&*value) as *const CFArray) };
        let count = unsafe { ffi::CFArrayGetCount(array) };
        let windows = (0..count)
            .filter_map(|idx| {
                let raw = unsafe { ffi::CFArrayGetValueAtIndex(array, idx) };
                let element = NonNull::new(raw as *mut AXUIElement)?;
                // The array only borrows its elements.
                let element = unsafe { CFRetained::retain(element) };
                Some(Arc::new(SystemAxWindow(element)) as AxWindowRef)
            })
            .collect::<Vec<_>>();
        debug!(pid, count = windows.len(), "listed accessibility windows");
        Ok(windows)
    }
}

pub struct SystemAxWindow(CFRetained<AXUIElement>);

// SAFETY: AXUIElement references are CoreFoundation objects and the
// accessibility API may be called from any thread. Calls on one element are
// serialized by the target application.
unsafe impl Send for SystemAxWindow {}
unsafe impl Sync for SystemAxWindow {}

impl fmt::Debug for SystemAxWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SystemAxWindow").field(&CFRetained::as_ptr(&self.0)).finish()
    }
}

impl SystemAxWindow {
    fn read_bool(&self, attribute: &'static str) -> Result<bool> {
        let value = copy_attribute(&self.0, attribute)?;
        let raw: *const CFType = &*value;
        if unsafe { ffi::CFGetTypeID(raw) != ffi::CFBooleanGetTypeID() } {
            return Err(AxError::Unsupported(attribute));
        }
        Ok(unsafe { ffi::CFBooleanGetValue(raw) })
    }

    fn write_bool(&self, attribute: &'static str, value: bool) -> Result<()> {
        let name = CFString::from_str(attribute);
        let value = unsafe { if value { ffi::kCFBooleanTrue } else { ffi::kCFBooleanFalse } };
        let code = unsafe { ffi::AXUIElementSetAttributeValue(&self.0, &name, value) };
        check(code, attribute)
    }

    fn read_value<T>(&self, attribute: &'static str, kind: u32, mut out: T) -> Result<T> {
        let value = copy_attribute(&self.0, attribute)?;
        let value = unsafe { &*(ptr::from_ref(&*value) as *const AXValue) };
        let ok = unsafe { ffi::AXValueGetValue(value, kind, ptr::from_mut(&mut out).cast()) };
        if ok { Ok(out) } else { Err(AxError::Unsupported(attribute)) }
    }
}

impl AxWindow for SystemAxWindow {
    fn title(&self) -> Result<String> {
        let value = copy_attribute(&self.0, "AXTitle")?;
        let raw: *const CFType = &*value;
        if unsafe { ffi::CFGetTypeID(raw) != ffi::CFStringGetTypeID() } {
            return Err(AxError::Unsupported("AXTitle"));
        }
        Ok(unsafe { &*(raw as *const CFString) }.to_string())
    }

    fn frame(&self) -> Result<Rect> {
        let origin = self.read_value("AXPosition", ffi::kAXValueTypeCGPoint, CGPoint::ZERO)?;
        let size = self.read_value("AXSize", ffi::kAXValueTypeCGSize, CGSize::ZERO)?;
        Ok(Rect::new(Point::new(origin.x, origin.y), Size::new(size.width, size.height)))
    }

    fn raise(&self) -> Result<()> {
        let action = CFString::from_str("AXRaise");
        check(unsafe { ffi::AXUIElementPerformAction(&self.0, &action) }, "AXRaise")
    }

    fn set_main(&self, main: bool) -> Result<()> { self.write_bool("AXMain", main) }

    fn set_focused(&self, focused: bool) -> Result<()> { self.write_bool("AXFocused", focused) }

    fn is_main(&self) -> Result<bool> { self.read_bool("AXMain") }

    fn is_focused(&self) -> Result<bool> { self.read_bool("AXFocused") }
}

fn copy_attribute(element: &AXUIElement, attribute: &'static str) -> Result<CFRetained<CFType>> {
    let name = CFString::from_str(attribute);
    let mut out: *const CFType = ptr::null();
    check(unsafe { ffi::AXUIElementCopyAttributeValue(element, &name, &mut out) }, attribute)?;
    let out = NonNull::new(out.cast_mut()).ok_or(AxError::Unsupported(attribute))?;
    Ok(unsafe { CFRetained::from_raw(out) })
}

fn check(code: ffi::AXErrorCode, what: &'static str) -> Result<()> {
    match code {
        ffi::kAXErrorSuccess => Ok(()),
        ffi::kAXErrorInvalidUIElement => Err(AxError::InvalidHandle),
        ffi::kAXErrorCannotComplete | ffi::kAXErrorFailure => Err(AxError::CannotComplete),
        ffi::kAXErrorAttributeUnsupported
        | ffi::kAXErrorActionUnsupported
        | ffi::kAXErrorNoValue => Err(AxError::Unsupported(what)),
        ffi::kAXErrorAPIDisabled => Err(AxError::NotTrusted),
        other => Err(AxError::Platform(other)),
    }
}
