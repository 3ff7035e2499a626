use std::ffi::c_void;
use std::ptr::{self, NonNull};

use objc2_core_foundation::{
    CFArray, CFDictionary, CFNumber, CFRetained, CFString, CFType, CGPoint, CGRect, CGSize,
};
use tracing::warn;

use super::{ffi, to_rect};
use crate::sys::geometry::Rect;
use crate::sys::window_server::{WindowList, WindowServerId, WindowServerInfo};

/// The window list as reported by `CGWindowListCopyWindowInfo`.
pub struct CgWindowList;

impl WindowList for CgWindowList {
    fn on_screen_windows(&self) -> Vec<WindowServerInfo> {
        let options =
            ffi::kCGWindowListOptionOnScreenOnly | ffi::kCGWindowListExcludeDesktopElements;
        let raw = unsafe { ffi::CGWindowListCopyWindowInfo(options, ffi::kCGNullWindowID) };
        let Some(raw) = NonNull::new(raw) else {
            warn!("window list unavailable");
            return Vec::new();
        };
        let list: CFRetained<CFArray> = unsafe { CFRetained::from_raw(raw) };
        let count = unsafe { ffi::CFArrayGetCount(&list) };
        (0..count)
            .filter_map(|idx| {
                let dict = unsafe { ffi::CFArrayGetValueAtIndex(&list, idx) } as *const CFDictionary;
                // SAFETY: every element of the window list is a dictionary
                // kept alive by `list`.
                unsafe { dict.as_ref() }.and_then(parse_entry)
            })
            .collect()
    }
}

fn parse_entry(dict: &CFDictionary) -> Option<WindowServerInfo> {
    let id = number(dict, "kCGWindowNumber")?;
    let pid = number(dict, "kCGWindowOwnerPID")?;
    let layer = number(dict, "kCGWindowLayer").unwrap_or(0);
    let on_screen = boolean(dict, "kCGWindowIsOnscreen").unwrap_or(true);
    let title = string(dict, "kCGWindowName").unwrap_or_default();
    let bounds = bounds(dict)?;
    Some(WindowServerInfo {
        id: WindowServerId::new(u32::try_from(id).ok()?),
        pid: i32::try_from(pid).ok()?,
        title,
        layer: i32::try_from(layer).ok()?,
        on_screen,
        bounds,
    })
}

fn value(dict: &CFDictionary, key: &str) -> *const CFType {
    let key = CFString::from_str(key);
    let key_ptr: *const CFString = &*key;
    unsafe { ffi::CFDictionaryGetValue(dict, key_ptr as *const c_void) as *const CFType }
}

fn number(dict: &CFDictionary, key: &str) -> Option<i64> {
    let raw = value(dict, key) as *const CFNumber;
    let number = unsafe { raw.as_ref() }?;
    let mut out: i64 = 0;
    let ok = unsafe {
        ffi::CFNumberGetValue(number, ffi::kCFNumberSInt64Type, ptr::from_mut(&mut out).cast())
    };
    ok.then_some(out)
}

fn boolean(dict: &CFDictionary, key: &str) -> Option<bool> {
    let raw = value(dict, key);
    if raw.is_null() || unsafe { ffi::CFGetTypeID(raw) != ffi::CFBooleanGetTypeID() } {
        return None;
    }
    Some(unsafe { ffi::CFBooleanGetValue(raw) })
}

fn string(dict: &CFDictionary, key: &str) -> Option<String> {
    let raw = value(dict, key);
    if raw.is_null() || unsafe { ffi::CFGetTypeID(raw) != ffi::CFStringGetTypeID() } {
        return None;
    }
    let string = unsafe { &*(raw as *const CFString) };
    Some(string.to_string())
}

fn bounds(dict: &CFDictionary) -> Option<Rect> {
    let raw = value(dict, "kCGWindowBounds") as *const CFDictionary;
    let bounds = unsafe { raw.as_ref() }?;
    let mut rect = CGRect::new(CGPoint::ZERO, CGSize::ZERO);
    unsafe { ffi::CGRectMakeWithDictionaryRepresentation(bounds, &mut rect) }.then(|| to_rect(rect))
}
