//! Raw declarations for the framework calls the bindings do not expose in
//! the shape we need.

#![allow(non_upper_case_globals, non_snake_case)]

use std::ffi::c_void;

use objc2_application_services::{AXUIElement, AXValue};
use objc2_core_foundation::{
    CFArray, CFDictionary, CFIndex, CFMachPort, CFNumber, CFRunLoopSource, CFString, CFType,
    CGPoint, CGRect,
};
use objc2_core_graphics::{
    CGEvent, CGEventField, CGEventFlags, CGEventMask, CGEventSourceStateID, CGEventTapCallBack,
    CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType, CGMouseButton,
};

use crate::sys::app::pid_t;

pub type AXErrorCode = i32;
pub type CFTypeID = usize;

pub const kAXErrorSuccess: AXErrorCode = 0;
pub const kAXErrorFailure: AXErrorCode = -25200;
pub const kAXErrorInvalidUIElement: AXErrorCode = -25202;
pub const kAXErrorCannotComplete: AXErrorCode = -25204;
pub const kAXErrorAttributeUnsupported: AXErrorCode = -25205;
pub const kAXErrorActionUnsupported: AXErrorCode = -25206;
pub const kAXErrorNoValue: AXErrorCode = -25212;
pub const kAXErrorAPIDisabled: AXErrorCode = -25211;

pub const kAXValueTypeCGPoint: u32 = 1;
pub const kAXValueTypeCGSize: u32 = 2;

pub const kCFNumberSInt64Type: CFIndex = 4;

pub const kCGWindowListOptionOnScreenOnly: u32 = 1 << 0;
pub const kCGWindowListExcludeDesktopElements: u32 = 1 << 4;
pub const kCGNullWindowID: u32 = 0;

pub const DISPATCH_MEMORYPRESSURE_WARN: usize = 0x2;
pub const DISPATCH_MEMORYPRESSURE_CRITICAL: usize = 0x4;

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    pub fn AXIsProcessTrusted() -> bool;
    pub fn AXIsProcessTrustedWithOptions(options: *const CFDictionary) -> bool;
    pub fn AXUIElementCreateApplication(pid: pid_t) -> *mut AXUIElement;
    pub fn AXUIElementSetMessagingTimeout(element: &AXUIElement, timeout_secs: f32)
    -> AXErrorCode;
    pub fn AXUIElementCopyAttributeValue(
        element: &AXUIElement,
        attribute: &CFString,
        value: *mut *const CFType,
    ) -> AXErrorCode;
    pub fn AXUIElementSetAttributeValue(
        element: &AXUIElement,
        attribute: &CFString,
        value: *const CFType,
    ) -> AXErrorCode;
    pub fn AXUIElementPerformAction(element: &AXUIElement, action: &CFString) -> AXErrorCode;
    pub fn AXValueGetValue(value: &AXValue, the_type: u32, value_ptr: *mut c_void) -> bool;
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    pub static kCFBooleanTrue: *const CFType;
    pub static kCFBooleanFalse: *const CFType;

    pub fn CFGetTypeID(cf: *const CFType) -> CFTypeID;
    pub fn CFStringGetTypeID() -> CFTypeID;
    pub fn CFBooleanGetTypeID() -> CFTypeID;
    pub fn CFArrayGetTypeID() -> CFTypeID;
    pub fn CFBooleanGetValue(boolean: *const CFType) -> bool;
    pub fn CFArrayGetCount(array: &CFArray) -> CFIndex;
    pub fn CFArrayGetValueAtIndex(array: &CFArray, idx: CFIndex) -> *const c_void;
    pub fn CFDictionaryGetValue(dict: &CFDictionary, key: *const c_void) -> *const c_void;
    pub fn CFNumberGetValue(number: &CFNumber, the_type: CFIndex, value_ptr: *mut c_void) -> bool;
    pub fn CFMachPortCreateRunLoopSource(
        allocator: *const c_void,
        port: &CFMachPort,
        order: CFIndex,
    ) -> *mut CFRunLoopSource;
    pub fn CFMachPortInvalidate(port: &CFMachPort);
    pub fn CFRunLoopRun();
}

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    pub fn CGWindowListCopyWindowInfo(option: u32, relative_to_window: u32) -> *mut CFArray;
    pub fn CGRectMakeWithDictionaryRepresentation(dict: &CFDictionary, rect: *mut CGRect) -> bool;

    pub fn CGEventTapCreate(
        tap: CGEventTapLocation,
        place: CGEventTapPlacement,
        options: CGEventTapOptions,
        events_of_interest: CGEventMask,
        callback: CGEventTapCallBack,
        user_info: *mut c_void,
    ) -> *mut CFMachPort;
    pub fn CGEventTapCreateForPid(
        pid: pid_t,
        place: CGEventTapPlacement,
        options: CGEventTapOptions,
        events_of_interest: CGEventMask,
        callback: CGEventTapCallBack,
        user_info: *mut c_void,
    ) -> *mut CFMachPort;
    pub fn CGEventTapEnable(tap: &CFMachPort, enable: bool);

    pub fn CGEventCreate(source: *const c_void) -> *mut CGEvent;
    pub fn CGEventCreateMouseEvent(
        source: *const c_void,
        mouse_type: CGEventType,
        position: CGPoint,
        button: CGMouseButton,
    ) -> *mut CGEvent;
    pub fn CGEventPost(tap: CGEventTapLocation, event: &CGEvent);
    pub fn CGEventGetLocation(event: &CGEvent) -> CGPoint;
    pub fn CGEventGetFlags(event: &CGEvent) -> CGEventFlags;
    pub fn CGEventGetIntegerValueField(event: &CGEvent, field: CGEventField) -> i64;
    pub fn CGEventSourceFlagsState(state_id: CGEventSourceStateID) -> CGEventFlags;
}

pub type DispatchObject = *mut c_void;

unsafe extern "C" {
    pub static _dispatch_source_type_memorypressure: c_void;

    pub fn dispatch_get_global_queue(identifier: isize, flags: usize) -> DispatchObject;
    pub fn dispatch_source_create(
        source_type: *const c_void,
        handle: usize,
        mask: usize,
        queue: DispatchObject,
    ) -> DispatchObject;
    pub fn dispatch_set_context(object: DispatchObject, context: *mut c_void);
    pub fn dispatch_source_set_event_handler_f(
        source: DispatchObject,
        handler: unsafe extern "C" fn(*mut c_void),
    );
    pub fn dispatch_resume(object: DispatchObject);
    pub fn dispatch_source_cancel(source: DispatchObject);
    pub fn dispatch_release(object: DispatchObject);
}

unsafe extern "C" {
    pub static _dispatch_main_q: c_void;

    pub fn dispatch_async_f(
        queue: *const c_void,
        context: *mut c_void,
        work: unsafe extern "C" fn(*mut c_void),
    );
    pub fn dispatch_source_set_cancel_handler_f(
        source: DispatchObject,
        handler: unsafe extern "C" fn(*mut c_void),
    );
}
