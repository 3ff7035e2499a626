use std::ptr::{self, NonNull};

use objc2_core_foundation::CFRetained;
use objc2_core_graphics::{CGEventSourceStateID, CGEventTapLocation, CGEventType, CGMouseButton};

use super::{ffi, to_cg_point, to_point};
use crate::sys::event::{InputState, PointerError};
use crate::sys::geometry::Point;
use crate::sys::hotkey::Modifiers;

/// Pointer and modifier state from the combined session event source.
pub struct SystemInput;

impl InputState for SystemInput {
    fn pointer_location(&self) -> Option<Point> {
        let event = NonNull::new(unsafe { ffi::CGEventCreate(ptr::null()) })?;
        let event = unsafe { CFRetained::from_raw(event) };
        Some(to_point(unsafe { ffi::CGEventGetLocation(&event) }))
    }

    fn warp_pointer(&self, point: Point) -> Result<(), PointerError> {
        let raw = unsafe {
            ffi::CGEventCreateMouseEvent(
                ptr::null(),
                CGEventType::MouseMoved,
                to_cg_point(point),
                CGMouseButton::Left,
            )
        };
        let event = NonNull::new(raw).ok_or(PointerError { point })?;
        let event = unsafe { CFRetained::from_raw(event) };
        unsafe { ffi::CGEventPost(CGEventTapLocation::HIDEventTap, &event) };
        Ok(())
    }

    fn modifiers(&self) -> Modifiers {
        let flags = unsafe { ffi::CGEventSourceFlagsState(CGEventSourceStateID::CombinedSessionState) };
        Modifiers::from_cg_flags(flags.0)
    }
}
