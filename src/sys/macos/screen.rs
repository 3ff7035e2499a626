use std::mem::MaybeUninit;

use objc2_core_graphics::{CGDisplayBounds, CGError, CGGetActiveDisplayList};
use tracing::warn;

use super::to_rect;
use crate::sys::screen::{DisplayInfo, DisplayList, ScreenId, main_display_first};

type CGDirectDisplayID = u32;

const MAX_SCREENS: usize = 64;

/// Active displays from CoreGraphics, in global top-left coordinates.
pub struct CgDisplays;

impl DisplayList for CgDisplays {
    fn displays(&self) -> Vec<DisplayInfo> {
        let mut ids: MaybeUninit<[CGDirectDisplayID; MAX_SCREENS]> = MaybeUninit::uninit();
        let mut count: u32 = 0;
        let ids = unsafe {
            let err = CGGetActiveDisplayList(
                MAX_SCREENS as u32,
                ids.as_mut_ptr() as *mut CGDirectDisplayID,
                &mut count,
            );
            if err != CGError::Success {
                warn!(?err, "could not list displays");
                return Vec::new();
            }
            std::slice::from_raw_parts(ids.as_ptr() as *const u32, count as usize)
        };
        let displays = ids
            .iter()
            .map(|&id| DisplayInfo {
                id: ScreenId::new(id),
                frame: to_rect(CGDisplayBounds(id)),
            })
            .collect();
        main_display_first(displays)
    }
}
