//! A live window and application switcher.
//!
//! The compositor's window list is joined with the accessibility layer to
//! produce snapshots, which a transient overlay cycles through while a
//! modifier key is held. Releasing the modifier commits the selection and
//! activates the chosen window off the UI thread.

pub mod actor;
pub mod common;
pub mod engine;
pub mod model;
pub mod sys;
pub mod ui;
