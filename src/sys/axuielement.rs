//! The accessibility-automation layer.
//!
//! Handles expose no window server id, which is why discovery joins them to
//! the compositor list by position.

use std::fmt::Debug;
use std::sync::Arc;

use super::app::pid_t;
use super::geometry::Rect;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AxError {
    #[error("accessibility access has not been granted")]
    NotTrusted,
    #[error("the element is no longer valid")]
    InvalidHandle,
    #[error("attribute or action {0} is not supported by the element")]
    Unsupported(&'static str),
    #[error("the application did not respond")]
    CannotComplete,
    #[error("accessibility call failed with code {0}")]
    Platform(i32),
}

pub type Result<T> = std::result::Result<T, AxError>;

/// A window element of some application.
pub trait AxWindow: Send + Sync + Debug {
    fn title(&self) -> Result<String>;

    fn frame(&self) -> Result<Rect>;

    fn raise(&self) -> Result<()>;

    fn set_main(&self, main: bool) -> Result<()>;

    fn set_focused(&self, focused: bool) -> Result<()>;

    fn is_main(&self) -> Result<bool>;

    fn is_focused(&self) -> Result<bool>;
}

pub type AxWindowRef = Arc<dyn AxWindow>;

pub trait Accessibility: Send + Sync {
    fn is_trusted(&self) -> bool;

    /// Checks trust and asks the system to show its permission prompt if
    /// access has not been granted yet.
    fn request_trust(&self) -> bool;

    /// The window elements of `pid`, in the application's own order.
    fn windows(&self, pid: pid_t) -> Result<Vec<AxWindowRef>>;
}
