//! Discovery and activation, the two halves of a switch.
//!
//! Both run on the background worker and only ever talk to the platform
//! through [`crate::sys::Platform`].

pub mod activation;
pub mod discovery;

pub use activation::{ActivationEngine, ActivationOutcome};
pub use discovery::Discovery;
