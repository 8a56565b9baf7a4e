//! vigil platform contracts.
//!
//! The engine never talks to a browser, a window system, or capture hardware
//! directly. It goes through the traits in this crate:
//! - [`display::DisplayHost`]: fullscreen and visibility primitives
//! - [`media::MediaDevices`]: camera/microphone acquisition
//!
//! [`synthetic`] provides deterministic in-process hosts used by tests and
//! the CLI; [`capabilities`] inspects the real machine for the `check` report.

pub mod capabilities;
pub mod display;
pub mod media;
pub mod synthetic;

pub use display::*;
pub use media::*;
