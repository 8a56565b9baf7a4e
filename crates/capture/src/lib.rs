//! vigil media capture
//!
//! Acquires the camera/microphone through a [`vigil_platform::MediaDevices`]
//! host and records the resulting stream as a sequence of periodic chunks.
//!
//! ```text
//! MediaDevices ──open──▶ DeviceStream ──drain every interval──▶ on_chunk(MediaChunk)
//!                              ▲
//!                  MediaCaptureAdapter (one stream, one recording)
//! ```

pub mod adapter;
pub mod recorder;

pub use adapter::*;
pub use recorder::*;
