//! vigil common utilities
//!
//! Shared infrastructure for all vigil crates:
//! - Error taxonomy and result alias
//! - Injectable clocks and tick drift measurement
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
