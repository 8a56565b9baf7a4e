//! vigil session engine
//!
//! The core of a proctored exam:
//! - [`auth`]: credential login and session verification
//! - [`engine::ExamSession`]: the lifecycle state machine that owns the
//!   countdown, the capture adapter, the watchdog and the monitoring channel
//! - [`timer::CountdownTimer`]: wall-clock countdown with a single expiry
//! - [`submission::SubmissionWriter`]: the exactly-once, resumable write
//! - [`store::RecordStore`] and its in-memory / JSON-file implementations

pub mod auth;
pub mod engine;
pub mod json_store;
pub mod memory;
pub mod store;
pub mod submission;
pub mod timer;

pub use auth::{login, verify_session};
pub use engine::*;
pub use json_store::JsonFileStore;
pub use memory::InMemoryRecordStore;
pub use store::*;
pub use submission::*;
pub use timer::CountdownTimer;
