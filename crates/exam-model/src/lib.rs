//! vigil exam model
//!
//! Plain data shared by every other crate: what an exam is, who may take it,
//! the mutable state of one sitting, what gets written when it ends, and the
//! messages exchanged with the remote proctor.

pub mod credential;
pub mod exam;
pub mod protocol;
pub mod session;
pub mod submission;

pub use credential::*;
pub use exam::*;
pub use protocol::*;
pub use session::*;
pub use submission::*;

/// Identifier of a student row.
pub type StudentId = uuid::Uuid;
/// Identifier of a test (exam) row.
pub type TestId = uuid::Uuid;
/// Identifier of a test session row.
pub type SessionId = uuid::Uuid;
/// Identifier of a question row.
pub type QuestionId = uuid::Uuid;
