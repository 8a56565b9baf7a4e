//! vigil invitations
//!
//! Admin-side delivery of exam credentials: one templated message per
//! student carrying their one-time password and the test link.

pub mod dispatch;
pub mod mailer;

pub use dispatch::*;
pub use mailer::*;
