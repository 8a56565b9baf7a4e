//! Students, issued credentials, and session tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SessionId, StudentId, TestId};

/// A student row in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    /// One-time password issued with the invitation.
    pub password: String,
    pub has_taken_test: bool,
}

/// A one-time credential issued to a student for one exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamCredential {
    pub student_id: StudentId,
    pub test_id: TestId,
    pub issued_password: String,
}

impl Student {
    /// The credential this student logs in with for `test_id`.
    pub fn credential(&self, test_id: TestId) -> ExamCredential {
        ExamCredential {
            student_id: self.id,
            test_id,
            issued_password: self.password.clone(),
        }
    }
}

/// Proof of a successful login, owned by exactly one client session.
///
/// Not `Clone`: the engine receives it by value and it is consumed on
/// submission or [`SessionToken::logout`].
#[derive(Debug, PartialEq, Eq)]
pub struct SessionToken {
    session_id: SessionId,
    student_id: StudentId,
    test_id: TestId,
    started_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn new(
        session_id: SessionId,
        student_id: StudentId,
        test_id: TestId,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            student_id,
            test_id,
            started_at,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    pub fn test_id(&self) -> TestId {
        self.test_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Explicit logout. Consumes the token and returns the id of the
    /// session it belonged to.
    pub fn logout(self) -> SessionId {
        self.session_id
    }
}
