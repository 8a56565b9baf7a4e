//! Record store contract.
//!
//! The store is an external collaborator. The engine needs a handful of
//! reads at login and setup and four writes at submission; everything else
//! (admin CRUD, bulk upload) lives elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_common::error::VigilResult;
use vigil_exam_model::{
    ExamDescriptor, Question, Score, SessionId, Student, StudentId, TestId, TestSessionRow,
    TestSubmissionRow,
};

/// Write operations, used to target fault injection and count writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WriteOp {
    CreateSession,
    InsertSubmissions,
    CompleteSession,
    MarkTestTaken,
}

/// All tables of a store, as persisted by [`crate::json_store::JsonFileStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    pub exams: Vec<ExamDescriptor>,
    pub questions: Vec<Question>,
    pub students: Vec<Student>,
    pub sessions: Vec<TestSessionRow>,
    pub submissions: Vec<TestSubmissionRow>,
}

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn exam(&self, test_id: TestId) -> VigilResult<Option<ExamDescriptor>>;

    /// Questions of an exam in display order.
    async fn questions(&self, test_id: TestId) -> VigilResult<Vec<Question>>;

    /// Student whose email (case-insensitive) and password both match.
    async fn student_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> VigilResult<Option<Student>>;

    async fn students(&self) -> VigilResult<Vec<Student>>;

    async fn session(&self, session_id: SessionId) -> VigilResult<Option<TestSessionRow>>;

    /// The session of `student_id` on `test_id` that has not completed yet.
    async fn open_session(
        &self,
        student_id: StudentId,
        test_id: TestId,
    ) -> VigilResult<Option<TestSessionRow>>;

    async fn submissions(&self, session_id: SessionId) -> VigilResult<Vec<TestSubmissionRow>>;

    async fn create_session(&self, row: TestSessionRow) -> VigilResult<()>;

    /// Insert answer rows. A row for an already stored
    /// (session, question) pair replaces it.
    async fn insert_submissions(&self, rows: &[TestSubmissionRow]) -> VigilResult<()>;

    /// Close the open session matching both `session_id` and `student_id`.
    ///
    /// Returns `false` when no such open session exists.
    async fn complete_session(
        &self,
        session_id: SessionId,
        student_id: StudentId,
        completed_at: DateTime<Utc>,
        score: Score,
    ) -> VigilResult<bool>;

    async fn mark_test_taken(&self, student_id: StudentId) -> VigilResult<()>;
}
