//! In-memory record store with fault injection.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use vigil_common::error::{VigilError, VigilResult};
use vigil_exam_model::{
    ExamDescriptor, Question, Score, SessionId, Student, StudentId, TestId, TestSessionRow,
    TestSubmissionRow,
};

use crate::store::{RecordStore, StoreSnapshot, WriteOp};

#[derive(Debug, Default)]
struct Faults {
    any_write: u32,
    by_op: HashMap<WriteOp, u32>,
    reads: bool,
    writes_applied: HashMap<WriteOp, u32>,
}

/// Tables held in memory behind an async `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<StoreSnapshot>,
    faults: Mutex<Faults>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            tables: RwLock::new(snapshot),
            faults: Mutex::default(),
        }
    }

    /// Copy of every table.
    pub async fn snapshot(&self) -> StoreSnapshot {
        self.tables.read().await.clone()
    }

    /// Swap every table for `snapshot`.
    pub(crate) async fn replace(&self, snapshot: StoreSnapshot) {
        *self.tables.write().await = snapshot;
    }

    /// Fail the next `n` writes of any kind.
    pub fn fail_next_writes(&self, n: u32) {
        self.faults().any_write = n;
    }

    /// Fail the next `n` writes of kind `op`.
    pub fn fail_next(&self, op: WriteOp, n: u32) {
        self.faults().by_op.insert(op, n);
    }

    /// Make every read fail until switched off.
    pub fn fail_reads(&self, fail: bool) {
        self.faults().reads = fail;
    }

    /// Successful writes of kind `op`.
    pub fn writes(&self, op: WriteOp) -> u32 {
        self.faults().writes_applied.get(&op).copied().unwrap_or(0)
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_read(&self) -> VigilResult<()> {
        if self.faults().reads {
            return Err(VigilError::record_store("injected read failure"));
        }
        Ok(())
    }

    fn check_write(&self, op: WriteOp) -> VigilResult<()> {
        let mut faults = self.faults();
        if let Some(n) = faults.by_op.get_mut(&op).filter(|n| **n > 0) {
            *n -= 1;
            return Err(VigilError::record_store(format!("injected {op:?} failure")));
        }
        if faults.any_write > 0 {
            faults.any_write -= 1;
            return Err(VigilError::record_store(format!("injected {op:?} failure")));
        }
        Ok(())
    }

    fn applied(&self, op: WriteOp) {
        *self.faults().writes_applied.entry(op).or_insert(0) += 1;
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn exam(&self, test_id: TestId) -> VigilResult<Option<ExamDescriptor>> {
        self.check_read()?;
        let tables = self.tables.read().await;
        Ok(tables.exams.iter().find(|e| e.test_id == test_id).cloned())
    }

    async fn questions(&self, test_id: TestId) -> VigilResult<Vec<Question>> {
        self.check_read()?;
        let tables = self.tables.read().await;
        Ok(tables
            .questions
            .iter()
            .filter(|q| q.test_id == test_id)
            .cloned()
            .collect())
    }

    async fn student_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> VigilResult<Option<Student>> {
        self.check_read()?;
        let tables = self.tables.read().await;
        Ok(tables
            .students
            .iter()
            .find(|s| s.email.eq_ignore_ascii_case(email) && s.password == password)
            .cloned())
    }

    async fn students(&self) -> VigilResult<Vec<Student>> {
        self.check_read()?;
        Ok(self.tables.read().await.students.clone())
    }

    async fn session(&self, session_id: SessionId) -> VigilResult<Option<TestSessionRow>> {
        self.check_read()?;
        let tables = self.tables.read().await;
        Ok(tables.sessions.iter().find(|s| s.id == session_id).cloned())
    }

    async fn open_session(
        &self,
        student_id: StudentId,
        test_id: TestId,
    ) -> VigilResult<Option<TestSessionRow>> {
        self.check_read()?;
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .iter()
            .find(|s| s.student_id == student_id && s.test_id == test_id && s.is_open())
            .cloned())
    }

    async fn submissions(&self, session_id: SessionId) -> VigilResult<Vec<TestSubmissionRow>> {
        self.check_read()?;
        let tables = self.tables.read().await;
        Ok(tables
            .submissions
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn create_session(&self, row: TestSessionRow) -> VigilResult<()> {
        self.check_write(WriteOp::CreateSession)?;
        let mut tables = self.tables.write().await;
        if tables.sessions.iter().any(|s| s.id == row.id) {
            return Err(VigilError::record_store(format!(
                "session {} already exists",
                row.id
            )));
        }
        tables.sessions.push(row);
        drop(tables);
        self.applied(WriteOp::CreateSession);
        Ok(())
    }

    async fn insert_submissions(&self, rows: &[TestSubmissionRow]) -> VigilResult<()> {
        self.check_write(WriteOp::InsertSubmissions)?;
        let mut tables = self.tables.write().await;
        for row in rows {
            tables
                .submissions
                .retain(|r| !(r.session_id == row.session_id && r.question_id == row.question_id));
            tables.submissions.push(row.clone());
        }
        drop(tables);
        self.applied(WriteOp::InsertSubmissions);
        Ok(())
    }

    async fn complete_session(
        &self,
        session_id: SessionId,
        student_id: StudentId,
        completed_at: DateTime<Utc>,
        score: Score,
    ) -> VigilResult<bool> {
        self.check_write(WriteOp::CompleteSession)?;
        let mut tables = self.tables.write().await;
        let Some(row) = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.student_id == student_id && s.is_open())
        else {
            return Ok(false);
        };
        row.completed_at = Some(completed_at);
        row.total_score = Some(score.correct);
        row.total_questions = Some(score.total);
        drop(tables);
        self.applied(WriteOp::CompleteSession);
        Ok(true)
    }

    async fn mark_test_taken(&self, student_id: StudentId) -> VigilResult<()> {
        self.check_write(WriteOp::MarkTestTaken)?;
        let mut tables = self.tables.write().await;
        let student = tables
            .students
            .iter_mut()
            .find(|s| s.id == student_id)
            .ok_or_else(|| VigilError::record_store(format!("student {student_id} not found")))?;
        student.has_taken_test = true;
        drop(tables);
        self.applied(WriteOp::MarkTestTaken);
        Ok(())
    }
}
