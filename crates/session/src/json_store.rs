//! Record store persisted as a JSON snapshot file.
//!
//! Reads are served from memory. A write is applied to a staged copy of the
//! tables, the copy is written out (temp file, then rename over the
//! original), and only then does it replace the tables in memory. A failed
//! write leaves both the file and memory as they were.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use vigil_common::error::{VigilError, VigilResult};
use vigil_exam_model::{
    ExamDescriptor, Question, Score, SessionId, Student, StudentId, TestId, TestSessionRow,
    TestSubmissionRow,
};

use crate::memory::InMemoryRecordStore;
use crate::store::{RecordStore, StoreSnapshot};

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: InMemoryRecordStore,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Load an existing snapshot.
    pub async fn open(path: impl Into<PathBuf>) -> VigilResult<Self> {
        let path = path.into();
        let data = tokio::fs::read(&path).await.map_err(|e| {
            VigilError::config(format!("cannot read store {}: {e}", path.display()))
        })?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&data)?;
        tracing::debug!(
            path = %path.display(),
            exams = snapshot.exams.len(),
            students = snapshot.students.len(),
            "Record store loaded"
        );
        Ok(Self {
            path,
            inner: InMemoryRecordStore::from_snapshot(snapshot),
            write_lock: Mutex::new(()),
        })
    }

    /// Write `snapshot` to `path` and open it.
    pub async fn create(path: impl Into<PathBuf>, snapshot: StoreSnapshot) -> VigilResult<Self> {
        let path = path.into();
        write_snapshot(&path, &snapshot).await?;
        Ok(Self {
            path,
            inner: InMemoryRecordStore::from_snapshot(snapshot),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.inner.snapshot().await
    }

    /// Copy of the current tables to apply one write to.
    async fn stage(&self) -> InMemoryRecordStore {
        InMemoryRecordStore::from_snapshot(self.inner.snapshot().await)
    }

    /// Persist the staged tables, then make them current.
    async fn commit(&self, staged: InMemoryRecordStore) -> VigilResult<()> {
        let snapshot = staged.snapshot().await;
        write_snapshot(&self.path, &snapshot)
            .await
            .map_err(|e| VigilError::record_store(format!("persist failed: {e}")))?;
        self.inner.replace(snapshot).await;
        Ok(())
    }
}

async fn write_snapshot(path: &Path, snapshot: &StoreSnapshot) -> VigilResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait::async_trait]
impl RecordStore for JsonFileStore {
    async fn exam(&self, test_id: TestId) -> VigilResult<Option<ExamDescriptor>> {
        self.inner.exam(test_id).await
    }

    async fn questions(&self, test_id: TestId) -> VigilResult<Vec<Question>> {
        self.inner.questions(test_id).await
    }

    async fn student_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> VigilResult<Option<Student>> {
        self.inner.student_by_credentials(email, password).await
    }

    async fn students(&self) -> VigilResult<Vec<Student>> {
        self.inner.students().await
    }

    async fn session(&self, session_id: SessionId) -> VigilResult<Option<TestSessionRow>> {
        self.inner.session(session_id).await
    }

    async fn open_session(
        &self,
        student_id: StudentId,
        test_id: TestId,
    ) -> VigilResult<Option<TestSessionRow>> {
        self.inner.open_session(student_id, test_id).await
    }

    async fn submissions(&self, session_id: SessionId) -> VigilResult<Vec<TestSubmissionRow>> {
        self.inner.submissions(session_id).await
    }

    async fn create_session(&self, row: TestSessionRow) -> VigilResult<()> {
        let _guard = self.write_lock.lock().await;
        let staged = self.stage().await;
        staged.create_session(row).await?;
        self.commit(staged).await
    }

    async fn insert_submissions(&self, rows: &[TestSubmissionRow]) -> VigilResult<()> {
        let _guard = self.write_lock.lock().await;
        let staged = self.stage().await;
        staged.insert_submissions(rows).await?;
        self.commit(staged).await
    }

    async fn complete_session(
        &self,
        session_id: SessionId,
        student_id: StudentId,
        completed_at: DateTime<Utc>,
        score: Score,
    ) -> VigilResult<bool> {
        let _guard = self.write_lock.lock().await;
        let staged = self.stage().await;
        let updated = staged
            .complete_session(session_id, student_id, completed_at, score)
            .await?;
        if updated {
            self.commit(staged).await?;
        }
        Ok(updated)
    }

    async fn mark_test_taken(&self, student_id: StudentId) -> VigilResult<()> {
        let _guard = self.write_lock.lock().await;
        let staged = self.stage().await;
        staged.mark_test_taken(student_id).await?;
        self.commit(staged).await
    }
}
