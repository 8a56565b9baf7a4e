//! Login and session verification.

use uuid::Uuid;
use vigil_common::clock::Clock;
use vigil_common::error::{VigilError, VigilResult};
use vigil_exam_model::{SessionToken, TestId, TestSessionRow};

use crate::store::RecordStore;

/// Exchange a student's one-time credential for a [`SessionToken`].
///
/// The exam must exist, be active and be inside its availability window.
/// A student who already took the test is rejected with
/// [`VigilError::AlreadyCompleted`]. If the student already has an open
/// session for this test (a reload, a second tab) that session is reused;
/// no second row is created.
pub async fn login(
    store: &dyn RecordStore,
    clock: &dyn Clock,
    test_id: TestId,
    email: &str,
    password: &str,
) -> VigilResult<SessionToken> {
    let now = clock.now();
    let exam = store
        .exam(test_id)
        .await?
        .ok_or_else(|| VigilError::exam_unavailable(format!("test {test_id} not found")))?;
    exam.check_available(now)
        .map_err(|reason| VigilError::exam_unavailable(reason.to_string()))?;

    let email = email.trim();
    let student = store
        .student_by_credentials(email, password)
        .await?
        .ok_or(VigilError::InvalidCredential)?;
    if student.has_taken_test {
        tracing::info!(student_id = %student.id, %test_id, "Login rejected: test already taken");
        return Err(VigilError::AlreadyCompleted);
    }

    if let Some(existing) = store.open_session(student.id, test_id).await? {
        tracing::info!(
            session_id = %existing.id,
            student_id = %student.id,
            "Resuming open session"
        );
        return Ok(SessionToken::new(
            existing.id,
            existing.student_id,
            existing.test_id,
            existing.started_at,
        ));
    }

    let row = TestSessionRow {
        id: Uuid::new_v4(),
        test_id,
        student_id: student.id,
        started_at: now,
        completed_at: None,
        total_score: None,
        total_questions: None,
    };
    store.create_session(row.clone()).await?;
    tracing::info!(session_id = %row.id, student_id = %student.id, %test_id, "Session created");

    Ok(SessionToken::new(row.id, row.student_id, row.test_id, row.started_at))
}

/// Check that `token` still names an open session of its student and test.
pub async fn verify_session(
    store: &dyn RecordStore,
    token: &SessionToken,
) -> VigilResult<TestSessionRow> {
    let row = store
        .session(token.session_id())
        .await?
        .ok_or_else(|| VigilError::session_expired("session not found"))?;

    if row.student_id != token.student_id() || row.test_id != token.test_id() {
        return Err(VigilError::session_expired(
            "session does not belong to this student and test",
        ));
    }
    if !row.is_open() {
        return Err(VigilError::session_expired("session already completed"));
    }
    Ok(row)
}
