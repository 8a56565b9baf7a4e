mod common;

use std::time::Duration;

use common::{t0, world};
use uuid::Uuid;
use vigil_common::error::VigilError;
use vigil_exam_model::SessionToken;
use vigil_session::{login, verify_session, ExamSession, RecordStore, StoreSnapshot, WriteOp};

#[tokio::test]
async fn test_login_outside_window_creates_nothing() {
    let w = world(60);
    w.clock.advance(Duration::from_secs(3 * 3600));

    assert!(matches!(
        w.login().await,
        Err(VigilError::ExamUnavailable { .. })
    ));
    assert!(w.store.snapshot().await.sessions.is_empty());

    w.clock.set(t0() - chrono::Duration::hours(2));
    assert!(matches!(
        w.login().await,
        Err(VigilError::ExamUnavailable { .. })
    ));
    assert!(w.store.snapshot().await.sessions.is_empty());
}

#[tokio::test]
async fn test_inactive_or_missing_exam_is_unavailable() {
    let w = world(60);
    let mut exam = w.exam.clone();
    exam.is_active = false;
    let store = vigil_session::InMemoryRecordStore::from_snapshot(StoreSnapshot {
        exams: vec![exam],
        students: vec![w.student.clone()],
        ..Default::default()
    });
    let result = login(&store, &w.clock, w.exam.test_id, &w.student.email, &w.student.password).await;
    assert!(matches!(result, Err(VigilError::ExamUnavailable { .. })));

    let result = login(
        w.store.as_ref(),
        &w.clock,
        Uuid::new_v4(),
        &w.student.email,
        &w.student.password,
    )
    .await;
    assert!(matches!(result, Err(VigilError::ExamUnavailable { .. })));
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credential() {
    let w = world(60);
    let result = login(
        w.store.as_ref(),
        &w.clock,
        w.exam.test_id,
        &w.student.email,
        "guess",
    )
    .await;
    assert!(matches!(result, Err(VigilError::InvalidCredential)));
}

#[tokio::test]
async fn test_email_matching_ignores_case_and_whitespace() {
    let w = world(60);
    let token = login(
        w.store.as_ref(),
        &w.clock,
        w.exam.test_id,
        "  LIN@example.com ",
        &w.student.password,
    )
    .await
    .unwrap();
    assert_eq!(token.student_id(), w.student.id);
}

#[tokio::test]
async fn test_second_login_reuses_open_session() {
    let w = world(60);
    let first = w.login().await.unwrap();
    w.clock.advance(Duration::from_secs(30));
    let second = w.login().await.unwrap();

    assert_eq!(first.session_id(), second.session_id());
    assert_eq!(second.started_at(), t0());
    assert_eq!(w.store.snapshot().await.sessions.len(), 1);
    assert_eq!(w.store.writes(WriteOp::CreateSession), 1);
}

#[tokio::test(start_paused = true)]
async fn test_login_after_completion_is_already_completed() {
    let mut w = world(60);
    let (mut session, _peer) = w.active().await;
    session.submit().await.unwrap();
    drop(session);

    assert!(matches!(w.login().await, Err(VigilError::AlreadyCompleted)));
    assert_eq!(w.store.snapshot().await.sessions.len(), 1);
}

#[tokio::test]
async fn test_verify_session_rejects_foreign_and_closed_tokens() {
    let w = world(60);
    let token = w.login().await.unwrap();
    let row = verify_session(w.store.as_ref(), &token).await.unwrap();
    assert_eq!(row.id, token.session_id());

    let foreign = SessionToken::new(token.session_id(), Uuid::new_v4(), token.test_id(), t0());
    assert!(matches!(
        verify_session(w.store.as_ref(), &foreign).await,
        Err(VigilError::SessionExpired { .. })
    ));

    let missing = SessionToken::new(Uuid::new_v4(), token.student_id(), token.test_id(), t0());
    assert!(matches!(
        verify_session(w.store.as_ref(), &missing).await,
        Err(VigilError::SessionExpired { .. })
    ));

    w.store
        .complete_session(
            token.session_id(),
            token.student_id(),
            t0(),
            Default::default(),
        )
        .await
        .unwrap();
    assert!(matches!(
        verify_session(w.store.as_ref(), &token).await,
        Err(VigilError::SessionExpired { .. })
    ));
    assert!(matches!(
        ExamSession::prepare(token, w.deps(), w.config()).await,
        Err(VigilError::SessionExpired { .. })
    ));
}

#[tokio::test]
async fn test_logout_consumes_token() {
    let w = world(60);
    let token = w.login().await.unwrap();
    let id = token.session_id();
    assert_eq!(token.logout(), id);
}
