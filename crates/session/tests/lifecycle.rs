mod common;

use std::time::Duration;

use common::{settle, world};
use vigil_common::error::VigilError;
use vigil_exam_model::{OptionId, Phase, SetupStep, SubmissionRecord, WarningSource};
use vigil_platform::synthetic::DeviceBehavior;
use vigil_platform::{DisplayHost, FullscreenError};
use vigil_session::{RecordStore, SessionEvent, SessionOutcome, WriteOp};

#[tokio::test(start_paused = true)]
async fn test_timer_expiry_with_no_answers_completes() {
    let mut w = world(60);
    let (mut session, _peer) = w.active().await;
    assert_eq!(session.phase(), Phase::Active);
    assert!(w.display.is_fullscreen());

    w.clock.advance(Duration::from_secs(60));
    let outcome = session.run().await.unwrap();

    let receipt = match outcome {
        SessionOutcome::Completed(receipt) => receipt,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(receipt.answered, 0);
    assert_eq!(receipt.score.correct, 0);
    assert_eq!(receipt.score.total, 4);
    assert_eq!(session.phase(), Phase::Completed);
    assert_eq!(session.state().remaining_seconds(), 0);

    let row = w
        .store
        .session(session.session_id())
        .await
        .unwrap()
        .unwrap();
    let rows = w.store.submissions(row.id).await.unwrap();
    let record = SubmissionRecord::from_rows(&row, &rows).unwrap();
    assert!(record.answers.is_empty());
    assert_eq!(row.total_questions, Some(4));
    assert!(w.student_row().await.has_taken_test);

    assert!(!w.display.is_fullscreen());
    assert_eq!(w.devices.live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_manual_submit_round_trips_answers() {
    let mut w = world(3600);
    let (mut session, _peer) = w.active().await;
    let q = w.questions.clone();

    session.answer(q[0].id, OptionId::A).unwrap();
    session.answer(q[1].id, OptionId::A).unwrap();
    session.answer(q[1].id, OptionId::C).unwrap();
    session.answer(q[3].id, OptionId::D).unwrap();
    let submitted = session.answers().clone();

    session.submit().await.unwrap();
    let receipt = session.receipt().unwrap().clone();
    assert_eq!(receipt.answered, 3);
    assert_eq!(receipt.score.correct, 2);

    let row = w.store.session(session.session_id()).await.unwrap().unwrap();
    assert_eq!(row.total_score, Some(2));
    let rows = w.store.submissions(row.id).await.unwrap();
    let record = SubmissionRecord::from_rows(&row, &rows).unwrap();
    assert_eq!(record.answers, submitted);

    let letters: Vec<String> = rows
        .iter()
        .map(|r| serde_json::to_value(r).unwrap()["selected_answer"].to_string())
        .collect();
    assert!(letters.iter().all(|l| ["\"A\"", "\"C\"", "\"D\""].contains(&l.as_str())));

    assert!(!w.display.is_fullscreen());
    assert_eq!(w.devices.live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_remote_termination_writes_nothing() {
    let mut w = world(3600);
    let (mut session, peer) = w.active().await;
    session.answer(w.questions[0].id, OptionId::A).unwrap();

    w.clock.advance(Duration::from_secs(30));
    peer.send(r#"{"type":"exam_terminated","reason":"Second person in frame","seq":4}"#)
        .await;
    let outcome = session.run().await.unwrap();

    assert_eq!(
        outcome,
        SessionOutcome::Terminated {
            reason: "Second person in frame".to_string()
        }
    );
    assert_eq!(session.state().termination_reason(), Some("Second person in frame"));
    assert!(session.answers().is_empty());
    assert!(!w.display.is_fullscreen());
    assert_eq!(w.devices.live_streams(), 0);

    // The countdown is gone: running past the deadline changes nothing.
    w.clock.advance(Duration::from_secs(7200));
    tokio::time::sleep(Duration::from_secs(5)).await;
    session.process_pending().await.unwrap();
    assert_eq!(session.phase(), Phase::Terminated);

    assert_eq!(w.store.writes(WriteOp::InsertSubmissions), 0);
    assert_eq!(w.store.writes(WriteOp::CompleteSession), 0);
    let row = w.store.session(session.session_id()).await.unwrap().unwrap();
    assert!(row.completed_at.is_none());
    assert!(!w.student_row().await.has_taken_test);
}

#[tokio::test(start_paused = true)]
async fn test_warnings_recorded_in_arrival_order_once() {
    let mut w = world(3600);
    let (mut session, peer) = w.active().await;

    for frame in [
        r#"{"type":"warning","message":"Face not visible","seq":1}"#,
        r#"{"type":"warning","message":"Face not visible","seq":1}"#,
        r#"{"type":"warning","message":"Talking detected","seq":2}"#,
        r#"{"type":"warning","message":"Looking away","seq":3}"#,
        r#"{"type":"warning","message":"Looking away","seq":3}"#,
    ] {
        peer.send(frame).await;
    }
    settle().await;

    w.display.set_refusal(Some(FullscreenError::GestureRequired));
    w.display.simulate_exit();
    settle().await;
    session.process_pending().await.unwrap();

    let proctor: Vec<&str> = session
        .warnings()
        .iter()
        .filter(|w| w.source == WarningSource::Proctor)
        .map(|w| w.message.as_str())
        .collect();
    assert_eq!(proctor, vec!["Face not visible", "Talking detected", "Looking away"]);
    assert_eq!(
        session
            .warnings()
            .iter()
            .filter(|w| w.source == WarningSource::Watchdog)
            .count(),
        1
    );
    assert_eq!(session.phase(), Phase::Active);
}

#[tokio::test(start_paused = true)]
async fn test_setup_failures_are_retryable_and_leave_state_alone() {
    let w = world(3600);
    let mut session = w.prepared().await;

    assert!(matches!(
        session.confirm_environment(),
        Err(VigilError::InvalidTransition { .. })
    ));
    assert!(matches!(
        session.answer(w.questions[0].id, OptionId::A),
        Err(VigilError::InvalidTransition { .. })
    ));

    w.devices.set_behavior(DeviceBehavior::DenyPermission);
    let denied = session.enable_camera().await.unwrap_err();
    assert!(matches!(denied, VigilError::PermissionDenied { .. }));
    w.devices.set_behavior(DeviceBehavior::Unavailable);
    let missing = session.enable_camera().await.unwrap_err();
    assert!(matches!(missing, VigilError::DeviceUnavailable { .. }));
    assert_ne!(denied.user_message(), missing.user_message());
    assert_eq!(session.phase(), Phase::AwaitingPermissions);
    assert_eq!(session.state().setup_step(), SetupStep::Camera);

    w.devices.set_behavior(DeviceBehavior::Grant);
    session.enable_camera().await.unwrap();
    assert_eq!(session.state().setup_step(), SetupStep::Fullscreen);

    w.display.set_refusal(Some(FullscreenError::Refused("kiosk policy".into())));
    assert!(matches!(
        session.enter_fullscreen(),
        Err(VigilError::PermissionDenied { .. })
    ));
    assert_eq!(session.state().setup_step(), SetupStep::Fullscreen);
    w.display.set_refusal(None);
    session.enter_fullscreen().unwrap();

    // The window closed while the student was getting ready.
    w.clock.advance(Duration::from_secs(3 * 3600));
    assert!(matches!(
        session.confirm_environment(),
        Err(VigilError::ExamUnavailable { .. })
    ));
    assert_eq!(session.phase(), Phase::AwaitingPermissions);
}

#[tokio::test(start_paused = true)]
async fn test_failed_channel_open_rolls_back_camera_step() {
    let w = world(3600);
    let mut session = w.prepared().await;
    // Abandoning closes the channel for good, so connecting fails.
    session.abandon();

    for _ in 0..2 {
        let err = session.enable_camera().await.unwrap_err();
        assert!(matches!(err, VigilError::Channel { .. }));
        assert_eq!(w.devices.live_streams(), 0);
        assert_eq!(session.phase(), Phase::AwaitingPermissions);
        assert_eq!(session.state().setup_step(), SetupStep::Camera);
    }
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_duration_does_not_start_exam() {
    let mut w = world(u64::MAX);
    let mut session = w.prepared().await;
    session.enable_camera().await.unwrap();
    session.enter_fullscreen().unwrap();
    let _peer = w.listener.accept().await.unwrap();

    assert!(matches!(
        session.confirm_environment(),
        Err(VigilError::InvalidInput { .. })
    ));
    assert_eq!(session.phase(), Phase::AwaitingPermissions);
    assert_eq!(session.state().setup_step(), SetupStep::Environment);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_write_failure_stays_submitting_until_retried() {
    let mut w = world(3600);
    let (mut session, _peer) = w.active().await;
    session.answer(w.questions[2].id, OptionId::C).unwrap();

    w.store.fail_next_writes(100);
    let err = session.submit().await.unwrap_err();
    assert!(matches!(err, VigilError::RecordStore { .. }));
    assert!(err.user_message().contains("contact support"));
    assert_eq!(session.phase(), Phase::Submitting);
    assert!(session.outcome().is_none());

    // Leaving Active released everything even though the write failed.
    assert!(!w.display.is_fullscreen());
    assert_eq!(w.devices.live_streams(), 0);
    assert!(session.answer(w.questions[0].id, OptionId::A).is_err());

    // Further triggers are no-ops.
    session.submit().await.unwrap();
    session
        .handle_event(SessionEvent::TimerExpired)
        .await
        .unwrap();

    w.store.fail_next_writes(0);
    session.retry_submission().await.unwrap();
    assert_eq!(session.phase(), Phase::Completed);
    assert_eq!(w.store.writes(WriteOp::InsertSubmissions), 1);
    assert_eq!(w.store.writes(WriteOp::CompleteSession), 1);
    assert_eq!(w.store.writes(WriteOp::MarkTestTaken), 1);
    assert!(session.retry_submission().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_racing_triggers_submit_once() {
    let mut w = world(60);
    let (mut session, _peer) = w.active().await;
    let handle = session.handle();

    w.clock.advance(Duration::from_secs(61));
    assert!(handle.submit());
    assert!(handle.send(SessionEvent::TimerExpired));
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(handle.submit());

    session.process_pending().await.unwrap();
    assert_eq!(session.phase(), Phase::Completed);
    assert_eq!(w.store.writes(WriteOp::CompleteSession), 1);
    assert_eq!(w.store.writes(WriteOp::MarkTestTaken), 1);
}

#[tokio::test(start_paused = true)]
async fn test_channel_loss_does_not_end_exam() {
    let mut w = world(60);
    let (mut session, peer) = w.active().await;

    drop(peer);
    tokio::time::sleep(Duration::from_secs(3)).await;
    session.process_pending().await.unwrap();
    assert_eq!(session.phase(), Phase::Active);
    assert!(w.listener.try_accept().is_some());

    w.clock.advance(Duration::from_secs(60));
    assert!(matches!(
        session.run().await.unwrap(),
        SessionOutcome::Completed(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_drop_releases_fullscreen_devices_and_channel() {
    let mut w = world(3600);
    let (session, mut peer) = w.active().await;
    assert!(w.display.is_fullscreen());
    assert_eq!(w.devices.live_streams(), 1);

    drop(session);

    assert!(!w.display.is_fullscreen());
    assert_eq!(w.devices.live_streams(), 0);
    while peer.recv().await.is_some() {}
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_session_can_be_resumed() {
    let mut w = world(3600);
    let (mut session, _peer) = w.active().await;
    let id = session.session_id();
    session.abandon();
    assert!(!w.display.is_fullscreen());
    drop(session);

    let token = w.login().await.unwrap();
    assert_eq!(token.session_id(), id);
}
