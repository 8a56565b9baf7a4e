//! Take an exam from the terminal.
//!
//! Camera and display run on synthetic backends; the monitoring channel is
//! a real WebSocket connection to the configured endpoint. The exam ends on
//! timer expiry, on Ctrl+C (manual submit), or when the proctor terminates it.

use std::sync::Arc;

use uuid::Uuid;
use vigil_common::clock::{Clock, SystemClock};
use vigil_common::config::AppConfig;
use vigil_common::error::{VigilError, VigilResult};
use vigil_exam_model::{OptionId, Phase, QuestionId};
use vigil_monitor::WsTransport;
use vigil_platform::synthetic::{HeadlessDisplay, SyntheticDevices};
use vigil_session::{login, ExamSession, JsonFileStore, SessionDeps, SessionOutcome};

pub async fn run(
    config: AppConfig,
    test_id: Uuid,
    email: String,
    password: String,
    answers: Vec<String>,
) -> anyhow::Result<()> {
    let answers = answers
        .iter()
        .map(|raw| parse_answer(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let store = Arc::new(JsonFileStore::open(config.store_path.clone()).await?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let token = report(login(store.as_ref(), clock.as_ref(), test_id, &email, &password).await)?;
    tracing::debug!(session_id = %token.session_id(), "Session token issued");
    println!("Logged in as {email}");

    let deps = SessionDeps {
        store,
        clock,
        devices: Arc::new(SyntheticDevices::default()),
        display: Arc::new(HeadlessDisplay::new()),
        transport: Arc::new(WsTransport),
    };
    let mut session = report(ExamSession::prepare(token, deps, config).await)?;

    println!("Exam: {}", session.exam().title);
    println!("  Questions: {}", session.questions().len());
    println!("  Duration:  {}s", session.exam().duration_seconds);
    println!();

    report(session.enable_camera().await)?;
    println!("[OK] Camera and microphone");
    report(session.enter_fullscreen())?;
    println!("[OK] Fullscreen");
    report(session.confirm_environment())?;
    println!("[OK] Environment confirmed, exam started");
    println!();

    for (question_id, option) in answers {
        match session.answer(question_id, option) {
            Ok(()) => println!("  Answered {question_id}: {option}"),
            Err(e) => println!("  [WARN] {question_id}: {e}"),
        }
    }

    println!();
    println!(
        "{} of {} answered, {}s remaining. Press Ctrl+C to submit...",
        session.answers().len(),
        session.questions().len(),
        session.remaining_seconds()
    );

    let handle = session.handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.submit();
        }
    });

    let mut result = session.run().await;
    if result.is_err() && session.phase() == Phase::Submitting {
        println!("[WARN] Submission did not go through, retrying once more...");
        result = match session.retry_submission().await {
            Ok(()) => session
                .outcome()
                .ok_or_else(|| VigilError::invalid_transition("session did not finish")),
            Err(e) => Err(e),
        };
    }
    interrupt.abort();

    let outcome = report(result)?;
    println!();
    for warning in session.warnings() {
        println!("  [WARN] {:?}: {}", warning.source, warning.message);
    }
    match outcome {
        SessionOutcome::Completed(receipt) => {
            println!("Submitted session {}", receipt.session_id);
            println!(
                "  Score: {}/{} ({} answered)",
                receipt.score.correct, receipt.score.total, receipt.answered
            );
        }
        SessionOutcome::Terminated { reason } => {
            println!("Exam terminated: {reason}");
        }
    }

    Ok(())
}

/// Parse `QUESTION_ID=OPTION`.
fn parse_answer(raw: &str) -> anyhow::Result<(QuestionId, OptionId)> {
    let (id, option) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected QUESTION_ID=OPTION, got '{raw}'"))?;
    let id: QuestionId = id
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid question id '{id}': {e}"))?;
    let option: OptionId = option.trim().parse()?;
    Ok((id, option))
}

/// Print the student-facing message before handing the error up.
fn report<T>(result: VigilResult<T>) -> anyhow::Result<T> {
    result.map_err(|e| {
        eprintln!("{}", e.user_message());
        e.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        let id = Uuid::new_v4();
        let (qid, option) = parse_answer(&format!("{id}=C")).unwrap();
        assert_eq!(qid, id);
        assert_eq!(option, OptionId::C);
    }

    #[test]
    fn test_parse_answer_rejects_bad_input() {
        assert!(parse_answer("no-separator").is_err());
        assert!(parse_answer("not-a-uuid=A").is_err());
        assert!(parse_answer(&format!("{}=c", Uuid::new_v4())).is_err());
    }
}
