//! Exam session engine.
//!
//! Drives one sitting from setup to a terminal phase:
//!
//! ```text
//! AwaitingPermissions ── camera ─▶ fullscreen ─▶ environment ──▶ Active
//!        │                                                        │
//!        └──────────── terminate ──────────┐        timer / manual submit
//!                                          ▼                      ▼
//!                                     Terminated        Submitting ─▶ Completed
//! ```
//!
//! Every collaborator (timer, watchdog, monitoring channel, the UI) reports
//! to the engine by pushing a [`SessionEvent`] into its inbox. The engine
//! consumes events one at a time and is the only writer of
//! [`SessionState`], so the submission guard is a plain phase check.

use std::sync::Arc;

use tokio::sync::mpsc;
use vigil_capture::MediaCaptureAdapter;
use vigil_common::clock::Clock;
use vigil_common::config::AppConfig;
use vigil_common::error::{VigilError, VigilResult};
use vigil_exam_model::{
    AnswerSheet, ExamDescriptor, IllegalTransition, OptionId, OutboundMessage, Phase, Question,
    QuestionId, SessionId, SessionState, SessionToken, SetupStep, StudentId, SubmissionRecord,
    Warning, WarningSource,
};
use vigil_monitor::{ChannelStatus, MonitoringClient, Subscription, Transport};
use vigil_platform::{DisplayHost, MediaConstraints, MediaDevices};
use vigil_watchdog::{IntegrityWatchdog, Violation};

use crate::auth::verify_session;
use crate::store::RecordStore;
use crate::submission::{SubmissionReceipt, SubmissionWriter};
use crate::timer::CountdownTimer;

const DEFAULT_TERMINATION_REASON: &str = "Terminated by proctor";

/// Everything the engine talks to.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn RecordStore>,
    pub clock: Arc<dyn Clock>,
    pub devices: Arc<dyn MediaDevices>,
    pub display: Arc<dyn DisplayHost>,
    pub transport: Arc<dyn Transport>,
}

/// Input to the engine's inbox.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TimerExpired,
    ManualSubmit,
    ProctorWarning(String),
    Terminated { reason: Option<String> },
    Violation(Violation),
    ChannelStatus(ChannelStatus),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed(SubmissionReceipt),
    Terminated { reason: String },
}

/// Cloneable sender into a session's inbox.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    inbox: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    /// Queue an event. Returns `false` once the session is gone.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.inbox.send(event).is_ok()
    }

    /// Ask for a manual submission.
    pub fn submit(&self) -> bool {
        self.send(SessionEvent::ManualSubmit)
    }
}

pub struct ExamSession {
    token: Option<SessionToken>,
    session_id: SessionId,
    student_id: StudentId,
    exam: ExamDescriptor,
    questions: Vec<Question>,
    deps: SessionDeps,
    config: AppConfig,
    state: SessionState,
    answers: AnswerSheet,
    media: MediaCaptureAdapter,
    channel: MonitoringClient,
    watchdog: Option<IntegrityWatchdog>,
    timer: CountdownTimer,
    subscriptions: Vec<Subscription>,
    inbox_tx: mpsc::UnboundedSender<SessionEvent>,
    inbox: mpsc::UnboundedReceiver<SessionEvent>,
    writer: Option<SubmissionWriter>,
    receipt: Option<SubmissionReceipt>,
}

fn illegal(e: IllegalTransition) -> VigilError {
    VigilError::invalid_transition(e.to_string())
}

impl ExamSession {
    /// Verify `token` and load the exam.
    ///
    /// Fails with [`VigilError::SessionExpired`] for a stale token and
    /// [`VigilError::ExamUnavailable`] outside the availability window.
    pub async fn prepare(
        token: SessionToken,
        deps: SessionDeps,
        config: AppConfig,
    ) -> VigilResult<Self> {
        verify_session(deps.store.as_ref(), &token).await?;

        let exam = deps
            .store
            .exam(token.test_id())
            .await?
            .ok_or_else(|| VigilError::exam_unavailable("test no longer exists"))?;
        exam.check_available(deps.clock.now())
            .map_err(|reason| VigilError::exam_unavailable(reason.to_string()))?;
        let questions = deps.store.questions(exam.test_id).await?;

        tracing::info!(
            session_id = %token.session_id(),
            test = %exam.title,
            questions = questions.len(),
            duration_seconds = exam.duration_seconds,
            "Exam session prepared"
        );

        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        Ok(Self {
            session_id: token.session_id(),
            student_id: token.student_id(),
            token: Some(token),
            state: SessionState::new(exam.duration_seconds),
            media: MediaCaptureAdapter::new(Arc::clone(&deps.devices)),
            channel: MonitoringClient::new(
                config.monitoring.clone(),
                Arc::clone(&deps.transport),
            ),
            timer: CountdownTimer::new(Arc::clone(&deps.clock), config.timer.clone()),
            watchdog: None,
            exam,
            questions,
            deps,
            config,
            answers: AnswerSheet::new(),
            subscriptions: Vec::new(),
            inbox_tx,
            inbox,
            writer: None,
            receipt: None,
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn exam(&self) -> &ExamDescriptor {
        &self.exam
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn warnings(&self) -> &[Warning] {
        self.state.warnings()
    }

    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    /// Seconds left, live while the countdown runs.
    pub fn remaining_seconds(&self) -> u64 {
        if self.timer.is_running() {
            self.timer.remaining_seconds()
        } else {
            self.state.remaining_seconds()
        }
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            inbox: self.inbox_tx.clone(),
        }
    }

    fn require_step(&self, step: SetupStep) -> VigilResult<()> {
        if self.state.phase() != Phase::AwaitingPermissions || self.state.setup_step() != step {
            return Err(VigilError::invalid_transition(format!(
                "'{}' is not the current setup step (phase {:?}, step {:?})",
                step.title(),
                self.state.phase(),
                self.state.setup_step()
            )));
        }
        Ok(())
    }

    /// Setup step 1: acquire camera and microphone, start recording, and open
    /// the monitoring channel.
    pub async fn enable_camera(&mut self) -> VigilResult<()> {
        self.require_step(SetupStep::Camera)?;

        let constraints = MediaConstraints::from_config(&self.config.media);
        let stream = self.media.acquire(&constraints).await?;

        let sender = self.channel.chunk_sender();
        if let Err(e) = self
            .media
            .start_recording(self.config.monitoring.chunk_interval(), move |chunk| {
                sender.send(&chunk);
            })
        {
            self.media.release();
            return Err(e);
        }

        let inbox = self.inbox_tx.clone();
        let mut subscriptions = vec![self.channel.on_warning(move |w| {
            let _ = inbox.send(SessionEvent::ProctorWarning(w.message.clone()));
        })];
        let inbox = self.inbox_tx.clone();
        subscriptions.push(self.channel.on_terminate(move |t| {
            let _ = inbox.send(SessionEvent::Terminated {
                reason: t.reason.clone(),
            });
        }));
        let inbox = self.inbox_tx.clone();
        subscriptions.push(self.channel.on_status(move |s| {
            let _ = inbox.send(SessionEvent::ChannelStatus(*s));
        }));
        let hello = OutboundMessage::Hello {
            session_id: self.session_id,
            student_id: self.student_id,
            test_id: self.exam.test_id,
        };
        // Undo the step so it can be retried from scratch.
        if let Err(e) = self.channel.connect(hello) {
            self.media.release();
            return Err(e);
        }
        self.subscriptions.extend(subscriptions);

        self.state.advance_setup();
        tracing::info!(session_id = %self.session_id, stream = %stream.id, "Camera enabled");
        Ok(())
    }

    /// Setup step 2: enter fullscreen and start the integrity watchdog.
    pub fn enter_fullscreen(&mut self) -> VigilResult<()> {
        self.require_step(SetupStep::Fullscreen)?;

        let inbox = self.inbox_tx.clone();
        let watchdog = IntegrityWatchdog::start(Arc::clone(&self.deps.display), move |v| {
            let _ = inbox.send(SessionEvent::Violation(v));
        })?;
        self.watchdog = Some(watchdog);

        self.state.advance_setup();
        tracing::info!(session_id = %self.session_id, "Fullscreen enabled");
        Ok(())
    }

    /// Setup step 3: the student confirmed their environment. Starts the exam.
    pub fn confirm_environment(&mut self) -> VigilResult<()> {
        self.require_step(SetupStep::Environment)?;
        self.exam
            .check_available(self.deps.clock.now())
            .map_err(|reason| VigilError::exam_unavailable(reason.to_string()))?;

        let inbox = self.inbox_tx.clone();
        self.timer.start(self.exam.duration_seconds, move || {
            let _ = inbox.send(SessionEvent::TimerExpired);
        })?;
        if let Err(e) = self.state.transition(Phase::Active) {
            self.timer.cancel();
            return Err(illegal(e));
        }

        tracing::info!(
            session_id = %self.session_id,
            duration_seconds = self.exam.duration_seconds,
            "Exam started"
        );
        Ok(())
    }

    /// Record an answer. Changing an answer overwrites it.
    pub fn answer(&mut self, question_id: QuestionId, option: OptionId) -> VigilResult<()> {
        if self.state.phase() != Phase::Active {
            return Err(VigilError::invalid_transition(format!(
                "answers are only accepted while active (phase {:?})",
                self.state.phase()
            )));
        }
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(VigilError::invalid_input(format!(
                "question {question_id} is not part of this exam"
            )));
        }
        self.answers.insert(question_id, option);
        Ok(())
    }

    /// Manual submit from the student.
    pub async fn submit(&mut self) -> VigilResult<()> {
        self.handle_event(SessionEvent::ManualSubmit).await
    }

    /// Apply one event.
    pub async fn handle_event(&mut self, event: SessionEvent) -> VigilResult<()> {
        match event {
            SessionEvent::TimerExpired => self.submit_once("timer").await,
            SessionEvent::ManualSubmit => self.submit_once("manual").await,
            SessionEvent::ProctorWarning(message) => {
                self.record_warning(message, WarningSource::Proctor);
                Ok(())
            }
            SessionEvent::Violation(violation) => {
                self.record_warning(violation.message(), WarningSource::Watchdog);
                Ok(())
            }
            SessionEvent::Terminated { reason } => {
                self.terminate(reason.unwrap_or_else(|| DEFAULT_TERMINATION_REASON.to_string()));
                Ok(())
            }
            SessionEvent::ChannelStatus(status) => {
                match status {
                    ChannelStatus::Failed => tracing::warn!(
                        session_id = %self.session_id,
                        "Monitoring unavailable; exam continues on local state"
                    ),
                    other => tracing::debug!(session_id = %self.session_id, status = ?other, "Monitoring status"),
                }
                Ok(())
            }
        }
    }

    /// Apply the next queued event, waiting for one if necessary.
    pub async fn process_next(&mut self) -> VigilResult<()> {
        match self.inbox.recv().await {
            Some(event) => self.handle_event(event).await,
            None => Err(VigilError::channel("session inbox closed")),
        }
    }

    /// Apply every event queued right now.
    pub async fn process_pending(&mut self) -> VigilResult<()> {
        while let Ok(event) = self.inbox.try_recv() {
            self.handle_event(event).await?;
        }
        Ok(())
    }

    /// Process events until the session ends.
    ///
    /// A failed submission write is returned as an error with the phase left
    /// at `Submitting`; call [`ExamSession::retry_submission`] to try again.
    pub async fn run(&mut self) -> VigilResult<SessionOutcome> {
        loop {
            if let Some(outcome) = self.outcome() {
                return Ok(outcome);
            }
            if self.state.phase() == Phase::Submitting {
                return Err(VigilError::invalid_transition(
                    "submission pending; retry the submission",
                ));
            }
            self.process_next().await?;
        }
    }

    /// Final result, once the session reached a terminal phase.
    pub fn outcome(&self) -> Option<SessionOutcome> {
        match self.state.phase() {
            Phase::Completed => self.receipt.clone().map(SessionOutcome::Completed),
            Phase::Terminated => Some(SessionOutcome::Terminated {
                reason: self
                    .state
                    .termination_reason()
                    .unwrap_or(DEFAULT_TERMINATION_REASON)
                    .to_string(),
            }),
            Phase::AwaitingPermissions | Phase::Active | Phase::Submitting => None,
        }
    }

    /// Retry a submission whose write failed. Only steps that did not land
    /// are written.
    pub async fn retry_submission(&mut self) -> VigilResult<()> {
        if self.state.phase() != Phase::Submitting || self.writer.is_none() {
            return Err(VigilError::invalid_transition("no submission to retry"));
        }
        self.write_submission().await
    }

    /// Leave the session without submitting (navigation away, window
    /// closed). Releases every device and connection; the session row stays
    /// open so the student can log in again.
    pub fn abandon(&mut self) {
        tracing::info!(session_id = %self.session_id, phase = ?self.state.phase(), "Session abandoned");
        self.release_resources();
    }

    fn record_warning(&mut self, message: String, source: WarningSource) {
        match self.state.phase() {
            Phase::AwaitingPermissions | Phase::Active => {
                tracing::warn!(session_id = %self.session_id, ?source, %message, "Integrity warning");
                self.state.push_warning(Warning {
                    timestamp: self.deps.clock.now(),
                    message,
                    source,
                });
            }
            phase => {
                tracing::debug!(?phase, ?source, %message, "Warning after exam end ignored");
            }
        }
    }

    fn terminate(&mut self, reason: String) {
        match self.state.phase() {
            Phase::AwaitingPermissions | Phase::Active => {}
            phase => {
                tracing::info!(?phase, %reason, "Termination after exam end ignored");
                return;
            }
        }

        self.sync_remaining();
        self.release_resources();
        let discarded = self.answers.len();
        self.answers.clear();
        // Checked above: both phases may move to Terminated.
        let _ = self.state.terminate(reason.clone());
        self.token.take();

        tracing::warn!(
            session_id = %self.session_id,
            %reason,
            discarded_answers = discarded,
            "Exam terminated; no submission written"
        );
    }

    async fn submit_once(&mut self, trigger: &'static str) -> VigilResult<()> {
        if self.state.phase() != Phase::Active {
            tracing::debug!(
                trigger,
                phase = ?self.state.phase(),
                "Submission already handled; trigger ignored"
            );
            return Ok(());
        }

        self.sync_remaining();
        self.state.transition(Phase::Submitting).map_err(illegal)?;
        tracing::info!(session_id = %self.session_id, trigger, answered = self.answers.len(), "Submitting");

        // Devices and fullscreen are released whatever the write outcome.
        self.release_resources();

        let record = SubmissionRecord {
            session_id: self.session_id,
            student_id: self.student_id,
            test_id: self.exam.test_id,
            answers: std::mem::take(&mut self.answers),
            completed_at: self.deps.clock.now(),
        };
        let score = record.score(&self.questions);
        self.writer = Some(SubmissionWriter::new(
            Arc::clone(&self.deps.store),
            self.config.submission.clone(),
            record,
            score,
        ));
        self.write_submission().await
    }

    async fn write_submission(&mut self) -> VigilResult<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(VigilError::invalid_transition("no submission prepared"));
        };
        match writer.run().await {
            Ok(receipt) => {
                self.state.transition(Phase::Completed).map_err(illegal)?;
                self.receipt = Some(receipt);
                self.writer = None;
                if let Some(token) = self.token.take() {
                    token.logout();
                }
                tracing::info!(session_id = %self.session_id, "Exam completed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %e,
                    "Submission failed; session stays in Submitting"
                );
                Err(e)
            }
        }
    }

    fn sync_remaining(&mut self) {
        if self.timer.is_running() || self.timer.has_fired() {
            self.state
                .set_remaining_seconds(self.timer.remaining_seconds());
        }
    }

    fn release_resources(&mut self) {
        self.subscriptions.clear();
        self.timer.cancel();
        if let Some(mut watchdog) = self.watchdog.take() {
            watchdog.dispose();
        }
        self.media.release();
        self.channel.disconnect();
    }
}

impl Drop for ExamSession {
    fn drop(&mut self) {
        self.release_resources();
    }
}
