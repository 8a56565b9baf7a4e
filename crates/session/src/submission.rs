//! Submission writer.
//!
//! A submission is three store writes treated as one logical transaction:
//! answer rows, session completion, and the student's `has_taken_test` flag.
//! Completed steps are remembered, so a retry resumes at the first missing
//! step and never repeats one that already landed.

use std::sync::Arc;

use vigil_common::config::SubmissionConfig;
use vigil_common::error::{VigilError, VigilResult};
use vigil_exam_model::{Score, SessionId, SubmissionRecord};

use crate::store::RecordStore;

/// One write of a submission, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WriteStep {
    Answers,
    SessionCompletion,
    StudentFlag,
}

impl WriteStep {
    pub const ALL: [WriteStep; 3] = [
        WriteStep::Answers,
        WriteStep::SessionCompletion,
        WriteStep::StudentFlag,
    ];
}

/// Proof of a confirmed write.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub session_id: SessionId,
    pub score: Score,
    pub answered: usize,
    /// Attempts used by the run that finished the write.
    pub attempts: u32,
}

pub struct SubmissionWriter {
    store: Arc<dyn RecordStore>,
    config: SubmissionConfig,
    record: SubmissionRecord,
    score: Score,
    landed: Vec<WriteStep>,
}

impl SubmissionWriter {
    pub fn new(
        store: Arc<dyn RecordStore>,
        config: SubmissionConfig,
        record: SubmissionRecord,
        score: Score,
    ) -> Self {
        Self {
            store,
            config,
            record,
            score,
            landed: Vec::new(),
        }
    }

    pub fn record(&self) -> &SubmissionRecord {
        &self.record
    }

    /// Steps confirmed by the store so far.
    pub fn landed(&self) -> &[WriteStep] {
        &self.landed
    }

    pub fn pending(&self) -> Vec<WriteStep> {
        WriteStep::ALL
            .into_iter()
            .filter(|s| !self.landed.contains(s))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.landed.len() == WriteStep::ALL.len()
    }

    /// Run the pending steps with bounded retry.
    ///
    /// Errors that retrying cannot fix are returned as-is. On exhaustion the
    /// error is a [`VigilError::RecordStore`] that names the steps that did
    /// and did not land.
    pub async fn run(&mut self) -> VigilResult<SubmissionReceipt> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.run_pending().await {
                Ok(()) => {
                    tracing::info!(
                        session_id = %self.record.session_id,
                        attempt,
                        score = self.score.correct,
                        total = self.score.total,
                        "Submission written"
                    );
                    return Ok(SubmissionReceipt {
                        session_id: self.record.session_id,
                        score: self.score,
                        answered: self.record.answers.len(),
                        attempts: attempt,
                    });
                }
                Err(e) if !e.is_retryable() => {
                    tracing::error!(
                        session_id = %self.record.session_id,
                        landed = ?self.landed,
                        error = %e,
                        "Submission rejected by the store"
                    );
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %self.record.session_id,
                        attempt,
                        max_attempts,
                        pending = ?self.pending(),
                        error = %e,
                        "Submission write failed"
                    );
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.backoff(attempt)).await;
                    }
                }
            }
        }

        let cause = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown failure".to_string());
        if self.landed.is_empty() {
            tracing::error!(
                session_id = %self.record.session_id,
                error = %cause,
                "Submission not written"
            );
        } else {
            tracing::error!(
                session_id = %self.record.session_id,
                landed = ?self.landed,
                missing = ?self.pending(),
                error = %cause,
                "Submission partially written; records are inconsistent"
            );
        }
        Err(VigilError::record_store(format!(
            "submission for session {} incomplete (landed {:?}, missing {:?}): {cause}",
            self.record.session_id,
            self.landed,
            self.pending()
        )))
    }

    async fn run_pending(&mut self) -> VigilResult<()> {
        for step in self.pending() {
            self.execute(step).await?;
            self.landed.push(step);
            tracing::debug!(session_id = %self.record.session_id, ?step, "Submission step landed");
        }
        Ok(())
    }

    async fn execute(&self, step: WriteStep) -> VigilResult<()> {
        let record = &self.record;
        match step {
            WriteStep::Answers => {
                let rows = record.to_rows();
                if rows.is_empty() {
                    return Ok(());
                }
                self.store.insert_submissions(&rows).await
            }
            WriteStep::SessionCompletion => {
                let closed = self
                    .store
                    .complete_session(
                        record.session_id,
                        record.student_id,
                        record.completed_at,
                        self.score,
                    )
                    .await?;
                if closed {
                    return Ok(());
                }
                // A store may have applied an earlier attempt it reported as failed.
                let row = self.store.session(record.session_id).await?;
                match row {
                    Some(row)
                        if row.student_id == record.student_id
                            && row.completed_at == Some(record.completed_at) =>
                    {
                        tracing::info!(
                            session_id = %record.session_id,
                            "Session completion already recorded"
                        );
                        Ok(())
                    }
                    _ => Err(VigilError::session_expired(format!(
                        "no open session {} for student {}",
                        record.session_id, record.student_id
                    ))),
                }
            }
            WriteStep::StudentFlag => self.store.mark_test_taken(record.student_id).await,
        }
    }
}
