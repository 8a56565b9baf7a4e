//! Mutable state of one exam sitting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of an exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Setup in progress: camera, fullscreen, environment check.
    AwaitingPermissions,
    /// Exam running under the countdown.
    Active,
    /// Submission write in flight (or failed and awaiting retry).
    Submitting,
    /// Submission confirmed by the record store.
    Completed,
    /// Forcibly ended; nothing was written.
    Terminated,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Terminated)
    }

    /// Whether the transition `self -> to` is part of the lifecycle.
    pub fn can_transition_to(&self, to: Phase) -> bool {
        matches!(
            (self, to),
            (Phase::AwaitingPermissions, Phase::Active)
                | (Phase::AwaitingPermissions, Phase::Terminated)
                | (Phase::Active, Phase::Submitting)
                | (Phase::Active, Phase::Terminated)
                | (Phase::Submitting, Phase::Completed)
        )
    }
}

/// Sub-steps of the setup phase, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStep {
    Camera,
    Fullscreen,
    Environment,
}

impl SetupStep {
    pub fn next(&self) -> Option<SetupStep> {
        match self {
            SetupStep::Camera => Some(SetupStep::Fullscreen),
            SetupStep::Fullscreen => Some(SetupStep::Environment),
            SetupStep::Environment => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SetupStep::Camera => "Camera Setup",
            SetupStep::Fullscreen => "Fullscreen Mode",
            SetupStep::Environment => "Environment Check",
        }
    }
}

/// Where a warning came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSource {
    /// Relayed from the remote proctor.
    Proctor,
    /// Raised locally by the integrity watchdog.
    Watchdog,
}

/// A non-fatal integrity signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub source: WarningSource,
}

/// Rejected phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Illegal transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: Phase,
    pub to: Phase,
}

/// The session's mutable core. Owned and mutated by the session engine only;
/// everyone else sees snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    phase: Phase,
    setup_step: SetupStep,
    remaining_seconds: u64,
    warnings: Vec<Warning>,
    termination_reason: Option<String>,
}

impl SessionState {
    /// Fresh state at the start of setup.
    pub fn new(duration_seconds: u64) -> Self {
        Self {
            phase: Phase::AwaitingPermissions,
            setup_step: SetupStep::Camera,
            remaining_seconds: duration_seconds,
            warnings: Vec::new(),
            termination_reason: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn setup_step(&self) -> SetupStep {
        self.setup_step
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    /// Warnings in arrival order.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn termination_reason(&self) -> Option<&str> {
        self.termination_reason.as_deref()
    }

    /// Move to `to`, rejecting anything outside the lifecycle.
    pub fn transition(&mut self, to: Phase) -> Result<(), IllegalTransition> {
        if !self.phase.can_transition_to(to) {
            return Err(IllegalTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    /// Advance to the next setup step. No-op once the last step is reached.
    pub fn advance_setup(&mut self) {
        if let Some(next) = self.setup_step.next() {
            self.setup_step = next;
        }
    }

    pub fn set_remaining_seconds(&mut self, seconds: u64) {
        self.remaining_seconds = seconds;
    }

    pub fn push_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Terminate with an audit reason.
    pub fn terminate(&mut self, reason: impl Into<String>) -> Result<(), IllegalTransition> {
        self.transition(Phase::Terminated)?;
        self.termination_reason = Some(reason.into());
        Ok(())
    }
}
