//! Error types shared across vigil crates.
//!
//! The variants follow the failure taxonomy of an exam session: setup
//! failures the student can retry, session and credential failures that send
//! the student back to login, and terminal outcomes.

/// Top-level error type for vigil operations.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// Camera, microphone or fullscreen refused by the user or host.
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// Capture hardware missing or failing.
    #[error("Device unavailable: {message}")]
    DeviceUnavailable { message: String },

    /// Session token missing, mismatched, or already closed.
    #[error("Session expired: {message}")]
    SessionExpired { message: String },

    /// Network/backend failure talking to the record store.
    #[error("Record store failure: {message}")]
    RecordStore { message: String },

    #[error("Invalid email or password")]
    InvalidCredential,

    #[error("Exam already completed")]
    AlreadyCompleted,

    /// Remote proctor ended the exam.
    #[error("Exam terminated: {reason}")]
    IntegrityTermination { reason: String },

    /// Exam inactive or `now` outside its availability window.
    #[error("Exam unavailable: {message}")]
    ExamUnavailable { message: String },

    /// Operation not allowed in the current session phase.
    #[error("Invalid transition: {message}")]
    InvalidTransition { message: String },

    #[error("Monitoring channel error: {message}")]
    Channel { message: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using VigilError.
pub type VigilResult<T> = Result<T, VigilError>;

impl VigilError {
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: msg.into(),
        }
    }

    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: msg.into(),
        }
    }

    pub fn session_expired(msg: impl Into<String>) -> Self {
        Self::SessionExpired {
            message: msg.into(),
        }
    }

    pub fn record_store(msg: impl Into<String>) -> Self {
        Self::RecordStore {
            message: msg.into(),
        }
    }

    pub fn terminated(reason: impl Into<String>) -> Self {
        Self::IntegrityTermination {
            reason: reason.into(),
        }
    }

    pub fn exam_unavailable(msg: impl Into<String>) -> Self {
        Self::ExamUnavailable {
            message: msg.into(),
        }
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition {
            message: msg.into(),
        }
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Whether the student can reasonably retry the failed step.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. }
                | Self::DeviceUnavailable { .. }
                | Self::RecordStore { .. }
                | Self::Channel { .. }
                | Self::InvalidCredential
        )
    }

    /// Short actionable text for the student. Never includes internal payloads.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied { .. } => "Grant camera and fullscreen access, then retry.",
            Self::DeviceUnavailable { .. } => {
                "Your camera or microphone is not responding. Reconnect it and retry."
            }
            Self::SessionExpired { .. } => "Your session has expired. Please log in again.",
            Self::RecordStore { .. } => {
                "We could not reach the exam server. If this persists, contact support."
            }
            Self::InvalidCredential => "Invalid email or password.",
            Self::AlreadyCompleted => "You have already taken this test.",
            Self::IntegrityTermination { .. } => {
                "Your exam has been terminated by the administrator."
            }
            Self::ExamUnavailable { .. } => "This test is not available right now.",
            Self::InvalidTransition { .. } => "That action is not available at this point.",
            Self::Channel { .. } => "Proctoring connection interrupted. Your exam continues.",
            Self::InvalidInput { .. } => "Please check your input and try again.",
            Self::Capture { .. }
            | Self::Config { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => "Something went wrong. Please contact support.",
        }
    }
}
