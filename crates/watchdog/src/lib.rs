//! vigil integrity watchdog
//!
//! Holds the exam surface in fullscreen for as long as the watchdog lives.
//! When the student leaves fullscreen the watchdog immediately asks for it
//! back; if the host refuses, or the surface is hidden, a [`Violation`] is
//! reported. The watchdog never ends an exam itself.
//!
//! The fullscreen hold is scoped: [`IntegrityWatchdog::dispose`] (or drop)
//! stops listening and leaves fullscreen if it is still held.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use vigil_common::error::{VigilError, VigilResult};
use vigil_platform::{DisplayHost, DisplaySignal, FullscreenError};

/// A locally detected integrity problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Fullscreen was left and could not be restored.
    FullscreenLost { detail: String },
    /// The exam surface was hidden.
    SurfaceHidden,
}

impl Violation {
    /// Warning text recorded on the session.
    pub fn message(&self) -> String {
        match self {
            Violation::FullscreenLost { detail } => {
                format!("Fullscreen mode was exited and could not be restored ({detail})")
            }
            Violation::SurfaceHidden => "Exam window was hidden or switched away from".to_string(),
        }
    }
}

/// Receives violations. Called from the watchdog task.
pub type ViolationCallback = Arc<dyn Fn(Violation) + Send + Sync>;

/// Fullscreen enforcement for one exam session.
pub struct IntegrityWatchdog {
    host: Arc<dyn DisplayHost>,
    listener: Option<JoinHandle<()>>,
}

impl IntegrityWatchdog {
    /// Enter fullscreen and start watching.
    ///
    /// Fails with [`VigilError::PermissionDenied`] when the initial request
    /// is refused; nothing is left running in that case.
    pub fn start<F>(host: Arc<dyn DisplayHost>, on_violation: F) -> VigilResult<Self>
    where
        F: Fn(Violation) + Send + Sync + 'static,
    {
        // Subscribe first so an exit right after entering is not missed.
        let signals = host.signals();

        if !host.is_fullscreen() {
            host.request_fullscreen().map_err(|e| {
                tracing::warn!(error = %e, "Fullscreen request refused");
                VigilError::permission_denied(e.to_string())
            })?;
        }
        tracing::info!("Fullscreen hold acquired");

        let on_violation: ViolationCallback = Arc::new(on_violation);
        let listener = tokio::spawn(watch(Arc::clone(&host), signals, on_violation));

        Ok(Self {
            host,
            listener: Some(listener),
        })
    }

    pub fn is_active(&self) -> bool {
        self.listener.is_some()
    }

    /// Stop listening and leave fullscreen if still held. Idempotent.
    pub fn dispose(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        // Abort before exiting so our own exit is not treated as a violation.
        listener.abort();
        if self.host.is_fullscreen() {
            self.host.exit_fullscreen();
        }
        tracing::info!("Fullscreen hold released");
    }
}

impl Drop for IntegrityWatchdog {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn watch(
    host: Arc<dyn DisplayHost>,
    mut signals: tokio::sync::broadcast::Receiver<DisplaySignal>,
    on_violation: ViolationCallback,
) {
    loop {
        let signal = match signals.recv().await {
            Ok(signal) => signal,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Display signals lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match signal {
            DisplaySignal::FullscreenExited => match host.request_fullscreen() {
                Ok(()) => tracing::info!("Fullscreen exited; restored"),
                Err(e) => {
                    let detail = match e {
                        FullscreenError::GestureRequired => "user gesture required".to_string(),
                        FullscreenError::Refused(reason) => reason,
                    };
                    tracing::warn!(%detail, "Fullscreen exited; restore failed");
                    on_violation(Violation::FullscreenLost { detail });
                }
            },
            DisplaySignal::VisibilityChanged { visible: false } => {
                tracing::warn!("Exam surface hidden");
                on_violation(Violation::SurfaceHidden);
            }
            DisplaySignal::VisibilityChanged { visible: true }
            | DisplaySignal::FullscreenEntered => {}
        }
    }
}
