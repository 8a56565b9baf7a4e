//! Fullscreen and visibility primitives.

use tokio::sync::broadcast;

/// A change observed on the display host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySignal {
    FullscreenEntered,
    FullscreenExited,
    /// The exam surface was hidden (tab switch, minimize) or shown again.
    VisibilityChanged { visible: bool },
}

/// Why a fullscreen request failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FullscreenError {
    /// The host only grants fullscreen in response to a user action.
    #[error("Fullscreen requires a user gesture")]
    GestureRequired,

    #[error("Fullscreen refused: {0}")]
    Refused(String),
}

/// The surface the exam is displayed on.
pub trait DisplayHost: Send + Sync {
    /// Ask the host to enter fullscreen.
    fn request_fullscreen(&self) -> Result<(), FullscreenError>;

    /// Leave fullscreen. No-op when not fullscreen.
    fn exit_fullscreen(&self);

    /// Whether the surface is currently fullscreen.
    fn is_fullscreen(&self) -> bool;

    /// Subscribe to display changes from now on.
    fn signals(&self) -> broadcast::Receiver<DisplaySignal>;
}
