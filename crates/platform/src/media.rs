//! Camera/microphone acquisition contracts.

use vigil_common::config::MediaConfig;
use vigil_common::error::VigilError;
use vigil_exam_model::MediaKind;

/// Requested video track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: String,
}

/// What to acquire from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: Option<VideoConstraints>,
    pub audio: bool,
}

impl MediaConstraints {
    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            video: Some(VideoConstraints {
                ideal_width: config.ideal_width,
                ideal_height: config.ideal_height,
                facing_mode: config.facing_mode.clone(),
            }),
            audio: config.audio,
        }
    }

    /// Media kinds a stream satisfying these constraints carries.
    pub fn kinds(&self) -> Vec<MediaKind> {
        let mut kinds = Vec::new();
        if self.video.is_some() {
            kinds.push(MediaKind::Camera);
        }
        if self.audio {
            kinds.push(MediaKind::Audio);
        }
        kinds
    }
}

/// Acquisition failure. The two cases get different retry guidance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    Unavailable(String),
}

impl From<DeviceError> for VigilError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::PermissionDenied(msg) => VigilError::permission_denied(msg),
            DeviceError::Unavailable(msg) => VigilError::device_unavailable(msg),
        }
    }
}

/// Host access to capture devices.
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open a live stream satisfying `constraints`.
    async fn open(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn DeviceStream>, DeviceError>;
}

/// A live set of device tracks.
pub trait DeviceStream: Send {
    /// Stable identifier of this stream.
    fn id(&self) -> &str;

    /// Media kinds carried by the stream.
    fn kinds(&self) -> Vec<MediaKind>;

    /// Bytes captured for `kind` since the previous call. Empty when nothing
    /// new is available or the stream has stopped.
    fn drain(&mut self, kind: MediaKind) -> Vec<u8>;

    /// Stop all tracks. Idempotent.
    fn stop(&mut self);

    /// Whether any track is still running.
    fn is_live(&self) -> bool;
}
