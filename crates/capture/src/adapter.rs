//! Media capture adapter.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use vigil_common::error::{VigilError, VigilResult};
use vigil_exam_model::MediaKind;
use vigil_platform::{MediaConstraints, MediaDevices};

use crate::recorder::{ChunkCallback, MediaChunk, RecorderStats, Recording, SharedStream};

/// Description of the acquired stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub id: String,
    pub kinds: Vec<MediaKind>,
}

/// Owns at most one device stream and at most one recording of it.
///
/// Dropping the adapter releases everything it holds.
pub struct MediaCaptureAdapter {
    devices: Arc<dyn MediaDevices>,
    stream: Option<(StreamInfo, SharedStream)>,
    recording: Option<Recording>,
}

impl MediaCaptureAdapter {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            stream: None,
            recording: None,
        }
    }

    /// Request device handles.
    ///
    /// Fails with [`VigilError::PermissionDenied`] or
    /// [`VigilError::DeviceUnavailable`]. When a stream is already held it
    /// is returned unchanged.
    pub async fn acquire(&mut self, constraints: &MediaConstraints) -> VigilResult<StreamInfo> {
        if let Some((info, _)) = &self.stream {
            return Ok(info.clone());
        }

        let stream = self.devices.open(constraints).await.map_err(|e| {
            tracing::warn!(error = %e, "Media acquisition failed");
            VigilError::from(e)
        })?;

        let info = StreamInfo {
            id: stream.id().to_string(),
            kinds: stream.kinds(),
        };
        tracing::info!(stream = %info.id, kinds = ?info.kinds, "Media stream acquired");
        self.stream = Some((info.clone(), Arc::new(Mutex::new(stream))));
        Ok(info)
    }

    /// Begin emitting a chunk per kind every `interval`.
    ///
    /// Rejected when no stream is held or the stream is already recording.
    pub fn start_recording<F>(&mut self, interval: Duration, on_chunk: F) -> VigilResult<()>
    where
        F: Fn(MediaChunk) + Send + Sync + 'static,
    {
        if interval.is_zero() {
            return Err(VigilError::invalid_input("Chunk interval must be non-zero"));
        }
        let Some((info, stream)) = &self.stream else {
            return Err(VigilError::capture("No media stream acquired"));
        };
        if let Some(recording) = &self.recording {
            return Err(VigilError::capture(format!(
                "Stream {} is already recording",
                recording.stream_id()
            )));
        }

        let callback: ChunkCallback = Arc::new(on_chunk);
        self.recording = Some(Recording::start(
            Arc::clone(stream),
            info.id.clone(),
            interval,
            callback,
        ));
        Ok(())
    }

    /// Stream currently held, if any.
    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream.as_ref().map(|(info, _)| info)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.as_ref().is_some_and(Recording::is_running)
    }

    pub fn stats(&self) -> RecorderStats {
        self.recording
            .as_ref()
            .map(Recording::stats)
            .unwrap_or_default()
    }

    /// Stop recording and all device tracks. Idempotent.
    pub fn release(&mut self) {
        if let Some(mut recording) = self.recording.take() {
            recording.stop();
        }
        if let Some((info, stream)) = self.stream.take() {
            stream.lock().unwrap_or_else(|e| e.into_inner()).stop();
            tracing::info!(stream = %info.id, "Media stream released");
        }
    }
}

impl Drop for MediaCaptureAdapter {
    fn drop(&mut self) {
        self.release();
    }
}
