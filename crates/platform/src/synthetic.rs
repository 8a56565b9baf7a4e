//! Deterministic in-process hosts.
//!
//! `SyntheticDevices` and `HeadlessDisplay` behave like a cooperative
//! browser: they grant or refuse on demand, emit predictable chunk bytes,
//! and let tests inject fullscreen exits and visibility changes.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use vigil_exam_model::MediaKind;

use crate::display::{DisplayHost, DisplaySignal, FullscreenError};
use crate::media::{DeviceError, DeviceStream, MediaConstraints, MediaDevices};

/// How `SyntheticDevices::open` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceBehavior {
    Grant,
    DenyPermission,
    Unavailable,
}

/// Fake capture devices.
#[derive(Debug, Clone)]
pub struct SyntheticDevices {
    behavior: Arc<Mutex<DeviceBehavior>>,
    live_streams: Arc<AtomicUsize>,
    opened: Arc<AtomicU64>,
}

impl SyntheticDevices {
    pub fn new(behavior: DeviceBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            live_streams: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Change how subsequent `open` calls answer.
    pub fn set_behavior(&self, behavior: DeviceBehavior) {
        *self.behavior.lock().unwrap_or_else(|e| e.into_inner()) = behavior;
    }

    /// Streams opened and not yet stopped.
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticDevices {
    fn default() -> Self {
        Self::new(DeviceBehavior::Grant)
    }
}

#[async_trait::async_trait]
impl MediaDevices for SyntheticDevices {
    async fn open(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn DeviceStream>, DeviceError> {
        let behavior = *self.behavior.lock().unwrap_or_else(|e| e.into_inner());
        match behavior {
            DeviceBehavior::DenyPermission => Err(DeviceError::PermissionDenied(
                "camera access was refused".to_string(),
            )),
            DeviceBehavior::Unavailable => Err(DeviceError::Unavailable(
                "no camera device found".to_string(),
            )),
            DeviceBehavior::Grant => {
                let n = self.opened.fetch_add(1, Ordering::SeqCst);
                self.live_streams.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(SyntheticStream {
                    id: format!("synthetic-{n}"),
                    kinds: constraints.kinds(),
                    frames: 0,
                    live: true,
                    live_streams: Arc::clone(&self.live_streams),
                }))
            }
        }
    }
}

struct SyntheticStream {
    id: String,
    kinds: Vec<MediaKind>,
    frames: u64,
    live: bool,
    live_streams: Arc<AtomicUsize>,
}

impl DeviceStream for SyntheticStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn kinds(&self) -> Vec<MediaKind> {
        self.kinds.clone()
    }

    fn drain(&mut self, kind: MediaKind) -> Vec<u8> {
        if !self.live || !self.kinds.contains(&kind) {
            return Vec::new();
        }
        self.frames += 1;
        format!("{}:{:?}:{}", self.id, kind, self.frames).into_bytes()
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.live_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A display with no window system behind it.
#[derive(Debug)]
pub struct HeadlessDisplay {
    fullscreen: AtomicBool,
    refusal: Mutex<Option<FullscreenError>>,
    requests: AtomicU64,
    signals: broadcast::Sender<DisplaySignal>,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(32);
        Self {
            fullscreen: AtomicBool::new(false),
            refusal: Mutex::new(None),
            requests: AtomicU64::new(0),
            signals,
        }
    }

    /// Make every following fullscreen request fail with `refusal`
    /// (`None` grants again).
    pub fn set_refusal(&self, refusal: Option<FullscreenError>) {
        *self.refusal.lock().unwrap_or_else(|e| e.into_inner()) = refusal;
    }

    /// Number of fullscreen requests received so far.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// The student pressed Escape.
    pub fn simulate_exit(&self) {
        if self.fullscreen.swap(false, Ordering::SeqCst) {
            let _ = self.signals.send(DisplaySignal::FullscreenExited);
        }
    }

    /// The exam surface was hidden or shown.
    pub fn simulate_visibility(&self, visible: bool) {
        let _ = self
            .signals
            .send(DisplaySignal::VisibilityChanged { visible });
    }
}

impl Default for HeadlessDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayHost for HeadlessDisplay {
    fn request_fullscreen(&self) -> Result<(), FullscreenError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(refusal) = self.refusal.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(refusal);
        }
        if !self.fullscreen.swap(true, Ordering::SeqCst) {
            let _ = self.signals.send(DisplaySignal::FullscreenEntered);
        }
        Ok(())
    }

    fn exit_fullscreen(&self) {
        if self.fullscreen.swap(false, Ordering::SeqCst) {
            let _ = self.signals.send(DisplaySignal::FullscreenExited);
        }
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }

    fn signals(&self) -> broadcast::Receiver<DisplaySignal> {
        self.signals.subscribe()
    }
}
