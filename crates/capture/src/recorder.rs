//! Periodic chunk recording over a live device stream.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use vigil_exam_model::MediaKind;
use vigil_platform::DeviceStream;

/// A captured slice of media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChunk {
    pub kind: MediaKind,
    /// Position of this chunk within the recording, starting at 0.
    pub seq: u64,
    pub data: Vec<u8>,
}

/// Receives chunks as they become ready. Called from the recorder task.
pub type ChunkCallback = Arc<dyn Fn(MediaChunk) + Send + Sync>;

pub(crate) type SharedStream = Arc<Mutex<Box<dyn DeviceStream>>>;

/// Runtime statistics of a recording.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderStats {
    /// Chunks handed to the callback.
    pub chunks_emitted: u64,

    /// Total payload bytes handed to the callback.
    pub bytes_emitted: u64,

    /// Intervals that produced no data at all.
    pub empty_intervals: u64,
}

#[derive(Debug, Default)]
struct Counters {
    chunks: AtomicU64,
    bytes: AtomicU64,
    empty: AtomicU64,
}

/// A running recording. Stopping is idempotent; dropping stops it.
pub struct Recording {
    stream_id: String,
    stop_flag: Arc<AtomicBool>,
    counters: Arc<Counters>,
    task: Option<JoinHandle<()>>,
}

impl Recording {
    pub(crate) fn start(
        stream: SharedStream,
        stream_id: String,
        interval: Duration,
        on_chunk: ChunkCallback,
    ) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters::default());

        let task = {
            let stop_flag = Arc::clone(&stop_flag);
            let counters = Arc::clone(&counters);
            let stream_id = stream_id.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick completes immediately; chunks are emitted
                // once a full interval has been captured.
                ticker.tick().await;
                let mut seq = 0u64;

                while !stop_flag.load(Ordering::SeqCst) {
                    ticker.tick().await;
                    if stop_flag.load(Ordering::SeqCst) {
                        break;
                    }

                    let ready: Vec<(MediaKind, Vec<u8>)> = {
                        let mut stream = stream.lock().unwrap_or_else(|e| e.into_inner());
                        if !stream.is_live() {
                            tracing::debug!(stream = %stream_id, "Stream ended; recorder exiting");
                            break;
                        }
                        stream
                            .kinds()
                            .into_iter()
                            .map(|kind| (kind, stream.drain(kind)))
                            .filter(|(_, data)| !data.is_empty())
                            .collect()
                    };

                    if ready.is_empty() {
                        counters.empty.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }

                    for (kind, data) in ready {
                        counters.chunks.fetch_add(1, Ordering::Relaxed);
                        counters.bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
                        on_chunk(MediaChunk { kind, seq, data });
                        seq += 1;
                    }
                }
            })
        };

        tracing::info!(stream = %stream_id, interval_ms = interval.as_millis() as u64, "Recording started");
        Self {
            stream_id,
            stop_flag,
            counters,
            task: Some(task),
        }
    }

    /// Id of the stream being recorded.
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            chunks_emitted: self.counters.chunks.load(Ordering::Relaxed),
            bytes_emitted: self.counters.bytes.load(Ordering::Relaxed),
            empty_intervals: self.counters.empty.load(Ordering::Relaxed),
        }
    }

    /// Stop emitting chunks.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!(stream = %self.stream_id, chunks = self.stats().chunks_emitted, "Recording stopped");
        }
    }
}

impl Drop for Recording {
    fn drop(&mut self) {
        self.stop();
    }
}
