//! Monitoring channel client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vigil_capture::MediaChunk;
use vigil_common::config::MonitoringConfig;
use vigil_common::error::{VigilError, VigilResult};
use vigil_exam_model::{InboundMessage, OutboundMessage};

use crate::dedupe::SequenceFilter;
use crate::events::{EventBus, Subscription};
use crate::transport::Transport;

/// Connection status of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connecting,
    Connected,
    /// Waiting to retry after losing (or failing to open) the connection.
    Reconnecting { attempt: u32 },
    /// Gave up after the configured number of attempts.
    Failed,
    /// Closed by [`MonitoringClient::disconnect`].
    Disconnected,
}

/// A `warning` message from the proctor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProctorWarning {
    pub message: String,
}

/// An `exam_terminated` message from the proctor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationNotice {
    pub reason: Option<String>,
}

/// What happened to a chunk handed to [`ChunkSender::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDelivery {
    Queued,
    /// Outbound buffer full; the chunk was discarded.
    DroppedFull,
    /// No live connection; the chunk was discarded.
    NotConnected,
}

type OutboundSlot = Arc<Mutex<Option<mpsc::Sender<String>>>>;

/// Cloneable, non-blocking handle for uploading chunks. Usable from the
/// capture callback.
#[derive(Clone)]
pub struct ChunkSender {
    outbound: OutboundSlot,
    dropped: Arc<AtomicU64>,
}

impl ChunkSender {
    pub fn send(&self, chunk: &MediaChunk) -> ChunkDelivery {
        let message = OutboundMessage::stream_data(chunk.kind, chunk.seq, &chunk.data);
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode chunk");
                return ChunkDelivery::NotConnected;
            }
        };

        let slot = self.outbound.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = slot.as_ref() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(seq = chunk.seq, "Chunk dropped: not connected");
            return ChunkDelivery::NotConnected;
        };
        match sender.try_send(text) {
            Ok(()) => ChunkDelivery::Queued,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(seq = chunk.seq, kind = ?chunk.kind, "Chunk dropped: outbound buffer full");
                ChunkDelivery::DroppedFull
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(seq = chunk.seq, "Chunk dropped: connection closing");
                ChunkDelivery::NotConnected
            }
        }
    }

    /// Chunks discarded so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
struct Buses {
    warnings: EventBus<ProctorWarning>,
    terminations: EventBus<TerminationNotice>,
    status: EventBus<ChannelStatus>,
    current: Arc<Mutex<Option<ChannelStatus>>>,
}

impl Buses {
    fn set_status(&self, status: ChannelStatus) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(status);
        self.status.emit(&status);
    }
}

/// Persistent connection to the remote proctor.
///
/// The channel is telemetry: losing it is reported on the status bus and
/// retried a bounded number of times, never escalated.
pub struct MonitoringClient {
    config: MonitoringConfig,
    transport: Arc<dyn Transport>,
    buses: Buses,
    chunks: ChunkSender,
    supervisor: Option<JoinHandle<()>>,
    closed: bool,
}

impl MonitoringClient {
    pub fn new(config: MonitoringConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            buses: Buses {
                warnings: EventBus::new(),
                terminations: EventBus::new(),
                status: EventBus::new(),
                current: Arc::new(Mutex::new(None)),
            },
            chunks: ChunkSender {
                outbound: Arc::new(Mutex::new(None)),
                dropped: Arc::new(AtomicU64::new(0)),
            },
            supervisor: None,
            closed: false,
        }
    }

    pub fn on_warning<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ProctorWarning) + Send + Sync + 'static,
    {
        self.buses.warnings.subscribe(handler)
    }

    pub fn on_terminate<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&TerminationNotice) + Send + Sync + 'static,
    {
        self.buses.terminations.subscribe(handler)
    }

    pub fn on_status<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ChannelStatus) + Send + Sync + 'static,
    {
        self.buses.status.subscribe(handler)
    }

    /// Start connecting in the background. `hello` is sent first on every
    /// (re)connection.
    ///
    /// Returns once the connection task is running; its progress is
    /// reported on the status bus.
    pub fn connect(&mut self, hello: OutboundMessage) -> VigilResult<()> {
        if self.closed {
            return Err(VigilError::channel("channel already disconnected"));
        }
        if self.supervisor.is_some() {
            return Err(VigilError::invalid_transition("channel already connecting"));
        }

        let hello = serde_json::to_string(&hello)?;
        self.supervisor = Some(tokio::spawn(supervise(
            self.config.clone(),
            Arc::clone(&self.transport),
            hello,
            self.buses.clone(),
            Arc::clone(&self.chunks.outbound),
        )));
        Ok(())
    }

    /// Handle for uploading chunks.
    pub fn chunk_sender(&self) -> ChunkSender {
        self.chunks.clone()
    }

    /// Upload one chunk without waiting.
    pub fn send_chunk(&self, chunk: &MediaChunk) -> ChunkDelivery {
        self.chunks.send(chunk)
    }

    /// Latest status, `None` before `connect`.
    pub fn status(&self) -> Option<ChannelStatus> {
        *self.buses.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Close the channel. Idempotent and safe in any state.
    pub fn disconnect(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(supervisor) = self.supervisor.take() {
            supervisor.abort();
        }
        // Dropping the last sender closes the connection.
        self.chunks
            .outbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        self.buses.set_status(ChannelStatus::Disconnected);
        tracing::info!(dropped_chunks = self.chunks.dropped(), "Monitoring channel disconnected");
    }
}

impl Drop for MonitoringClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn supervise(
    config: MonitoringConfig,
    transport: Arc<dyn Transport>,
    hello: String,
    buses: Buses,
    outbound: OutboundSlot,
) {
    let mut filter = SequenceFilter::new();
    let mut failures = 0u32;
    buses.set_status(ChannelStatus::Connecting);

    loop {
        match transport.open(&config.url, config.outbound_buffer).await {
            Ok(mut connection) => {
                if connection.outbound.send(hello.clone()).await.is_ok() {
                    *outbound.lock().unwrap_or_else(|e| e.into_inner()) =
                        Some(connection.outbound);
                    failures = 0;
                    buses.set_status(ChannelStatus::Connected);
                    tracing::info!(url = %config.url, "Monitoring channel connected");

                    while let Some(text) = connection.inbound.recv().await {
                        dispatch(&text, &mut filter, &buses);
                    }

                    outbound.lock().unwrap_or_else(|e| e.into_inner()).take();
                }
                tracing::warn!(url = %config.url, "Monitoring connection lost");
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %config.url, "Monitoring connection failed");
            }
        }

        failures += 1;
        if failures > config.max_reconnect_attempts {
            tracing::error!(
                attempts = failures,
                "Monitoring channel giving up; exam continues without telemetry"
            );
            buses.set_status(ChannelStatus::Failed);
            return;
        }
        buses.set_status(ChannelStatus::Reconnecting { attempt: failures });
        tokio::time::sleep(config.reconnect_delay()).await;
    }
}

fn dispatch(text: &str, filter: &mut SequenceFilter, buses: &Buses) {
    let message: InboundMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable proctor message ignored");
            return;
        }
    };

    if !filter.admit(message.seq()) {
        tracing::debug!(seq = ?message.seq(), "Redelivered proctor message ignored");
        return;
    }

    match message {
        InboundMessage::Warning { message, .. } => {
            buses.warnings.emit(&ProctorWarning { message });
        }
        InboundMessage::ExamTerminated { reason, .. } => {
            buses.terminations.emit(&TerminationNotice { reason });
        }
        InboundMessage::Unknown => {
            tracing::debug!("Unknown proctor message type ignored");
        }
    }
}
