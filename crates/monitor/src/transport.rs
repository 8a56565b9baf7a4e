//! Connection seam between the monitoring client and the network.
//!
//! A [`Transport`] opens a [`Connection`]: a pair of text-frame queues. The
//! inbound queue closing means the connection was lost; dropping the
//! outbound sender closes the connection from our side.

use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use vigil_common::error::{VigilError, VigilResult};

/// An open message-oriented connection.
#[derive(Debug)]
pub struct Connection {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<String>,
}

/// Opens connections to the monitoring endpoint.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Connect to `url`. `buffer` bounds the outbound queue.
    async fn open(&self, url: &str, buffer: usize) -> VigilResult<Connection>;
}

/// WebSocket transport carrying JSON text frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str, buffer: usize) -> VigilResult<Connection> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| VigilError::channel(format!("WebSocket connect to {url} failed: {e}")))?;
        let (mut write, mut read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<String>(buffer.max(1));
        let (in_tx, in_rx) = mpsc::channel::<String>(buffer.max(1));

        let reader = tokio::spawn(read_pump(read, in_tx));

        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text)).await {
                    tracing::warn!(error = %e, "WebSocket write failed");
                    break;
                }
            }
            reader.abort();
            let _ = write.close().await;
        });

        Ok(Connection {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

/// Forward inbound text frames until the endpoint closes the connection or
/// the receiving side goes away.
async fn read_pump<S, E>(mut read: S, in_tx: mpsc::Sender<String>)
where
    S: futures::Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    loop {
        let frame = tokio::select! {
            _ = in_tx.closed() => break,
            frame = read.next() => frame,
        };
        match frame {
            Some(Ok(Message::Text(text))) => {
                if in_tx.send(text).await.is_err() {
                    break;
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                tracing::info!("Monitoring endpoint closed the connection");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!(error = %e, "WebSocket read failed");
                break;
            }
        }
    }
}

/// The far end of an in-memory connection, held by tests.
///
/// Dropping the peer simulates connection loss.
#[derive(Debug)]
pub struct MemoryPeer {
    pub url: String,
    to_client: mpsc::Sender<String>,
    from_client: mpsc::Receiver<String>,
}

impl MemoryPeer {
    /// Deliver a raw text frame to the client.
    pub async fn send(&self, text: impl Into<String>) -> bool {
        self.to_client.send(text.into()).await.is_ok()
    }

    /// Next frame sent by the client; `None` once the client closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Frame already sent by the client, if any.
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }
}

#[derive(Default)]
struct MemoryState {
    refusals: u32,
    attempts: u32,
}

/// In-process transport. Every successful `open` hands a [`MemoryPeer`] to
/// the paired [`MemoryListener`].
#[derive(Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

/// Accepts the peers of a [`MemoryTransport`].
pub struct MemoryListener {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                state: Arc::new(Mutex::new(MemoryState::default())),
                peers: tx,
            },
            MemoryListener { peers: rx },
        )
    }

    /// Fail the next `n` open attempts.
    pub fn refuse_next(&self, n: u32) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).refusals = n;
    }

    /// Open attempts made so far, refused ones included.
    pub fn attempts(&self) -> u32 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).attempts
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, url: &str, buffer: usize) -> VigilResult<Connection> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.attempts += 1;
            if state.refusals > 0 {
                state.refusals -= 1;
                return Err(VigilError::channel(format!("connection to {url} refused")));
            }
        }

        let (out_tx, out_rx) = mpsc::channel(buffer.max(1));
        let (in_tx, in_rx) = mpsc::channel(buffer.max(1));
        self.peers
            .send(MemoryPeer {
                url: url.to_string(),
                to_client: in_tx,
                from_client: out_rx,
            })
            .map_err(|_| VigilError::channel("memory listener dropped"))?;

        Ok(Connection {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

impl MemoryListener {
    /// Wait for the next connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// A connection opened and not yet accepted, if any.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frames(
        messages: Vec<Message>,
    ) -> impl futures::Stream<Item = Result<Message, std::io::Error>> + Unpin {
        futures::stream::iter(messages.into_iter().map(Ok)).chain(futures::stream::pending())
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_pump_stops_when_receiver_goes_away() {
        let (tx, mut rx) = mpsc::channel(4);
        let pump = tokio::spawn(read_pump(frames(vec![Message::Text("hi".to_string())]), tx));

        assert_eq!(rx.recv().await.as_deref(), Some("hi"));
        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), pump)
            .await
            .expect("read pump kept running after the receiver was dropped")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_pump_ends_on_close_frame() {
        let (tx, mut rx) = mpsc::channel(4);
        let pump = tokio::spawn(read_pump(
            frames(vec![
                Message::Binary(vec![1, 2, 3]),
                Message::Text("last".to_string()),
                Message::Close(None),
                Message::Text("after close".to_string()),
            ]),
            tx,
        ));

        assert_eq!(rx.recv().await.as_deref(), Some("last"));
        assert_eq!(rx.recv().await, None);
        tokio::time::timeout(Duration::from_secs(1), pump)
            .await
            .unwrap()
            .unwrap();
    }
}
