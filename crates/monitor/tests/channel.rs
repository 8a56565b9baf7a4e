use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;
use vigil_capture::MediaChunk;
use vigil_common::config::MonitoringConfig;
use vigil_exam_model::{decode_payload, MediaKind, OutboundMessage};
use vigil_monitor::{
    ChannelStatus, ChunkDelivery, MemoryListener, MemoryTransport, MonitoringClient, Subscription,
};

fn config(buffer: usize, max_reconnect_attempts: u32) -> MonitoringConfig {
    MonitoringConfig {
        url: "memory://proctor".to_string(),
        chunk_interval_ms: 1000,
        outbound_buffer: buffer,
        reconnect_delay_ms: 2000,
        max_reconnect_attempts,
    }
}

fn hello() -> OutboundMessage {
    OutboundMessage::Hello {
        session_id: Uuid::new_v4(),
        student_id: Uuid::new_v4(),
        test_id: Uuid::new_v4(),
    }
}

fn chunk(seq: u64) -> MediaChunk {
    MediaChunk {
        kind: MediaKind::Camera,
        seq,
        data: vec![0xde, 0xad, seq as u8],
    }
}

struct Harness {
    client: MonitoringClient,
    transport: MemoryTransport,
    listener: MemoryListener,
    statuses: mpsc::UnboundedReceiver<ChannelStatus>,
    warnings: mpsc::UnboundedReceiver<String>,
    terminations: mpsc::UnboundedReceiver<Option<String>>,
    _subs: Vec<Subscription>,
}

fn harness(config: MonitoringConfig) -> Harness {
    let (transport, listener) = MemoryTransport::new();
    let client = MonitoringClient::new(config, Arc::new(transport.clone()));

    let (status_tx, statuses) = mpsc::unbounded_channel();
    let (warn_tx, warnings) = mpsc::unbounded_channel();
    let (term_tx, terminations) = mpsc::unbounded_channel();
    let subs = vec![
        client.on_status(move |s| {
            let _ = status_tx.send(*s);
        }),
        client.on_warning(move |w| {
            let _ = warn_tx.send(w.message.clone());
        }),
        client.on_terminate(move |t| {
            let _ = term_tx.send(t.reason.clone());
        }),
    ];

    Harness {
        client,
        transport,
        listener,
        statuses,
        warnings,
        terminations,
        _subs: subs,
    }
}

async fn wait_for(statuses: &mut mpsc::UnboundedReceiver<ChannelStatus>, want: ChannelStatus) {
    while let Some(status) = statuses.recv().await {
        if status == want {
            return;
        }
    }
    panic!("status channel closed before {want:?}");
}

#[tokio::test(start_paused = true)]
async fn test_hello_then_chunks_in_wire_format() {
    let mut h = harness(config(8, 3));
    let hello = hello();
    h.client.connect(hello.clone()).unwrap();

    let mut peer = h.listener.accept().await.unwrap();
    wait_for(&mut h.statuses, ChannelStatus::Connected).await;
    assert_eq!(peer.url, "memory://proctor");

    let first: OutboundMessage = serde_json::from_str(&peer.recv().await.unwrap()).unwrap();
    assert_eq!(first, hello);

    assert_eq!(h.client.send_chunk(&chunk(7)), ChunkDelivery::Queued);
    let frame: serde_json::Value = serde_json::from_str(&peer.recv().await.unwrap()).unwrap();
    assert_eq!(frame["type"], "stream-data");
    assert_eq!(frame["mediaType"], "camera");
    assert_eq!(frame["seq"], 7);
    assert_eq!(
        decode_payload(frame["payload"].as_str().unwrap()).unwrap(),
        vec![0xde, 0xad, 7]
    );
}

#[tokio::test(start_paused = true)]
async fn test_proctor_messages_delivered_once_in_order() {
    let mut h = harness(config(8, 3));
    h.client.connect(hello()).unwrap();
    let peer = h.listener.accept().await.unwrap();

    for frame in [
        r#"{"type":"warning","message":"look at the screen","seq":1}"#,
        r#"{"type":"warning","message":"look at the screen","seq":1}"#,
        r#"{"type":"heartbeat"}"#,
        r#"not json"#,
        r#"{"type":"warning","message":"second person detected","seq":2}"#,
        r#"{"type":"exam_terminated","reason":"phone in view","seq":3}"#,
        r#"{"type":"exam_terminated","seq":3}"#,
    ] {
        assert!(peer.send(frame).await);
    }

    assert_eq!(h.warnings.recv().await.unwrap(), "look at the screen");
    assert_eq!(h.warnings.recv().await.unwrap(), "second person detected");
    assert_eq!(
        h.terminations.recv().await.unwrap(),
        Some("phone in view".to_string())
    );

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.warnings.try_recv().is_err());
    assert!(h.terminations.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_keeps_redelivery_filter() {
    let mut h = harness(config(8, 3));
    h.client.connect(hello()).unwrap();

    let first = h.listener.accept().await.unwrap();
    first
        .send(r#"{"type":"warning","message":"one","seq":1}"#)
        .await;
    assert_eq!(h.warnings.recv().await.unwrap(), "one");
    drop(first);

    wait_for(&mut h.statuses, ChannelStatus::Reconnecting { attempt: 1 }).await;
    let mut second = h.listener.accept().await.unwrap();
    wait_for(&mut h.statuses, ChannelStatus::Connected).await;
    assert!(second.recv().await.unwrap().contains("\"hello\""));

    second
        .send(r#"{"type":"warning","message":"one","seq":1}"#)
        .await;
    second
        .send(r#"{"type":"warning","message":"two","seq":2}"#)
        .await;
    assert_eq!(h.warnings.recv().await.unwrap(), "two");
    assert_eq!(h.transport.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_is_bounded() {
    let mut h = harness(config(8, 2));
    h.transport.refuse_next(10);
    h.client.connect(hello()).unwrap();

    let mut seen = Vec::new();
    while let Some(status) = h.statuses.recv().await {
        seen.push(status);
        if status == ChannelStatus::Failed {
            break;
        }
    }
    assert_eq!(
        seen,
        vec![
            ChannelStatus::Connecting,
            ChannelStatus::Reconnecting { attempt: 1 },
            ChannelStatus::Reconnecting { attempt: 2 },
            ChannelStatus::Failed,
        ]
    );
    assert_eq!(h.transport.attempts(), 3);
    assert_eq!(h.client.send_chunk(&chunk(0)), ChunkDelivery::NotConnected);
}

#[tokio::test(start_paused = true)]
async fn test_full_buffer_drops_chunks_without_blocking() {
    let mut h = harness(config(1, 3));
    h.client.connect(hello()).unwrap();
    let mut peer = h.listener.accept().await.unwrap();
    wait_for(&mut h.statuses, ChannelStatus::Connected).await;
    peer.recv().await.unwrap();

    let sender = h.client.chunk_sender();
    assert_eq!(sender.send(&chunk(0)), ChunkDelivery::Queued);
    assert_eq!(sender.send(&chunk(1)), ChunkDelivery::DroppedFull);
    assert_eq!(sender.dropped(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_is_idempotent() {
    let mut h = harness(config(8, 3));
    h.client.connect(hello()).unwrap();
    let mut peer = h.listener.accept().await.unwrap();
    wait_for(&mut h.statuses, ChannelStatus::Connected).await;
    peer.recv().await.unwrap();

    h.client.disconnect();
    h.client.disconnect();

    assert_eq!(h.client.status(), Some(ChannelStatus::Disconnected));
    assert_eq!(peer.recv().await, None);
    assert_eq!(h.client.send_chunk(&chunk(0)), ChunkDelivery::NotConnected);
    assert!(h.client.connect(hello()).is_err());

    let mut disconnected = 0;
    while let Ok(status) = h.statuses.try_recv() {
        if status == ChannelStatus::Disconnected {
            disconnected += 1;
        }
    }
    assert_eq!(disconnected, 1);
    assert!(h.transport.attempts() == 1);
}

#[tokio::test]
async fn test_disconnect_before_connect_is_safe() {
    let (transport, _listener) = MemoryTransport::new();
    let mut client = MonitoringClient::new(config(8, 3), Arc::new(transport));
    client.disconnect();
    assert_eq!(client.status(), Some(ChannelStatus::Disconnected));
}
