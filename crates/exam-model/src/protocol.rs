//! Wire messages exchanged with the remote proctor.
//!
//! Every message is a JSON object discriminated by `type`. Outbound media
//! chunks carry their bytes base64-encoded. Inbound messages may carry a
//! monotonically increasing `seq`; transports that can redeliver use it to
//! drop duplicates.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::{SessionId, StudentId, TestId};

/// What a captured chunk contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Camera,
    Screen,
    Audio,
}

impl MediaKind {
    /// Container MIME type the chunk bytes are encoded in.
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio/webm",
            MediaKind::Camera | MediaKind::Screen => "video/webm",
        }
    }
}

/// Client -> proctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    /// Identifies the session right after the connection opens.
    #[serde(rename = "hello")]
    Hello {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(rename = "studentId")]
        student_id: StudentId,
        #[serde(rename = "testId")]
        test_id: TestId,
    },

    /// One captured media chunk.
    #[serde(rename = "stream-data")]
    StreamData {
        #[serde(rename = "mediaType")]
        media_type: MediaKind,
        /// Base64 of the chunk bytes.
        payload: String,
        /// Per-session chunk counter.
        seq: u64,
    },
}

/// Proctor -> client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "warning")]
    Warning {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
    },

    #[serde(rename = "exam_terminated")]
    ExamTerminated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
    },

    /// Any message type this client does not understand.
    #[serde(other)]
    Unknown,
}

impl OutboundMessage {
    /// Build a stream-data message from raw chunk bytes.
    pub fn stream_data(media_type: MediaKind, seq: u64, bytes: &[u8]) -> Self {
        OutboundMessage::StreamData {
            media_type,
            payload: base64::engine::general_purpose::STANDARD.encode(bytes),
            seq,
        }
    }
}

impl InboundMessage {
    /// Sequence number, if the sender attached one.
    pub fn seq(&self) -> Option<u64> {
        match self {
            InboundMessage::Warning { seq, .. } | InboundMessage::ExamTerminated { seq, .. } => {
                *seq
            }
            InboundMessage::Unknown => None,
        }
    }
}

/// Decode the payload of a stream-data message.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(payload)
}
