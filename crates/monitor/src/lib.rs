//! vigil monitoring channel
//!
//! Persistent connection to the remote proctor:
//! - Outbound: a `hello` identifying the session, then captured media chunks
//! - Inbound: `warning` and `exam_terminated` messages, each delivered to
//!   subscribers at most once even when the network redelivers
//!
//! ```text
//! MediaChunk ──ChunkSender──▶ outbound queue ──▶ Transport ──▶ proctor
//!                                                    │
//!  on_warning / on_terminate ◀── SequenceFilter ◀────┘
//! ```

pub mod client;
pub mod dedupe;
pub mod events;
pub mod transport;

pub use client::*;
pub use dedupe::SequenceFilter;
pub use events::{EventBus, Subscription};
pub use transport::*;
