//! Streaming text accumulation for SSE generation responses.
//!
//! The proxy streams chat-completion chunks as `data: {json}` lines,
//! finished by `data: [DONE]`. This module decodes the body incrementally
//! and produces snapshots of the full generated text after every delta.
//!
//! - [`Utf8Decoder`] keeps multi-byte sequences intact across chunks.
//! - [`SnapshotAccumulator`] is the synchronous, I/O-free line protocol.
//! - [`SnapshotStream`] adapts it to a `futures::Stream` with cancellation.
//!
//! ```rust
//! use devguard_client::streaming::SnapshotAccumulator;
//!
//! let mut acc = SnapshotAccumulator::new();
//! let snapshots = acc.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n");
//! assert_eq!(snapshots, vec!["Hi".to_string()]);
//! ```

mod accumulator;
mod decoder;
mod stream;

pub use accumulator::{delta_content, SnapshotAccumulator, StreamState};
pub use decoder::Utf8Decoder;
pub use stream::{SnapshotEvent, SnapshotStream, StreamOutcome};

/// Prefix of an SSE data line, including the single separating space.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that ends a generation stream.
pub const DONE_SENTINEL: &str = "[DONE]";
