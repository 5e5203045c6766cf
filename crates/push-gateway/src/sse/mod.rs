//! Push protocol: Server-Sent Events subscriber stream.

pub mod handler;

pub use handler::{preflight, stream_events, to_sse, StreamParams, LAST_EVENT_ID};
