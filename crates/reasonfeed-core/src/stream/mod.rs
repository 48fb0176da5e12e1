//! Reasoning stream ingest: the reconnecting SSE reader and the frame decoder.

pub mod decoder;
pub mod reader;

pub use decoder::{Decoded, EventKind, ReasoningEvent, decode_data, decode_line};
pub use reader::{FrameStream, SseFrames, StreamReader};
