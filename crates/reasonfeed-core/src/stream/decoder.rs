//! Turns raw reasoning-stream lines into typed events.
//!
//! The server emits three frame shapes on the `data:` line: keepalives
//! (`{"status": ...}` / `{"timestamp": ...}`), batches (`{"events": [...]}`),
//! and error frames (`{"error": "..."}`). Anything else is ignored so new
//! server frames do not break older clients.

use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::payload::Payload;

/// Task scope used when an event carries no task id.
pub const SYSTEM_TASK_ID: &str = "system";
/// Thought scope used when an event carries no thought id.
pub const UNKNOWN_THOUGHT_ID: &str = "unknown";

/// Pipeline stage event tags understood by the reasoning tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    ThoughtStart,
    SnapshotAndContext,
    DmaResults,
    AspdmaResult,
    ConscienceResult,
    ActionResult,
    /// Unrecognized tag, kept verbatim
    Other(String),
}

impl EventKind {
    /// Maps an exact, case-sensitive `event_type` tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "thought_start" => EventKind::ThoughtStart,
            "snapshot_and_context" => EventKind::SnapshotAndContext,
            "dma_results" => EventKind::DmaResults,
            "aspdma_result" => EventKind::AspdmaResult,
            "conscience_result" => EventKind::ConscienceResult,
            "action_result" => EventKind::ActionResult,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::ThoughtStart => "thought_start",
            EventKind::SnapshotAndContext => "snapshot_and_context",
            EventKind::DmaResults => "dma_results",
            EventKind::AspdmaResult => "aspdma_result",
            EventKind::ConscienceResult => "conscience_result",
            EventKind::ActionResult => "action_result",
            EventKind::Other(tag) => tag,
        }
    }
}

/// One decoded element of an `events` batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningEvent {
    /// Owning task, or [`SYSTEM_TASK_ID`]
    pub task_id: String,
    /// Thought within the task, or [`UNKNOWN_THOUGHT_ID`]
    pub thought_id: String,
    pub kind: EventKind,
    /// Every field except the identifiers and the tag
    pub payload: Payload,
}

/// Result of decoding one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Keepalive, SSE bookkeeping, or a frame shape this client does not use
    Ignore,
    Events(Vec<ReasoningEvent>),
}

/// Decodes one raw stream line (`data: {...}`, `event: ...`, blank, etc.).
///
/// # Errors
/// Returns a [`DecodeError`] when the data is not usable; the caller should
/// drop the line and keep reading.
pub fn decode_line(line: &str) -> Result<Decoded, DecodeError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return Ok(Decoded::Ignore);
    }

    if let Some(data) = trimmed.strip_prefix("data:") {
        return decode_data(data);
    }

    if is_sse_field(trimmed) {
        return Ok(Decoded::Ignore);
    }

    decode_data(trimmed)
}

/// Decodes the data part of an SSE frame.
///
/// # Errors
/// See [`decode_line`].
pub fn decode_data(data: &str) -> Result<Decoded, DecodeError> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(Decoded::Ignore);
    }

    let value: Value =
        serde_json::from_str(data).map_err(|err| DecodeError::Json(err.to_string()))?;
    let Value::Object(mut object) = value else {
        return Err(DecodeError::Shape("expected a JSON object".to_string()));
    };

    if is_keepalive(&object) {
        return Ok(Decoded::Ignore);
    }

    if let Some(events) = object.remove("events") {
        let Value::Array(items) = events else {
            return Err(DecodeError::Shape("`events` is not an array".to_string()));
        };
        return items
            .into_iter()
            .enumerate()
            .map(|(index, item)| decode_event(item, index))
            .collect::<Result<Vec<_>, _>>()
            .map(Decoded::Events);
    }

    if let Some(error) = object.get("error") {
        let message = error
            .as_str()
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(DecodeError::Server(message));
    }

    Ok(Decoded::Ignore)
}

fn is_sse_field(line: &str) -> bool {
    ["event:", "id:", "retry:"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

/// A payload made only of `status` and/or `timestamp` keys.
fn is_keepalive(object: &Map<String, Value>) -> bool {
    !object.is_empty()
        && object
            .keys()
            .all(|key| key == "status" || key == "timestamp")
}

fn decode_event(item: Value, index: usize) -> Result<ReasoningEvent, DecodeError> {
    let Value::Object(mut fields) = item else {
        return Err(DecodeError::Shape(format!("event {index} is not an object")));
    };

    let kind = match fields.remove("event_type") {
        Some(Value::String(tag)) => EventKind::from_tag(&tag),
        Some(_) => {
            return Err(DecodeError::Shape(format!(
                "event {index} has a non-string `event_type`"
            )));
        }
        None => {
            return Err(DecodeError::Shape(format!(
                "event {index} is missing `event_type`"
            )));
        }
    };

    let task_id = take_id(&mut fields, "task_id").unwrap_or_else(|| SYSTEM_TASK_ID.to_string());
    let thought_id =
        take_id(&mut fields, "thought_id").unwrap_or_else(|| UNKNOWN_THOUGHT_ID.to_string());

    Ok(ReasoningEvent {
        task_id,
        thought_id,
        kind,
        payload: Payload::from(Value::Object(fields)),
    })
}

/// Removes an id field; empty strings and non-strings count as absent.
fn take_id(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id),
        _ => None,
    }
}
