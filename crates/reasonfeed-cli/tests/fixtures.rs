//! SSE and JSON fixture helpers for integration tests.

#![allow(dead_code)]

use serde_json::{Value, json};
use wiremock::ResponseTemplate;

// Load fixture templates at compile time
pub const REASONING_STREAM: &str = include_str!("fixtures/reasoning_stream.sse");

/// Full reasoning cycle for one thought, ending in `action`.
pub fn reasoning_sse(task_id: &str, thought_id: &str, content: &str, action: &str) -> String {
    REASONING_STREAM
        .replace("{{TASK_ID}}", task_id)
        .replace("{{THOUGHT_ID}}", thought_id)
        .replace("{{CONTENT}}", &escape_json(content))
        .replace("{{DESCRIPTION}}", "Respond to the user")
        .replace("{{ACTION}}", action)
}

/// Wrap SSE body string in a ResponseTemplate.
pub fn sse_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body.to_string())
}

/// One transcript message as the history endpoint returns it.
pub fn history_message(id: &str, content: &str, timestamp: &str, is_agent: bool) -> Value {
    json!({
        "id": id,
        "content": content,
        "author": if is_agent { "Datum" } else { "user" },
        "timestamp": timestamp,
        "is_agent": is_agent,
    })
}

/// History endpoint response wrapping `messages`.
pub fn history_response(messages: Vec<Value>) -> ResponseTemplate {
    let total = messages.len();
    ResponseTemplate::new(200).set_body_json(json!({
        "data": {"messages": messages, "total_count": total, "has_more": false}
    }))
}

/// Accepted submission response.
pub fn accepted_response(message_id: &str, task_id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": {
            "accepted": true,
            "message_id": message_id,
            "task_id": task_id,
            "channel_id": "api_user"
        }
    }))
}

/// Rejected submission response.
pub fn rejected_response(reason: &str, detail: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": {
            "accepted": false,
            "rejection_reason": reason,
            "rejection_detail": detail
        }
    }))
}

/// Escape special characters for JSON string embedding.
fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

pub fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}
