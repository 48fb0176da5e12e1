//! Wire types for the agent API.

use serde::{Deserialize, Serialize};

/// `{"data": ...}` envelope wrapping every successful API response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageRequest<'a> {
    pub message: &'a str,
}

/// Server answer to a message submission.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionResponse {
    pub accepted: bool,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub rejection_detail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryPage {
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireMessage {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub is_agent: bool,
}
