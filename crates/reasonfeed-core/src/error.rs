//! Error types shared by the stream reader, decoder, and API client.
//!
//! Each error carries a kind so callers can branch on it (retry, drop the
//! line, surface to the user) without string matching.

use std::fmt;

use serde_json::Value;

/// Categories of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Request or connect timed out
    Timeout,
    /// Connection could not be established
    Connect,
    /// Server answered with a non-success status
    HttpStatus,
    /// Any other network failure (including mid-stream drops)
    Network,
    /// Response body could not be decoded
    Parse,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Connect => write!(f, "connect"),
            TransportErrorKind::HttpStatus => write!(f, "http_status"),
            TransportErrorKind::Network => write!(f, "network"),
            TransportErrorKind::Parse => write!(f, "parse"),
        }
    }
}

/// Failure of a single HTTP exchange (stream connect, poll, or submission).
#[derive(Debug, Clone)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// One-line summary suitable for logs
    pub message: String,
    /// HTTP status when `kind` is `HttpStatus`
    pub status: Option<u16>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Creates an HTTP status error, pulling a short reason out of a JSON body
    /// when the server sent one.
    pub fn http_status(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<Value>(body).ok().and_then(|json| {
            json.get("detail")
                .or_else(|| json.get("error"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });
        let message = match detail {
            Some(detail) => format!("HTTP {status}: {detail}"),
            None => format!("HTTP {status}"),
        };
        Self {
            kind: TransportErrorKind::HttpStatus,
            message,
            status: Some(status),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Parse, message)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

/// Maps a reqwest error onto a transport error kind.
pub fn classify_reqwest_error(e: &reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::new(TransportErrorKind::Timeout, format!("Request timed out: {e}"))
    } else if e.is_connect() {
        TransportError::new(TransportErrorKind::Connect, format!("Connection failed: {e}"))
    } else if e.is_decode() {
        TransportError::parse(format!("Failed to decode response: {e}"))
    } else {
        TransportError::new(TransportErrorKind::Network, format!("Network error: {e}"))
    }
}

/// Why a stream line could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The data was not valid JSON
    Json(String),
    /// Valid JSON with an unusable shape (missing `event_type`, etc.)
    Shape(String),
    /// The server pushed an error frame
    Server(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Json(msg) => write!(f, "invalid stream JSON: {msg}"),
            DecodeError::Shape(msg) => write!(f, "unexpected stream payload: {msg}"),
            DecodeError::Server(msg) => write!(f, "server stream error: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Outcome of a failed message submission.
#[derive(Debug, Clone)]
pub enum SubmitError {
    /// The server answered but declined to process the message.
    Rejected {
        reason: Option<String>,
        detail: Option<String>,
    },
    /// The round trip itself failed.
    Transport(TransportError),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Rejected { reason, detail } => {
                write!(f, "Message rejected")?;
                if let Some(reason) = reason {
                    write!(f, " ({reason})")?;
                }
                if let Some(detail) = detail {
                    write!(f, ": {detail}")?;
                }
                Ok(())
            }
            SubmitError::Transport(err) => write!(f, "Message submission failed: {err}"),
        }
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmitError::Transport(err) => Some(err),
            SubmitError::Rejected { .. } => None,
        }
    }
}

impl From<TransportError> for SubmitError {
    fn from(err: TransportError) -> Self {
        SubmitError::Transport(err)
    }
}
