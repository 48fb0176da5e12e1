//! HTTP client for the agent API (message submission, transcript history).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{SubmitError, TransportError, classify_reqwest_error};
use crate::history::TranscriptMessage;

pub mod auth;
mod types;

pub use auth::{AuthProvider, StaticToken};
use types::{Envelope, HistoryPage, MessageRequest, SubmissionResponse};

/// Standard User-Agent header for reasonfeed requests.
pub const USER_AGENT: &str = concat!("reasonfeed/", env!("CARGO_PKG_VERSION"));

pub const STREAM_PATH: &str = "/v1/system/runtime/reasoning-stream";
pub const MESSAGE_PATH: &str = "/v1/agent/message";
pub const HISTORY_PATH: &str = "/v1/agent/history";

/// An accepted message submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Id the transcript will list this message under. Generated locally
    /// when the server did not return one.
    pub message_id: String,
    /// Server-assigned task, when the server created one
    pub task_id: Option<String>,
}

/// Agent API client.
///
/// Cheap to clone; all clones share one connection pool and auth source.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<dyn AuthProvider>,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Builds a client for the resolved base URL with the configured
    /// connect timeout and the reasonfeed User-Agent.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn from_config(config: &Config, auth: Arc<dyn AuthProvider>) -> Result<Self> {
        let base_url = config.resolved_base_url()?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(http, base_url, auth))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Submits one user message.
    ///
    /// # Errors
    /// `SubmitError::Rejected` when the server declined the message,
    /// `SubmitError::Transport` when the round trip failed.
    pub async fn submit_message(
        &self,
        message: &str,
        timeout: Duration,
    ) -> Result<Submission, SubmitError> {
        let builder = self
            .http
            .post(self.url(MESSAGE_PATH))
            .timeout(timeout)
            .header(ACCEPT, "application/json")
            .json(&MessageRequest { message });
        let response: SubmissionResponse = self.send(builder).await?;

        if !response.accepted {
            return Err(SubmitError::Rejected {
                reason: response.rejection_reason,
                detail: response.rejection_detail,
            });
        }

        Ok(Submission {
            message_id: response
                .message_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            task_id: response.task_id.filter(|id| !id.is_empty()),
        })
    }

    /// Fetches the most recent `limit` transcript messages.
    ///
    /// # Errors
    /// Returns a `TransportError` when the request or decoding fails.
    pub async fn fetch_history(
        &self,
        channel_id: Option<&str>,
        limit: u32,
        timeout: Duration,
    ) -> Result<Vec<TranscriptMessage>, TransportError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(channel_id) = channel_id {
            query.push(("channel_id", channel_id.to_string()));
        }
        let builder = self
            .http
            .get(self.url(HISTORY_PATH))
            .timeout(timeout)
            .header(ACCEPT, "application/json")
            .query(&query);
        let page: HistoryPage = self.send(builder).await?;

        Ok(page
            .messages
            .into_iter()
            .map(|m| {
                TranscriptMessage::new(
                    m.id,
                    m.content,
                    m.author,
                    m.is_agent,
                    m.timestamp.unwrap_or_default(),
                )
            })
            .collect())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, TransportError> {
        let builder = auth::with_auth(builder, self.auth.as_ref());
        let response = builder
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::http_status(status.as_u16(), &body));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| TransportError::parse(format!("Failed to decode response: {e}")))?;
        Ok(envelope.data)
    }
}
