//! Transcript polling and the cached transcript it feeds.

use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ApiClient;

/// One message of the durable conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptMessage {
    pub id: String,
    pub content: String,
    pub author: String,
    /// True when the agent wrote this message
    pub is_agent: bool,
    /// Timestamp exactly as the server sent it
    pub timestamp: String,
    /// Parsed form of `timestamp`, used for ordering
    pub sent_at: Option<DateTime<Utc>>,
}

impl TranscriptMessage {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
        is_agent: bool,
        timestamp: impl Into<String>,
    ) -> Self {
        let timestamp = timestamp.into();
        let sent_at = parse_timestamp(&timestamp);
        Self {
            id: id.into(),
            content: content.into(),
            author: author.into(),
            is_agent,
            timestamp,
            sent_at,
        }
    }

    pub fn is_user(&self) -> bool {
        !self.is_agent
    }
}

/// Parses RFC 3339 timestamps, and naive ISO timestamps as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Orders messages ascending by timestamp.
///
/// Stable: equal timestamps keep server order, and messages whose timestamp
/// does not parse go last in the order they arrived.
pub fn sort_chronologically(messages: &mut [TranscriptMessage]) {
    messages.sort_by(|a, b| match (a.sent_at, b.sent_at) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Last successfully polled transcript, replaced wholesale on each poll.
#[derive(Debug, Default)]
pub struct TranscriptCache {
    messages: Vec<TranscriptMessage>,
}

impl TranscriptCache {
    /// Replaces the cached transcript. Returns whether the content changed.
    pub fn replace(&mut self, mut messages: Vec<TranscriptMessage>) -> bool {
        sort_chronologically(&mut messages);
        if messages == self.messages {
            return false;
        }
        self.messages = messages;
        true
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Fetches the transcript on a fixed interval, independent of the stream.
pub struct HistoryPoller {
    client: ApiClient,
    channel_id: Option<String>,
    limit: u32,
    interval: Duration,
    timeout: Duration,
}

/// Floor for the poll interval; `tokio::time::interval` rejects zero.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

impl HistoryPoller {
    /// `interval` is raised to [`MIN_POLL_INTERVAL`] when shorter.
    pub fn new(
        client: ApiClient,
        channel_id: Option<String>,
        limit: u32,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            channel_id,
            limit,
            interval: interval.max(MIN_POLL_INTERVAL),
            timeout,
        }
    }

    /// Performs one fetch. Failures are logged and reported as `None`.
    pub async fn poll_once(&self) -> Option<Vec<TranscriptMessage>> {
        match self
            .client
            .fetch_history(self.channel_id.as_deref(), self.limit, self.timeout)
            .await
        {
            Ok(messages) => {
                debug!(count = messages.len(), "transcript polled");
                Some(messages)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    kind = %err.kind,
                    "transcript poll failed; keeping previous cache"
                );
                None
            }
        }
    }

    /// Polls until `cancel` fires, handing every successful result to
    /// `on_loaded`. The first poll happens immediately.
    pub async fn run<F>(&self, cancel: CancellationToken, mut on_loaded: F)
    where
        F: FnMut(Vec<TranscriptMessage>),
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let polled = tokio::select! {
                () = cancel.cancelled() => break,
                polled = self.poll_once() => polled,
            };
            if let Some(messages) = polled {
                on_loaded(messages);
            }
        }

        debug!("transcript poller stopped");
    }
}
