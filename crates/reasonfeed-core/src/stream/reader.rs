//! Long-lived reasoning stream connection.
//!
//! [`StreamReader::run`] keeps one SSE connection open, hands every frame's
//! data to the caller, and reconnects after a fixed delay whenever the
//! connection fails or the server closes it. The live flag is true exactly
//! while a connection is established.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use eventsource_stream::{EventStream, Eventsource};
use futures_util::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::auth::{AuthProvider, with_auth};
use crate::error::{TransportError, TransportErrorKind, classify_reqwest_error};

/// Boxed stream of SSE data payloads.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Splits a byte stream into SSE frames and yields each frame's data.
///
/// Partial lines are buffered across chunks; frames without data (bare
/// `event:` or comment lines) are skipped. Invalid UTF-8 is replaced with
/// U+FFFD, so a corrupt frame reaches the decoder instead of ending the
/// connection.
pub struct SseFrames<S> {
    inner: EventStream<LossyUtf8<S>>,
}

impl<S, E> SseFrames<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            inner: LossyUtf8::new(stream).eventsource(),
        }
    }
}

impl<S, E> Stream for SseFrames<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = Result<String, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let inner = Pin::new(&mut self.inner);
            match inner.poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if event.data.trim().is_empty() {
                        continue;
                    }
                    return Poll::Ready(Some(Ok(event.data)));
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(TransportError::new(
                        TransportErrorKind::Network,
                        format!("SSE stream error: {e}"),
                    ))));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Byte stream adapter that only ever yields valid UTF-8.
///
/// `eventsource-stream` keeps undecodable bytes buffered until the
/// connection ends, which stalls every later frame. Sequences split across
/// chunks are carried into the next chunk; anything else invalid becomes
/// U+FFFD.
struct LossyUtf8<S> {
    inner: S,
    carry: Vec<u8>,
    done: bool,
}

impl<S> LossyUtf8<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            carry: Vec::new(),
            done: false,
        }
    }
}

impl<S, E> Stream for LossyUtf8<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if self.carry.is_empty() && std::str::from_utf8(&chunk).is_ok() {
                    return Poll::Ready(Some(Ok(chunk)));
                }
                let mut buf = std::mem::take(&mut self.carry);
                buf.extend_from_slice(&chunk);
                let (text, carry) = repair_utf8(&buf);
                self.carry = carry;
                Poll::Ready(Some(Ok(Bytes::from(text))))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => {
                self.done = true;
                if self.carry.is_empty() {
                    return Poll::Ready(None);
                }
                let rest = String::from_utf8_lossy(&self.carry).into_owned();
                self.carry.clear();
                Poll::Ready(Some(Ok(Bytes::from(rest))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Splits `buf` into valid UTF-8 and an incomplete trailing sequence.
fn repair_utf8(buf: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut out = Vec::with_capacity(buf.len());
    let mut rest = buf;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.extend_from_slice(valid.as_bytes());
                return (out, Vec::new());
            }
            Err(err) => {
                let (valid, after) = rest.split_at(err.valid_up_to());
                out.extend_from_slice(valid);
                match err.error_len() {
                    Some(len) => {
                        out.extend_from_slice("\u{FFFD}".as_bytes());
                        rest = &after[len..];
                    }
                    None => return (out, after.to_vec()),
                }
            }
        }
    }
}

/// Floor for the reconnect delay so a failing server is not hammered.
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(10);

/// Reconnecting reader for the reasoning stream.
pub struct StreamReader {
    http: reqwest::Client,
    url: String,
    auth: Arc<dyn AuthProvider>,
    reconnect_delay: Duration,
    live: watch::Sender<bool>,
}

impl StreamReader {
    /// `reconnect_delay` is raised to [`MIN_RECONNECT_DELAY`] when shorter.
    pub fn new(
        http: reqwest::Client,
        url: impl Into<String>,
        auth: Arc<dyn AuthProvider>,
        reconnect_delay: Duration,
    ) -> Self {
        let (live, _) = watch::channel(false);
        Self {
            http,
            url: url.into(),
            auth,
            reconnect_delay: reconnect_delay.max(MIN_RECONNECT_DELAY),
            live,
        }
    }

    /// Subscribes to the live flag.
    pub fn live(&self) -> watch::Receiver<bool> {
        self.live.subscribe()
    }

    pub fn is_live(&self) -> bool {
        *self.live.borrow()
    }

    /// Opens one connection.
    ///
    /// No read timeout is applied: the server holds the stream open
    /// indefinitely and sends keepalives on its own schedule.
    ///
    /// # Errors
    /// Returns a `TransportError` when the request fails or the server
    /// answers with a non-success status.
    pub async fn connect(&self) -> Result<FrameStream, TransportError> {
        let builder = self
            .http
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        let response = with_auth(builder, self.auth.as_ref())
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::http_status(status.as_u16(), &body));
        }

        Ok(Box::pin(SseFrames::new(response.bytes_stream())))
    }

    /// Reads until `cancel` fires, passing each frame's data to `on_data`.
    ///
    /// Connection failures, mid-stream errors, and clean server closes all
    /// lead to the same fixed-delay reconnect; the reader never gives up.
    pub async fn run<F>(&self, cancel: CancellationToken, mut on_data: F)
    where
        F: FnMut(String),
    {
        'session: loop {
            let connected = tokio::select! {
                () = cancel.cancelled() => break 'session,
                connected = self.connect() => connected,
            };

            match connected {
                Ok(mut frames) => {
                    self.set_live(true);
                    info!(url = %self.url, "reasoning stream connected");

                    loop {
                        let next = tokio::select! {
                            () = cancel.cancelled() => break 'session,
                            next = frames.next() => next,
                        };
                        match next {
                            Some(Ok(data)) => on_data(data),
                            Some(Err(err)) => {
                                warn!(error = %err, "reasoning stream interrupted");
                                break;
                            }
                            None => {
                                info!("reasoning stream closed by server");
                                break;
                            }
                        }
                    }

                    self.set_live(false);
                }
                Err(err) => {
                    warn!(error = %err, kind = %err.kind, "reasoning stream connect failed");
                }
            }

            debug!(delay_ms = self.reconnect_delay.as_millis(), "reconnecting reasoning stream");
            tokio::select! {
                () = cancel.cancelled() => break 'session,
                () = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.set_live(false);
        debug!("reasoning stream reader stopped");
    }

    fn set_live(&self, live: bool) {
        self.live.send_if_modified(|current| {
            if *current == live {
                return false;
            }
            *current = live;
            true
        });
    }
}
