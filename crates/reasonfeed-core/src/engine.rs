//! Wires the stream reader, history poller, and view merger together.
//!
//! The reasoning tree, transcript cache, and merger live in a single state
//! task. The reader and poller loops only send it [`EngineInput`]s, and
//! consumers only see the published view and live flag.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, AuthProvider, STREAM_PATH, StaticToken, Submission};
use crate::config::Config;
use crate::correlator::Correlator;
use crate::error::SubmitError;
use crate::history::{HistoryPoller, TranscriptCache, TranscriptMessage};
use crate::stream::decoder::{Decoded, ReasoningEvent, decode_data};
use crate::stream::reader::StreamReader;
use crate::tree::ReasoningTree;
use crate::view::{ViewItem, ViewMerger};

/// Published presentation sequence.
pub type View = Arc<Vec<ViewItem>>;

/// Messages accepted by the state task.
#[derive(Debug)]
enum EngineInput {
    Events(Vec<ReasoningEvent>),
    Transcript(Vec<TranscriptMessage>),
    /// A new correlation was recorded
    Correlated,
    Reset,
}

/// Submits messages on behalf of a running engine.
///
/// Cheap to clone, so each submission can run on its own task.
#[derive(Clone)]
pub struct Submitter {
    client: ApiClient,
    correlator: Correlator,
    inbox: mpsc::UnboundedSender<EngineInput>,
    timeout: Duration,
}

impl Submitter {
    /// Submits a user message and links it to the server task on acceptance.
    ///
    /// # Errors
    /// Returns `SubmitError::Rejected` when the server declined the message
    /// and `SubmitError::Transport` when the round trip failed. Neither is
    /// retried.
    pub async fn submit(&self, message: &str) -> Result<Submission, SubmitError> {
        let submission = self.client.submit_message(message, self.timeout).await?;

        match &submission.task_id {
            Some(task_id) => {
                if self.correlator.record(&submission.message_id, task_id) {
                    let _ = self.inbox.send(EngineInput::Correlated);
                }
                info!(message_id = %submission.message_id, task_id = %task_id, "message accepted");
            }
            None => {
                info!(message_id = %submission.message_id, "message accepted without task");
            }
        }
        Ok(submission)
    }
}

/// Running engine handle.
///
/// Dropping the handle without calling [`Engine::shutdown`] leaves the
/// background tasks running until the runtime stops.
pub struct Engine {
    submitter: Submitter,
    view: watch::Receiver<View>,
    live: watch::Receiver<bool>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Starts the engine using the token resolved from `config`.
    ///
    /// # Errors
    /// See [`Engine::start`].
    pub fn from_config(config: &Config) -> Result<Self> {
        let auth = Arc::new(StaticToken::new(config.resolved_token()));
        Self::start(config, auth)
    }

    /// Spawns the reader, poller, and state tasks on the current runtime.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn start(config: &Config, auth: Arc<dyn AuthProvider>) -> Result<Self> {
        let client = ApiClient::from_config(config, Arc::clone(&auth))?;
        let base_url = client.base_url().to_string();
        let correlator = Correlator::new();
        let cancel = CancellationToken::new();
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        let (view_tx, view) = watch::channel(View::default());

        let reader = StreamReader::new(
            client.http().clone(),
            client.url(STREAM_PATH),
            auth,
            config.reconnect_delay(),
        );
        let live = reader.live();

        let poller = HistoryPoller::new(
            client.clone(),
            config.channel_id.clone(),
            config.history_limit(),
            config.poll_interval(),
            config.request_timeout(),
        );

        let tasks = vec![
            spawn_reader(reader, inbox.clone(), cancel.clone()),
            spawn_poller(poller, inbox.clone(), cancel.clone()),
            tokio::spawn(run_state(
                inbox_rx,
                correlator.clone(),
                view_tx,
                cancel.clone(),
            )),
        ];

        info!(base_url = %base_url, "engine started");
        Ok(Self {
            submitter: Submitter {
                client,
                correlator,
                inbox,
                timeout: config.submit_timeout(),
            },
            view,
            live,
            cancel,
            tasks,
        })
    }

    /// Subscribes to the presentation sequence.
    pub fn view(&self) -> watch::Receiver<View> {
        self.view.clone()
    }

    /// Subscribes to the stream connection flag.
    pub fn live(&self) -> watch::Receiver<bool> {
        self.live.clone()
    }

    pub fn correlator(&self) -> &Correlator {
        &self.submitter.correlator
    }

    /// Handle for submitting from other tasks.
    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// See [`Submitter::submit`].
    ///
    /// # Errors
    /// See [`Submitter::submit`].
    pub async fn submit(&self, message: &str) -> Result<Submission, SubmitError> {
        self.submitter.submit(message).await
    }

    /// Clears the reasoning tree.
    pub fn reset(&self) {
        let _ = self.submitter.inbox.send(EngineInput::Reset);
    }

    /// Stops every background task. In-flight requests are dropped.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "engine task ended abnormally");
            }
        }
        debug!("engine stopped");
    }
}

fn spawn_reader(
    reader: StreamReader,
    inbox: mpsc::UnboundedSender<EngineInput>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        reader
            .run(cancel, |data| match decode_data(&data) {
                Ok(Decoded::Events(events)) if !events.is_empty() => {
                    debug!(count = events.len(), "reasoning batch received");
                    let _ = inbox.send(EngineInput::Events(events));
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "dropping undecodable stream frame"),
            })
            .await;
    })
}

fn spawn_poller(
    poller: HistoryPoller,
    inbox: mpsc::UnboundedSender<EngineInput>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        poller
            .run(cancel, |messages| {
                let _ = inbox.send(EngineInput::Transcript(messages));
            })
            .await;
    })
}

async fn run_state(
    mut inbox: mpsc::UnboundedReceiver<EngineInput>,
    correlator: Correlator,
    view: watch::Sender<View>,
    cancel: CancellationToken,
) {
    let mut tree = ReasoningTree::new();
    let mut cache = TranscriptCache::default();
    let mut merger = ViewMerger::new();

    loop {
        let input = tokio::select! {
            () = cancel.cancelled() => break,
            input = inbox.recv() => match input {
                Some(input) => input,
                None => break,
            },
        };

        let changed = match input {
            EngineInput::Events(events) => events
                .iter()
                .fold(false, |changed, event| tree.apply(event) | changed),
            EngineInput::Transcript(messages) => cache.replace(messages),
            EngineInput::Correlated => true,
            EngineInput::Reset => tree.clear(),
        };
        if !changed {
            continue;
        }

        if let Some(items) = merger.refresh(cache.messages(), &tree, &correlator) {
            debug!(items = items.len(), "view updated");
            view.send_replace(Arc::new(items.to_vec()));
        }
    }
}
