use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::aggregator::{ChannelMode, TranscriptAggregator};
use super::channel::{run_channel, ChannelAction, ChannelHealth, SpeechChannel};
use super::types::{Sender, SpeechEvent, Utterance};
use crate::config::TranscriptConfig;
use crate::error::{SessionError, SessionResult};

/// Receives the finalized transcript each time it changes
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn checkpoint(&self, finalized: Vec<Utterance>) -> SessionResult<()>;
}

/// Current display state of a live transcript
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptView {
    pub utterances: Vec<Utterance>,
    pub candidate_mode: ChannelMode,
    pub agent_mode: ChannelMode,
}

enum Command {
    Event(SpeechEvent),
    ChannelError {
        source: Sender,
        message: String,
        reply: oneshot::Sender<ChannelAction>,
    },
    Manual {
        text: String,
        reply: oneshot::Sender<SessionResult<()>>,
    },
    Snapshot(oneshot::Sender<TranscriptView>),
    Finish(oneshot::Sender<Vec<Utterance>>),
}

/// Cloneable handle to a running live transcript
#[derive(Clone)]
pub struct LiveTranscriptHandle {
    tx: mpsc::Sender<Command>,
    retry_backoff: Duration,
}

/// Spawns the single-writer task that owns a session's aggregator.
///
/// Both channels and all external callers talk to it through one command
/// queue, so merges are serialized no matter which channel triggered them.
pub struct LiveTranscript;

impl LiveTranscript {
    pub fn spawn(
        config: &TranscriptConfig,
        sink: Option<Arc<dyn TranscriptSink>>,
    ) -> LiveTranscriptHandle {
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        let (checkpoint_tx, checkpoint_rx) = watch::channel(Vec::new());

        if let Some(sink) = sink {
            tokio::spawn(checkpoint_loop(sink, checkpoint_rx));
        }

        tokio::spawn(merge_loop(rx, checkpoint_tx, config.max_channel_retries));

        LiveTranscriptHandle {
            tx,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

async fn merge_loop(
    mut rx: mpsc::Receiver<Command>,
    checkpoint: watch::Sender<Vec<Utterance>>,
    max_retries: u32,
) {
    let mut aggregator = TranscriptAggregator::new();
    let mut candidate_health = ChannelHealth::new(max_retries);
    let mut agent_health = ChannelHealth::new(max_retries);

    debug!("Live transcript task started");

    while let Some(command) = rx.recv().await {
        match command {
            Command::Event(event) => {
                let health = match event.source {
                    Sender::Candidate => &mut candidate_health,
                    Sender::Agent => &mut agent_health,
                };
                health.record_success();

                debug!(
                    "{} segment {} (final={}): {}",
                    event.source, event.segment_id, event.is_final, event.text
                );
                if aggregator.apply(event) {
                    checkpoint.send_replace(aggregator.finalized());
                }
            }
            Command::ChannelError {
                source,
                message,
                reply,
            } => {
                let health = match source {
                    Sender::Candidate => &mut candidate_health,
                    Sender::Agent => &mut agent_health,
                };
                let action = health.record_error();
                warn!(
                    "{} channel error ({} consecutive): {}",
                    source,
                    health.consecutive_errors(),
                    message
                );

                if action == ChannelAction::Degrade && aggregator.mode(source) == ChannelMode::Live {
                    let mode = aggregator.degrade(source);
                    warn!("{} channel switched to {:?} for the rest of the session", source, mode);
                }
                let _ = reply.send(action);
            }
            Command::Manual { text, reply } => {
                let result = aggregator.submit_manual(&text, Utc::now());
                if result.is_ok() {
                    checkpoint.send_replace(aggregator.finalized());
                }
                let _ = reply.send(result);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(TranscriptView {
                    utterances: aggregator.snapshot(),
                    candidate_mode: aggregator.mode(Sender::Candidate),
                    agent_mode: aggregator.mode(Sender::Agent),
                });
            }
            Command::Finish(reply) => {
                let finalized = aggregator.finish();
                info!("Live transcript finished with {} utterances", finalized.len());
                let _ = reply.send(finalized);
                return;
            }
        }
    }

    debug!("Live transcript task stopped: all handles dropped");
}

async fn checkpoint_loop(sink: Arc<dyn TranscriptSink>, mut rx: watch::Receiver<Vec<Utterance>>) {
    while rx.changed().await.is_ok() {
        let finalized = rx.borrow_and_update().clone();
        if let Err(e) = sink.checkpoint(finalized).await {
            error!("Failed to checkpoint transcript: {}", e);
        }
    }
}

impl LiveTranscriptHandle {
    /// Feed a speech event from either channel
    pub async fn push(&self, event: SpeechEvent) -> SessionResult<()> {
        self.send(Command::Event(event)).await
    }

    /// Report a channel failure; the answer says whether to restart
    pub async fn report_error(
        &self,
        source: Sender,
        message: impl Into<String>,
    ) -> SessionResult<ChannelAction> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ChannelError {
            source,
            message: message.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::TranscriptClosed)
    }

    /// Typed candidate text, accepted only in manual-entry mode
    pub async fn submit_manual(&self, text: impl Into<String>) -> SessionResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Manual {
            text: text.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::TranscriptClosed)?
    }

    pub async fn snapshot(&self) -> SessionResult<TranscriptView> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await.map_err(|_| SessionError::TranscriptClosed)
    }

    /// Stop the transcript and return its finalized utterances
    pub async fn finish(&self) -> SessionResult<Vec<Utterance>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Finish(reply)).await?;
        rx.await.map_err(|_| SessionError::TranscriptClosed)
    }

    /// Attach a speech channel; it is restarted on failure until it degrades
    pub fn attach(&self, channel: Box<dyn SpeechChannel>) -> JoinHandle<()> {
        tokio::spawn(run_channel(channel, self.clone(), self.retry_backoff))
    }

    /// Resolves once the transcript task has stopped
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, command: Command) -> SessionResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SessionError::TranscriptClosed)
    }
}
