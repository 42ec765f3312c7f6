use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::live::LiveTranscriptHandle;
use super::types::{Sender, SpeechEvent};
use crate::error::{SessionError, SessionResult};

/// What a channel should do after an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum ChannelAction {
    /// Reopen the channel; `attempt` counts consecutive failures so far
    Restart { attempt: u32 },
    /// Stop restarting for the rest of the session
    Degrade,
}

/// Consecutive-error accounting for one speech channel
#[derive(Debug, Clone)]
pub struct ChannelHealth {
    max_retries: u32,
    consecutive_errors: u32,
    degraded: bool,
}

impl ChannelHealth {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
            consecutive_errors: 0,
            degraded: false,
        }
    }

    /// Record a failure. Reaching `max_retries` consecutive failures is
    /// terminal; once degraded, every later call keeps answering `Degrade`.
    pub fn record_error(&mut self) -> ChannelAction {
        if self.degraded {
            return ChannelAction::Degrade;
        }

        self.consecutive_errors += 1;
        if self.consecutive_errors >= self.max_retries {
            self.degraded = true;
            ChannelAction::Degrade
        } else {
            ChannelAction::Restart {
                attempt: self.consecutive_errors,
            }
        }
    }

    /// A delivered event breaks the run of consecutive errors
    pub fn record_success(&mut self) {
        if !self.degraded {
            self.consecutive_errors = 0;
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// A restartable speech-to-text producer for one sender.
///
/// There is no end-of-stream signal: a closed receiver counts as a failure,
/// and the session ends only when the lifecycle manager finishes it.
#[async_trait]
pub trait SpeechChannel: Send {
    /// Open (or reopen) the channel
    async fn open(&mut self) -> SessionResult<mpsc::Receiver<SessionResult<SpeechEvent>>>;

    /// Which side of the conversation this channel carries
    fn source(&self) -> Sender;

    /// Channel name for logging
    fn name(&self) -> &str;
}

/// Pump a speech channel into a live transcript until the transcript ends
/// or the channel degrades.
pub async fn run_channel(
    mut channel: Box<dyn SpeechChannel>,
    live: LiveTranscriptHandle,
    backoff: Duration,
) {
    let source = channel.source();
    info!("Speech channel {} ({}) started", channel.name(), source);

    loop {
        let error = match channel.open().await {
            Ok(mut rx) => loop {
                tokio::select! {
                    _ = live.closed() => {
                        info!("Speech channel {} stopped: transcript finished", channel.name());
                        return;
                    }
                    item = rx.recv() => match item {
                        Some(Ok(event)) => {
                            if live.push(event).await.is_err() {
                                return;
                            }
                        }
                        Some(Err(e)) => break e,
                        None => {
                            break SessionError::Channel {
                                channel: source,
                                message: "stream closed".to_string(),
                            }
                        }
                    }
                }
            },
            Err(e) => e,
        };

        warn!("Speech channel {} failed: {}", channel.name(), error);

        match live.report_error(source, error.to_string()).await {
            Ok(ChannelAction::Restart { attempt }) => {
                info!(
                    "Restarting speech channel {} (attempt {})",
                    channel.name(),
                    attempt
                );
                tokio::select! {
                    _ = live.closed() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
            Ok(ChannelAction::Degrade) => {
                warn!(
                    "Speech channel {} gave up after repeated failures",
                    channel.name()
                );
                return;
            }
            Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_third_consecutive_error_degrades() {
        let mut health = ChannelHealth::new(3);
        assert_eq!(health.record_error(), ChannelAction::Restart { attempt: 1 });
        assert_eq!(health.record_error(), ChannelAction::Restart { attempt: 2 });
        assert_eq!(health.record_error(), ChannelAction::Degrade);
        assert!(health.is_degraded());

        // Terminal: success does not revive the channel
        health.record_success();
        assert_eq!(health.record_error(), ChannelAction::Degrade);
    }

    #[test]
    fn test_success_resets_count() {
        let mut health = ChannelHealth::new(3);
        health.record_error();
        health.record_error();
        health.record_success();
        assert_eq!(health.consecutive_errors(), 0);
        assert_eq!(health.record_error(), ChannelAction::Restart { attempt: 1 });
    }
}
