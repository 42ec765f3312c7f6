use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::client::NatsClient;
use super::messages::SttMessage;
use crate::error::{SessionError, SessionResult};
use crate::transcript::{SegmentId, Sender, SpeechChannel, SpeechEvent};

/// One side of a session's speech, read from the STT service over NATS
pub struct NatsSpeechChannel {
    client: NatsClient,
    subject: String,
    session_id: String,
    source: Sender,
    name: String,
}

impl NatsSpeechChannel {
    pub fn new(client: NatsClient, subject: &str, session_id: String, source: Sender) -> Self {
        let name = format!("nats:{}:{}", session_id, source);
        Self {
            client,
            subject: subject.to_string(),
            session_id,
            source,
            name,
        }
    }
}

/// Map an STT message onto a speech event for `source` in `session_id`.
/// Returns `None` for messages meant for another session or channel.
pub fn to_speech_event(
    msg: SttMessage,
    session_id: &str,
    source: Sender,
) -> Option<SpeechEvent> {
    if msg.session_id != session_id || msg.source != source {
        return None;
    }

    let timestamp = match DateTime::parse_from_rfc3339(&msg.timestamp) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(e) => {
            warn!("Bad timestamp {:?} on segment {}: {}", msg.timestamp, msg.segment_id, e);
            Utc::now()
        }
    };

    Some(SpeechEvent {
        source,
        segment_id: SegmentId(msg.segment_id),
        text: msg.text,
        is_final: !msg.partial,
        timestamp,
    })
}

/// Forward this session's events from a stream of STT payloads.
///
/// Returns when the stream ends or the receiving side is dropped, whichever
/// comes first; payloads for other sessions never reach `tx`.
pub async fn forward_transcripts<S, P>(
    mut payloads: S,
    tx: mpsc::Sender<SessionResult<SpeechEvent>>,
    session_id: &str,
    source: Sender,
) where
    S: Stream<Item = P> + Unpin,
    P: AsRef<[u8]>,
{
    loop {
        let payload = tokio::select! {
            _ = tx.closed() => break,
            payload = payloads.next() => match payload {
                Some(payload) => payload,
                None => break,
            },
        };

        let parsed = match serde_json::from_slice::<SttMessage>(payload.as_ref()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Failed to parse transcript message: {}", e);
                continue;
            }
        };

        if let Some(event) = to_speech_event(parsed, session_id, source) {
            if tx.send(Ok(event)).await.is_err() {
                break;
            }
        }
    }
}

#[async_trait]
impl SpeechChannel for NatsSpeechChannel {
    async fn open(&mut self) -> SessionResult<mpsc::Receiver<SessionResult<SpeechEvent>>> {
        let mut subscriber = self
            .client
            .subscribe_transcripts(&self.subject)
            .await
            .map_err(|e| SessionError::Channel {
                channel: self.source,
                message: format!("{:#}", e),
            })?;

        let (tx, rx) = mpsc::channel(100);
        let session_id = self.session_id.clone();
        let source = self.source;

        tokio::spawn(async move {
            forward_transcripts(
                subscriber.by_ref().map(|msg| msg.payload),
                tx,
                &session_id,
                source,
            )
            .await;

            if let Err(e) = subscriber.unsubscribe().await {
                debug!("Unsubscribe for {} {} failed: {}", session_id, source, e);
            }
            info!("Transcript subscription for {} {} ended", session_id, source);
        });

        Ok(rx)
    }

    fn source(&self) -> Sender {
        self.source
    }

    fn name(&self) -> &str {
        &self.name
    }
}
