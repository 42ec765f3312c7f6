use crate::nats::NatsClient;
use crate::session::SessionManager;
use std::sync::Arc;

/// STT feed wiring used to attach speech channels to new sessions
#[derive(Clone)]
pub struct SpeechFeed {
    pub client: NatsClient,
    pub subject: String,
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,

    /// When set, new sessions get candidate and agent NATS channels
    pub speech_feed: Option<SpeechFeed>,
}

impl AppState {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self {
            manager,
            speech_feed: None,
        }
    }

    pub fn with_speech_feed(mut self, feed: SpeechFeed) -> Self {
        self.speech_feed = Some(feed);
        self
    }
}
