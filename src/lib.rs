pub mod access;
pub mod config;
pub mod error;
pub mod http;
pub mod nats;
pub mod session;
pub mod transcript;

pub use access::{AccessDecision, AccessWindow, DenyReason};
pub use config::Config;
pub use error::{SessionError, SessionResult};
pub use http::{create_router, AppState, SpeechFeed};
pub use nats::{NatsClient, NatsSpeechChannel, SttMessage};
pub use session::{
    AnalysisUpdate, Candidate, CompleteRequest, DocumentStore, InterviewSession, Job, MemoryStore,
    SaveDirectRequest, Scores, SessionId, SessionManager, SessionOutcome, SessionStatus,
    StartRequest,
};
pub use transcript::{
    ChannelAction, ChannelMode, LiveTranscript, LiveTranscriptHandle, SegmentId, Sender,
    SpeechChannel, SpeechEvent, TranscriptAggregator, TranscriptView, Utterance,
};
