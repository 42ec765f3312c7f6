pub mod channel;
pub mod client;
pub mod messages;

pub use channel::{forward_transcripts, to_speech_event, NatsSpeechChannel};
pub use client::NatsClient;
pub use messages::SttMessage;
