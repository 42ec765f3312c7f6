//! Live transcript aggregation
//!
//! This module merges the candidate microphone and AI interviewer speech
//! streams into one ordered, de-duplicated transcript:
//! - `TranscriptAggregator`: interim map per channel + finalized sequence
//! - `ChannelHealth`: bounded restarts, then degraded mode
//! - `LiveTranscript`: single-writer task serializing updates from both channels
//! - `SpeechChannel`: restartable speech-to-text producer

mod aggregator;
mod channel;
mod live;
mod types;

pub use aggregator::{ChannelMode, TranscriptAggregator};
pub use channel::{run_channel, ChannelAction, ChannelHealth, SpeechChannel};
pub use live::{LiveTranscript, LiveTranscriptHandle, TranscriptSink, TranscriptView};
pub use types::{
    merge_final, normalize_transcript, sort_by_timestamp, SegmentId, Sender, SpeechEvent,
    Utterance,
};
