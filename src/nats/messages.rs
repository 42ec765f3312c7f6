use serde::{Deserialize, Serialize};

use crate::transcript::Sender;

/// Speech-to-text result published by the STT service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttMessage {
    pub session_id: String,
    /// Which channel produced the text (candidate microphone or agent voice)
    pub source: Sender,
    pub segment_id: String,
    pub text: String,
    pub partial: bool,
    /// RFC3339 start time of the segment
    pub timestamp: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}
