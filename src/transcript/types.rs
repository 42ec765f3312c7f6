use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who spoke an utterance; also identifies the speech channel it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// Candidate microphone
    Candidate,
    /// AI interviewer voice
    Agent,
}

impl Sender {
    pub const ALL: [Sender; 2] = [Sender::Candidate, Sender::Agent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::Candidate => "candidate",
            Sender::Agent => "agent",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped unit of speech attributed to a sender.
///
/// Serializes to the canonical storage shape
/// `{ "sender": "...", "text": "...", "timestamp": "<RFC 3339>" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Utterance {
    pub fn new(sender: Sender, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp,
        }
    }
}

/// Identifier an STT provider assigns to a segment; interim guesses and the
/// final result for the same stretch of speech share it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub String);

impl SegmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A speech-to-text event from one of the two channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechEvent {
    pub source: Sender,
    pub segment_id: SegmentId,
    pub text: String,
    pub is_final: bool,
    /// Start time of the segment as reported by the provider
    pub timestamp: DateTime<Utc>,
}

impl SpeechEvent {
    pub fn interim(
        source: Sender,
        segment_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            segment_id: SegmentId::new(segment_id),
            text: text.into(),
            is_final: false,
            timestamp,
        }
    }

    pub fn final_segment(
        source: Sender,
        segment_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            is_final: true,
            ..Self::interim(source, segment_id, text, timestamp)
        }
    }

    pub fn to_utterance(&self) -> Utterance {
        Utterance::new(self.source, self.text.clone(), self.timestamp)
    }
}

/// Sort utterances by timestamp; equal timestamps keep their relative order.
pub fn sort_by_timestamp(utterances: &mut [Utterance]) {
    utterances.sort_by_key(|u| u.timestamp);
}

/// Merge a final utterance into `finalized`.
///
/// An entry from the same sender at the same timestamp is a correction and
/// is replaced in place, so the latest text wins and keeps the original
/// arrival slot.
pub fn merge_final(finalized: &mut Vec<Utterance>, utterance: Utterance) {
    let existing = finalized
        .iter_mut()
        .find(|u| u.sender == utterance.sender && u.timestamp == utterance.timestamp);

    match existing {
        Some(entry) => *entry = utterance,
        None => finalized.push(utterance),
    }
}

/// Stored form of a transcript: corrections collapsed, sorted by timestamp
pub fn normalize_transcript(utterances: Vec<Utterance>) -> Vec<Utterance> {
    let mut merged = Vec::with_capacity(utterances.len());
    for utterance in utterances {
        merge_final(&mut merged, utterance);
    }
    sort_by_timestamp(&mut merged);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_normalize_collapses_corrections() {
        let out = normalize_transcript(vec![
            Utterance::new(Sender::Candidate, "first", at(5)),
            Utterance::new(Sender::Agent, "question", at(2)),
            Utterance::new(Sender::Agent, "same instant", at(5)),
            Utterance::new(Sender::Candidate, "corrected", at(5)),
        ]);

        let texts: Vec<&str> = out.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["question", "corrected", "same instant"]);
    }
}
