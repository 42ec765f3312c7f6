use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::types::{merge_final, sort_by_timestamp, SegmentId, Sender, SpeechEvent, Utterance};
use crate::error::{SessionError, SessionResult};

/// How a channel is currently feeding the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// Speech-to-text events are accepted
    Live,
    /// Candidate channel gave up; typed text stands in for speech
    ManualEntry,
    /// Agent channel gave up; no further agent speech is captured
    Lost,
}

#[derive(Debug)]
struct InterimEntry {
    utterance: Utterance,
    /// Arrival order of the segment, kept across in-place updates
    seq: u64,
}

/// Merges candidate and agent speech streams into one ordered transcript.
///
/// Interim guesses live in one map per channel keyed by segment id and are
/// updated in place. Finals leave the interim map and merge into the
/// finalized sequence, where an identical `(sender, timestamp)` counts as a
/// correction and replaces the earlier entry.
#[derive(Debug)]
pub struct TranscriptAggregator {
    candidate_interim: HashMap<SegmentId, InterimEntry>,
    agent_interim: HashMap<SegmentId, InterimEntry>,
    /// Arrival order; corrections replace in place
    finalized: Vec<Utterance>,
    candidate_mode: ChannelMode,
    agent_mode: ChannelMode,
    next_seq: u64,
}

impl Default for TranscriptAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self {
            candidate_interim: HashMap::new(),
            agent_interim: HashMap::new(),
            finalized: Vec::new(),
            candidate_mode: ChannelMode::Live,
            agent_mode: ChannelMode::Live,
            next_seq: 0,
        }
    }

    pub fn mode(&self, source: Sender) -> ChannelMode {
        match source {
            Sender::Candidate => self.candidate_mode,
            Sender::Agent => self.agent_mode,
        }
    }

    /// Apply a speech event. Returns `true` when the finalized sequence changed.
    pub fn apply(&mut self, event: SpeechEvent) -> bool {
        if self.mode(event.source) != ChannelMode::Live {
            debug!(
                "Dropping {} event {} from inactive channel",
                event.source, event.segment_id
            );
            return false;
        }

        let utterance = event.to_utterance();

        if event.is_final {
            self.interim_mut(event.source).remove(&event.segment_id);
            merge_final(&mut self.finalized, utterance);
            return true;
        }

        let seq = self.next_seq;
        let interim = self.interim_mut(event.source);
        if let Some(entry) = interim.get_mut(&event.segment_id) {
            entry.utterance = utterance;
        } else {
            interim.insert(event.segment_id, InterimEntry { utterance, seq });
            self.next_seq += 1;
        }
        false
    }

    /// Accept typed candidate text as a final utterance. Only valid once the
    /// candidate channel has degraded to manual entry.
    pub fn submit_manual(&mut self, text: &str, timestamp: DateTime<Utc>) -> SessionResult<()> {
        if self.candidate_mode != ChannelMode::ManualEntry {
            return Err(SessionError::Validation(
                "manual entry is only accepted after the candidate channel has failed".to_string(),
            ));
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::Validation("manual entry is empty".to_string()));
        }

        merge_final(
            &mut self.finalized,
            Utterance::new(Sender::Candidate, text, timestamp),
        );
        Ok(())
    }

    /// Switch a channel out of live mode for the rest of the session.
    ///
    /// The candidate side falls back to manual entry; the agent side is lost.
    /// Pending interim guesses from that channel are dropped.
    pub fn degrade(&mut self, source: Sender) -> ChannelMode {
        let mode = match source {
            Sender::Candidate => ChannelMode::ManualEntry,
            Sender::Agent => ChannelMode::Lost,
        };
        match source {
            Sender::Candidate => self.candidate_mode = mode,
            Sender::Agent => self.agent_mode = mode,
        }
        self.interim_mut(source).clear();
        mode
    }

    /// Finalized utterances sorted by timestamp, ties in insertion order
    pub fn finalized(&self) -> Vec<Utterance> {
        let mut sorted = self.finalized.clone();
        sort_by_timestamp(&mut sorted);
        sorted
    }

    /// Current best-effort display: finalized sorted by timestamp, then
    /// pending interim guesses (candidate first, then agent, by arrival).
    pub fn snapshot(&self) -> Vec<Utterance> {
        let mut out = self.finalized();
        for source in Sender::ALL {
            let mut pending: Vec<&InterimEntry> = self.interim(source).values().collect();
            pending.sort_by_key(|e| e.seq);
            out.extend(pending.into_iter().map(|e| e.utterance.clone()));
        }
        out
    }

    pub fn pending_interim(&self) -> usize {
        self.candidate_interim.len() + self.agent_interim.len()
    }

    /// End of session: unfinalized interim guesses are discarded.
    pub fn finish(self) -> Vec<Utterance> {
        if self.pending_interim() > 0 {
            debug!(
                "Discarding {} unfinalized interim segments at session end",
                self.pending_interim()
            );
        }
        self.finalized()
    }

    fn interim(&self, source: Sender) -> &HashMap<SegmentId, InterimEntry> {
        match source {
            Sender::Candidate => &self.candidate_interim,
            Sender::Agent => &self.agent_interim,
        }
    }

    fn interim_mut(&mut self, source: Sender) -> &mut HashMap<SegmentId, InterimEntry> {
        match source {
            Sender::Candidate => &mut self.candidate_interim,
            Sender::Agent => &mut self.agent_interim,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_interim_updates_in_place() {
        let mut agg = TranscriptAggregator::new();
        agg.apply(SpeechEvent::interim(Sender::Candidate, "s1", "hel", at(1)));
        agg.apply(SpeechEvent::interim(Sender::Candidate, "s1", "hello", at(1)));

        let view = agg.snapshot();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].text, "hello");
    }

    #[test]
    fn test_final_removes_interim() {
        let mut agg = TranscriptAggregator::new();
        agg.apply(SpeechEvent::interim(Sender::Agent, "a1", "tell me", at(2)));
        assert!(agg.apply(SpeechEvent::final_segment(
            Sender::Agent,
            "a1",
            "Tell me about yourself.",
            at(2)
        )));

        assert_eq!(agg.pending_interim(), 0);
        assert_eq!(agg.finalized().len(), 1);
    }

    #[test]
    fn test_interim_follows_finalized_in_source_order() {
        let mut agg = TranscriptAggregator::new();
        agg.apply(SpeechEvent::interim(Sender::Agent, "a2", "next", at(1)));
        agg.apply(SpeechEvent::interim(Sender::Candidate, "c2", "so", at(9)));
        agg.apply(SpeechEvent::final_segment(Sender::Candidate, "c1", "Hi", at(5)));

        let senders: Vec<Sender> = agg.snapshot().iter().map(|u| u.sender).collect();
        assert_eq!(senders, vec![Sender::Candidate, Sender::Candidate, Sender::Agent]);
    }

    #[test]
    fn test_same_timestamp_different_sender_is_kept() {
        let mut agg = TranscriptAggregator::new();
        agg.apply(SpeechEvent::final_segment(Sender::Candidate, "c1", "yes", at(3)));
        agg.apply(SpeechEvent::final_segment(Sender::Agent, "a1", "ok", at(3)));

        let out = agg.finish();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].sender, Sender::Candidate);
    }

    #[test]
    fn test_manual_entry_requires_degraded_channel() {
        let mut agg = TranscriptAggregator::new();
        assert!(agg.submit_manual("typed", at(1)).is_err());

        assert_eq!(agg.degrade(Sender::Candidate), ChannelMode::ManualEntry);
        agg.submit_manual("typed", at(1)).unwrap();
        assert!(agg.submit_manual("   ", at(2)).is_err());
        assert_eq!(agg.finalized()[0].text, "typed");
    }

    #[test]
    fn test_lost_agent_channel_drops_events() {
        let mut agg = TranscriptAggregator::new();
        agg.apply(SpeechEvent::interim(Sender::Agent, "a1", "pending", at(1)));
        assert_eq!(agg.degrade(Sender::Agent), ChannelMode::Lost);
        assert!(!agg.apply(SpeechEvent::final_segment(Sender::Agent, "a2", "late", at(2))));
        assert!(agg.snapshot().is_empty());
    }
}
