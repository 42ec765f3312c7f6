use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};
use crate::transcript::Utterance;

/// Length of the synthetic window used when a transcript has no timestamps
pub const EMPTY_TRANSCRIPT_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SessionError::not_found("session", s))
    }
}

/// Lifecycle state of an interview attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Interrupted,
    Analyzed,
    AnalysisFailed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Interrupted => "interrupted",
            SessionStatus::Analyzed => "analyzed",
            SessionStatus::AnalysisFailed => "analysis_failed",
        }
    }

    /// Whether `self → next` is a legal lifecycle step.
    ///
    /// Live sessions end as completed or interrupted; any ended session may
    /// be (re-)analyzed, successfully or not.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match self {
            InProgress => matches!(next, Completed | Interrupted),
            Completed | Interrupted | Analyzed | AnalysisFailed => {
                matches!(next, Analyzed | AnalysisFailed)
            }
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores attached by the analysis collaborator, each in 0..=100
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communication: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_solving: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall: Option<f64>,
}

impl Scores {
    pub fn validate(&self) -> SessionResult<()> {
        let named = [
            ("technical", self.technical),
            ("communication", self.communication),
            ("problem_solving", self.problem_solving),
            ("overall", self.overall),
        ];

        for (name, value) in named {
            if let Some(v) = value {
                if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                    return Err(SessionError::Validation(format!(
                        "score {} = {} is outside 0..=100",
                        name, v
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One interview attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSession {
    pub id: SessionId,
    pub meeting_code: String,
    pub candidate_id: Option<String>,
    pub job_id: Option<String>,
    pub interview_type: Option<String>,
    pub status: SessionStatus,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Seconds
    pub duration: Option<i64>,
    pub transcript: Vec<Utterance>,
    pub summary: Option<String>,
    pub key_points: Option<Vec<String>>,
    pub scores: Option<Scores>,
    pub feedback: Option<String>,
}

/// Field-level update; only fields that are set get written
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    pub transcript: Option<Vec<Utterance>>,
    pub summary: Option<String>,
    pub key_points: Option<Vec<String>>,
    pub scores: Option<Scores>,
    pub feedback: Option<String>,
}

impl SessionPatch {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply(self, session: &mut InterviewSession) {
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(ended_at) = self.ended_at {
            session.ended_at = Some(ended_at);
        }
        if let Some(duration) = self.duration {
            session.duration = Some(duration);
        }
        if let Some(transcript) = self.transcript {
            session.transcript = transcript;
        }
        if let Some(summary) = self.summary {
            session.summary = Some(summary);
        }
        if let Some(key_points) = self.key_points {
            session.key_points = Some(key_points);
        }
        if let Some(scores) = self.scores {
            session.scores = Some(scores);
        }
        if let Some(feedback) = self.feedback {
            session.feedback = Some(feedback);
        }
    }
}

/// Candidate record as far as this core needs it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub meeting_code: Option<String>,
    pub job_id: Option<String>,
    /// Scheduled self-serve slot, if any
    pub scheduled_at: Option<DateTime<Utc>>,
    pub applied_at: DateTime<Utc>,
    /// Aggregate score propagated from the latest analysis
    pub overall_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub meeting_code: Option<String>,
}

/// Seconds between two instants, rounded to the nearest second
pub fn duration_secs(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> i64 {
    let millis = (ended_at - started_at).num_milliseconds();
    (millis as f64 / 1000.0).round() as i64
}

/// Start, end and duration implied by a transcript sorted by timestamp.
///
/// An empty transcript gets a one-minute window ending at `now`.
pub fn transcript_bounds(
    transcript: &[Utterance],
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>, i64) {
    match (transcript.first(), transcript.last()) {
        (Some(first), Some(last)) => (
            first.timestamp,
            last.timestamp,
            duration_secs(first.timestamp, last.timestamp),
        ),
        _ => (
            now - Duration::seconds(EMPTY_TRANSCRIPT_SECS),
            now,
            EMPTY_TRANSCRIPT_SECS,
        ),
    }
}
