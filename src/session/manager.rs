use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::model::{
    duration_secs, transcript_bounds, Candidate, InterviewSession, Job, Scores, SessionId,
    SessionPatch, SessionStatus,
};
use super::store::DocumentStore;
use crate::access::{AccessDecision, AccessWindow};
use crate::config::TranscriptConfig;
use crate::error::{SessionError, SessionResult};
use crate::transcript::{
    normalize_transcript, LiveTranscript, LiveTranscriptHandle, TranscriptSink, Utterance,
};

#[derive(Debug, Clone, Deserialize)]
pub struct StartRequest {
    pub meeting_code: String,
    pub candidate_id: Option<String>,
    pub job_id: Option<String>,
    pub interview_type: Option<String>,
    pub title: Option<String>,
    /// Interviewer-started sessions are not held to the candidate's window
    #[serde(default)]
    pub interviewer: bool,
}

impl StartRequest {
    pub fn for_code(meeting_code: impl Into<String>) -> Self {
        Self {
            meeting_code: meeting_code.into(),
            candidate_id: None,
            job_id: None,
            interview_type: None,
            title: None,
            interviewer: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteRequest {
    /// Explicit transcript; when absent the live transcript is consumed
    pub transcript: Option<Vec<Utterance>>,
    pub summary: Option<String>,
    pub key_points: Option<Vec<String>>,
    /// Seconds; derived from start/end when absent
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveDirectRequest {
    pub candidate_id: String,
    pub job_id: Option<String>,
    #[serde(default)]
    pub transcript: Vec<Utterance>,
    pub interview_type: Option<String>,
}

/// Result of the external analysis collaborator
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisUpdate {
    pub scores: Option<Scores>,
    pub summary: Option<String>,
    pub key_points: Option<Vec<String>>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub status: SessionStatus,
}

/// Orchestrates interview session lifecycles over a document store.
///
/// The at-most-one-`in_progress`-per-meeting-code invariant is kept by
/// interrupting earlier live sessions before inserting a new one. Each
/// interruption is a per-document compare-and-swap, but the find-then-patch
/// sequence as a whole is not atomic: two concurrent `start` calls for the
/// same code can both pass the scan and briefly leave two sessions live.
/// The next `start` on that code interrupts both.
pub struct SessionManager {
    store: Arc<dyn DocumentStore>,
    transcript_config: TranscriptConfig,
    access: AccessWindow,
    live: RwLock<HashMap<SessionId, LiveTranscriptHandle>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn DocumentStore>, transcript_config: TranscriptConfig) -> Self {
        Self {
            store,
            transcript_config,
            access: AccessWindow::default(),
            live: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_access_window(mut self, access: AccessWindow) -> Self {
        self.access = access;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Evaluate the self-serve access window for a meeting code.
    ///
    /// Codes that resolve to no candidate have no slot and are granted. A
    /// candidate with a session still in progress on the code holds a prior
    /// grant and may rejoin.
    pub async fn check_access(
        &self,
        meeting_code: &str,
        candidate_id: Option<&str>,
        client_offset_minutes: i32,
        now: DateTime<Utc>,
    ) -> SessionResult<AccessDecision> {
        match self.resolve_candidate(meeting_code, candidate_id).await {
            Ok(candidate) => {
                self.access_for(&candidate, meeting_code, client_offset_minutes, now)
                    .await
            }
            Err(SessionError::NotFound { .. }) => {
                Ok(self.access.evaluate(None, client_offset_minutes, now))
            }
            Err(e) => Err(e),
        }
    }

    /// Open a live session for a meeting code, interrupting any session
    /// still in progress on the same code.
    pub async fn start(&self, req: StartRequest) -> SessionResult<SessionOutcome> {
        let candidate = self
            .resolve_candidate(&req.meeting_code, req.candidate_id.as_deref())
            .await?;
        let now = Utc::now();

        if !req.interviewer {
            let decision = self
                .access_for(&candidate, &req.meeting_code, 0, now)
                .await?;
            if let Some(reason) = decision.deny_reason {
                info!(
                    "Refused to start session on {} for candidate {}: {}",
                    req.meeting_code, candidate.id, reason
                );
                return Err(SessionError::AccessDenied {
                    reason,
                    retry_after_seconds: decision.retry_after_seconds,
                });
            }
        }

        let job = self.resolve_job(&req, &candidate).await?;

        self.supersede(&req.meeting_code, now).await?;

        let title = req.title.clone().unwrap_or_else(|| {
            derive_title(&candidate, job.as_ref(), req.interview_type.as_deref(), now)
        });

        let session = InterviewSession {
            id: SessionId::new(),
            meeting_code: req.meeting_code.clone(),
            candidate_id: Some(candidate.id.clone()),
            job_id: job.map(|j| j.id),
            interview_type: req.interview_type,
            status: SessionStatus::InProgress,
            title,
            started_at: now,
            ended_at: None,
            duration: None,
            transcript: Vec::new(),
            summary: None,
            key_points: None,
            scores: None,
            feedback: None,
        };
        let session_id = session.id;

        self.store.insert_session(session).await?;

        let sink: Arc<dyn TranscriptSink> = Arc::new(StoreCheckpoint {
            store: Arc::clone(&self.store),
            session_id,
        });
        let handle = LiveTranscript::spawn(&self.transcript_config, Some(sink));
        {
            let mut live = self.live.write().await;
            live.insert(session_id, handle);
        }

        info!(
            "Started session {} for meeting {} (candidate {})",
            session_id, req.meeting_code, candidate.id
        );

        Ok(SessionOutcome {
            session_id,
            status: SessionStatus::InProgress,
        })
    }

    /// Record the end of a live session. Calling this on a session that has
    /// already left `in_progress` returns its current status unchanged.
    pub async fn complete(
        &self,
        session_id: SessionId,
        req: CompleteRequest,
    ) -> SessionResult<SessionOutcome> {
        let session = self.get(session_id).await?;

        if session.status != SessionStatus::InProgress {
            info!(
                "Session {} already {}; complete is a no-op",
                session_id, session.status
            );
            return Ok(SessionOutcome {
                session_id,
                status: session.status,
            });
        }

        let live_transcript = self.finish_live(session_id).await;
        let transcript = normalize_transcript(match (req.transcript, live_transcript) {
            (Some(explicit), _) => explicit,
            (None, Some(live)) => live,
            (None, None) => session.transcript,
        });

        let ended_at = Utc::now();
        let duration = req
            .duration
            .unwrap_or_else(|| duration_secs(session.started_at, ended_at));
        let utterances = transcript.len();

        let patch = SessionPatch {
            status: Some(SessionStatus::Completed),
            ended_at: Some(ended_at),
            duration: Some(duration),
            transcript: Some(transcript),
            summary: req.summary,
            key_points: req.key_points,
            ..Default::default()
        };

        if !self
            .store
            .patch_session_if(session_id, SessionStatus::InProgress, patch)
            .await?
        {
            // Lost a race with another completion or an interruption
            let current = self.get(session_id).await?;
            debug!(
                "Session {} left in_progress concurrently (now {})",
                session_id, current.status
            );
            return Ok(SessionOutcome {
                session_id,
                status: current.status,
            });
        }

        info!(
            "Completed session {} ({} utterances, {}s)",
            session_id, utterances, duration
        );

        Ok(SessionOutcome {
            session_id,
            status: SessionStatus::Completed,
        })
    }

    /// Persist an out-of-band session whose transcript was captured
    /// elsewhere. Timing comes from the transcript itself.
    pub async fn save_direct(&self, req: SaveDirectRequest) -> SessionResult<SessionOutcome> {
        let candidate = self
            .store
            .get_candidate(&req.candidate_id)
            .await?
            .ok_or_else(|| SessionError::not_found("candidate", &req.candidate_id))?;

        let job = match req.job_id.as_deref().or(candidate.job_id.as_deref()) {
            Some(job_id) => self.store.get_job(job_id).await?,
            None => None,
        };
        let job_id = req.job_id.clone().or_else(|| candidate.job_id.clone());

        let meeting_code = candidate
            .meeting_code
            .clone()
            .unwrap_or_else(|| format!("direct-{}", candidate.id));

        let now = Utc::now();
        self.supersede(&meeting_code, now).await?;

        let transcript = normalize_transcript(req.transcript);
        let (started_at, ended_at, duration) = transcript_bounds(&transcript, now);

        let session = InterviewSession {
            id: SessionId::new(),
            meeting_code: meeting_code.clone(),
            candidate_id: Some(candidate.id.clone()),
            job_id,
            title: derive_title(&candidate, job.as_ref(), req.interview_type.as_deref(), started_at),
            interview_type: req.interview_type,
            status: SessionStatus::Completed,
            started_at,
            ended_at: Some(ended_at),
            duration: Some(duration),
            transcript,
            summary: None,
            key_points: None,
            scores: None,
            feedback: None,
        };
        let session_id = session.id;

        self.store.insert_session(session).await?;

        info!(
            "Saved direct session {} for candidate {} on {} ({}s)",
            session_id, candidate.id, meeting_code, duration
        );

        Ok(SessionOutcome {
            session_id,
            status: SessionStatus::Completed,
        })
    }

    /// Attach analysis results. Out-of-range scores mark the session
    /// `analysis_failed` before the validation error is returned.
    pub async fn update_analysis(
        &self,
        session_id: SessionId,
        update: AnalysisUpdate,
    ) -> SessionResult<SessionId> {
        let session = self.get(session_id).await?;

        if !session.status.can_transition_to(SessionStatus::Analyzed) {
            return Err(SessionError::invalid_state(
                session_id,
                session.status,
                "analyze",
            ));
        }

        if let Some(scores) = &update.scores {
            if let Err(e) = scores.validate() {
                warn!("Analysis for session {} rejected: {}", session_id, e);
                self.store
                    .patch_session(session_id, SessionPatch::status(SessionStatus::AnalysisFailed))
                    .await?;
                return Err(e);
            }
        }

        let overall = update.scores.as_ref().and_then(|s| s.overall);

        let patch = SessionPatch {
            status: Some(SessionStatus::Analyzed),
            scores: update.scores,
            summary: update.summary,
            key_points: update.key_points,
            feedback: update.feedback,
            ..Default::default()
        };
        if !self.store.patch_session(session_id, patch).await? {
            return Err(SessionError::not_found("session", session_id));
        }

        if let (Some(overall), Some(candidate_id)) = (overall, session.candidate_id.as_deref()) {
            if !self.store.set_candidate_score(candidate_id, overall).await? {
                warn!(
                    "Candidate {} for session {} no longer exists; overall score not propagated",
                    candidate_id, session_id
                );
            }
        }

        info!("Analysis attached to session {}", session_id);

        Ok(session_id)
    }

    /// Remove a session; its live transcript, if any, is stopped and dropped.
    pub async fn delete_session(&self, session_id: SessionId) -> SessionResult<()> {
        let _ = self.finish_live(session_id).await;

        if !self.store.delete_session(session_id).await? {
            return Err(SessionError::not_found("session", session_id));
        }

        info!("Deleted session {}", session_id);
        Ok(())
    }

    pub async fn get(&self, session_id: SessionId) -> SessionResult<InterviewSession> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| SessionError::not_found("session", session_id))
    }

    /// Most recently started session for a meeting code
    pub async fn get_by_meeting_code(
        &self,
        meeting_code: &str,
    ) -> SessionResult<Option<InterviewSession>> {
        let sessions = self.store.sessions_by_meeting_code(meeting_code).await?;
        Ok(sessions.into_iter().max_by_key(|s| s.started_at))
    }

    /// A candidate's sessions, newest first
    pub async fn get_by_candidate(&self, candidate_id: &str) -> SessionResult<Vec<InterviewSession>> {
        let mut sessions = self.store.sessions_by_candidate(candidate_id).await?;
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    /// Handle to the live transcript of an in-progress session
    pub async fn live_transcript(&self, session_id: SessionId) -> SessionResult<LiveTranscriptHandle> {
        let live = self.live.read().await;
        live.get(&session_id)
            .cloned()
            .ok_or_else(|| SessionError::not_found("live transcript", session_id))
    }

    /// Interrupt every session still in progress on `meeting_code`.
    async fn supersede(&self, meeting_code: &str, now: DateTime<Utc>) -> SessionResult<usize> {
        let active: Vec<InterviewSession> = self
            .store
            .sessions_by_meeting_code(meeting_code)
            .await?
            .into_iter()
            .filter(|s| s.status == SessionStatus::InProgress)
            .collect();

        let mut interrupted = 0;
        for session in active {
            let patch = SessionPatch {
                status: Some(SessionStatus::Interrupted),
                ended_at: Some(now),
                duration: Some(duration_secs(session.started_at, now)),
                transcript: self.finish_live(session.id).await,
                ..Default::default()
            };

            if self
                .store
                .patch_session_if(session.id, SessionStatus::InProgress, patch)
                .await?
            {
                interrupted += 1;
                info!(
                    "Interrupted session {} superseded on meeting {}",
                    session.id, meeting_code
                );
            } else {
                debug!("Session {} ended before it could be interrupted", session.id);
            }
        }

        Ok(interrupted)
    }

    /// Stop a registered live transcript and return its finalized utterances
    async fn finish_live(&self, session_id: SessionId) -> Option<Vec<Utterance>> {
        let handle = {
            let mut live = self.live.write().await;
            live.remove(&session_id)
        }?;

        match handle.finish().await {
            Ok(transcript) => Some(transcript),
            Err(e) => {
                warn!("Live transcript for session {} unavailable: {}", session_id, e);
                None
            }
        }
    }

    async fn access_for(
        &self,
        candidate: &Candidate,
        meeting_code: &str,
        client_offset_minutes: i32,
        now: DateTime<Utc>,
    ) -> SessionResult<AccessDecision> {
        let rejoining = self
            .store
            .sessions_by_meeting_code(meeting_code)
            .await?
            .iter()
            .any(|s| {
                s.status == SessionStatus::InProgress
                    && s.candidate_id.as_deref() == Some(candidate.id.as_str())
            });

        Ok(self.access.evaluate_with_prior_grant(
            candidate.scheduled_at,
            rejoining,
            client_offset_minutes,
            now,
        ))
    }

    async fn resolve_candidate(
        &self,
        meeting_code: &str,
        candidate_id: Option<&str>,
    ) -> SessionResult<Candidate> {
        if let Some(id) = candidate_id {
            return self
                .store
                .get_candidate(id)
                .await?
                .ok_or_else(|| SessionError::not_found("candidate", id));
        }

        if let Some(candidate) = self.store.candidate_by_meeting_code(meeting_code).await? {
            return Ok(candidate);
        }

        if let Some(job) = self.store.job_by_meeting_code(meeting_code).await? {
            if let Some(candidate) = self.store.latest_applicant_for_job(&job.id).await? {
                return Ok(candidate);
            }
        }

        Err(SessionError::not_found("candidate for meeting", meeting_code))
    }

    async fn resolve_job(&self, req: &StartRequest, candidate: &Candidate) -> SessionResult<Option<Job>> {
        if let Some(id) = &req.job_id {
            return self
                .store
                .get_job(id)
                .await?
                .map(Some)
                .ok_or_else(|| SessionError::not_found("job", id));
        }

        if let Some(job) = self.store.job_by_meeting_code(&req.meeting_code).await? {
            return Ok(Some(job));
        }

        match &candidate.job_id {
            Some(id) => self.store.get_job(id).await,
            None => Ok(None),
        }
    }
}

/// Persists the finalized transcript of a live session while it is still
/// in progress, so an abandoned session keeps what was said.
struct StoreCheckpoint {
    store: Arc<dyn DocumentStore>,
    session_id: SessionId,
}

#[async_trait]
impl TranscriptSink for StoreCheckpoint {
    async fn checkpoint(&self, finalized: Vec<Utterance>) -> SessionResult<()> {
        let count = finalized.len();
        let patch = SessionPatch {
            transcript: Some(finalized),
            ..Default::default()
        };
        if self
            .store
            .patch_session_if(self.session_id, SessionStatus::InProgress, patch)
            .await?
        {
            debug!("Checkpointed {} utterances for session {}", count, self.session_id);
        }
        Ok(())
    }
}

fn derive_title(
    candidate: &Candidate,
    job: Option<&Job>,
    interview_type: Option<&str>,
    at: DateTime<Utc>,
) -> String {
    let subject = job
        .map(|j| j.title.as_str())
        .or(interview_type)
        .unwrap_or("Interview");
    format!(
        "{} - {} - {}",
        candidate.name,
        subject,
        at.format("%Y-%m-%d %H:%M UTC")
    )
}
