use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::model::{Candidate, InterviewSession, Job, SessionId, SessionPatch, SessionStatus};
use super::store::DocumentStore;
use crate::error::SessionResult;

/// In-process document store backed by `RwLock`ed maps
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionId, InterviewSession>>,
    candidates: RwLock<HashMap<String, Candidate>>,
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_candidate(&self, candidate: Candidate) {
        let mut candidates = self.candidates.write().await;
        candidates.insert(candidate.id.clone(), candidate);
    }

    pub async fn put_job(&self, job: Job) {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_session(&self, id: SessionId) -> SessionResult<Option<InterviewSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id).cloned())
    }

    async fn insert_session(&self, session: InterviewSession) -> SessionResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id, session);
        Ok(())
    }

    async fn patch_session(&self, id: SessionId, patch: SessionPatch) -> SessionResult<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(session) => {
                patch.apply(session);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn patch_session_if(
        &self,
        id: SessionId,
        expected: SessionStatus,
        patch: SessionPatch,
    ) -> SessionResult<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(session) if session.status == expected => {
                patch.apply(session);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_session(&self, id: SessionId) -> SessionResult<bool> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(&id).is_some())
    }

    async fn sessions_by_meeting_code(
        &self,
        meeting_code: &str,
    ) -> SessionResult<Vec<InterviewSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| s.meeting_code == meeting_code)
            .cloned()
            .collect())
    }

    async fn sessions_by_candidate(&self, candidate_id: &str) -> SessionResult<Vec<InterviewSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| s.candidate_id.as_deref() == Some(candidate_id))
            .cloned()
            .collect())
    }

    async fn get_candidate(&self, id: &str) -> SessionResult<Option<Candidate>> {
        let candidates = self.candidates.read().await;
        Ok(candidates.get(id).cloned())
    }

    async fn candidate_by_meeting_code(&self, meeting_code: &str) -> SessionResult<Option<Candidate>> {
        let candidates = self.candidates.read().await;
        Ok(candidates
            .values()
            .filter(|c| c.meeting_code.as_deref() == Some(meeting_code))
            .max_by_key(|c| c.applied_at)
            .cloned())
    }

    async fn get_job(&self, id: &str) -> SessionResult<Option<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(id).cloned())
    }

    async fn job_by_meeting_code(&self, meeting_code: &str) -> SessionResult<Option<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .find(|j| j.meeting_code.as_deref() == Some(meeting_code))
            .cloned())
    }

    async fn latest_applicant_for_job(&self, job_id: &str) -> SessionResult<Option<Candidate>> {
        let candidates = self.candidates.read().await;
        Ok(candidates
            .values()
            .filter(|c| c.job_id.as_deref() == Some(job_id))
            .max_by_key(|c| c.applied_at)
            .cloned())
    }

    async fn set_candidate_score(&self, candidate_id: &str, overall: f64) -> SessionResult<bool> {
        let mut candidates = self.candidates.write().await;
        match candidates.get_mut(candidate_id) {
            Some(candidate) => {
                candidate.overall_score = Some(overall);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
