use async_trait::async_trait;

use super::model::{Candidate, InterviewSession, Job, SessionId, SessionPatch, SessionStatus};
use crate::error::SessionResult;

/// Document store consumed by the lifecycle manager.
///
/// Every operation is atomic for the single document it touches; nothing
/// here spans documents. `patch_session` writes only the fields the patch
/// sets, and reads reflect the latest committed write.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_session(&self, id: SessionId) -> SessionResult<Option<InterviewSession>>;

    async fn insert_session(&self, session: InterviewSession) -> SessionResult<()>;

    /// Returns `false` if the session does not exist
    async fn patch_session(&self, id: SessionId, patch: SessionPatch) -> SessionResult<bool>;

    /// Compare-and-swap on status: applies the patch only while the session
    /// is still in `expected`. Returns whether it was applied.
    async fn patch_session_if(
        &self,
        id: SessionId,
        expected: SessionStatus,
        patch: SessionPatch,
    ) -> SessionResult<bool>;

    /// Returns `false` if the session does not exist
    async fn delete_session(&self, id: SessionId) -> SessionResult<bool>;

    async fn sessions_by_meeting_code(&self, meeting_code: &str)
        -> SessionResult<Vec<InterviewSession>>;

    async fn sessions_by_candidate(&self, candidate_id: &str) -> SessionResult<Vec<InterviewSession>>;

    async fn get_candidate(&self, id: &str) -> SessionResult<Option<Candidate>>;

    async fn candidate_by_meeting_code(&self, meeting_code: &str) -> SessionResult<Option<Candidate>>;

    async fn get_job(&self, id: &str) -> SessionResult<Option<Job>>;

    async fn job_by_meeting_code(&self, meeting_code: &str) -> SessionResult<Option<Job>>;

    /// Most recent applicant (by `applied_at`) to a job
    async fn latest_applicant_for_job(&self, job_id: &str) -> SessionResult<Option<Candidate>>;

    /// Returns `false` if the candidate does not exist
    async fn set_candidate_score(&self, candidate_id: &str, overall: f64) -> SessionResult<bool>;
}
