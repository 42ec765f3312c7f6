use super::state::AppState;
use crate::access::{AccessDecision, DenyReason};
use crate::error::SessionError;
use crate::nats::NatsSpeechChannel;
use crate::session::{
    AnalysisUpdate, CompleteRequest, InterviewSession, SaveDirectRequest, SessionId,
    SessionOutcome, StartRequest,
};
use crate::transcript::{ChannelAction, Sender, SpeechEvent, TranscriptView};
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AccessCheckRequest {
    pub meeting_code: String,

    pub candidate_id: Option<String>,

    /// Client timezone, minutes east of UTC (display only)
    #[serde(default)]
    pub client_offset_minutes: i32,
}

#[derive(Debug, Deserialize)]
pub struct ChannelErrorRequest {
    pub source: Sender,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualEntryRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny_reason: Option<DenyReason>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<i64>,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::NotFound { .. } => StatusCode::NOT_FOUND,
            SessionError::AccessDenied { .. } => StatusCode::FORBIDDEN,
            SessionError::InvalidState { .. } | SessionError::TranscriptClosed => {
                StatusCode::CONFLICT
            }
            SessionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SessionError::Channel { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        let (deny_reason, retry_after_seconds) = match &self {
            SessionError::AccessDenied {
                reason,
                retry_after_seconds,
            } => (Some(*reason), *retry_after_seconds),
            _ => (None, None),
        };

        let mut response = (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                deny_reason,
                retry_after_seconds,
            }),
        )
            .into_response();

        if let Some(secs) = retry_after_seconds {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

type ApiResult<T> = Result<Json<T>, SessionError>;

// ============================================================================
// Handlers
// ============================================================================

/// POST /access/check
/// Decide whether a candidate may enter the room for a meeting code
pub async fn check_access(
    State(state): State<AppState>,
    Json(req): Json<AccessCheckRequest>,
) -> ApiResult<AccessDecision> {
    let decision = state
        .manager
        .check_access(
            &req.meeting_code,
            req.candidate_id.as_deref(),
            req.client_offset_minutes,
            Utc::now(),
        )
        .await?;

    if !decision.granted {
        info!(
            "Access denied for meeting {}: {}",
            req.meeting_code, decision.reason
        );
    }

    Ok(Json(decision))
}

/// POST /sessions/start
/// Start a live session, superseding any in-progress one on the same code.
/// Candidate starts are held to the access window; interviewer starts are not.
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> ApiResult<SessionOutcome> {
    let outcome = state.manager.start(req).await?;

    if let Some(feed) = &state.speech_feed {
        let live = state.manager.live_transcript(outcome.session_id).await?;
        for source in Sender::ALL {
            let channel = NatsSpeechChannel::new(
                feed.client.clone(),
                &feed.subject,
                outcome.session_id.to_string(),
                source,
            );
            live.attach(Box::new(channel));
        }
    }

    Ok(Json(outcome))
}

/// POST /sessions/:session_id/complete
pub async fn complete_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(req): Json<CompleteRequest>,
) -> ApiResult<SessionOutcome> {
    Ok(Json(state.manager.complete(session_id, req).await?))
}

/// POST /sessions/direct
/// Save an out-of-band session with a transcript captured elsewhere
pub async fn save_direct(
    State(state): State<AppState>,
    Json(req): Json<SaveDirectRequest>,
) -> ApiResult<SessionOutcome> {
    Ok(Json(state.manager.save_direct(req).await?))
}

/// POST /sessions/:session_id/analysis
pub async fn update_analysis(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(update): Json<AnalysisUpdate>,
) -> ApiResult<AnalysisResponse> {
    let session_id = state.manager.update_analysis(session_id, update).await?;
    Ok(Json(AnalysisResponse { session_id }))
}

/// GET /sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> ApiResult<InterviewSession> {
    Ok(Json(state.manager.get(session_id).await?))
}

/// DELETE /sessions/:session_id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<StatusCode, SessionError> {
    state.manager.delete_session(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /meetings/:meeting_code/session
/// Most recent session for a meeting code, or null
pub async fn get_meeting_session(
    State(state): State<AppState>,
    Path(meeting_code): Path<String>,
) -> ApiResult<Option<InterviewSession>> {
    Ok(Json(state.manager.get_by_meeting_code(&meeting_code).await?))
}

/// GET /candidates/:candidate_id/sessions
/// A candidate's sessions, newest first
pub async fn get_candidate_sessions(
    State(state): State<AppState>,
    Path(candidate_id): Path<String>,
) -> ApiResult<Vec<InterviewSession>> {
    Ok(Json(state.manager.get_by_candidate(&candidate_id).await?))
}

/// GET /sessions/:session_id/transcript
/// Current ordered transcript, including pending interim text
pub async fn get_live_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> ApiResult<TranscriptView> {
    let live = state.manager.live_transcript(session_id).await?;
    Ok(Json(live.snapshot().await?))
}

/// POST /sessions/:session_id/transcript/events
/// Speech-to-text event from a client-side recognizer
pub async fn push_transcript_event(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(event): Json<SpeechEvent>,
) -> Result<StatusCode, SessionError> {
    let live = state.manager.live_transcript(session_id).await?;
    live.push(event).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /sessions/:session_id/transcript/errors
/// Report a recognizer failure; the response says whether to restart it
pub async fn report_channel_error(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(req): Json<ChannelErrorRequest>,
) -> ApiResult<ChannelAction> {
    let live = state.manager.live_transcript(session_id).await?;
    Ok(Json(live.report_error(req.source, req.message).await?))
}

/// POST /sessions/:session_id/transcript/manual
/// Typed candidate text once the microphone channel has failed
pub async fn submit_manual_entry(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(req): Json<ManualEntryRequest>,
) -> Result<StatusCode, SessionError> {
    let live = state.manager.live_transcript(session_id).await?;
    live.submit_manual(req.text).await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
