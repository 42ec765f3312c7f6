use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Access gate
        .route("/access/check", post(handlers::check_access))
        // Session lifecycle
        .route("/sessions/start", post(handlers::start_session))
        .route("/sessions/direct", post(handlers::save_direct))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/sessions/:session_id/complete",
            post(handlers::complete_session),
        )
        .route(
            "/sessions/:session_id/analysis",
            post(handlers::update_analysis),
        )
        // Live transcript
        .route(
            "/sessions/:session_id/transcript",
            get(handlers::get_live_transcript),
        )
        .route(
            "/sessions/:session_id/transcript/events",
            post(handlers::push_transcript_event),
        )
        .route(
            "/sessions/:session_id/transcript/errors",
            post(handlers::report_channel_error),
        )
        .route(
            "/sessions/:session_id/transcript/manual",
            post(handlers::submit_manual_entry),
        )
        // Session queries
        .route(
            "/meetings/:meeting_code/session",
            get(handlers::get_meeting_session),
        )
        .route(
            "/candidates/:candidate_id/sessions",
            get(handlers::get_candidate_sessions),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
