//! HTTP API for the interview platform front end
//!
//! This module provides a REST API over the session core:
//! - POST /access/check - Evaluate the self-serve access window
//! - POST /sessions/start, /sessions/direct - Open or save sessions
//! - POST /sessions/:id/complete, /sessions/:id/analysis - Lifecycle transitions
//! - GET|DELETE /sessions/:id - Fetch or remove a session
//! - /sessions/:id/transcript[/events|/errors|/manual] - Live transcript
//! - GET /meetings/:code/session, /candidates/:id/sessions - Queries
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, SpeechFeed};
