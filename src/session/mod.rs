//! Interview session management
//!
//! This module provides the session lifecycle core:
//! - `InterviewSession` and its status machine
//! - `DocumentStore`: the persistence boundary (per-document atomic ops)
//! - `MemoryStore`: in-process store implementation
//! - `SessionManager`: start, complete, direct save, analysis, deletion

mod manager;
mod memory;
mod model;
mod store;

pub use manager::{
    AnalysisUpdate, CompleteRequest, SaveDirectRequest, SessionManager, SessionOutcome,
    StartRequest,
};
pub use memory::MemoryStore;
pub use model::{
    duration_secs, transcript_bounds, Candidate, InterviewSession, Job, Scores, SessionId,
    SessionPatch, SessionStatus, EMPTY_TRANSCRIPT_SECS,
};
pub use store::DocumentStore;
