// HTTP API tests
//
// Drive the router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use interview_sessions::config::TranscriptConfig;
use interview_sessions::{create_router, AppState, Candidate, MemoryStore, SessionManager};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app() -> Router {
    let store = Arc::new(MemoryStore::new());
    store
        .put_candidate(Candidate {
            id: "cand-1".to_string(),
            name: "Ada".to_string(),
            meeting_code: Some("MEET-1".to_string()),
            job_id: None,
            scheduled_at: Some(Utc::now() + Duration::hours(2)),
            applied_at: Utc::now(),
            overall_score: None,
        })
        .await;

    let manager = Arc::new(SessionManager::new(store, TranscriptConfig::default()));
    create_router(AppState::new(manager))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(serde_json::to_vec(&v)?),
            None => Body::empty(),
        })?;

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    Ok((status, value))
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let app = app().await;
    let (status, _) = send(&app, "GET", "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_access_check_denies_early_candidate() -> Result<()> {
    let app = app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/access/check",
        Some(json!({ "meeting_code": "MEET-1", "client_offset_minutes": 60 })),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["granted"], json!(false));
    assert_eq!(body["deny_reason"], json!("too_early"));
    assert!(body["retry_after_seconds"].as_i64().unwrap_or(0) > 0);
    Ok(())
}

#[tokio::test]
async fn test_access_check_grants_unscheduled_code() -> Result<()> {
    let app = app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/access/check",
        Some(json!({ "meeting_code": "INTERVIEWER-ROOM" })),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["granted"], json!(true));
    Ok(())
}

#[tokio::test]
async fn test_start_is_held_to_access_window() -> Result<()> {
    let app = app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/sessions/start",
        Some(json!({ "meeting_code": "MEET-1" })),
    )
    .await?;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["deny_reason"], json!("too_early"));
    assert!(body["retry_after_seconds"].as_i64().unwrap_or(0) > 0);

    let (_, latest) = send(&app, "GET", "/meetings/MEET-1/session", None).await?;
    assert_eq!(latest, Value::Null, "no session was opened");

    Ok(())
}

#[tokio::test]
async fn test_live_session_flow() -> Result<()> {
    let app = app().await;

    let (status, started) = send(
        &app,
        "POST",
        "/sessions/start",
        Some(json!({
            "meeting_code": "MEET-1",
            "interview_type": "technical",
            "interviewer": true
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["status"], json!("in_progress"));
    let id = started["session_id"].as_str().unwrap_or_default().to_string();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/sessions/{}/transcript/events", id),
        Some(json!({
            "source": "agent",
            "segment_id": "a1",
            "text": "Walk me through your last project.",
            "is_final": true,
            "timestamp": "2025-10-27T14:30:00Z"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, view) = send(&app, "GET", &format!("/sessions/{}/transcript", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["utterances"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(view["candidate_mode"], json!("live"));

    let (status, completed) = send(
        &app,
        "POST",
        &format!("/sessions/{}/complete", id),
        Some(json!({})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], json!("completed"));

    let (status, session) = send(&app, "GET", &format!("/sessions/{}", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["transcript"][0]["sender"], json!("agent"));
    assert_eq!(session["transcript"][0]["timestamp"], json!("2025-10-27T14:30:00Z"));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/sessions/{}/analysis", id),
        Some(json!({ "scores": { "overall": 250 } })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap_or_default().contains("overall"));

    let (_, latest) = send(&app, "GET", "/meetings/MEET-1/session", None).await?;
    assert_eq!(latest["status"], json!("analysis_failed"));

    let (_, list) = send(&app, "GET", "/candidates/cand-1/sessions", None).await?;
    assert_eq!(list.as_array().map(|a| a.len()), Some(1));

    let (status, _) = send(&app, "DELETE", &format!("/sessions/{}", id), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/sessions/{}", id), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_degraded_mode_over_http() -> Result<()> {
    let app = app().await;

    let (_, started) = send(
        &app,
        "POST",
        "/sessions/start",
        Some(json!({ "meeting_code": "MEET-1", "interviewer": true })),
    )
    .await?;
    let id = started["session_id"].as_str().unwrap_or_default().to_string();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/sessions/{}/transcript/manual", id),
        Some(json!({ "text": "too early" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut last = Value::Null;
    for _ in 0..3 {
        let (status, action) = send(
            &app,
            "POST",
            &format!("/sessions/{}/transcript/errors", id),
            Some(json!({ "source": "candidate", "message": "not-allowed" })),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        last = action;
    }
    assert_eq!(last["action"], json!("degrade"));

    let (status, _) = send(
        &app,
        "POST",
        &format!("/sessions/{}/transcript/manual", id),
        Some(json!({ "text": "I'd shard by tenant" })),
    )
    .await?;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, view) = send(&app, "GET", &format!("/sessions/{}/transcript", id), None).await?;
    assert_eq!(view["candidate_mode"], json!("manual_entry"));
    assert_eq!(view["utterances"][0]["text"], json!("I'd shard by tenant"));

    Ok(())
}

#[tokio::test]
async fn test_unknown_meeting_returns_null_and_404s() -> Result<()> {
    let app = app().await;

    let (status, body) = send(&app, "GET", "/meetings/NOPE/session", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let (status, _) = send(
        &app,
        "POST",
        "/sessions/start",
        Some(json!({ "meeting_code": "NOPE" })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
