use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures::stream::{self, StreamExt};
use interview_sessions::nats::{forward_transcripts, to_speech_event, SttMessage};
use interview_sessions::Sender;
use serde_json::json;
use tokio::sync::mpsc;

#[test]
fn test_stt_message_deserialization() {
    let json = r#"{
        "session_id": "8d6a3c1e-0000-4000-8000-000000000001",
        "source": "candidate",
        "segment_id": "seg-17",
        "text": "Hello world",
        "partial": false,
        "timestamp": "2025-10-27T14:30:05Z",
        "confidence": 0.95
    }"#;

    let msg: SttMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.source, Sender::Candidate);
    assert_eq!(msg.segment_id, "seg-17");
    assert!(!msg.partial);
    assert_eq!(msg.confidence, Some(0.95));
}

#[test]
fn test_stt_message_no_confidence() {
    let json = r#"{
        "session_id": "s1",
        "source": "agent",
        "segment_id": "seg-1",
        "text": "No confidence score",
        "partial": true,
        "timestamp": "2025-10-27T14:30:05Z"
    }"#;

    let msg: SttMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.source, Sender::Agent);
    assert_eq!(msg.confidence, None);
}

#[test]
fn test_final_message_maps_to_final_event() {
    let msg = SttMessage {
        session_id: "s1".to_string(),
        source: Sender::Agent,
        segment_id: "seg-2".to_string(),
        text: "Tell me about a hard bug".to_string(),
        partial: false,
        timestamp: "2025-10-27T14:30:05Z".to_string(),
        confidence: None,
    };

    let event = to_speech_event(msg, "s1", Sender::Agent).expect("event for this channel");
    assert!(event.is_final);
    assert_eq!(event.segment_id.0, "seg-2");
    assert_eq!(
        event.timestamp,
        Utc.with_ymd_and_hms(2025, 10, 27, 14, 30, 5).unwrap()
    );
}

#[test]
fn test_messages_for_other_sessions_or_channels_are_skipped() {
    let msg = SttMessage {
        session_id: "s1".to_string(),
        source: Sender::Candidate,
        segment_id: "seg-3".to_string(),
        text: "hello".to_string(),
        partial: true,
        timestamp: "2025-10-27T14:30:05Z".to_string(),
        confidence: Some(0.5),
    };

    assert!(to_speech_event(msg.clone(), "s2", Sender::Candidate).is_none());
    assert!(to_speech_event(msg, "s1", Sender::Agent).is_none());
}

fn stt_payload(session_id: &str, source: &str, text: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "session_id": session_id,
        "source": source,
        "segment_id": "seg-1",
        "text": text,
        "partial": false,
        "timestamp": "2025-10-27T14:30:05Z"
    }))
    .unwrap()
}

#[tokio::test]
async fn test_forwarding_keeps_only_matching_events() {
    let payloads = stream::iter(vec![
        stt_payload("other", "candidate", "not ours"),
        b"not json".to_vec(),
        stt_payload("s1", "agent", "wrong channel"),
        stt_payload("s1", "candidate", "ours"),
    ]);

    let (tx, mut rx) = mpsc::channel(8);
    forward_transcripts(payloads, tx, "s1", Sender::Candidate).await;

    let event = rx.recv().await.unwrap().unwrap();
    assert_eq!(event.text, "ours");
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_forwarding_stops_when_receiver_dropped() {
    // Only other sessions' traffic, then a bus that never goes quiet
    let payloads = stream::iter(vec![stt_payload("other", "candidate", "busy bus")])
        .chain(stream::pending());

    let (tx, rx) = mpsc::channel(8);
    let task = tokio::spawn(async move {
        forward_transcripts(Box::pin(payloads), tx, "s1", Sender::Candidate).await;
    });

    drop(rx);
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("forwarder kept running after its receiver was dropped")
        .unwrap();
}
