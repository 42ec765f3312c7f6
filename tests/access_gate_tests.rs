// Access window tests
//
// These tests pin the self-serve entry window: 15 minutes before the
// scheduled time through 60 minutes after, same calendar day only.

use chrono::{DateTime, Duration, TimeZone, Utc};
use interview_sessions::{AccessWindow, DenyReason};

fn scheduled() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 27, 14, 30, 0).unwrap()
}

#[test]
fn test_sixteen_minutes_early_is_denied() {
    let window = AccessWindow::default();
    let decision = window.evaluate(Some(scheduled()), 0, scheduled() - Duration::minutes(16));

    assert!(!decision.granted);
    assert_eq!(decision.deny_reason, Some(DenyReason::TooEarly));
    assert_eq!(decision.retry_after_seconds, Some(60), "window opens in one minute");
    assert!(decision.reason.contains("too early"));
}

#[test]
fn test_fourteen_minutes_early_is_granted() {
    let window = AccessWindow::default();
    let decision = window.evaluate(Some(scheduled()), 0, scheduled() - Duration::minutes(14));

    assert!(decision.granted);
    assert_eq!(decision.deny_reason, None);
    assert_eq!(decision.retry_after_seconds, None);
}

#[test]
fn test_sixty_one_minutes_late_is_denied() {
    let window = AccessWindow::default();
    let decision = window.evaluate(Some(scheduled()), 0, scheduled() + Duration::minutes(61));

    assert!(!decision.granted);
    assert_eq!(decision.deny_reason, Some(DenyReason::WindowClosed));
    assert_eq!(decision.retry_after_seconds, None, "no retry once closed");
    assert!(decision.reason.contains("window closed"));
}

#[test]
fn test_next_calendar_day_is_denied_inside_window() {
    let late_slot = Utc.with_ymd_and_hms(2025, 10, 27, 23, 30, 0).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 10, 28, 0, 20, 0).unwrap();

    let window = AccessWindow::default();
    assert!(now <= window.closes_at(late_slot), "still within 60 minutes");

    let decision = window.evaluate(Some(late_slot), 0, now);
    assert!(!decision.granted);
    assert_eq!(decision.deny_reason, Some(DenyReason::WindowClosed));
}

#[test]
fn test_unscheduled_slot_is_always_granted() {
    let window = AccessWindow::default();
    let far_future = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

    let decision = window.evaluate(None, -300, far_future);
    assert!(decision.granted);
    assert!(decision.opens_at.is_none());
}

#[test]
fn test_client_offset_does_not_move_window() {
    let window = AccessWindow::default();
    let now = scheduled() - Duration::minutes(16);

    for offset in [-720, -300, 0, 330, 840] {
        let decision = window.evaluate(Some(scheduled()), offset, now);
        assert!(!decision.granted, "offset {} must not grant early entry", offset);
        assert_eq!(decision.retry_after_seconds, Some(60));
    }
}

#[test]
fn test_repeated_polling_is_stable() {
    let window = AccessWindow::default();
    let now = scheduled() - Duration::minutes(20);

    let first = window.evaluate(Some(scheduled()), 0, now);
    let second = window.evaluate(Some(scheduled()), 0, now);
    assert_eq!(first, second);
    assert_eq!(first.retry_after_seconds, Some(5 * 60));
}
