use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest real-world UTC offset (UTC+14 / UTC-12 fit inside this)
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Why a candidate was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    TooEarly,
    WindowClosed,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::TooEarly => write!(f, "too early: the interview room is not open yet"),
            DenyReason::WindowClosed => write!(f, "window closed: this interview slot has ended"),
        }
    }
}

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub granted: bool,

    /// Human-readable explanation, always present
    pub reason: String,

    /// Machine-readable denial cause
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny_reason: Option<DenyReason>,

    /// Seconds until the window opens (only for "too early")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub opens_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub closes_at: Option<DateTime<Utc>>,

    /// Window bounds rendered in the client's reported timezone, display only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_opens_at: Option<DateTime<FixedOffset>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_closes_at: Option<DateTime<FixedOffset>>,
}

impl AccessDecision {
    fn unscheduled() -> Self {
        Self {
            granted: true,
            reason: "no scheduled slot; access is always open".to_string(),
            deny_reason: None,
            retry_after_seconds: None,
            opens_at: None,
            closes_at: None,
            local_opens_at: None,
            local_closes_at: None,
        }
    }
}

/// The [open, close] window around a scheduled slot
#[derive(Debug, Clone, Copy)]
pub struct AccessWindow {
    open_before: Duration,
    close_after: Duration,
    server_offset: FixedOffset,
}

impl Default for AccessWindow {
    fn default() -> Self {
        Self::new(Duration::minutes(15), Duration::minutes(60), 0)
    }
}

impl AccessWindow {
    /// `server_offset_minutes` is the canonical clock's offset east of UTC.
    /// Out-of-range offsets fall back to UTC.
    pub fn new(open_before: Duration, close_after: Duration, server_offset_minutes: i32) -> Self {
        Self {
            open_before,
            close_after,
            server_offset: offset_from_minutes(server_offset_minutes).unwrap_or_else(|| Utc.fix()),
        }
    }

    pub fn opens_at(&self, scheduled_at: DateTime<Utc>) -> DateTime<Utc> {
        scheduled_at - self.open_before
    }

    pub fn closes_at(&self, scheduled_at: DateTime<Utc>) -> DateTime<Utc> {
        scheduled_at + self.close_after
    }

    /// Decide whether a candidate may enter now.
    ///
    /// A request without a scheduled slot (interviewer-issued or always-open
    /// codes) is granted unconditionally. `client_offset_minutes` is minutes
    /// east of UTC as reported by the client and only affects the `local_*`
    /// display fields.
    pub fn evaluate(
        &self,
        scheduled_at: Option<DateTime<Utc>>,
        client_offset_minutes: i32,
        now: DateTime<Utc>,
    ) -> AccessDecision {
        self.evaluate_with_prior_grant(scheduled_at, false, client_offset_minutes, now)
    }

    /// Like [`evaluate`](Self::evaluate), but a candidate who already holds a
    /// live session (`prior_grant`) may rejoin from outside the window.
    pub fn evaluate_with_prior_grant(
        &self,
        scheduled_at: Option<DateTime<Utc>>,
        prior_grant: bool,
        client_offset_minutes: i32,
        now: DateTime<Utc>,
    ) -> AccessDecision {
        let Some(scheduled_at) = scheduled_at else {
            return AccessDecision::unscheduled();
        };

        let opens_at = self.opens_at(scheduled_at);
        let closes_at = self.closes_at(scheduled_at);
        let client_offset = offset_from_minutes(client_offset_minutes);

        let same_day = now.with_timezone(&self.server_offset).date_naive()
            == scheduled_at.with_timezone(&self.server_offset).date_naive();

        let (deny_reason, retry_after_seconds) = if now < opens_at {
            (Some(DenyReason::TooEarly), Some(ceil_seconds(opens_at - now)))
        } else if now > closes_at || !same_day {
            (Some(DenyReason::WindowClosed), None)
        } else {
            (None, None)
        };

        let (deny_reason, retry_after_seconds, reason) = match deny_reason {
            Some(_) if prior_grant => (
                None,
                None,
                "session already in progress; rejoining".to_string(),
            ),
            Some(r) => (Some(r), retry_after_seconds, r.to_string()),
            None => (None, None, "within the scheduled access window".to_string()),
        };

        AccessDecision {
            granted: deny_reason.is_none(),
            reason,
            deny_reason,
            retry_after_seconds,
            opens_at: Some(opens_at),
            closes_at: Some(closes_at),
            local_opens_at: client_offset.map(|tz| opens_at.with_timezone(&tz)),
            local_closes_at: client_offset.map(|tz| closes_at.with_timezone(&tz)),
        }
    }
}

fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    if minutes.abs() > MAX_OFFSET_MINUTES {
        return None;
    }
    FixedOffset::east_opt(minutes * 60)
}

/// Round a positive duration up to whole seconds
fn ceil_seconds(d: Duration) -> i64 {
    let millis = d.num_milliseconds();
    (millis + 999).div_euclid(1000)
}
