use anyhow::{Context, Result};
use chrono::Duration;
use serde::Deserialize;

use crate::access::AccessWindow;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub access: AccessConfig,
    pub transcript: TranscriptConfig,
    pub nats: NatsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "interview-sessions".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Self-serve entry window around a scheduled slot
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Minutes before the scheduled time the window opens
    pub open_before_minutes: i64,

    /// Minutes after the scheduled time the window closes
    pub close_after_minutes: i64,

    /// Offset of the server's canonical clock from UTC, used for calendar-date checks
    pub server_utc_offset_minutes: i32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            open_before_minutes: 15,
            close_after_minutes: 60,
            server_utc_offset_minutes: 0,
        }
    }
}

impl AccessConfig {
    pub fn window(&self) -> AccessWindow {
        AccessWindow::new(
            Duration::minutes(self.open_before_minutes),
            Duration::minutes(self.close_after_minutes),
            self.server_utc_offset_minutes,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Consecutive channel errors tolerated before a channel stops restarting
    pub max_channel_retries: u32,

    /// Delay before reopening a failed channel
    pub retry_backoff_ms: u64,

    /// Capacity of the aggregator's command queue
    pub command_buffer: usize,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            max_channel_retries: 3,
            retry_backoff_ms: 500,
            command_buffer: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub enabled: bool,
    pub url: String,
    pub subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "nats://localhost:4222".to_string(),
            subject: "stt.text.>".to_string(),
        }
    }
}

impl Config {
    /// Load from a config file (any format the `config` crate understands),
    /// with `INTERVIEW__SECTION__KEY` environment overrides on top.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("INTERVIEW").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to deserialize config")
    }
}
