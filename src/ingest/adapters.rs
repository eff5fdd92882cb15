// src/ingest/adapters.rs
//! Platform payload shapes and their mapping into [`RawSignal`].
//!
//! Each adapter only maps fields; it makes no payment decision.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::types::{IngestError, RawSignal, SignalSource};

/// Anything a platform adapter can turn into a [`RawSignal`].
pub trait IntoSignal {
    fn channel(&self) -> SignalSource;
    fn into_signal(self) -> Result<RawSignal, IngestError>;
}

/// A posted status-bar notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub package_name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub big_text: Option<String>,
    /// Post time in unix milliseconds; capture time is used when absent.
    #[serde(default)]
    pub post_time_ms: Option<i64>,
}

impl IntoSignal for NotificationPayload {
    fn channel(&self) -> SignalSource {
        SignalSource::Notification
    }

    /// Body is the longer of the expanded and short texts.
    fn into_signal(self) -> Result<RawSignal, IngestError> {
        let text = self.text.unwrap_or_default();
        let big = self.big_text.unwrap_or_default();
        let body = if big.trim().chars().count() > text.trim().chars().count() {
            big
        } else {
            text
        };
        RawSignal::new(
            SignalSource::Notification,
            self.package_name,
            self.title,
            body,
            observed_at(self.post_time_ms, SignalSource::Notification)?,
        )
    }
}

/// Text snapshot from an accessibility notification-state event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessibilityPayload {
    pub package_name: String,
    #[serde(default)]
    pub texts: Vec<String>,
    #[serde(default)]
    pub event_time_ms: Option<i64>,
}

impl IntoSignal for AccessibilityPayload {
    fn channel(&self) -> SignalSource {
        SignalSource::AccessibilityEvent
    }

    /// Non-blank node texts joined with a single space.
    fn into_signal(self) -> Result<RawSignal, IngestError> {
        let body = self
            .texts
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        RawSignal::new(
            SignalSource::AccessibilityEvent,
            self.package_name,
            None,
            body,
            observed_at(self.event_time_ms, SignalSource::AccessibilityEvent)?,
        )
    }
}

/// One received SMS (multi-part bodies already concatenated by the platform).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmsPayload {
    pub sender: String,
    pub body: String,
    #[serde(default)]
    pub received_at_ms: Option<i64>,
}

impl IntoSignal for SmsPayload {
    fn channel(&self) -> SignalSource {
        SignalSource::SmsMessage
    }

    fn into_signal(self) -> Result<RawSignal, IngestError> {
        RawSignal::new(
            SignalSource::SmsMessage,
            self.sender,
            None,
            self.body,
            observed_at(self.received_at_ms, SignalSource::SmsMessage)?,
        )
    }
}

impl IntoSignal for RawSignal {
    fn channel(&self) -> SignalSource {
        self.source()
    }

    fn into_signal(self) -> Result<RawSignal, IngestError> {
        Ok(self)
    }
}

fn observed_at(ms: Option<i64>, channel: SignalSource) -> Result<DateTime<Utc>, IngestError> {
    match ms {
        None => Ok(Utc::now()),
        Some(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or(IngestError::Malformed {
                channel,
                reason: "timestamp out of range",
            }),
    }
}
