// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Channel a signal was captured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Notification,
    AccessibilityEvent,
    SmsMessage,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Notification => "notification",
            SignalSource::AccessibilityEvent => "accessibility_event",
            SignalSource::SmsMessage => "sms_message",
        }
    }

    /// Channels whose origin is a structured app identity supplied by the OS.
    pub fn is_identity_trusted(&self) -> bool {
        matches!(
            self,
            SignalSource::Notification | SignalSource::AccessibilityEvent
        )
    }
}

impl std::fmt::Display for SignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("malformed {channel} payload: {reason}")]
    Malformed {
        channel: SignalSource,
        reason: &'static str,
    },
}

/// One observation from one channel.
///
/// Only constructible through [`RawSignal::new`], which rejects empty bodies
/// and empty origin identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSignal {
    source: SignalSource,
    origin_identity: String,
    title: Option<String>,
    body: String,
    observed_at: DateTime<Utc>,
}

impl RawSignal {
    pub fn new(
        source: SignalSource,
        origin_identity: impl Into<String>,
        title: Option<String>,
        body: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, IngestError> {
        let origin_identity = origin_identity.into().trim().to_string();
        if origin_identity.is_empty() {
            return Err(IngestError::Malformed {
                channel: source,
                reason: "empty origin identity",
            });
        }
        let body = body.into();
        if body.trim().is_empty() {
            return Err(IngestError::Malformed {
                channel: source,
                reason: "empty body",
            });
        }
        // Only notifications carry a title; blank titles are dropped.
        let title = match source {
            SignalSource::Notification => title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            _ => None,
        };
        Ok(Self {
            source,
            origin_identity,
            title,
            body,
            observed_at,
        })
    }

    pub fn source(&self) -> SignalSource {
        self.source
    }

    pub fn origin_identity(&self) -> &str {
        &self.origin_identity
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_malformed() {
        let err = RawSignal::new(
            SignalSource::SmsMessage,
            "VM-HDFCBK",
            None,
            "   \n ",
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            IngestError::Malformed {
                channel: SignalSource::SmsMessage,
                reason: "empty body",
            }
        );
    }

    #[test]
    fn empty_origin_is_malformed() {
        let err = RawSignal::new(SignalSource::Notification, " ", None, "paid", Utc::now());
        assert!(err.is_err());
    }

    #[test]
    fn title_kept_only_for_notifications() {
        let now = Utc::now();
        let n = RawSignal::new(
            SignalSource::Notification,
            "com.phonepe.app",
            Some(" Money received ".into()),
            "body",
            now,
        )
        .unwrap();
        assert_eq!(n.title(), Some("Money received"));

        let s = RawSignal::new(
            SignalSource::SmsMessage,
            "AX-PAYTM",
            Some("ignored".into()),
            "body",
            now,
        )
        .unwrap();
        assert_eq!(s.title(), None);
    }
}
