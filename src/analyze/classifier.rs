//! Signal classifier: decides whether a raw signal is payment-related.
//!
//! Identity-trusted channels (notification, accessibility) are accepted on
//! the app allow-list alone. SMS sender ids are spoofable, so SMS is accepted
//! on a sender token OR a payment keyword OR a currency marker in the body.
//! All matching is case-insensitive substring matching.

use std::collections::HashSet;

use crate::config::PipelineConfig;
use crate::ingest::types::{RawSignal, SignalSource};

/// Which rule accepted or rejected a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    AppIdentity,
    SenderToken(String),
    Keyword(String),
    CurrencyMarker(String),
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyBody,
    UnknownApp,
    NoPaymentTokens,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Verdict::Rejected(_))
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::AppIdentity => "app_identity",
            Verdict::SenderToken(_) => "sender_token",
            Verdict::Keyword(_) => "keyword",
            Verdict::CurrencyMarker(_) => "currency_marker",
            Verdict::Rejected(RejectReason::EmptyBody) => "empty_body",
            Verdict::Rejected(RejectReason::UnknownApp) => "unknown_app",
            Verdict::Rejected(RejectReason::NoPaymentTokens) => "no_payment_tokens",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    notification_apps: HashSet<String>,
    accessibility_apps: HashSet<String>,
    sender_tokens: Vec<String>,
    keywords: Vec<String>,
    markers: Vec<String>,
}

impl Classifier {
    pub fn new(cfg: &PipelineConfig) -> Self {
        Self {
            notification_apps: cfg
                .apps
                .iter()
                .map(|a| a.package.to_ascii_lowercase())
                .collect(),
            accessibility_apps: cfg
                .accessibility_packages()
                .iter()
                .map(|p| p.to_ascii_lowercase())
                .collect(),
            sender_tokens: lowered(cfg.senders.iter().map(|s| s.token.as_str())),
            keywords: lowered(cfg.keywords.iter().map(String::as_str)),
            markers: lowered(cfg.currency_markers.iter().map(|m| m.marker.as_str())),
        }
    }

    pub fn classify(&self, signal: &RawSignal) -> bool {
        self.classify_verbose(signal).is_accepted()
    }

    /// Same decision as [`Classifier::classify`], naming the rule that fired.
    pub fn classify_verbose(&self, signal: &RawSignal) -> Verdict {
        let body = signal.body();
        if body.trim().is_empty() {
            return Verdict::Rejected(RejectReason::EmptyBody);
        }

        let origin = signal.origin_identity().to_lowercase();
        match signal.source() {
            SignalSource::Notification => self.by_identity(&self.notification_apps, &origin),
            SignalSource::AccessibilityEvent => {
                self.by_identity(&self.accessibility_apps, &origin)
            }
            SignalSource::SmsMessage => {
                if let Some(tok) = first_contained(&origin, &self.sender_tokens) {
                    return Verdict::SenderToken(tok.to_string());
                }
                let text = body.to_lowercase();
                if let Some(kw) = first_contained(&text, &self.keywords) {
                    return Verdict::Keyword(kw.to_string());
                }
                if let Some(m) = first_contained(&text, &self.markers) {
                    return Verdict::CurrencyMarker(m.to_string());
                }
                Verdict::Rejected(RejectReason::NoPaymentTokens)
            }
        }
    }

    fn by_identity(&self, allow: &HashSet<String>, origin: &str) -> Verdict {
        if allow.contains(origin) {
            Verdict::AppIdentity
        } else {
            Verdict::Rejected(RejectReason::UnknownApp)
        }
    }
}

fn lowered<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items.map(|s| s.to_lowercase()).collect()
}

fn first_contained<'a>(haystack: &str, needles: &'a [String]) -> Option<&'a str> {
    needles
        .iter()
        .find(|n| haystack.contains(n.as_str()))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sig(source: SignalSource, origin: &str, body: &str) -> RawSignal {
        RawSignal::new(source, origin, None, body, Utc::now()).unwrap()
    }

    #[test]
    fn notification_trusted_on_identity_alone() {
        let c = Classifier::new(&PipelineConfig::default());
        assert!(c.classify(&sig(
            SignalSource::Notification,
            "com.phonepe.app",
            "Your weekly rewards summary"
        )));
        assert!(!c.classify(&sig(
            SignalSource::Notification,
            "com.unknown.app",
            "You received ₹500"
        )));
    }

    #[test]
    fn identity_match_is_case_insensitive() {
        let c = Classifier::new(&PipelineConfig::default());
        assert_eq!(
            c.classify_verbose(&sig(SignalSource::Notification, "COM.PhonePe.APP", "hi")),
            Verdict::AppIdentity
        );
    }

    #[test]
    fn accessibility_can_use_narrower_list() {
        let cfg = PipelineConfig {
            accessibility_apps: Some(vec!["com.phonepe.app".into()]),
            ..PipelineConfig::default()
        };
        let c = Classifier::new(&cfg);
        assert!(c.classify(&sig(
            SignalSource::AccessibilityEvent,
            "com.phonepe.app",
            "x"
        )));
        assert!(!c.classify(&sig(
            SignalSource::AccessibilityEvent,
            "net.one97.paytm",
            "x"
        )));
        // notification channel still uses the full list
        assert!(c.classify(&sig(SignalSource::Notification, "net.one97.paytm", "x")));
    }

    #[test]
    fn sms_rules_in_priority_order() {
        let c = Classifier::new(&PipelineConfig::default());
        assert_eq!(
            c.classify_verbose(&sig(SignalSource::SmsMessage, "AX-PhonePe", "hello")),
            Verdict::SenderToken("phonepe".into())
        );
        assert_eq!(
            c.classify_verbose(&sig(
                SignalSource::SmsMessage,
                "+911234",
                "UPI txn ok"
            )),
            Verdict::Keyword("upi".into())
        );
        assert_eq!(
            c.classify_verbose(&sig(
                SignalSource::SmsMessage,
                "VM-HDFCBK",
                "Rs.1200 debited from your account"
            )),
            Verdict::CurrencyMarker("rs.".into())
        );
        assert_eq!(
            c.classify_verbose(&sig(
                SignalSource::SmsMessage,
                "+911234",
                "See you at dinner"
            )),
            Verdict::Rejected(RejectReason::NoPaymentTokens)
        );
    }

    #[test]
    fn embedded_keyword_still_matches() {
        // substring semantics: "prepaid" contains "paid"
        let c = Classifier::new(&PipelineConfig::default());
        assert!(c.classify(&sig(
            SignalSource::SmsMessage,
            "JD-JIOINF",
            "Your prepaid pack expires soon"
        )));
    }
}
