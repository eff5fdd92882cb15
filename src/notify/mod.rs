//! Event forwarding: a single injected [`Sink`] receives each emitted
//! [`PaymentEvent`]. The forwarder never retries; any retry or blocking
//! behaviour belongs to the sink.

pub mod webhook;

use metrics::counter;
use thiserror::Error;

use crate::event::PaymentEvent;
use crate::ingest::anon_hash;

pub use webhook::{
    finish_webhook_worker, spawn_webhook_worker, ChannelSink, Notifier, WebhookNotifier,
    MAX_WEBHOOK_ATTEMPTS,
};

/// Downstream consumer of payment events (host app bridge, webhook, ...).
pub trait Sink: Send + Sync {
    /// Hand off one event. `false` means the sink rejected or could not take it.
    fn deliver(&self, event: &PaymentEvent) -> bool;
}

impl<S: Sink + ?Sized> Sink for std::sync::Arc<S> {
    fn deliver(&self, event: &PaymentEvent) -> bool {
        (**self).deliver(event)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("sink rejected {channel} event {id}")]
    Rejected { channel: String, id: String },
}

pub struct Forwarder {
    sink: Box<dyn Sink>,
}

impl Forwarder {
    pub fn new(sink: impl Sink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    /// Deliver once. Failures are logged and counted, then returned to the caller.
    pub fn forward(&self, event: &PaymentEvent) -> Result<(), DeliveryError> {
        if self.sink.deliver(event) {
            counter!("events_forwarded_total").increment(1);
            return Ok(());
        }
        let id = anon_hash(&event.raw_text);
        counter!("delivery_failures_total").increment(1);
        tracing::warn!(
            target: "notify",
            %id,
            source = %event.source,
            "sink rejected payment event"
        );
        Err(DeliveryError::Rejected {
            channel: event.source.to_string(),
            id,
        })
    }
}

/// Sink that only logs. Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn deliver(&self, event: &PaymentEvent) -> bool {
        tracing::info!(
            target: "notify",
            id = %anon_hash(&event.raw_text),
            source = %event.source,
            app = event.app_name.as_deref().unwrap_or("-"),
            amount = ?event.extracted_amount,
            currency = event.currency_hint.as_deref().unwrap_or("-"),
            direction = event.direction_hint.as_str(),
            "payment event"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Direction;
    use crate::ingest::types::SignalSource;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Flaky {
        ok: bool,
        calls: AtomicUsize,
    }

    impl Sink for Flaky {
        fn deliver(&self, _event: &PaymentEvent) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.ok
        }
    }

    fn event() -> PaymentEvent {
        PaymentEvent {
            source: SignalSource::Notification,
            origin_identity: "com.phonepe.app".into(),
            raw_text: "received ₹1".into(),
            observed_at: Utc::now(),
            extracted_amount: None,
            currency_hint: None,
            direction_hint: Direction::Credited,
            counterpart: None,
            app_name: None,
        }
    }

    #[test]
    fn failed_delivery_is_reported_once_without_retry() {
        let sink = Arc::new(Flaky {
            ok: false,
            calls: AtomicUsize::new(0),
        });
        let fwd = Forwarder::new(sink.clone());
        let err = fwd.forward(&event()).unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected { .. }));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn successful_delivery() {
        let fwd = Forwarder::new(LogSink);
        assert!(fwd.forward(&event()).is_ok());
    }
}
