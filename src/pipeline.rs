//! Per-signal processing: classify → extract → dedup → forward.
//!
//! [`Pipeline`] is `Send + Sync`; share one behind an `Arc` across every
//! producer. It never panics on input and never returns an error: each
//! signal ends in exactly one [`ProcessOutcome`], and is delivered at most once.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::analyze::{Classifier, Extractor};
use crate::config::{ConfigError, PipelineConfig};
use crate::dedup::DedupGate;
use crate::ingest::adapters::IntoSignal;
use crate::ingest::anon_hash;
use crate::ingest::types::RawSignal;
use crate::notify::{Forwarder, Sink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Payload could not become a valid signal.
    Malformed,
    /// Not payment-related.
    Rejected,
    /// Same transaction already emitted within the dedup window.
    Suppressed,
    Delivered,
    /// Emitted, but the sink refused it. Not retried.
    DeliveryFailed,
}

impl ProcessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessOutcome::Malformed => "malformed",
            ProcessOutcome::Rejected => "rejected",
            ProcessOutcome::Suppressed => "suppressed",
            ProcessOutcome::Delivered => "delivered",
            ProcessOutcome::DeliveryFailed => "delivery_failed",
        }
    }
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_metrics);
}

fn describe_metrics() {
    describe_counter!("signals_received_total", "Signals handed to the pipeline.");
    describe_counter!(
        "signals_malformed_total",
        "Payloads dropped before classification (empty body or origin)."
    );
    describe_counter!(
        "signals_rejected_total",
        "Signals classified as not payment-related."
    );
    describe_counter!(
        "signals_accepted_total",
        "Signals classified as payment-related."
    );
    describe_counter!(
        "dedup_suppressed_total",
        "Payment events suppressed as cross-channel duplicates."
    );
    describe_counter!("events_forwarded_total", "Events accepted by the sink.");
    describe_counter!("delivery_failures_total", "Events the sink rejected.");
    describe_counter!(
        "webhook_failures_total",
        "Events the webhook worker gave up on after all retries."
    );
}

pub struct Pipeline {
    classifier: Classifier,
    extractor: Extractor,
    gate: DedupGate,
    forwarder: Forwarder,
}

impl Pipeline {
    pub fn new(cfg: &PipelineConfig, sink: impl Sink + 'static) -> Result<Self, ConfigError> {
        ensure_metrics_described();
        Ok(Self {
            classifier: Classifier::new(cfg),
            extractor: Extractor::new(cfg)?,
            gate: DedupGate::new(&cfg.dedup),
            forwarder: Forwarder::new(sink),
        })
    }

    /// Adapt a platform payload, then [`Pipeline::process`] it.
    pub fn ingest(&self, payload: impl IntoSignal) -> ProcessOutcome {
        let channel = payload.channel();
        counter!("signals_received_total", "source" => channel.as_str()).increment(1);
        match payload.into_signal() {
            Ok(signal) => self.run(signal),
            Err(e) => {
                counter!("signals_malformed_total", "source" => channel.as_str()).increment(1);
                tracing::debug!(target: "ingest", error = %e, "dropped malformed payload");
                ProcessOutcome::Malformed
            }
        }
    }

    pub fn process(&self, signal: RawSignal) -> ProcessOutcome {
        counter!("signals_received_total", "source" => signal.source().as_str()).increment(1);
        self.run(signal)
    }

    fn run(&self, signal: RawSignal) -> ProcessOutcome {
        let source = signal.source().as_str();
        let id = anon_hash(signal.body());

        let verdict = self.classifier.classify_verbose(&signal);
        if !verdict.is_accepted() {
            counter!("signals_rejected_total", "source" => source).increment(1);
            tracing::debug!(target: "classify", %id, source, reason = verdict.label(), "rejected");
            return ProcessOutcome::Rejected;
        }
        counter!("signals_accepted_total", "source" => source).increment(1);
        tracing::debug!(target: "classify", %id, source, rule = verdict.label(), "accepted");

        let event = self.extractor.extract(&signal);
        if !self.gate.should_emit(&event) {
            counter!("dedup_suppressed_total", "source" => source).increment(1);
            return ProcessOutcome::Suppressed;
        }

        match self.forwarder.forward(&event) {
            Ok(()) => {
                tracing::info!(
                    target: "ingest",
                    %id,
                    source,
                    direction = event.direction_hint.as_str(),
                    has_amount = event.extracted_amount.is_some(),
                    "payment event forwarded"
                );
                ProcessOutcome::Delivered
            }
            Err(_) => ProcessOutcome::DeliveryFailed,
        }
    }

    /// Keys currently held by the dedup gate.
    pub fn dedup_len(&self) -> usize {
        self.gate.len()
    }
}
