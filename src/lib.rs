// src/lib.rs
// Public library surface for the binary, host bridges and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod dedup;
pub mod event;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::config::{ConfigError, PipelineConfig};
pub use crate::event::{Direction, PaymentEvent};
pub use crate::ingest::adapters::{
    AccessibilityPayload, IntoSignal, NotificationPayload, SmsPayload,
};
pub use crate::ingest::types::{IngestError, RawSignal, SignalSource};
pub use crate::notify::{DeliveryError, LogSink, Sink};
pub use crate::pipeline::{Pipeline, ProcessOutcome};
