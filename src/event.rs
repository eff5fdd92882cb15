// src/event.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::ingest::types::SignalSource;

/// Best-effort money direction derived from keyword polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credited,
    Paid,
    #[default]
    Unknown,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credited => "credited",
            Direction::Paid => "paid",
            Direction::Unknown => "unknown",
        }
    }
}

/// Normalized payment event handed to the sink.
///
/// Built only by [`crate::analyze::extractor::Extractor::extract`] from a
/// signal that passed classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct PaymentEvent {
    pub source: SignalSource,
    pub origin_identity: String,
    pub raw_text: String,
    pub observed_at: DateTime<Utc>,
    pub extracted_amount: Option<Decimal>,
    pub currency_hint: Option<String>,
    pub direction_hint: Direction,
    /// UPI VPA or counterparty name, when one could be read.
    pub counterpart: Option<String>,
    /// Display name of the originating payment app or SMS sender.
    pub app_name: Option<String>,
}
