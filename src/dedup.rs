//! Deduplication gate: suppresses repeat emissions of one transaction seen
//! through several channels within a short window.
//!
//! The key is a fingerprint of the transaction plus a coarse time bucket
//! (`observed_at / window`). A recorded observation matches when the
//! fingerprints are equal, the buckets are adjacent, the two observation
//! times are less than one window apart, and the two events do not
//! contradict each other: direction and counterpart must be equal or
//! unknown on one side. Adjacent buckets are checked so that two
//! observations straddling a bucket edge still collide.
//!
//! State is a bounded, insertion-ordered record. Expired entries are swept
//! lazily on every call; once over capacity the oldest entries are evicted.
//! Check-and-record happens under a single lock.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

use crate::config::{DedupSettings, MAX_DEDUP_WINDOW_SECS};
use crate::event::{Direction, PaymentEvent};
use crate::ingest::normalize_text;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    fingerprint: String,
    bucket: i64,
}

impl DedupKey {
    pub fn for_event(event: &PaymentEvent, window_secs: u64) -> Self {
        let window = i64::try_from(window_secs).unwrap_or(i64::MAX).max(1);
        Self {
            fingerprint: fingerprint(event),
            bucket: event.observed_at.timestamp().div_euclid(window),
        }
    }

    fn is_near(&self, other: &DedupKey) -> bool {
        self.fingerprint == other.fingerprint && self.bucket.abs_diff(other.bucket) <= 1
    }
}

/// Hash of the transaction essence.
///
/// With an amount, the essence is currency + amount so the same transaction
/// worded differently on two channels collides. Without one, it falls back
/// to the case-folded, whitespace-collapsed text.
pub fn fingerprint(event: &PaymentEvent) -> String {
    let essence = match event.extracted_amount {
        Some(amount) => format!(
            "amt|{}|{}",
            event.currency_hint.as_deref().unwrap_or("?"),
            amount.normalize()
        ),
        None => format!("txt|{}", normalize_text(&event.raw_text)),
    };
    let digest = Sha256::digest(essence.as_bytes());
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug, Clone)]
struct Seen {
    key: DedupKey,
    at: DateTime<Utc>,
    direction: Direction,
    counterpart: Option<String>,
}

impl Seen {
    fn of(event: &PaymentEvent, key: DedupKey) -> Self {
        Self {
            key,
            at: event.observed_at,
            direction: event.direction_hint,
            counterpart: event.counterpart.as_deref().map(normalize_text),
        }
    }

    /// Same transaction unless direction or counterpart disagree.
    fn agrees_with(&self, other: &Seen) -> bool {
        let direction = self.direction == other.direction
            || self.direction == Direction::Unknown
            || other.direction == Direction::Unknown;
        let counterpart = match (&self.counterpart, &other.counterpart) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        direction && counterpart
    }
}

#[derive(Debug, Default)]
struct Record {
    order: VecDeque<Seen>,
}

impl Record {
    fn sweep(&mut self, now: DateTime<Utc>, window_ms: i64) {
        while let Some(front) = self.order.front() {
            if (now - front.at).num_milliseconds() < window_ms {
                break;
            }
            self.order.pop_front();
        }
    }

    fn matches(&self, candidate: &Seen, window_ms: i64) -> bool {
        self.order.iter().any(|seen| {
            seen.key.is_near(&candidate.key)
                && (candidate.at - seen.at).num_milliseconds().abs() < window_ms
                && seen.agrees_with(candidate)
        })
    }

    fn insert(&mut self, seen: Seen, capacity: usize) {
        self.order.push_back(seen);
        while self.order.len() > capacity {
            self.order.pop_front();
        }
    }
}

/// Thread-safe windowed dedup record. Share behind an `Arc`.
#[derive(Debug)]
pub struct DedupGate {
    window_secs: u64,
    capacity: usize,
    inner: Mutex<Record>,
}

impl DedupGate {
    /// Window is clamped to `1..=MAX_DEDUP_WINDOW_SECS`, capacity to at least 1.
    pub fn new(settings: &DedupSettings) -> Self {
        Self {
            window_secs: settings.window_secs.clamp(1, MAX_DEDUP_WINDOW_SECS),
            capacity: settings.capacity.max(1),
            inner: Mutex::new(Record::default()),
        }
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.window_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000)
    }

    /// `true` if the event should be emitted (and records it); `false` if a
    /// matching observation was seen within the window. Duplicates do not
    /// refresh recency.
    pub fn should_emit(&self, event: &PaymentEvent) -> bool {
        let candidate = Seen::of(event, DedupKey::for_event(event, self.window_secs));
        let window_ms = self.window_ms();

        let mut rec = self.inner.lock();
        rec.sweep(candidate.at, window_ms);
        if rec.matches(&candidate, window_ms) {
            tracing::debug!(
                target: "dedup",
                fingerprint = %candidate.key.fingerprint,
                bucket = candidate.key.bucket,
                source = %event.source,
                "suppressed duplicate payment event"
            );
            return false;
        }
        rec.insert(candidate, self.capacity);
        true
    }

    /// Number of retained observations.
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
