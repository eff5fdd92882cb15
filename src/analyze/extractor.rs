//! Field extractor: amount, currency, direction, counterpart and app name.
//!
//! Extraction never fails. Anything that cannot be read is left as `None`
//! (or `Direction::Unknown`).
//!
//! Amount rule: a currency marker and a numeric literal (thousands
//! separators, up to two decimals) separated by at most
//! `amount_token_window` whitespace tokens, in either order. Markers are
//! scanned left to right; each prefers the number after it, then the one
//! before it.

use once_cell::sync::OnceCell;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::config::{ConfigError, PipelineConfig};
use crate::event::{Direction, PaymentEvent};
use crate::ingest::types::{RawSignal, SignalSource};

/// Leading words that look like a name after "from"/"to" but are not one.
const NOT_A_NAME: &[&str] = &[
    "a", "ac", "acct", "account", "bank", "imps", "inr", "neft", "rs", "rtgs", "upi", "you",
    "your",
];

fn number_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:,\d+)*(?:\.\d{1,2})?").expect("number regex"))
}

fn vpa_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9][A-Za-z0-9._\-]*@[A-Za-z][A-Za-z0-9]*").expect("vpa regex")
    })
}

fn name_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:[Ff]rom|[Tt]o|[Bb]y)\s+([A-Z][A-Za-z.]+(?:\s+[A-Z][A-Za-z.]+){0,2})")
            .expect("counterpart regex")
    })
}

/// Amount + canonical currency read from one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountMatch {
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct Extractor {
    marker_re: Option<Regex>,
    /// normalized marker (lowercase, no trailing '.') -> canonical code
    marker_codes: HashMap<String, String>,
    token_window: usize,
    credit_words: Vec<String>,
    debit_words: Vec<String>,
    app_names: HashMap<String, String>,
    sender_names: Vec<(String, String)>,
}

impl Extractor {
    pub fn new(cfg: &PipelineConfig) -> Result<Self, ConfigError> {
        let mut markers: Vec<&str> = cfg
            .currency_markers
            .iter()
            .map(|m| m.marker.as_str())
            .collect();
        // Longest first so "rs." wins over a shorter overlapping marker.
        markers.sort_by_key(|m| std::cmp::Reverse(m.chars().count()));

        let marker_re = if markers.is_empty() {
            None
        } else {
            let alternation = markers
                .iter()
                .map(|m| marker_pattern(m))
                .collect::<Vec<_>>()
                .join("|");
            let re = Regex::new(&format!("(?i)(?:{alternation})"))
                .map_err(|e| ConfigError::Invalid(format!("currency marker regex: {e}")))?;
            Some(re)
        };

        let marker_codes = cfg
            .currency_markers
            .iter()
            .map(|m| (normalize_marker(&m.marker), m.code.clone()))
            .collect();

        let app_names = cfg
            .apps
            .iter()
            .filter_map(|a| {
                a.name
                    .as_ref()
                    .map(|n| (a.package.to_ascii_lowercase(), n.clone()))
            })
            .collect();

        let sender_names = cfg
            .senders
            .iter()
            .filter_map(|s| s.name.as_ref().map(|n| (s.token.to_lowercase(), n.clone())))
            .collect();

        Ok(Self {
            marker_re,
            marker_codes,
            token_window: cfg.amount_token_window,
            credit_words: cfg.direction.credit.iter().map(|w| w.to_lowercase()).collect(),
            debit_words: cfg.direction.debit.iter().map(|w| w.to_lowercase()).collect(),
            app_names,
            sender_names,
        })
    }

    /// Build a [`PaymentEvent`] from an accepted signal. Pure.
    pub fn extract(&self, signal: &RawSignal) -> PaymentEvent {
        let body = signal.body();
        let title = signal.title();

        let amount = self
            .extract_amount(body)
            .or_else(|| title.and_then(|t| self.extract_amount(t)));
        let counterpart =
            extract_counterpart(body).or_else(|| title.and_then(extract_counterpart));

        let (extracted_amount, currency_hint) = match amount {
            Some(m) => (Some(m.amount), Some(m.currency)),
            None => (None, None),
        };

        PaymentEvent {
            source: signal.source(),
            origin_identity: signal.origin_identity().to_string(),
            raw_text: body.to_string(),
            observed_at: signal.observed_at(),
            extracted_amount,
            currency_hint,
            direction_hint: self.direction(body),
            counterpart,
            app_name: self.app_name(signal),
        }
    }

    pub fn extract_amount(&self, text: &str) -> Option<AmountMatch> {
        let marker_re = self.marker_re.as_ref()?;
        let numbers = number_candidates(text);
        if numbers.is_empty() {
            return None;
        }

        for m in marker_re.find_iter(text) {
            let after = numbers
                .iter()
                .find(|n| n.start >= m.end())
                .filter(|n| n.start == m.end() || n.standalone)
                .filter(|n| gap_tokens(&text[m.end()..n.start]) <= self.token_window);
            let before = || {
                numbers
                    .iter()
                    .rev()
                    .find(|n| n.end <= m.start())
                    .filter(|n| n.standalone)
                    .filter(|n| gap_tokens(&text[n.end..m.start()]) <= self.token_window)
            };

            let Some(num) = after.or_else(before) else {
                continue;
            };
            let Some(amount) = parse_amount(num.text) else {
                continue;
            };
            let Some(code) = self.marker_codes.get(&normalize_marker(m.as_str())) else {
                continue;
            };
            return Some(AmountMatch {
                amount,
                currency: code.clone(),
            });
        }
        None
    }

    /// Credited / Paid only when exactly one keyword family matches.
    pub fn direction(&self, text: &str) -> Direction {
        let lower = text.to_lowercase();
        let credit = self.credit_words.iter().any(|w| lower.contains(w.as_str()));
        let debit = self.debit_words.iter().any(|w| lower.contains(w.as_str()));
        match (credit, debit) {
            (true, false) => Direction::Credited,
            (false, true) => Direction::Paid,
            _ => Direction::Unknown,
        }
    }

    fn app_name(&self, signal: &RawSignal) -> Option<String> {
        let origin = signal.origin_identity();
        match signal.source() {
            SignalSource::Notification | SignalSource::AccessibilityEvent => {
                self.app_names.get(&origin.to_ascii_lowercase()).cloned()
            }
            SignalSource::SmsMessage => {
                let lower = origin.to_lowercase();
                self.sender_names
                    .iter()
                    .find(|(tok, _)| lower.contains(tok.as_str()))
                    .map(|(_, name)| name.clone())
            }
        }
    }
}

/// VPA (`name@handle`) first, otherwise a capitalised name after from/to/by.
pub fn extract_counterpart(text: &str) -> Option<String> {
    if let Some(m) = vpa_re().find(text) {
        return Some(m.as_str().trim_end_matches('.').to_string());
    }
    for caps in name_re().captures_iter(text) {
        let Some(m) = caps.get(1) else { continue };
        let name = m.as_str().trim_end_matches('.');
        let first = name
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_end_matches('.')
            .to_ascii_lowercase();
        if NOT_A_NAME.contains(&first.as_str()) {
            continue;
        }
        return Some(name.to_string());
    }
    None
}

#[derive(Debug)]
struct NumberCandidate<'a> {
    start: usize,
    end: usize,
    text: &'a str,
    /// Not glued to a preceding letter or digit (e.g. the "1234" in "XX1234").
    standalone: bool,
}

fn number_candidates(text: &str) -> Vec<NumberCandidate<'_>> {
    number_re()
        .find_iter(text)
        .filter(|m| {
            // "500.123" is not a two-decimal literal
            !text[m.end()..].starts_with(|c: char| c.is_ascii_digit())
        })
        .map(|m| NumberCandidate {
            start: m.start(),
            end: m.end(),
            text: m.as_str(),
            standalone: !text[..m.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric()),
        })
        .collect()
}

fn gap_tokens(gap: &str) -> usize {
    gap.split_whitespace().count()
}

fn parse_amount(literal: &str) -> Option<Decimal> {
    Decimal::from_str(&literal.replace(',', "")).ok()
}

/// Regex for one configured marker. A trailing '.' is optional in text and
/// alphabetic markers must start on a word boundary.
fn marker_pattern(marker: &str) -> String {
    let (core, dotted) = match marker.strip_suffix('.') {
        Some(core) if !core.is_empty() => (core, true),
        _ => (marker, false),
    };
    let mut pat = String::new();
    if core.chars().next().is_some_and(|c| c.is_alphanumeric()) {
        pat.push_str(r"\b");
    }
    pat.push_str(&regex::escape(core));
    if dotted {
        pat.push_str(r"\.?");
    }
    pat
}

fn normalize_marker(marker: &str) -> String {
    let lower = marker.to_lowercase();
    match lower.strip_suffix('.') {
        Some(core) if !core.is_empty() => core.to_string(),
        _ => lower,
    }
}
