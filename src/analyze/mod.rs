// src/analyze/mod.rs
//! Payment analysis: classification of raw signals and field extraction.

pub mod classifier;
pub mod extractor;

// Re-export convenient types.
pub use crate::analyze::classifier::{Classifier, RejectReason, Verdict};
pub use crate::analyze::extractor::{extract_counterpart, AmountMatch, Extractor};
