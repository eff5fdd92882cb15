// src/ingest/mod.rs
pub mod adapters;
pub mod types;

/// Case-fold and collapse whitespace runs to a single space.
pub fn normalize_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = false;
    for ch in s.chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out.trim().to_string()
}

/// Short, stable id for a piece of text. Raw message bodies are never logged;
/// this id is logged instead.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_folds_case_and_whitespace() {
        assert_eq!(
            normalize_text("  You\tRECEIVED\n\n ₹500   from Raj "),
            "you received ₹500 from raj"
        );
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("Rs 500 credited");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("Rs 500 credited"));
        assert_ne!(a, anon_hash("Rs 501 credited"));
    }
}
