//! Accent and case folding for filter values and question matching
//!
//! All metadata comparisons in the engine go through [`normalize`] so that
//! "Théorème" and "theoreme" refer to the same canonical value. The fold is
//! idempotent: applying it twice yields the same string.

use unicode_normalization::UnicodeNormalization;

/// Fold a string to its canonical comparison form: lowercase, NFKD
/// decomposition with combining marks stripped, surrounding whitespace
/// trimmed.
pub fn normalize(s: &str) -> String {
    let folded: String = s
        .to_lowercase()
        .nfkd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect();

    folded.trim().to_string()
}

/// Fold a whole question into a key suitable for canonical-route lookup:
/// [`normalize`] plus punctuation collapsed to single spaces.
pub fn fold_key(s: &str) -> String {
    let folded = normalize(s);

    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
