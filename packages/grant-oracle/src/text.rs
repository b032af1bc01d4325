//! Text normalization and content hashing.

use sha2::{Digest, Sha256};

/// Normalize text for comparison.
///
/// - Convert to lowercase
/// - Replace every non-alphanumeric character with a space
/// - Collapse runs of whitespace and trim
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize, then drop every word found in `noise`.
pub fn normalize_without(text: &str, noise: &[&str]) -> String {
    normalize(text)
        .split(' ')
        .filter(|w| !w.is_empty() && !noise.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// SHA256 over the normalized form of each part, joined with `|`.
///
/// Robust against case and punctuation changes, so re-discovering the same
/// grant at the same source yields the same identifier.
pub fn content_hash(parts: &[&str]) -> String {
    let normalized = parts
        .iter()
        .map(|p| normalize(p))
        .collect::<Vec<_>>()
        .join("|");

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}
