//! Character-level string similarity on a 0-100 scale, backed by `rapidfuzz`.

use rapidfuzz::fuzz;

/// Normalized Indel similarity scaled to 0-100.
///
/// Two empty strings are identical (100.0).
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    fuzz::ratio(a.chars(), b.chars()) * 100.0
}

/// [`ratio`] after sorting whitespace-separated tokens, so word order is ignored.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
