//! UPC normalization and 12/13-digit conversion.
//!
//! A UPC is the join key between input rows, vendor catalogs and product
//! pages. Every comparison goes through [`normalize_upc`] first.

use regex_lite::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static UPC_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{12,13})\b").unwrap());

/// Strips every non-digit character.
pub fn normalize_upc(upc: &str) -> String {
    upc.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Returns true if the normalized UPC has 12 or 13 digits.
pub fn is_valid_upc(upc: &str) -> bool {
    matches!(normalize_upc(upc).len(), 12 | 13)
}

/// Converts a 12-digit UPC-A to a 13-digit EAN by prefixing a zero.
///
/// Anything that is not 12 digits comes back normalized but otherwise untouched.
pub fn upc_12_to_13(upc: &str) -> String {
    let clean = normalize_upc(upc);
    if clean.len() == 12 {
        format!("0{clean}")
    } else {
        clean
    }
}

/// Converts a 13-digit EAN to a 12-digit UPC-A when it has a leading zero.
pub fn upc_13_to_12(upc: &str) -> String {
    let clean = normalize_upc(upc);
    if clean.len() == 13 && clean.starts_with('0') {
        clean[1..].to_string()
    } else {
        clean
    }
}

/// Finds every standalone 12/13-digit code in free text.
///
/// Leading-zero EANs are folded to 12 digits; other 13-digit codes are
/// dropped. Output is sorted and unique.
pub fn extract_upcs_from_text(text: &str) -> Vec<String> {
    let mut found = BTreeSet::new();

    for caps in UPC_RUN.captures_iter(text) {
        let code = upc_13_to_12(&caps[1]);
        if code.len() == 12 {
            found.insert(code);
        }
    }

    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_upc_strips_non_digits() {
        assert_eq!(normalize_upc("0-12345-67890-5"), "012345678905");
        assert_eq!(normalize_upc(" 077 234 "), "077234");
        assert_eq!(normalize_upc("UPC: n/a"), "");
        assert_eq!(normalize_upc(""), "");
    }

    #[test]
    fn test_normalize_upc_idempotent() {
        for raw in ["0-12345-67890-5", "abc", "12 34", "", "0077234012345"] {
            let once = normalize_upc(raw);
            assert_eq!(normalize_upc(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_is_valid_upc() {
        assert!(is_valid_upc("012345678905"));
        assert!(is_valid_upc("0012345678905"));
        assert!(is_valid_upc("0-12345-67890-5"));
        assert!(!is_valid_upc("12345"));
        assert!(!is_valid_upc("12345678901234"));
        assert!(!is_valid_upc(""));
    }

    #[test]
    fn test_upc_12_to_13() {
        assert_eq!(upc_12_to_13("012345678905"), "0012345678905");
        assert_eq!(upc_12_to_13("12345"), "12345");
        assert_eq!(upc_12_to_13("0012345678905"), "0012345678905");
    }

    #[test]
    fn test_upc_13_to_12() {
        assert_eq!(upc_13_to_12("0012345678905"), "012345678905");
        // Non-zero EAN prefixes are not UPC-A codes
        assert_eq!(upc_13_to_12("5012345678900"), "5012345678900");
        assert_eq!(upc_13_to_12("012345678905"), "012345678905");
    }

    #[test]
    fn test_upc_roundtrip_with_leading_zero() {
        for upc in ["012345678905", "786453001226", "000000000000"] {
            assert_eq!(upc_13_to_12(&upc_12_to_13(upc)), upc);
        }
        let ean = "0786453001226";
        assert_eq!(upc_12_to_13(&upc_13_to_12(ean)), ean);
    }

    #[test]
    fn test_extract_upcs_from_text() {
        let text = "Item 012345678905, alt EAN 0786453001226 and 5012345678900; bad 12345";
        assert_eq!(extract_upcs_from_text(text), vec!["012345678905", "786453001226"]);
    }

    #[test]
    fn test_extract_upcs_dedupes_and_sorts() {
        let text = "786453001226 012345678905 0786453001226";
        assert_eq!(extract_upcs_from_text(text), vec!["012345678905", "786453001226"]);
        assert!(extract_upcs_from_text("").is_empty());
        // Embedded in a longer digit run is not a standalone code
        assert!(extract_upcs_from_text("12345678901234567").is_empty());
    }
}
