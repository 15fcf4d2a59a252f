//! Size extraction and tolerance matching.
//!
//! Sizes are grouped by unit family so "1 LB" and "16 OZ" compare equal.

use regex_lite::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Default relative tolerance for size comparison.
pub const SIZE_TOLERANCE: f64 = 0.08;

static INCHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(\d+(?:\.\d+)?)\s*(?:"|(?:INCH(?:ES)?|IN)\b)"#).unwrap());
static MEASURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*([A-Z]+)\b").unwrap());

/// Measured sizes keyed by unit family (`IN`, `OZ`, `G`, `ML`, `QT`).
pub type Sizes = BTreeMap<&'static str, Vec<f64>>;

/// Maps a unit spelling to its family and the multiplier into that family's base unit.
fn unit_family(unit: &str) -> Option<(&'static str, f64)> {
    let family = match unit {
        "IN" => ("IN", 1.0),
        "OZ" | "OUNCE" | "OUNCES" => ("OZ", 1.0),
        "LB" | "LBS" | "POUND" | "POUNDS" => ("OZ", 16.0),
        "G" | "GRAM" | "GRAMS" => ("G", 1.0),
        "KG" => ("G", 1000.0),
        "ML" | "MLS" => ("ML", 1.0),
        "L" | "LITER" | "LITERS" => ("ML", 1000.0),
        "QT" | "QTS" | "QUART" | "QUARTS" => ("QT", 1.0),
        "GAL" | "GALS" | "GALLON" | "GALLONS" => ("QT", 4.0),
        _ => return None,
    };
    Some(family)
}

/// True when no digit directly precedes the match.
fn starts_number(haystack: &str, start: usize) -> bool {
    !haystack[..start].ends_with(|c: char| c.is_ascii_digit())
}

/// Extracts every measurement from the text.
pub fn extract_sizes(text: &str) -> Sizes {
    let mut families = Sizes::new();
    if text.trim().is_empty() {
        return families;
    }

    let s = format!(" {} ", text.to_uppercase().replace(['\u{201C}', '\u{201D}'], "\""));

    for caps in INCHES.captures_iter(&s) {
        let value = &caps[1];
        if !starts_number(&s, caps.get(1).map_or(0, |m| m.start())) {
            continue;
        }
        if let Ok(v) = value.parse::<f64>() {
            families.entry("IN").or_default().push(v);
        }
    }

    for caps in MEASURE.captures_iter(&s) {
        if !starts_number(&s, caps.get(1).map_or(0, |m| m.start())) {
            continue;
        }
        let Some((family, multiplier)) = unit_family(&caps[2]) else {
            continue;
        };
        if let Ok(v) = caps[1].parse::<f64>() {
            families.entry(family).or_default().push(v * multiplier);
        }
    }

    families
}

/// Checks that every unit family present on both sides agrees within `tolerance`.
///
/// Families that only one side mentions are ignored.
pub fn sizes_match(query: &Sizes, product: &Sizes, tolerance: f64) -> bool {
    product.iter().all(|(family, product_vals)| {
        let Some(query_vals) = query.get(family).filter(|v| !v.is_empty()) else {
            return true;
        };
        if product_vals.is_empty() {
            return true;
        }
        product_vals.iter().any(|&p| {
            p != 0.0 && query_vals.iter().any(|&q| (p - q).abs() / p <= tolerance)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_sizes_inches() {
        let sizes = extract_sizes("Play Strong Ball 3.25\"");
        assert_eq!(sizes.get("IN"), Some(&vec![3.25]));

        let sizes = extract_sizes("Tug Rope 12 inch");
        assert_eq!(sizes.get("IN"), Some(&vec![12.0]));

        let sizes = extract_sizes("BALL 5\"");
        assert_eq!(sizes.get("IN"), Some(&vec![5.0]));

        let sizes = extract_sizes("Ball 3.25\" Orange");
        assert_eq!(sizes.get("IN"), Some(&vec![3.25]));
    }

    #[test]
    fn test_extract_sizes_after_leading_dot() {
        // Only a digit blocks the match, so ".5IN" reads as 5
        let sizes = extract_sizes("Ball X.5IN");
        assert_eq!(sizes.get("IN"), Some(&vec![5.0, 5.0]));

        let sizes = extract_sizes("Ball 10.5IN");
        assert_eq!(sizes.get("IN"), Some(&vec![10.5, 10.5]));
    }

    #[test]
    fn test_extract_sizes_in_unit_counted_by_both_patterns() {
        // "IN" is picked up by the inch scan and again by the unit scan
        let sizes = extract_sizes("Ball 4IN");
        assert_eq!(sizes.get("IN"), Some(&vec![4.0, 4.0]));
    }

    #[test]
    fn test_extract_sizes_weight_conversion() {
        let sizes = extract_sizes("Layena Pellets 50 lb");
        assert_eq!(sizes.get("OZ"), Some(&vec![800.0]));

        let sizes = extract_sizes("Treats 16oz and 2.5 KG");
        assert_eq!(sizes.get("OZ"), Some(&vec![16.0]));
        assert_eq!(sizes.get("G"), Some(&vec![2500.0]));
    }

    #[test]
    fn test_extract_sizes_volume() {
        let sizes = extract_sizes("Waterer 1 GAL");
        assert_eq!(sizes.get("QT"), Some(&vec![4.0]));
        let sizes = extract_sizes("Shampoo 2 L");
        assert_eq!(sizes.get("ML"), Some(&vec![2000.0]));
    }

    #[test]
    fn test_extract_sizes_ignores_unknown_units() {
        assert!(extract_sizes("Pack of 3 PCS").is_empty());
        assert!(extract_sizes("").is_empty());
    }

    #[test]
    fn test_sizes_match_within_tolerance() {
        let query = extract_sizes("BALL 3.25IN");
        let product = extract_sizes("Ball 3.5\"");
        // |3.5 - 3.25| / 3.5 = 0.071
        assert!(sizes_match(&query, &product, SIZE_TOLERANCE));

        let product = extract_sizes("Ball 5\"");
        assert!(!sizes_match(&query, &product, SIZE_TOLERANCE));
    }

    #[test]
    fn test_sizes_match_cross_unit() {
        let query = extract_sizes("1 LB bag");
        let product = extract_sizes("16 oz bag");
        assert!(sizes_match(&query, &product, SIZE_TOLERANCE));
    }

    #[test]
    fn test_sizes_match_ignores_one_sided_families() {
        let query = extract_sizes("Ball 3 IN");
        let product = extract_sizes("Treat 8 oz");
        assert!(sizes_match(&query, &product, SIZE_TOLERANCE));
        assert!(sizes_match(&Sizes::new(), &product, SIZE_TOLERANCE));
        assert!(sizes_match(&query, &Sizes::new(), SIZE_TOLERANCE));
    }
}
