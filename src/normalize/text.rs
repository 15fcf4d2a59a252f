//! HTML stripping, entity decoding and whitespace normalization.

use regex_lite::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::sync::LazyLock;

static BR_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<\s*br\s*/?>").unwrap());
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static HSPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").unwrap());
static AROUND_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\n\s*").unwrap());
static WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DASH_BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n?\s*[–—-]\s+").unwrap());

/// Decodes HTML entities (`&amp;`, `&#8217;`, ...) in tag-free text.
pub fn unescape_html(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    // html5ever decodes entities while building text nodes
    let escaped = s.replace('<', "&lt;");
    Html::parse_fragment(&escaped).root_element().text().collect()
}

/// Strips tags and decodes entities, turning `<br>` into newlines.
pub fn text_only(s: &str) -> String {
    let s = BR_TAG.replace_all(s, "\n");
    let s = ANY_TAG.replace_all(&s, "");
    unescape_html(&s).trim().to_string()
}

/// Like [`text_only`] but with tags replaced by spaces and whitespace tidied.
pub fn plain_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let txt = BR_TAG.replace_all(html, "\n");
    let txt = ANY_TAG.replace_all(&txt, " ");
    let txt = unescape_html(&txt);
    let txt = HSPACE.replace_all(&txt, " ");
    let txt = AROUND_NEWLINE.replace_all(&txt, "\n");
    txt.trim().to_string()
}

/// Collapses all whitespace runs into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    WS.replace_all(s.trim(), " ").into_owned()
}

/// Splits a description into bullet points if it reads like a list.
///
/// Returns an empty vector for prose.
pub fn extract_bullet_points(description: &str) -> Vec<String> {
    if description.trim().is_empty() {
        return Vec::new();
    }

    let norm = description.trim().replace("\r\n", "\n").replace('\r', "\n");
    let norm = norm
        .replace("..", "\n")
        .replace(';', "\n")
        .replace(['•', '·', '●'], "\n");
    let norm = DASH_BULLET.replace_all(&norm, "\n");

    let parts: Vec<&str> = norm
        .split('\n')
        .map(|p| p.trim_matches(|c| matches!(c, ' ' | '.' | '•' | '\t')))
        .filter(|p| !p.is_empty())
        .collect();

    let short = parts.iter().filter(|p| p.chars().count() <= 140).count();
    let needed = 2.max((0.6 * parts.len() as f64) as usize);
    if parts.len() < 2 || short < needed {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for part in parts {
        let item = tidy_bullet(part);
        if !item.is_empty() && seen.insert(item.to_lowercase()) {
            out.push(item);
        }
    }
    out
}

fn tidy_bullet(raw: &str) -> String {
    let mut item = raw.trim();
    if let Some(stripped) = item.strip_suffix('.') {
        item = stripped.trim();
    }

    let is_shouting = item.chars().count() > 2
        && item.chars().any(|c| c.is_alphabetic())
        && !item.chars().any(|c| c.is_lowercase());
    if !is_shouting {
        return item.to_string();
    }

    let lower = item.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_only() {
        assert_eq!(text_only("<p>Hello<br/>World</p>"), "Hello\nWorld");
        assert_eq!(text_only("Tom &amp; Jerry&#8217;s"), "Tom & Jerry\u{2019}s");
        assert_eq!(text_only("  <b>bold</b>  "), "bold");
        assert_eq!(text_only(""), "");
    }

    #[test]
    fn test_plain_text() {
        let html = "<div><p>First   line</p><BR>  <p>Second\tline</p></div>";
        assert_eq!(plain_text(html), "First line\nSecond line");
        assert_eq!(plain_text(""), "");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b   c "), "a b c");
        assert_eq!(normalize_whitespace(""), "");
    }

    #[test]
    fn test_unescape_keeps_plain_text() {
        assert_eq!(unescape_html("5 < 6 &gt; 4"), "5 < 6 > 4");
        assert_eq!(unescape_html("no entities"), "no entities");
    }

    #[test]
    fn test_extract_bullet_points_list() {
        let desc = "HIGH PROTEIN; Made in USA; Supports healthy digestion.";
        assert_eq!(
            extract_bullet_points(desc),
            vec!["High protein", "Made in USA", "Supports healthy digestion"]
        );
    }

    #[test]
    fn test_extract_bullet_points_dedupes() {
        let desc = "• Durable rubber • durable rubber • Floats in water";
        assert_eq!(extract_bullet_points(desc), vec!["Durable rubber", "Floats in water"]);
    }

    #[test]
    fn test_extract_bullet_points_prose_is_empty() {
        let prose = "This single sentence describes a dog toy that bounces and floats.";
        assert!(extract_bullet_points(prose).is_empty());
        assert!(extract_bullet_points("").is_empty());
    }

    #[test]
    fn test_extract_bullet_points_long_items_rejected() {
        let long = "x".repeat(200);
        let desc = format!("{long}; {long}; short");
        assert!(extract_bullet_points(&desc).is_empty());
    }
}
