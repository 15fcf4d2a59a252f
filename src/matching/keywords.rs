//! Keyword-set extraction and overlap scoring.
//!
//! Candidate product names and the query are both reduced to keyword sets
//! (lowercase, stop words removed, synonyms folded) and compared by how much
//! of the query the candidate covers.

use std::collections::{HashMap, HashSet};
use url::Url;

/// Stop words and synonyms used when building keyword sets for one vendor.
#[derive(Debug, Clone, Default)]
pub struct KeywordProfile {
    stop_words: HashSet<String>,
    synonyms: HashMap<String, String>,
}

impl KeywordProfile {
    /// Creates a profile from stop words and `(alias, canonical)` pairs.
    pub fn new(stop_words: &[&str], synonyms: &[(&str, &str)]) -> Self {
        Self {
            stop_words: stop_words.iter().map(|s| s.to_string()).collect(),
            synonyms: synonyms.iter().map(|(a, c)| (a.to_string(), c.to_string())).collect(),
        }
    }

    /// Cambridge Pavers: brand and packaging words carry no signal.
    pub fn cambridge() -> Self {
        Self::new(
            &[
                "cambridge", "pavers", "pavingstones", "collection", "design", "kit", "pc",
                "piece", "with", "and", "for", "the",
            ],
            &[],
        )
    }

    /// Purina Mills site search results.
    pub fn purina_search() -> Self {
        Self::new(
            &[
                "purina", "mills", "feed", "food", "formula", "complete", "original", "with",
                "and", "for", "high", "fat", "balanced", "supplement", "horse", "equine",
                "active", "senior", "animal", "nutrition",
            ],
            &[("equine", "horse"), ("hen", "poultry"), ("chicken", "poultry")],
        )
    }

    /// Purina Mills "all products" index; the catalog names are noisier.
    pub fn purina_index() -> Self {
        Self::new(
            &[
                "purina", "animal", "nutrition", "mills", "feed", "food", "formula", "complete",
                "original", "with", "and", "for", "high", "fat", "balanced", "pellet", "pellets",
                "crumbles", "textured", "supplement", "block", "mineral", "minerals", "all",
                "life", "stages",
            ],
            &[
                ("equine", "horse"),
                ("bovine", "cattle"),
                ("beef", "cattle"),
                ("hen", "poultry"),
                ("chicken", "poultry"),
                ("layers", "layer"),
            ],
        )
    }

    fn canonical<'a>(&'a self, token: &'a str) -> &'a str {
        self.synonyms.get(token).map(String::as_str).unwrap_or(token)
    }

    /// Lowercases, splits on non-word characters and drops noise tokens.
    pub fn keyword_set(&self, s: &str) -> HashSet<String> {
        let lower = s.to_lowercase();
        lower
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| t.chars().count() >= 2 && !t.chars().all(|c| c.is_ascii_digit()))
            .map(|t| self.canonical(t))
            .filter(|t| !self.stop_words.contains(*t))
            .map(str::to_string)
            .collect()
    }

    /// Keywords from the last path segment of a product URL.
    pub fn slug_tokens(&self, url: &str) -> HashSet<String> {
        let path = Url::parse(url).map(|u| u.path().to_string()).unwrap_or_else(|_| {
            crate::normalize::image::strip_query_params(url)
        });
        let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or("").to_lowercase();

        last.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty() && !t.chars().all(|c| c.is_ascii_digit()))
            .map(|t| self.canonical(t))
            .filter(|t| !self.stop_words.contains(*t))
            .map(str::to_string)
            .collect()
    }

    /// Keyword set for an index entry: its display name plus its URL slug.
    pub fn entry_keywords(&self, name: &str, url: &str) -> HashSet<String> {
        let mut kw = self.keyword_set(name);
        kw.extend(self.slug_tokens(url));
        kw
    }
}

/// Fraction of query keywords present in the candidate (0.0 - 1.0).
pub fn fuzzy_match_score(candidate: &HashSet<String>, query: &HashSet<String>) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let hits = candidate.intersection(query).count();
    hits as f64 / query.len().max(1) as f64
}

/// Picks the best-scoring candidate at or above `threshold`.
///
/// Ties keep the earliest candidate.
pub fn best_match<'a, T, F>(
    candidates: &'a [T],
    query: &HashSet<String>,
    threshold: f64,
    keywords: F,
) -> Option<(&'a T, f64)>
where
    F: Fn(&T) -> &HashSet<String>,
{
    let mut best: Option<(&T, f64)> = None;
    for candidate in candidates {
        let score = fuzzy_match_score(keywords(candidate), query);
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best.filter(|(_, score)| *score > 0.0 && *score >= threshold)
}
