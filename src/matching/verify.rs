//! Sliding-scale token coverage check for a candidate product page.

use crate::matching::guards::{GuardChain, PageFacts, QueryFacts};
use std::collections::HashSet;

/// Outcome of verifying one candidate page against a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept { score: f64, coverage: f64, title: String },
    Reject(String),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept { .. })
    }

    pub fn score(&self) -> f64 {
        match self {
            Verdict::Accept { score, .. } => *score,
            Verdict::Reject(_) => 0.0,
        }
    }
}

/// Minimum share of title tokens the query must cover. Short titles need more.
fn min_coverage(title_len: usize) -> f64 {
    if title_len <= 4 {
        0.75
    } else {
        0.60
    }
}

/// Scores `page` against the normalized query after the hard guards pass.
pub fn verify_candidate(
    page: &PageFacts,
    query_norm: &str,
    query: &QueryFacts,
    guards: &GuardChain,
) -> Verdict {
    if let Some(reason) = guards.check(page) {
        return Verdict::Reject(format!("reject: {reason}"));
    }

    let query_tokens: Vec<&str> = query_norm.split_whitespace().collect();
    let title_tokens: Vec<&str> = page.title_norm.split_whitespace().collect();
    let slug_upper = page.slug.to_uppercase();

    let token_set: HashSet<&str> =
        title_tokens.iter().copied().chain(slug_upper.split('-')).collect();

    let matches = query_tokens.iter().filter(|t| token_set.contains(*t)).count();
    let n_title = title_tokens.len().max(1);
    let coverage = matches as f64 / n_title as f64;
    let q_cov = matches as f64 / query_tokens.len().max(1) as f64;

    if matches < 2 || coverage < min_coverage(n_title) || q_cov < 0.5 {
        return Verdict::Reject(format!(
            "below coverage (cov={coverage:.2}, q_cov={q_cov:.2}, title_len={n_title})"
        ));
    }

    let mut score = 1.2 * matches as f64;
    if !query.forms.is_empty() {
        let form_hits = query.forms.intersection(&page.forms).count();
        score += if form_hits > 0 { 1.5 * form_hits as f64 } else { -0.8 };
    }

    let slug_hits = query_tokens.iter().filter(|t| slug_upper.contains(*t)).count();
    if slug_hits >= 2 {
        score += 0.6;
    }

    Verdict::Accept { score, coverage, title: page.title.clone() }
}
