//! Ethical Products (WooCommerce): site search plus page verification.
//!
//! Search results are noisy, so every candidate page is fetched and checked:
//! hard guards first (species, flavor, product line, size), then a
//! sliding-scale token coverage score. The best-scoring accepted page wins.

use crate::matching::guards::{GuardChain, GuardChainBuilder, PageFacts, QueryFacts};
use crate::matching::names::normalize_name;
use crate::matching::verify::{verify_candidate, Verdict};
use crate::models::InputRow;
use crate::normalize::upc::normalize_upc;
use crate::site::{resolve_url, PageParser, SiteFetch};
use crate::vendors::{Locator, Vendor};
use anyhow::Result;
use async_trait::async_trait;
use regex_lite::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

static ABSOLUTE_PRODUCT_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r##"(?i)href="([^"]+/product/[^"#?]+/)""##).unwrap());

static RELATIVE_PRODUCT_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)href="/product/([^"]+?)/""#).unwrap());

static WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const MAX_SEARCH_RESULTS: usize = 12;
const MAX_VERIFIED: usize = 10;

/// A candidate page that passed verification.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub url: String,
    pub score: f64,
    pub coverage: f64,
    pub title: String,
}

/// Locates Ethical product pages by UPC, description or title.
pub struct EthicalSearcher {
    origin: String,
}

impl Default for EthicalSearcher {
    fn default() -> Self {
        Self::new(Vendor::Ethical.origin())
    }
}

impl EthicalSearcher {
    pub fn new(origin: impl Into<String>) -> Self {
        Self { origin: origin.into().trim_end_matches('/').to_string() }
    }

    /// Product URLs from the site search for `query`, at most 12.
    ///
    /// `query` is sent as-is, so callers join words with `+`. A failed
    /// search yields no candidates.
    pub async fn search_site(&self, query: &str, client: &dyn SiteFetch) -> Vec<String> {
        let url = format!("{}/?s={}", self.origin, query);
        let html = match client.get(&url).await {
            Ok(html) => html,
            Err(e) => {
                debug!("Search '{}' failed: {:#}", query, e);
                String::new()
            }
        };

        let absolute = ABSOLUTE_PRODUCT_HREF
            .captures_iter(&html)
            .map(|c| resolve_url(&self.origin, &c[1]));
        let relative = RELATIVE_PRODUCT_HREF
            .captures_iter(&html)
            .map(|c| format!("{}/product/{}/", self.origin, &c[1]));

        let mut seen = HashSet::new();
        let candidates: Vec<String> = absolute
            .chain(relative)
            .filter(|u| seen.insert(u.clone()))
            .take(MAX_SEARCH_RESULTS)
            .collect();

        debug!("Search '{}' returned {} candidate(s)", query, candidates.len());
        candidates
    }

    /// Fetches a candidate page and scores it against the query.
    ///
    /// An unreachable page is verified as an empty one, which always fails coverage.
    pub async fn verify_product(
        &self,
        url: &str,
        query_norm: &str,
        query: &QueryFacts,
        guards: &GuardChain,
        client: &dyn SiteFetch,
    ) -> Verdict {
        let html = client.get(url).await.unwrap_or_default();

        let document = Html::parse_document(&html);
        let title = PageParser::title(&document);
        let taxonomy = PageParser::taxonomy(&document);
        let slug = slug_of(url);

        let page = PageFacts::new(&title, &slug, taxonomy, &html);
        verify_candidate(&page, query_norm, query, guards)
    }

    /// Verifies the first ten candidates and returns the best accepted one.
    pub async fn find_best_match(
        &self,
        candidates: &[String],
        query_norm: &str,
        query: &QueryFacts,
        client: &dyn SiteFetch,
    ) -> Option<RankedCandidate> {
        let guards = GuardChainBuilder::for_query(query).build();
        if !guards.is_empty() {
            debug!("Active guards: {}", guards.descriptions().join(", "));
        }

        let mut ranked: Vec<RankedCandidate> = Vec::new();
        for url in candidates.iter().take(MAX_VERIFIED) {
            match self.verify_product(url, query_norm, query, &guards, client).await {
                Verdict::Accept { score, coverage, title } => {
                    ranked.push(RankedCandidate { url: url.clone(), score, coverage, title });
                }
                Verdict::Reject(reason) => debug!("reject: {} :: {}", url, reason),
            }
        }

        // stable sort keeps search order among equal scores
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        for candidate in ranked.iter().take(5) {
            debug!(
                " - score={:.2} cov={:.2} title='{}' url={}",
                candidate.score, candidate.coverage, candidate.title, candidate.url
            );
        }

        let best = ranked.into_iter().next()?;
        info!("Match via name: q='{}' -> {} (score={:.2})", query_norm, best.url, best.score);
        Some(best)
    }

    /// Tries the UPC, `+UPC`, the normalized description, then the normalized title.
    pub async fn find_product_url(
        &self,
        row: &InputRow,
        client: &dyn SiteFetch,
    ) -> Option<String> {
        let upc = row.upc().map(|u| normalize_upc(&u)).unwrap_or_default();
        let description = row.description().unwrap_or_default();
        let title = row.upcitemdb_title().unwrap_or_default();

        let query = QueryFacts::from_texts(&description, &title);

        if !upc.is_empty() {
            for q in [upc.clone(), format!("%2B{upc}")] {
                let candidates = self.search_site(&q, client).await;
                if let Some(hit) = self.find_best_match(&candidates, &q, &query, client).await {
                    return Some(hit.url);
                }
            }
        }

        for text in [&description, &title] {
            if text.is_empty() {
                continue;
            }
            let q_norm = normalize_name(text);
            let search = WS.replace_all(&q_norm, "+");
            let candidates = self.search_site(&search, client).await;
            if let Some(hit) = self.find_best_match(&candidates, &q_norm, &query, client).await {
                return Some(hit.url);
            }
        }

        None
    }
}

#[async_trait]
impl Locator for EthicalSearcher {
    async fn locate(&self, row: &InputRow, client: &dyn SiteFetch) -> Result<Option<String>> {
        Ok(self.find_product_url(row, client).await)
    }
}

/// Last non-empty path segment of a URL.
fn slug_of(url: &str) -> String {
    let path = Url::parse(url).map(|u| u.path().to_string()).unwrap_or_else(|_| url.to_string());
    path.trim_matches('/').rsplit('/').next().unwrap_or_default().to_string()
}
