//! Purina Mills: shop and www site search with keyword matching.

use crate::matching::keywords::{best_match, KeywordProfile};
use crate::models::InputRow;
use crate::site::{product_links, ProductLink, SiteFetch};
use crate::vendors::site_index::SiteIndex;
use crate::vendors::{Locator, Vendor};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, info};

pub const WWW_ORIGIN: &str = "https://www.purinamills.com";

/// Which Purina site a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteKind {
    Shop,
    Www,
}

/// A named product link from a search result page.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub url: String,
    pub keywords: HashSet<String>,
    pub source: SiteKind,
}

/// Locates Purina Mills product pages from the distributor description.
pub struct PurinaMillsSearcher {
    shop_origin: String,
    www_origin: String,
    max_candidates: usize,
    threshold: f64,
    profile: KeywordProfile,
    index: Option<SiteIndex>,
    index_profile: KeywordProfile,
}

impl PurinaMillsSearcher {
    pub fn new(max_candidates: usize, threshold: f64) -> Self {
        Self {
            shop_origin: Vendor::PurinaMills.origin().to_string(),
            www_origin: WWW_ORIGIN.to_string(),
            max_candidates,
            threshold,
            profile: KeywordProfile::purina_search(),
            index: None,
            index_profile: KeywordProfile::purina_index(),
        }
    }

    /// Overrides both site origins (used against mock servers).
    pub fn with_origins(mut self, shop: &str, www: &str) -> Self {
        self.shop_origin = shop.trim_end_matches('/').to_string();
        self.www_origin = www.trim_end_matches('/').to_string();
        self
    }

    /// Adds a site index used as the last resort.
    pub fn with_index(mut self, index: SiteIndex) -> Self {
        self.index = Some(index);
        self
    }

    async fn search(&self, site: SiteKind, query: &str, client: &dyn SiteFetch) -> Vec<Candidate> {
        let origin = match site {
            SiteKind::Shop => &self.shop_origin,
            SiteKind::Www => &self.www_origin,
        };
        let url = format!("{}/search?q={}", origin, urlencoding::encode(query).replace("%20", "+"));
        debug!("Searching {}: '{}'", origin, query);

        let html = match client.get(&url).await {
            Ok(html) => html,
            Err(e) => {
                debug!("Search on {} failed: {:#}", origin, e);
                return Vec::new();
            }
        };

        let accept = |u: &str| match site {
            SiteKind::Shop => u.contains("/products/"),
            SiteKind::Www => u.contains("/products/detail/") || u.contains("/product/"),
        };

        let candidates: Vec<Candidate> = product_links(&html, &url, accept)
            .into_iter()
            .filter(|link| !link.name.is_empty())
            .take(self.max_candidates)
            .map(|ProductLink { url, name }| Candidate {
                keywords: self.profile.keyword_set(&name),
                name,
                url,
                source: site,
            })
            .collect();

        debug!("Found {} candidate(s) on {}", candidates.len(), origin);
        candidates
    }

    fn fuzzy_pick<'a>(&self, candidates: &'a [Candidate], query: &str) -> Option<(&'a Candidate, f64)> {
        let query_kw = self.profile.keyword_set(query);
        let found = best_match(candidates, &query_kw, self.threshold, |c| &c.keywords);
        if found.is_none() {
            debug!("No fuzzy match above threshold {:.2} for '{}'", self.threshold, query);
        }
        found
    }

    /// Runs the search strategies in order and returns the first hit.
    pub async fn find_product_url(&self, row: &InputRow, client: &dyn SiteFetch) -> Option<String> {
        if row.primary_upc().is_none() {
            debug!("No UPC provided.");
            return None;
        }

        let description = row.description();
        let upcitemdb_title = row.upcitemdb_title();
        if description.is_none() && upcitemdb_title.is_none() {
            debug!("No product name available for search.");
            return None;
        }

        if let Some(desc) = description.as_deref() {
            let candidates = self.search(SiteKind::Shop, desc, client).await;

            let lower = desc.to_lowercase();
            if let Some(exact) = candidates.iter().find(|c| {
                let name = c.name.to_lowercase();
                name.contains(&lower) || lower.contains(&name)
            }) {
                info!("Exact match found on shop site: {}", exact.url);
                return Some(exact.url.clone());
            }

            if let Some((hit, score)) = self.fuzzy_pick(&candidates, desc) {
                info!("Fuzzy match found on shop site (score={:.2}): {}", score, hit.url);
                return Some(hit.url.clone());
            }
        }

        if let Some(title) = upcitemdb_title.as_deref().filter(|t| Some(*t) != description.as_deref()) {
            let candidates = self.search(SiteKind::Shop, title, client).await;
            if let Some((hit, score)) = self.fuzzy_pick(&candidates, title) {
                info!("Match found on shop site using upcitemdb_title (score={:.2}): {}", score, hit.url);
                return Some(hit.url.clone());
            }
        }

        let mut www = Vec::new();
        if let Some(desc) = description.as_deref() {
            www = self.search(SiteKind::Www, desc, client).await;
        }
        if www.is_empty() {
            if let Some(title) = upcitemdb_title.as_deref() {
                www = self.search(SiteKind::Www, title, client).await;
            }
        }
        let primary = description.as_deref().or(upcitemdb_title.as_deref()).unwrap_or_default();
        if let Some((hit, score)) = self.fuzzy_pick(&www, primary) {
            info!("Match found on www site (score={:.2}): {}", score, hit.url);
            return Some(hit.url.clone());
        }

        if let Some(index) = &self.index {
            let query_kw = self.index_profile.keyword_set(primary);
            if let Some((entry, score)) = index.keyword_match(&query_kw, self.threshold) {
                info!("Match found in site index (score={:.2}): {}", score, entry.url);
                return Some(entry.url.clone());
            }
        }

        info!("No match found on either site");
        None
    }
}

#[async_trait]
impl Locator for PurinaMillsSearcher {
    async fn locate(&self, row: &InputRow, client: &dyn SiteFetch) -> Result<Option<String>> {
        Ok(self.find_product_url(row, client).await)
    }
}
