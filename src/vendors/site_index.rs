//! Site index: a crawl of a vendor's listing pages saved as JSON.

use crate::matching::keywords::{fuzzy_match_score, KeywordProfile};
use crate::site::{listing_links, next_page_url, SiteFetch};
use crate::vendors::Vendor;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

/// Cambridge category listings; products link to `/pavers-details?prodid=N`.
const CAMBRIDGE_CATEGORIES: &[&str] = &[
    "/pavers",
    "/walls",
    "/wallstones-stone-veneer",
    "/pavingstones-naturalstone",
    "/fireplaces",
    "/pizza-ovens",
    "/kitchens",
    "/waterfalls",
    "/fire-water",
    "/fountains",
    "/fire-tables-pits",
    "/grill-modules",
    "/patio-bistro-tables",
    "/bar-modules",
    "/caps-columns",
    "/steps-stairs",
    "/pergolas",
    "/umbrellas",
    "/garden-gate",
    "/outdoor-appliances",
    "/finishing-touches",
];

/// Age after which a saved index should be rebuilt.
pub const INDEX_MAX_AGE_DAYS: i64 = 7;

/// One product discovered on a listing page.
///
/// Dealer portal entries also carry the item id, price, stock and images
/// reported by the portal search API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// A saved crawl of one vendor's product listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteIndex {
    pub last_updated: String,
    pub total_products: usize,
    pub products: Vec<IndexEntry>,
}

impl SiteIndex {
    /// Creates an index stamped with the current time.
    pub fn new(products: Vec<IndexEntry>) -> Self {
        Self {
            last_updated: Utc::now().to_rfc3339(),
            total_products: products.len(),
            products,
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// When the index was built. Timestamps without an offset are local time.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        let stamp = self.last_updated.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(stamp) {
            return Some(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        Local.from_local_datetime(&naive).earliest().map(|dt| dt.with_timezone(&Utc))
    }

    /// True when the index is more than `max_age_days` whole days old, or its
    /// timestamp is missing or unreadable.
    pub fn is_stale(&self, max_age_days: i64) -> bool {
        self.is_stale_at(Utc::now(), max_age_days)
    }

    fn is_stale_at(&self, now: DateTime<Utc>, max_age_days: i64) -> bool {
        match self.updated_at() {
            Some(updated) => (now - updated).num_days() > max_age_days,
            None => true,
        }
    }

    /// Loads an index saved by [`SiteIndex::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read site index: {}", path.display()))?;
        let index: SiteIndex = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse site index: {}", path.display()))?;
        debug!("Loaded site index with {} products from {}", index.len(), path.display());
        Ok(index)
    }

    /// Writes the index as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write site index: {}", path.display()))?;
        Ok(())
    }

    /// Best keyword-coverage match over all entries, at or above `threshold`.
    pub fn keyword_match(
        &self,
        query: &HashSet<String>,
        threshold: f64,
    ) -> Option<(&IndexEntry, f64)> {
        let mut best: Option<(&IndexEntry, f64)> = None;
        for entry in &self.products {
            let keywords: HashSet<String> = entry.keywords.iter().cloned().collect();
            let score = fuzzy_match_score(&keywords, query);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((entry, score));
            }
        }
        best.filter(|(_, score)| *score > 0.0 && *score >= threshold)
    }
}

/// Where and how to crawl one vendor's listings.
#[derive(Debug, Clone)]
pub struct IndexSource {
    pub origin: String,
    pub start_paths: Vec<String>,
    /// Try a `?view=all` variant of each start path first.
    pub view_all: bool,
    /// Query parameter incremented when a page has no next link.
    pub page_param: Option<String>,
    /// Keep the query string on product URLs.
    pub keep_query: bool,
    /// Substring a product link must contain.
    pub link_marker: String,
    pub profile: KeywordProfile,
}

impl IndexSource {
    pub fn cambridge() -> Self {
        Self {
            origin: Vendor::Cambridge.origin().to_string(),
            start_paths: CAMBRIDGE_CATEGORIES.iter().map(|p| p.to_string()).collect(),
            view_all: false,
            page_param: None,
            keep_query: true,
            link_marker: "prodid=".to_string(),
            profile: KeywordProfile::cambridge(),
        }
    }

    pub fn purina_mills() -> Self {
        Self {
            origin: Vendor::PurinaMills.origin().to_string(),
            start_paths: vec!["/collections/all-products".to_string()],
            view_all: true,
            page_param: Some("page".to_string()),
            keep_query: false,
            link_marker: "/products/".to_string(),
            profile: KeywordProfile::purina_index(),
        }
    }

    /// Crawl settings for vendors that have listing pages.
    pub fn for_vendor(vendor: Vendor) -> Option<Self> {
        match vendor {
            Vendor::Cambridge => Some(Self::cambridge()),
            Vendor::PurinaMills => Some(Self::purina_mills()),
            _ => None,
        }
    }

    fn start_urls(&self) -> Vec<(String, String)> {
        let origin = self.origin.trim_end_matches('/');
        let mut urls = Vec::new();
        for path in &self.start_paths {
            let base = format!("{origin}{path}");
            let category = path.trim_matches('/').to_string();
            if self.view_all {
                urls.push((set_query_param(&base, "view", "all"), category.clone()));
            }
            urls.push((base, category));
        }
        urls
    }
}

/// Replaces (or adds) a query parameter, keeping the others.
fn set_query_param(url: &str, key: &str, value: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let kept: Vec<(String, String)> =
        parsed.query_pairs().into_owned().filter(|(k, _)| k != key).collect();
    parsed.query_pairs_mut().clear().extend_pairs(kept).append_pair(key, value);
    parsed.to_string()
}

/// The same URL with its page parameter incremented (missing counts as page 1).
fn next_page_param_url(url: &str, key: &str) -> String {
    let current = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.query_pairs().find(|(k, _)| k == key).and_then(|(_, v)| v.parse::<u32>().ok())
        })
        .unwrap_or(1);
    set_query_param(url, key, &(current + 1).to_string())
}

/// Crawls listing pages into a [`SiteIndex`].
pub struct SiteIndexer {
    source: IndexSource,
    max_pages: usize,
}

impl SiteIndexer {
    pub fn new(source: IndexSource, max_pages: usize) -> Self {
        Self { source, max_pages }
    }

    /// Walks every start URL and its pagination, visiting each page once.
    ///
    /// `max_pages` caps each start URL's walk. A page that fails to load ends
    /// that walk; the crawl moves on to the next start URL.
    pub async fn build(&self, client: &dyn SiteFetch) -> Result<SiteIndex> {
        let source = &self.source;
        let mut visited: HashSet<String> = HashSet::new();
        let mut seen_products: HashSet<String> = HashSet::new();
        let mut products: Vec<IndexEntry> = Vec::new();
        let mut total_pages = 0usize;

        for (start, category) in source.start_urls() {
            let mut next = Some(start);
            let mut pages_fetched = 0usize;

            while let Some(url) = next.take() {
                if pages_fetched >= self.max_pages || visited.contains(&url) {
                    break;
                }
                visited.insert(url.clone());
                pages_fetched += 1;
                total_pages += 1;

                info!("Indexing page {}: {}", total_pages, url);

                let html = match client.get(&url).await {
                    Ok(html) => html,
                    Err(e) => {
                        warn!("Failed to fetch listing page {}: {:#}", url, e);
                        break;
                    }
                };

                let links = listing_links(
                    &html,
                    &url,
                    |u| u.contains(source.link_marker.as_str()),
                    source.keep_query,
                );

                let mut added = 0usize;
                for link in links {
                    if !seen_products.insert(link.url.clone()) {
                        continue;
                    }
                    let keywords: BTreeSet<String> =
                        source.profile.entry_keywords(&link.name, &link.url).into_iter().collect();
                    let title = if link.name.is_empty() {
                        fallback_title(&keywords, &link.url)
                    } else {
                        link.name
                    };
                    debug!("Indexed '{}' -> {}", title, link.url);
                    products.push(IndexEntry {
                        title,
                        url: link.url,
                        keywords,
                        category: (!category.is_empty()).then(|| category.clone()),
                        ..IndexEntry::default()
                    });
                    added += 1;
                }

                next = next_page_url(&html, &url);
                if next.is_none() && added > 0 && !source.view_all {
                    next = source.page_param.as_deref().map(|key| next_page_param_url(&url, key));
                }
            }

            if source.view_all && !products.is_empty() {
                break;
            }
        }

        if products.is_empty() {
            warn!("Site index is empty; no products discovered.");
        } else {
            info!(
                "Finished indexing {} products across {} page(s).",
                products.len(),
                total_pages
            );
        }

        Ok(SiteIndex::new(products))
    }
}

fn fallback_title(keywords: &BTreeSet<String>, url: &str) -> String {
    if keywords.is_empty() {
        url.trim_end_matches('/').rsplit('/').next().unwrap_or(url).to_string()
    } else {
        keywords.iter().cloned().collect::<Vec<_>>().join(" ")
    }
}
