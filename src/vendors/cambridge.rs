//! Cambridge Pavers: title matching against a crawled site index.

use crate::matching::similarity::token_sort_ratio;
use crate::models::InputRow;
use crate::site::SiteFetch;
use crate::vendors::site_index::{IndexEntry, SiteIndex};
use crate::vendors::{Locator, Vendor};
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Color families some product titles lead with; the public index omits them.
const COLOR_FAMILIES: &[&str] = &["Sherwood", "Crusader", "Excalibur", "Kingscourt", "Roundtable"];

pub const DEFAULT_TITLE_THRESHOLD: f64 = 60.0;

/// Drops a leading color-family word ("Sherwood Ledgestone" -> "Ledgestone").
pub fn strip_color_family(title: &str) -> &str {
    for family in COLOR_FAMILIES {
        if let Some(rest) = title.strip_prefix(family).and_then(|r| r.strip_prefix(' ')) {
            debug!("Stripped color family '{}' from title", family);
            return rest;
        }
    }
    title
}

/// Matches row titles to index entries by token-sort similarity.
pub struct TitleIndexMatcher {
    index: SiteIndex,
    origin: String,
    threshold: f64,
    strip_families: bool,
}

impl TitleIndexMatcher {
    pub fn new(index: SiteIndex, threshold: f64) -> Self {
        info!("Loaded product index: {} products", index.len());
        Self { index, origin: Vendor::Cambridge.origin().to_string(), threshold, strip_families: true }
    }

    /// Origin relative index URLs resolve against.
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.trim_end_matches('/').to_string();
        self
    }

    /// Matches the title as given; portal titles keep their color family.
    pub fn keep_color_family(mut self) -> Self {
        self.strip_families = false;
        self
    }

    /// Best entry whose score reaches the threshold, with its score.
    pub fn find_by_title(&self, title: &str, color: Option<&str>) -> Option<(&IndexEntry, f64)> {
        if self.index.is_empty() {
            warn!("Product index is empty");
            return None;
        }

        let search_title = if self.strip_families { strip_color_family(title) } else { title };
        debug!(
            "Searching for: title='{}' (original: '{}'), color='{}'",
            search_title,
            title,
            color.unwrap_or("")
        );

        let query = search_title.to_lowercase();
        let mut best: Option<(&IndexEntry, f64)> = None;
        for entry in &self.index.products {
            let score = token_sort_ratio(&query, &entry.title.to_lowercase());
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((entry, score));
            }
        }

        match best {
            Some((entry, score)) if score >= self.threshold => {
                debug!("Title match: '{}' (score: {:.1})", entry.title, score);
                Some((entry, score))
            }
            _ => {
                debug!("No title match found (best score: {:.1})", best.map_or(0.0, |(_, s)| s));
                None
            }
        }
    }

    /// Absolute product URL for the best title match.
    pub fn find_product_url(&self, title: &str, color: Option<&str>) -> Option<String> {
        let (entry, _) = self.find_by_title(title, color)?;
        let url = entry.url.trim();
        if url.starts_with('/') {
            Some(format!("{}{}", self.origin, url))
        } else {
            Some(url.to_string())
        }
    }
}

#[async_trait]
impl Locator for TitleIndexMatcher {
    async fn locate(&self, row: &InputRow, _client: &dyn SiteFetch) -> Result<Option<String>> {
        let Some(title) = row.title().or_else(|| row.description()) else {
            return Ok(None);
        };
        let color = row.color();
        Ok(self.find_product_url(&title, color.as_deref()))
    }
}
