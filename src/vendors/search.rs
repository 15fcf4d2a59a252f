//! UPC lookups against a vendor's own site search.
//!
//! KONG, Chala, Coastal Pet and Fromm all resolve a row the same way: a fixed
//! UPC override table first, then one or more search endpoints whose result
//! pages are scanned for the first product link.

use crate::models::InputRow;
use crate::normalize::normalize_upc;
use crate::site::{resolve_url, SiteFetch};
use crate::vendors::{Locator, Vendor};
use anyhow::Result;
use async_trait::async_trait;
use regex_lite::Regex;
use std::collections::HashMap;
use tracing::{debug, info};

/// One search endpoint and the product link pattern on its result page.
#[derive(Debug, Clone)]
pub struct SearchRoute {
    /// Path with a `{query}` placeholder.
    pub path: String,
    /// First capture group is the product href.
    pub link: Regex,
}

impl SearchRoute {
    pub fn new(path: &str, link: &str) -> Result<Self> {
        Ok(Self { path: path.to_string(), link: Regex::new(link)? })
    }

    fn url(&self, origin: &str, query: &str) -> String {
        format!("{}{}", origin, self.path.replace("{query}", &urlencoding::encode(query)))
    }

    fn first_link(&self, body: &str) -> Option<String> {
        let href = self.link.captures(body)?.get(1)?.as_str();
        Some(href.replace("&amp;", "&"))
    }
}

/// Locates product pages from the row UPC.
pub struct UpcSearcher {
    vendor: Vendor,
    origin: String,
    overrides: HashMap<String, String>,
    routes: Vec<SearchRoute>,
    /// Retry the search with only the last N UPC digits.
    partial_digits: Option<usize>,
}

impl UpcSearcher {
    pub fn new(vendor: Vendor, origin: &str) -> Self {
        Self {
            vendor,
            origin: origin.trim_end_matches('/').to_string(),
            overrides: HashMap::new(),
            routes: Vec::new(),
            partial_digits: None,
        }
    }

    pub fn with_route(mut self, route: SearchRoute) -> Self {
        self.routes.push(route);
        self
    }

    /// Adds a fixed UPC → URL mapping checked before any search.
    pub fn with_override(mut self, upc: &str, url: &str) -> Self {
        self.overrides.insert(normalize_upc(upc), url.to_string());
        self
    }

    pub fn with_partial_digits(mut self, digits: usize) -> Self {
        self.partial_digits = Some(digits);
        self
    }

    /// `?s=` search; product pages live under `/catalogue/`.
    pub fn kong(origin: &str) -> Result<Self> {
        Ok(Self::new(Vendor::Kong, origin)
            .with_route(SearchRoute::new("/?s={query}", r#"href="(/catalogue/[^"<>]+)""#)?))
    }

    /// Shopify search, retried with the last five UPC digits.
    pub fn chala(origin: &str) -> Result<Self> {
        Ok(Self::new(Vendor::Chala, origin)
            .with_route(SearchRoute::new("/search?q={query}", r#"href="(/products/[^"<>]+)""#)?)
            .with_partial_digits(5))
    }

    /// Site search, then the autocomplete endpoint; a few items only resolve by override.
    pub fn coastal(origin: &str) -> Result<Self> {
        Ok(Self::new(Vendor::Coastal, origin)
            .with_override("076484093722", "https://www.coastalpet.com/products/detail?id=TPC03")
            .with_override("076484362064", "https://www.coastalpet.com/products/detail?id=K9L02")
            .with_override("076484362088", "https://www.coastalpet.com/products/detail?id=K9L02")
            .with_route(SearchRoute::new(
                "/products/search/?q={query}",
                r#"href="(/products/detail/\?id=[^"<>]+)""#,
            )?)
            .with_route(SearchRoute::new(
                "/product/searchconnection/autocompleteandsuggest?fuzzy=true&term={query}",
                r"(/products/detail/\?id=[A-Za-z0-9]+)",
            )?))
    }

    /// The Fromm site has no usable search; only known UPCs resolve.
    pub fn fromm(origin: &str) -> Self {
        Self::new(Vendor::Fromm, origin)
            .with_override(
                "072705115372",
                "https://frommfamily.com/products/dog/gold/dry/large-breed-adult-gold/",
            )
            .with_override("072705115204", "https://frommfamily.com/products/dog/gold/dry/adult-gold/")
    }

    fn queries(&self, upc: &str) -> Vec<String> {
        let mut queries = vec![upc.to_string()];
        if let Some(n) = self.partial_digits.filter(|&n| upc.len() > n) {
            queries.push(upc[upc.len() - n..].to_string());
        }
        queries
    }

    async fn search(&self, query: &str, client: &dyn SiteFetch) -> Option<String> {
        for route in &self.routes {
            let url = route.url(&self.origin, query);
            debug!("Searching {}: {}", self.vendor.display_name(), url);

            let body = match client.get(&url).await {
                Ok(body) => body,
                Err(e) => {
                    debug!("Search request failed: {:#}", e);
                    continue;
                }
            };
            if let Some(href) = route.first_link(&body) {
                return Some(resolve_url(&url, &href));
            }
        }
        None
    }

    pub async fn find_product_url(&self, upc: &str, client: &dyn SiteFetch) -> Option<String> {
        let upc = normalize_upc(upc);
        if upc.is_empty() {
            return None;
        }

        if let Some(url) = self.overrides.get(&upc) {
            info!("Using UPC override for {}: {}", upc, url);
            return Some(url.clone());
        }

        for query in self.queries(&upc) {
            if let Some(url) = self.search(&query, client).await {
                info!("Search for '{}' found {}", query, url);
                return Some(url);
            }
        }

        debug!("No {} product found for UPC {}", self.vendor.display_name(), upc);
        None
    }
}

#[async_trait]
impl Locator for UpcSearcher {
    async fn locate(&self, row: &InputRow, client: &dyn SiteFetch) -> Result<Option<String>> {
        let Some(upc) = row.primary_upc() else {
            return Ok(None);
        };
        Ok(self.find_product_url(&upc, client).await)
    }
}
