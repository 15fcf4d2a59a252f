//! Tall Tails (Magento) product search.
//!
//! The search page is tried with the UPC first. After five consecutive UPC
//! misses the UPC step is switched off for the rest of the run, because the
//! site rarely indexes barcodes. Name searches then run over spelling
//! variants of the row's title.

use crate::models::InputRow;
use crate::site::{resolve_url, SiteFetch};
use crate::vendors::Locator;
use anyhow::Result;
use async_trait::async_trait;
use regex_lite::{NoExpand, Regex};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Consecutive UPC misses before UPC search is skipped.
pub const UPC_DISABLE_AFTER: u32 = 5;

const MAX_VARIANTS: usize = 12;

const SKIPPED_PATHS: &[&str] =
    &["/blog", "/catalogsearch", "/customer", "/account", "/cart", "/privacy", "/terms"];

const PDP_MARKERS: &[&str] = &[
    r#"class="product-info-main""#,
    r#"data-gallery-role="gallery""#,
    r#""@type":"Product""#,
    "'@type':'Product'",
];

static GRIDS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "div.products.wrapper.grid.products-grid ol.products.list.items.product-items",
        "ol.products.list.items.product-items",
        "ol.products.products.list.items",
        "div.search.results ol.products.list.items.product-items",
    ]
    .iter()
    .map(|css| Selector::parse(css).unwrap())
    .collect()
});

static GRID_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.item.product.product-item").unwrap());
static ITEM_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.product-item-link[href$='.html']").unwrap());

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9]+").unwrap());
static TWO_IN_ONE: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)\b2\s*[-x×]?\s*in\s*[-x×]?\s*1\b").unwrap(),
        Regex::new(r"(?i)\b2in1\b").unwrap(),
    ]
});
static QUOTED_INCHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(\d+)""#).unwrap());
static AXB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d+)\s*[xX×/]\s*(\d+)\b").unwrap());
static GRIZZLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bgrizzle\b").unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const TWO_IN_ONE_FORMS: &[&str] = &["2IN1", "2 IN 1", "2-IN-1", "2in1", "2-in-1", "2 in 1", "2×1", "2 x 1"];

/// Token overlap minus a small penalty for extra words in the tile name.
pub fn score_title(name: &str, query: &str) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let tokens = |s: &str| -> HashSet<String> {
        WORD.find_iter(&s.to_lowercase()).map(|m| m.as_str().to_string()).collect()
    };
    let name_tokens = tokens(name);
    let shared = name_tokens.intersection(&tokens(query)).count();
    shared as f64 - 0.10 * (name_tokens.len() - shared) as f64
}

/// Search spellings of a product name, the original first, at most twelve.
pub fn normalize_variants(base: &str) -> Vec<String> {
    let base = base.trim();
    if base.is_empty() {
        return Vec::new();
    }
    let mut variants = vec![base.to_string()];

    for pattern in TWO_IN_ONE.iter() {
        if pattern.is_match(base) {
            for form in TWO_IN_ONE_FORMS {
                variants.push(pattern.replace_all(base, NoExpand(form)).into_owned());
            }
        }
    }

    if base.contains('"') {
        for v in variants.clone() {
            variants.push(QUOTED_INCHES.replace_all(&v, "$1 in").into_owned());
            variants.push(QUOTED_INCHES.replace_all(&v, "${1}in").replace('"', ""));
        }
    }

    for v in variants.clone() {
        if let Some(caps) = AXB.captures(&v) {
            let (a, b) = (&caps[1], &caps[2]);
            for form in [format!("{a}x{b}"), format!("{a} x {b}"), format!("{a}×{b}"), format!("{a}/{b}")] {
                variants.push(AXB.replace_all(&v, NoExpand(&form)).into_owned());
            }
        }
    }

    for v in variants.clone() {
        variants.push(v.replace('-', " "));
    }
    for v in variants.clone() {
        variants.push(GRIZZLE.replace_all(&v, "grizzly").into_owned());
    }

    let mut seen = HashSet::new();
    let mut normalized: Vec<String> = variants
        .into_iter()
        .map(|v| SPACES.replace_all(&v, " ").trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.to_lowercase()))
        .collect();

    let original = base.to_lowercase();
    normalized.sort_by_key(|v| (v.to_lowercase() != original, v.len()));
    normalized.truncate(MAX_VARIANTS);
    normalized
}

/// Product page URLs from the search result grid only, best title match first.
pub fn grid_candidates(html: &str, page_url: &str, query: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(grid) = GRIDS.iter().find_map(|sel| document.select(sel).next()) else {
        debug!("No product grid on search results");
        return Vec::new();
    };

    let mut candidates: Vec<(String, String)> = grid
        .select(&GRID_ITEM)
        .filter_map(|item| item.select(&ITEM_LINK).next())
        .filter_map(|link| {
            let href = link.value().attr("href")?.trim();
            if href.is_empty() || SKIPPED_PATHS.iter().any(|p| href.contains(p)) {
                return None;
            }
            Some((resolve_url(page_url, href), link_text(link)))
        })
        .collect();

    if !query.is_empty() {
        candidates.sort_by(|a, b| score_title(&b.1, query).total_cmp(&score_title(&a.1, query)));
    }
    candidates.into_iter().map(|(url, _)| url).collect()
}

fn link_text(link: ElementRef) -> String {
    link.text().map(str::trim).filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" ")
}

fn is_product_page(html: &str) -> bool {
    PDP_MARKERS.iter().any(|m| html.contains(m))
}

pub struct TallTailsSearcher {
    origin: String,
    upc_misses: AtomicU32,
    upc_disabled: AtomicBool,
}

impl TallTailsSearcher {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            upc_misses: AtomicU32::new(0),
            upc_disabled: AtomicBool::new(false),
        }
    }

    pub fn upc_search_disabled(&self) -> bool {
        self.upc_disabled.load(Ordering::SeqCst)
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/catalogsearch/result/?q={}",
            self.origin,
            urlencoding::encode(query).replace("%20", "+")
        )
    }

    /// Searches `query` and returns the first grid tile that opens a product page.
    async fn search(&self, query: &str, client: &dyn SiteFetch) -> Result<Option<String>> {
        let url = self.search_url(query);
        debug!("Tall Tails search: {}", url);
        let html = client.get(&url).await?;

        let Some(candidate) = grid_candidates(&html, &url, query).into_iter().next() else {
            return Ok(None);
        };
        debug!("Validating candidate {}", candidate);
        let page = client.get(&candidate).await?;
        Ok(is_product_page(&page).then_some(candidate))
    }

    async fn search_upc(&self, upc: &str, client: &dyn SiteFetch) -> Option<String> {
        if self.upc_search_disabled() {
            debug!("Skipping UPC search after {} misses", self.upc_misses.load(Ordering::SeqCst));
            return None;
        }

        match self.search(upc, client).await {
            Ok(Some(url)) => {
                self.upc_misses.store(0, Ordering::SeqCst);
                return Some(url);
            }
            Ok(None) => {}
            Err(e) => debug!("UPC search failed: {:#}", e),
        }

        let misses = self.upc_misses.fetch_add(1, Ordering::SeqCst) + 1;
        if misses >= UPC_DISABLE_AFTER && !self.upc_disabled.swap(true, Ordering::SeqCst) {
            warn!("Disabling Tall Tails UPC search after {} consecutive misses", misses);
        }
        None
    }

    pub async fn find_product_url(&self, row: &InputRow, client: &dyn SiteFetch) -> Option<String> {
        let upc = row.primary_upc()?;

        if let Some(url) = self.search_upc(&upc, client).await {
            info!("Found Tall Tails product by UPC {}: {}", upc, url);
            return Some(url);
        }

        for name in [row.upcitemdb_title(), row.description()].into_iter().flatten() {
            let variants = normalize_variants(&name);
            debug!("Name search over {} variants of '{}'", variants.len(), name);
            for query in variants {
                match self.search(&query, client).await {
                    Ok(Some(url)) => {
                        info!("Found Tall Tails product by name '{}': {}", query, url);
                        return Some(url);
                    }
                    Ok(None) => {}
                    Err(e) => debug!("Name search '{}' failed: {:#}", query, e),
                }
            }
        }

        debug!("No Tall Tails product for UPC {}", upc);
        None
    }
}

#[async_trait]
impl Locator for TallTailsSearcher {
    async fn locate(&self, row: &InputRow, client: &dyn SiteFetch) -> Result<Option<String>> {
        Ok(self.find_product_url(row, client).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendors::testing::MockSite;

    const ORIGIN: &str = "https://www.talltailsdog.com";
    const PDP: &str = r#"<div class="product-info-main"><h1>Plush Bear</h1></div>"#;

    fn grid(items: &[(&str, &str)]) -> String {
        let tiles: String = items
            .iter()
            .map(|(href, name)| {
                format!(
                    r#"<li class="item product product-item"><a class="product-item-link" href="{href}">{name}</a></li>"#
                )
            })
            .collect();
        format!(
            r#"<header><a href="/blog/post.html">Blog</a></header>
               <div class="products wrapper grid products-grid">
               <ol class="products list items product-items">{tiles}</ol></div>"#
        )
    }

    #[test]
    fn test_score_title_prefers_overlap() {
        assert_eq!(score_title("Plush Bear", ""), 0.0);
        let close = score_title("Plush Grizzly Bear Toy", "grizzly bear");
        let far = score_title("Rope Tug", "grizzly bear");
        assert!((close - 1.8).abs() < 1e-9);
        assert!(far < close);
    }

    #[test]
    fn test_grid_candidates_ranked_and_filtered() {
        let html = grid(&[
            ("/customer/account.html", "Grizzly Bear"),
            ("/rope-tug.html", "Rope Tug"),
            ("/plush-grizzly-bear.html", "Plush Grizzly Bear"),
            ("/squeaker", "Grizzly Bear Squeaker"),
        ]);
        let url = format!("{ORIGIN}/catalogsearch/result/?q=grizzly+bear");
        let found = grid_candidates(&html, &url, "grizzly bear");
        assert_eq!(
            found,
            vec![format!("{ORIGIN}/plush-grizzly-bear.html"), format!("{ORIGIN}/rope-tug.html")]
        );
    }

    #[test]
    fn test_grid_missing() {
        let html = r#"<a class="product-item-link" href="/bear.html">Bear</a>"#;
        assert!(grid_candidates(html, ORIGIN, "bear").is_empty());
    }

    #[test]
    fn test_normalize_variants_two_in_one() {
        let variants = normalize_variants("TALL TAILS 2 IN 1 FUR TOY");
        assert_eq!(variants[0], "TALL TAILS 2 IN 1 FUR TOY");
        assert!(variants.iter().any(|v| v == "TALL TAILS 2IN1 FUR TOY"));
        assert!(variants.iter().any(|v| v == "TALL TAILS 2-IN-1 FUR TOY"));
        assert!(variants.len() <= MAX_VARIANTS);
    }

    #[test]
    fn test_normalize_variants_sizes_and_spelling() {
        let variants = normalize_variants(r#"Grizzle Bear 14" Toy"#);
        assert!(variants.contains(&"Grizzle Bear 14 in Toy".to_string()));
        assert!(variants.contains(&"Grizzle Bear 14in Toy".to_string()));
        assert!(variants.contains(&"grizzly Bear 14 in Toy".to_string()));

        let variants = normalize_variants("Fleece Blanket 30x40");
        assert!(variants.contains(&"Fleece Blanket 30 x 40".to_string()));
        assert!(variants.contains(&"Fleece Blanket 30/40".to_string()));
        assert!(variants.contains(&"Fleece Blanket 30×40".to_string()));

        assert!(normalize_variants("   ").is_empty());
        assert_eq!(normalize_variants("Rope-Tug"), vec!["Rope-Tug", "Rope Tug"]);
    }

    #[tokio::test]
    async fn test_finds_by_upc_and_validates_page() {
        let client = MockSite::new(ORIGIN)
            .page(
                &format!("{ORIGIN}/catalogsearch/result/?q=840102012345"),
                &grid(&[("/plush-bear.html", "Plush Bear")]),
            )
            .page(&format!("{ORIGIN}/plush-bear.html"), PDP);

        let searcher = TallTailsSearcher::new(ORIGIN);
        let row = InputRow::from_pairs([("upc", "840102012345")]);
        assert_eq!(
            searcher.locate(&row, &client).await.unwrap(),
            Some(format!("{ORIGIN}/plush-bear.html"))
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_title_variants() {
        let client = MockSite::new(ORIGIN)
            .page(&format!("{ORIGIN}/catalogsearch/result/?q=840102012345"), &grid(&[]))
            .page(
                &format!("{ORIGIN}/catalogsearch/result/?q=Plush+Bear"),
                &grid(&[("/plush-bear.html", "Plush Bear")]),
            )
            .page(&format!("{ORIGIN}/plush-bear.html"), PDP);

        let searcher = TallTailsSearcher::new(ORIGIN);
        let row = InputRow::from_pairs([("upc", "840102012345"), ("upcitemdb_title", "Plush Bear")]);
        assert_eq!(
            searcher.find_product_url(&row, &client).await,
            Some(format!("{ORIGIN}/plush-bear.html"))
        );
    }

    #[tokio::test]
    async fn test_rejects_non_product_candidate() {
        let client = MockSite::new(ORIGIN)
            .page(
                &format!("{ORIGIN}/catalogsearch/result/?q=840102012345"),
                &grid(&[("/gift-card.html", "Gift Card")]),
            )
            .page(&format!("{ORIGIN}/gift-card.html"), "<h1>Gift cards</h1>");

        let searcher = TallTailsSearcher::new(ORIGIN);
        let row = InputRow::from_pairs([("upc", "840102012345")]);
        assert!(searcher.find_product_url(&row, &client).await.is_none());
    }

    #[tokio::test]
    async fn test_upc_search_disabled_after_misses() {
        let client = MockSite::new(ORIGIN);
        let searcher = TallTailsSearcher::new(ORIGIN);

        for n in 0..UPC_DISABLE_AFTER {
            let row = InputRow::from_pairs([("upc", &*format!("84010201234{n}"))]);
            assert!(searcher.find_product_url(&row, &client).await.is_none());
        }
        assert!(searcher.upc_search_disabled());
        let before = client.call_count();

        let row = InputRow::from_pairs([("upc", "840102099999")]);
        assert!(searcher.find_product_url(&row, &client).await.is_none());
        assert_eq!(client.call_count(), before);
    }

    #[tokio::test]
    async fn test_hit_resets_miss_count() {
        let client = MockSite::new(ORIGIN)
            .page(
                &format!("{ORIGIN}/catalogsearch/result/?q=840102012345"),
                &grid(&[("/plush-bear.html", "Plush Bear")]),
            )
            .page(&format!("{ORIGIN}/plush-bear.html"), PDP);
        let searcher = TallTailsSearcher::new(ORIGIN);

        for n in 0..UPC_DISABLE_AFTER - 1 {
            let row = InputRow::from_pairs([("upc", &*format!("84010209999{n}"))]);
            searcher.find_product_url(&row, &client).await;
        }
        let hit = InputRow::from_pairs([("upc", "840102012345")]);
        assert!(searcher.find_product_url(&hit, &client).await.is_some());

        let miss = InputRow::from_pairs([("upc", "840102088888")]);
        searcher.find_product_url(&miss, &client).await;
        assert!(!searcher.upc_search_disabled());
    }
}
