//! HTML parser for vendor product pages and listing pages.

use crate::error::CollectError;
use crate::models::PageData;
use crate::normalize::image::{deduplicate_urls, make_absolute_url, normalize_image_url, strip_query_params};
use crate::normalize::text::{normalize_whitespace, text_only, unescape_html};
use crate::site::selectors::{listing, product};
use anyhow::Result;
use regex_lite::Regex;
use scraper::{ElementRef, Html};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;
use tracing::{debug, trace};
use url::Url;

static NEXT_TEXT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bnext\b").unwrap());

/// A product link found on a listing or search page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductLink {
    pub url: String,
    pub name: String,
}

/// Resolves `href` against the page it appeared on.
pub fn resolve_url(page_url: &str, href: &str) -> String {
    let href = href.trim();
    match Url::parse(page_url).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => make_absolute_url(page_url, href),
    }
}

/// Some Shopify themes render the title twice inside one heading.
fn collapse_doubled(title: &str) -> String {
    let chars: Vec<char> = title.chars().collect();
    if chars.len() > 30 {
        let mid = chars.len() / 2;
        let head: String = chars[..mid].iter().collect();
        let tail: String = chars[mid..].iter().collect();
        if head.trim() == tail.trim() {
            return head.trim().to_string();
        }
    }
    title.to_string()
}

fn element_text(el: ElementRef) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

/// Parser for vendor product pages.
pub struct PageParser {
    origin: String,
}

impl PageParser {
    /// Creates a parser that resolves relative URLs against `origin`.
    pub fn new(origin: impl Into<String>) -> Self {
        Self { origin: origin.into() }
    }

    /// Parses a product page into [`PageData`].
    ///
    /// Fails with [`CollectError::Parse`] when the page has no recognizable title.
    pub fn parse_product(&self, html: &str, url: &str) -> Result<PageData> {
        let document = Html::parse_document(html);
        let json_ld = Self::json_ld_product(&document);

        let title = Self::title(&document);
        if title.is_empty() {
            return Err(CollectError::Parse(url.to_string()).into());
        }

        let description_html = Self::description(&document, json_ld.as_ref());
        let images = self.images(&document, json_ld.as_ref());
        let price = Self::price(&document, json_ld.as_ref());
        let brand = json_ld.as_ref().and_then(Self::json_ld_brand);
        let taxonomy = Self::taxonomy(&document);

        debug!("Parsed '{}' with {} image(s) from {}", title, images.len(), url);

        Ok(PageData {
            url: url.to_string(),
            title,
            description_html,
            images,
            price,
            brand,
            collection: document
                .select(&product::COLLECTION)
                .map(element_text)
                .find(|t| !t.is_empty()),
            specifications: Self::labelled_block(&document, "specifications:"),
            taxonomy,
            platform: Self::platform(html),
            json_ld,
        })
    }

    /// Product title: title selectors, then meta `itemprop=name`, then `og:title`, then `<title>`.
    pub fn title(document: &Html) -> String {
        for selector in product::TITLE.iter() {
            if let Some(title) = document
                .select(selector)
                .map(|el| text_only(&el.inner_html()))
                .find(|t| !t.is_empty())
            {
                return collapse_doubled(&normalize_whitespace(&title));
            }
        }

        [&*product::META_NAME, &*product::OG_TITLE]
            .into_iter()
            .filter_map(|sel| document.select(sel).next())
            .filter_map(|el| el.value().attr("content"))
            .map(|c| normalize_whitespace(&unescape_html(c)))
            .find(|t| !t.is_empty())
            .or_else(|| document.select(&product::DOC_TITLE).next().map(element_text))
            .unwrap_or_default()
    }

    fn description(document: &Html, json_ld: Option<&Value>) -> String {
        for selector in product::DESCRIPTION.iter() {
            if let Some(el) = document.select(selector).next() {
                let inner = el.inner_html();
                if !text_only(&inner).is_empty() {
                    return inner.trim().to_string();
                }
            }
        }

        if let Some(text) = Self::labelled_block(document, "description:") {
            return text;
        }

        if let Some(desc) = json_ld
            .and_then(|p| p.get("description"))
            .and_then(Value::as_str)
            .filter(|d| !d.trim().is_empty())
        {
            return desc.trim().to_string();
        }

        document
            .select(&product::META_DESCRIPTION)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|c| unescape_html(c).trim().to_string())
            .unwrap_or_default()
    }

    /// Text following a `<strong>Label:</strong>` marker, with the label removed.
    fn labelled_block(document: &Html, label: &str) -> Option<String> {
        let marker = document
            .select(&product::LABEL)
            .find(|el| element_text(*el).to_lowercase().starts_with(label))?;
        let parent = marker.parent().and_then(ElementRef::wrap)?;
        let text = element_text(parent);
        let body = text.get(label.len()..).unwrap_or("").trim().to_string();
        (!body.is_empty()).then_some(body)
    }

    fn images(&self, document: &Html, json_ld: Option<&Value>) -> Vec<String> {
        let mut raw: Vec<String> = Vec::new();

        for (selector, attrs) in product::GALLERY.iter() {
            for el in document.select(selector) {
                if let Some(src) = attrs.iter().find_map(|a| el.value().attr(a)).filter(|s| !s.is_empty()) {
                    raw.push(src.to_string());
                }
            }
            if !raw.is_empty() {
                trace!("Gallery matched {} image(s)", raw.len());
                break;
            }
        }

        if raw.is_empty() {
            if let Some(image) = json_ld.and_then(|p| p.get("image")) {
                raw.extend(Self::json_ld_images(image));
            }
        }

        if raw.is_empty() {
            raw.extend(
                document
                    .select(&product::OG_IMAGE)
                    .filter_map(|el| el.value().attr("content"))
                    .map(String::from),
            );
        }

        deduplicate_urls(
            raw.iter()
                .map(|u| normalize_image_url(u, &self.origin, true, false))
                .filter(|u| !u.starts_with("data:")),
        )
    }

    fn json_ld_images(image: &Value) -> Vec<String> {
        match image {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items.iter().flat_map(Self::json_ld_images).collect(),
            Value::Object(obj) => obj
                .get("url")
                .or_else(|| obj.get("contentUrl"))
                .and_then(Value::as_str)
                .map(|s| vec![s.to_string()])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn price(document: &Html, json_ld: Option<&Value>) -> Option<String> {
        let offers = json_ld.and_then(|p| p.get("offers"));
        let offer = match offers {
            Some(Value::Array(items)) => items.first(),
            other => other,
        };
        if let Some(price) = offer.and_then(|o| o.get("price")) {
            match price {
                Value::String(s) if !s.is_empty() => return Some(s.clone()),
                Value::Number(n) => return Some(n.to_string()),
                _ => {}
            }
        }

        product::PRICE.iter().find_map(|selector| {
            let el = document.select(selector).next()?;
            let text = el
                .value()
                .attr("content")
                .map(String::from)
                .unwrap_or_else(|| element_text(el));
            let cleaned: String =
                text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
            (!cleaned.is_empty()).then_some(cleaned)
        })
    }

    fn json_ld_brand(product: &Value) -> Option<String> {
        match product.get("brand")? {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(String::from),
            _ => None,
        }
        .filter(|b| !b.trim().is_empty())
    }

    /// First JSON-LD object typed `Product`: a bare object, an array, or an `@graph`.
    pub fn json_ld_product(document: &Html) -> Option<Value> {
        document.select(&product::JSON_LD).find_map(|script| {
            let raw = script.text().collect::<String>();
            let value: Value = serde_json::from_str(raw.trim()).ok()?;
            Self::find_product_node(value)
        })
    }

    fn find_product_node(value: Value) -> Option<Value> {
        match value {
            Value::Array(items) => items.into_iter().find_map(Self::find_product_node),
            Value::Object(mut obj) => {
                if let Some(graph) = obj.remove("@graph") {
                    if let Some(found) = Self::find_product_node(graph) {
                        return Some(found);
                    }
                }
                let is_product = match obj.get("@type") {
                    Some(Value::String(t)) => t == "Product",
                    Some(Value::Array(types)) => types.iter().any(|t| t == "Product"),
                    _ => false,
                };
                is_product.then_some(Value::Object(obj))
            }
            _ => None,
        }
    }

    /// WooCommerce `product_cat-*` categories, plus coarse cat/dog/dish tags derived from them.
    pub fn taxonomy(document: &Html) -> BTreeSet<String> {
        let mut taxonomy = BTreeSet::new();
        for el in document.select(&product::CATEGORY_CONTAINER) {
            for class in el.value().classes() {
                let Some(slug) = class.strip_prefix("product_cat-") else {
                    continue;
                };
                let slug = slug.to_lowercase();
                if slug.contains("cat") {
                    taxonomy.insert("cat".to_string());
                }
                if slug.contains("dog") {
                    taxonomy.insert("dog".to_string());
                }
                if ["dish", "bowl", "tableware", "stoneware"].iter().any(|w| slug.contains(w)) {
                    taxonomy.insert("dish".to_string());
                }
                taxonomy.insert(slug);
            }
        }
        taxonomy
    }

    fn platform(html: &str) -> Option<String> {
        if html.contains("cdn.shopify.com") || html.contains("Shopify.theme") {
            Some("shopify".to_string())
        } else if html.contains("woocommerce") {
            Some("woocommerce".to_string())
        } else {
            None
        }
    }
}

/// Product links on a listing or search page whose absolute URL satisfies `accept`.
///
/// URLs lose their query and fragment and are de-duplicated in page order. A
/// link with no anchor text takes the nearest heading in its parent.
pub fn product_links(html: &str, page_url: &str, accept: impl Fn(&str) -> bool) -> Vec<ProductLink> {
    listing_links(html, page_url, accept, false)
}

/// Like [`product_links`], optionally keeping the query string for sites
/// that identify products by query parameter (`?prodid=`).
pub fn listing_links(
    html: &str,
    page_url: &str,
    accept: impl Fn(&str) -> bool,
    keep_query: bool,
) -> Vec<ProductLink> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&listing::ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let absolute = resolve_url(page_url, href);
        let url = if keep_query {
            absolute.split('#').next().unwrap_or_default().to_string()
        } else {
            strip_query_params(&absolute)
        };
        if !accept(&url) || !seen.insert(url.clone()) {
            continue;
        }

        let mut name = element_text(anchor);
        if name.is_empty() {
            name = anchor
                .parent()
                .and_then(ElementRef::wrap)
                .and_then(|p| p.select(&listing::HEADING).map(element_text).find(|t| !t.is_empty()))
                .unwrap_or_default();
        }
        links.push(ProductLink { url, name: unescape_html(&name).replace('\u{a0}', " ") });
    }

    links
}

/// URL of the next listing page, if the page advertises one.
pub fn next_page_url(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let href = document
        .select(&listing::NEXT_LINK_REL)
        .chain(document.select(&listing::NEXT_ANCHOR_REL))
        .chain(document.select(&listing::NEXT_ARIA))
        .find_map(|el| el.value().attr("href"))
        .or_else(|| {
            document
                .select(&listing::ANCHOR)
                .find(|a| NEXT_TEXT.is_match(&element_text(*a)))
                .and_then(|a| a.value().attr("href"))
        })
        .or_else(|| {
            document
                .select(&listing::NEXT_PAGINATION)
                .find_map(|el| el.value().attr("href"))
        })?;

    Some(resolve_url(page_url, href))
}
