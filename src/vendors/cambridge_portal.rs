//! Cambridge dealer portal (shop.cambridgepavers.com).
//!
//! The portal is a SuiteCommerce store. Its navigation API lists product
//! categories without a session; its search API returns per-color items
//! (item id, price, stock, images) once logged in. Product pages carry the
//! dealer-only fields: weight, sales unit, cost and vendor SKU.

use crate::error::CollectError;
use crate::models::{InputRow, PageData};
use crate::site::SiteFetch;
use crate::vendors::cambridge::TitleIndexMatcher;
use crate::vendors::orgill::Credentials;
use crate::vendors::site_index::{IndexEntry, SiteIndex};
use anyhow::{Context, Result};
use regex_lite::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub const PORTAL_ORIGIN: &str = "https://shop.cambridgepavers.com";

const NAV_PATH: &str = "/api/navigation/v1/categorynavitems/tree?c=827395&country=US&currency=USD\
&exclude_empty=false&language=en&max_level=6&menu_fields=internalid,name,sequencenumber,displayinsite\
&n=2&pcv_all_items=undefined&site_id=2&use_pcv=T";

const LOGIN_PATH: &str = "/scs/services/Account.Login.Service.ss?n=2";

/// Navigation levels at and below this one are product categories.
const PRODUCT_CATEGORY_LEVEL: i64 = 3;

const GALLERY_SKIP: &[&str] = &["thumb", "icon", "logo", "button", "sprite"];
const WEIGHT_LABELS: &[&str] = &["Weight:", "Item Weight:", "Shipping Weight:"];
const SALES_UNIT_LABELS: &[&str] = &["Sales Unit:", "Unit of Sale:", "Sold By:"];
const MODEL_LABELS: &[&str] = &["SKU:", "Model:", "Model Number:", "Vendor SKU:", "Item #:"];

static GALLERY: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        ".product-detail-images img",
        ".product-views-image-carousel img",
        ".bx-viewport img",
        ".product-image-gallery img",
    ]
    .iter()
    .map(|css| Selector::parse(css).unwrap())
    .collect()
});
static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

static WEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(lbs|lb|kgs|kg|oz)\b").unwrap());
static COST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\d+(?:\.\d{2})?").unwrap());
static LABEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^:]+:\s*").unwrap());

pub fn nav_url(origin: &str) -> String {
    format!("{origin}{NAV_PATH}")
}

pub fn search_url(origin: &str, category: &str) -> String {
    format!(
        "{origin}/scs/searchApi.ssp?c=827395&country=US&currency=USD&language=en&limit=100&n=2\
         &offset=0&pricelevel=5&site_id=2&sort=relevance:desc&commercecategoryurl={category}\
         &use_pcv=T&include=facets&fieldset=search"
    )
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn level_of(category: &Value) -> i64 {
    match category.get("level") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(1),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(1),
        _ => 1,
    }
}

/// Product category URLs from the navigation tree, depth first, without repeats.
pub fn category_urls(categories: &Value) -> Vec<String> {
    fn walk(categories: &Value, seen: &mut HashSet<String>, out: &mut Vec<String>) {
        for category in categories.as_array().into_iter().flatten() {
            let fullurl = value_text(category.get("fullurl"));
            let is_product_category = level_of(category) >= PRODUCT_CATEGORY_LEVEL
                && fullurl.matches('/').count() >= 3;
            if is_product_category && seen.insert(fullurl.clone()) {
                out.push(fullurl);
            }
            if let Some(children) = category.get("categories") {
                walk(children, seen, out);
            }
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    walk(categories, &mut seen, &mut out);
    out
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Index entries for one category's search API response.
///
/// Titles gain the color family from the category path ("/pavers/sherwood/..")
/// unless they already start with it.
pub fn portal_entries(response: &Value, category: &str) -> Vec<IndexEntry> {
    let parts: Vec<&str> = category.trim_matches('/').split('/').collect();
    let family = parts.get(1).map(|f| title_case(&f.replace('-', " "))).unwrap_or_default();

    let items = response.get("items").and_then(Value::as_array);
    items
        .into_iter()
        .flatten()
        .map(|item| {
            let name = value_text(item.get("displayname"));
            let title = if !family.is_empty() && !name.to_lowercase().starts_with(&family.to_lowercase()) {
                format!("{family} {name}")
            } else {
                name
            };

            let component = value_text(item.get("urlcomponent"));
            let url = match component.trim_matches('/').rsplit('/').next().filter(|c| !c.is_empty()) {
                Some(last) => format!("/{last}"),
                None => category.to_string(),
            };

            let images = item
                .pointer("/itemimages_detail/urls")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .map(|img| value_text(img.get("url")))
                .filter(|u| !u.is_empty())
                .collect();

            IndexEntry {
                title,
                url,
                category: Some(category.to_string()),
                sku: Some(value_text(item.get("itemid"))).filter(|s| !s.is_empty()),
                price: Some(value_text(item.get("onlinecustomerprice"))).filter(|p| !p.is_empty()),
                stock: Some(
                    item.get("quantityavailable")
                        .and_then(|q| q.as_i64().or_else(|| q.as_f64().map(|f| f as i64)))
                        .unwrap_or(0),
                ),
                images,
                ..IndexEntry::default()
            }
        })
        .collect()
}

/// Logs in to the portal with a form post. The session cookie stays in the client.
pub async fn portal_login(client: &dyn SiteFetch, origin: &str, credentials: &Credentials) -> Result<()> {
    let form = vec![
        ("email".to_string(), credentials.username.clone()),
        ("password".to_string(), credentials.password.clone()),
        ("redirect".to_string(), "true".to_string()),
    ];
    let failed = |reason: String| CollectError::LoginFailed { vendor: "cambridge-portal".to_string(), reason };

    let body = client
        .post_form(&format!("{origin}{LOGIN_PATH}"), &form)
        .await
        .map_err(|e| failed(format!("{e:#}")))?;

    if body.contains("errorMessage") {
        let reason = serde_json::from_str::<Value>(&body)
            .ok()
            .map(|v| value_text(v.get("errorMessage")))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "portal rejected the credentials".to_string());
        return Err(failed(reason).into());
    }
    info!("Logged in to Cambridge dealer portal as {}", credentials.username);
    Ok(())
}

/// Builds the portal index: navigation tree, then one search call per category.
pub struct PortalIndexer {
    origin: String,
    credentials: Option<Credentials>,
}

impl PortalIndexer {
    pub fn new(origin: &str, credentials: Option<Credentials>) -> Self {
        Self { origin: origin.trim_end_matches('/').to_string(), credentials }
    }

    pub async fn build(&self, client: &dyn SiteFetch) -> Result<SiteIndex> {
        let body = client.get(&nav_url(&self.origin)).await.context("Failed to fetch portal navigation")?;
        let tree: Value = serde_json::from_str(&body).context("Portal navigation is not JSON")?;
        let categories = tree.get("data").map(category_urls).unwrap_or_default();
        if categories.is_empty() {
            warn!("Portal navigation listed no product categories");
        }
        info!("Found {} portal categories", categories.len());

        match &self.credentials {
            Some(credentials) => portal_login(client, &self.origin, credentials).await?,
            None => warn!("No portal credentials; search results may omit dealer items"),
        }

        let mut products = Vec::new();
        for (i, category) in categories.iter().enumerate() {
            info!("[{}/{}] Fetching portal products from {}", i + 1, categories.len(), category);
            let entries = match client.get(&search_url(&self.origin, category)).await {
                Ok(body) => match serde_json::from_str::<Value>(&body) {
                    Ok(response) => portal_entries(&response, category),
                    Err(e) => {
                        warn!("Portal search for {} is not JSON: {}", category, e);
                        continue;
                    }
                },
                Err(e) => {
                    warn!("Portal search for {} failed: {:#}", category, e);
                    continue;
                }
            };
            debug!("{} product(s) in {}", entries.len(), category);
            products.extend(entries);
        }

        info!("Portal index built: {} products", products.len());
        Ok(SiteIndex::new(products))
    }
}

/// Dealer-only data for one matched portal product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortalData {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    pub gallery_images: Vec<String>,
    pub weight: String,
    pub sales_unit: String,
    pub cost: String,
    pub model_number: String,
}

impl PortalData {
    /// Important fields that came back empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.gallery_images.is_empty() {
            missing.push("gallery_images");
        }
        if self.cost.is_empty() {
            missing.push("cost");
        }
        if self.model_number.is_empty() {
            missing.push("model_number");
        }
        missing
    }

    /// Page data built from portal fields alone, for products missing from the public site.
    pub fn to_page(&self) -> PageData {
        let price = self.price.clone().or_else(|| {
            Some(self.cost.trim_start_matches('$').to_string()).filter(|c| !c.is_empty())
        });
        PageData {
            url: self.url.clone(),
            title: self.title.clone(),
            images: self.gallery_images.clone(),
            price,
            ..PageData::default()
        }
    }
}

/// Reads dealer fields from rendered portal product pages.
pub struct PortalParser {
    origin: String,
}

impl PortalParser {
    pub fn new(origin: &str) -> Self {
        Self { origin: origin.trim_end_matches('/').to_string() }
    }

    pub fn parse(&self, html: &str) -> PortalData {
        let document = Html::parse_document(html);
        let page_text: String = document.root_element().text().collect::<Vec<_>>().join(" ");

        PortalData {
            gallery_images: self.gallery(&document),
            weight: labeled_text(&document, WEIGHT_LABELS)
                .into_iter()
                .find_map(|text| WEIGHT.captures(&text).map(|c| format!("{} {}", &c[1], &c[2])))
                .unwrap_or_default(),
            sales_unit: labeled_value(&document, SALES_UNIT_LABELS),
            cost: COST.find(&page_text).map(|m| m.as_str().to_string()).unwrap_or_default(),
            model_number: labeled_value(&document, MODEL_LABELS),
            ..PortalData::default()
        }
    }

    fn gallery(&self, document: &Html) -> Vec<String> {
        let images: Vec<ElementRef> = GALLERY
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_else(|| document.select(&IMG).collect());

        let mut seen = HashSet::new();
        images
            .iter()
            .filter_map(|img| img.value().attr("src"))
            .filter(|src| {
                let lower = src.to_lowercase();
                !GALLERY_SKIP.iter().any(|skip| lower.contains(skip))
            })
            .map(|src| self.absolute(src))
            .filter(|url| !url.is_empty() && seen.insert(url.clone()))
            .collect()
    }

    fn absolute(&self, src: &str) -> String {
        let src = src.trim();
        let url = if let Some(rest) = src.strip_prefix("//") {
            format!("https://{rest}")
        } else if src.starts_with('/') {
            format!("{}{}", self.origin, src)
        } else {
            src.to_string()
        };
        match url.strip_prefix("http://") {
            Some(rest) => format!("https://{rest}"),
            None => url,
        }
    }
}

fn element_text(element: ElementRef) -> String {
    element.text().map(str::trim).filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" ")
}

/// Text around each label, label order first.
///
/// A label alone in its element ("<b>Weight:</b> 82 lbs") reads from the
/// enclosing element instead, at most two levels up.
fn labeled_text(document: &Html, labels: &[&str]) -> Vec<String> {
    labels
        .iter()
        .filter_map(|label| {
            let needle = label.to_lowercase();
            document.tree.nodes().find_map(|node| {
                let text = node.value().as_text()?;
                if !text.to_lowercase().contains(&needle) {
                    return None;
                }
                node.ancestors()
                    .filter_map(ElementRef::wrap)
                    .take(2)
                    .map(element_text)
                    .find(|around| !LABEL_PREFIX.replace(around, "").trim().is_empty())
            })
        })
        .collect()
}

/// First labeled element's text with its "Label:" prefix removed.
fn labeled_value(document: &Html, labels: &[&str]) -> String {
    labeled_text(document, labels)
        .into_iter()
        .map(|text| LABEL_PREFIX.replace(&text, "").trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Matches input rows to portal products and fetches their dealer data.
pub struct CambridgePortal {
    matcher: TitleIndexMatcher,
    origin: String,
    credentials: Option<Credentials>,
    session: OnceCell<()>,
}

impl CambridgePortal {
    pub fn new(index: SiteIndex, threshold: f64, origin: &str, credentials: Option<Credentials>) -> Self {
        let origin = origin.trim_end_matches('/').to_string();
        let matcher = TitleIndexMatcher::new(index, threshold).with_origin(&origin).keep_color_family();
        Self { matcher, origin, credentials, session: OnceCell::new() }
    }

    async fn ensure_login(&self, client: &dyn SiteFetch) -> Result<()> {
        let Some(credentials) = &self.credentials else {
            return Ok(());
        };
        self.session.get_or_try_init(|| portal_login(client, &self.origin, credentials)).await?;
        Ok(())
    }

    /// Portal data for a row, matched on "<title> <color>".
    pub async fn collect(&self, row: &InputRow, client: &dyn SiteFetch) -> Result<Option<PortalData>> {
        let Some(title) = row.title().or_else(|| row.description()) else {
            return Ok(None);
        };
        let query = match row.color() {
            Some(color) => format!("{title} {color}"),
            None => title,
        };

        let Some((entry, score)) = self.matcher.find_by_title(&query, None) else {
            debug!("No portal product for '{}'", query);
            return Ok(None);
        };
        debug!("Portal match '{}' (score {:.1})", entry.title, score);

        let url = if entry.url.starts_with('/') {
            format!("{}{}", self.origin, entry.url)
        } else {
            entry.url.clone()
        };

        self.ensure_login(client).await?;
        let html = client.get(&url).await?;
        let mut data = PortalParser::new(&self.origin).parse(&html);

        data.url = url;
        data.title = entry.title.clone();
        data.sku = entry.sku.clone();
        data.price = entry.price.clone();
        data.stock = entry.stock;
        if data.gallery_images.is_empty() {
            data.gallery_images = entry.images.clone();
        }

        let missing = data.missing_fields();
        if !missing.is_empty() {
            warn!("Portal data for '{}' is missing: {}", entry.title, missing.join(", "));
        }
        Ok(Some(data))
    }
}
