//! Bradley Caldwell: enrichment from a prebuilt product catalog, no scraping.

use crate::error::CollectError;
use crate::models::{InputRow, Manufacturer};
use crate::normalize::image::{deduplicate_urls, normalize_to_https};
use crate::normalize::text::{extract_bullet_points, text_only};
use crate::normalize::upc::normalize_upc;
use crate::site::SiteFetch;
use crate::vendors::{Locator, Vendor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, OnceLock};
use tracing::{debug, info};

static DOUBLE_PERIOD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\.\.\s*").unwrap());

fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Catalog records indexed by normalized UPC and by product URL.
#[derive(Debug, Default)]
struct Indexed {
    by_upc: HashMap<String, Value>,
    by_url: HashMap<String, Value>,
}

impl Indexed {
    fn build(items: Vec<Value>) -> Self {
        let mut indexed = Self::default();
        for record in items {
            let upc = normalize_upc(&value_text(record.get("upc")));
            let url = value_text(record.get("product_url")).trim().to_string();
            if !url.is_empty() {
                indexed.by_url.insert(url, record.clone());
            }
            if !upc.is_empty() {
                indexed.by_upc.insert(upc, record);
            }
        }
        indexed
    }
}

/// Lazily loaded product catalog (a JSON array of records).
#[derive(Debug, Default)]
pub struct CatalogIndex {
    path: Option<PathBuf>,
    loaded: OnceLock<Indexed>,
}

impl CatalogIndex {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path: path.filter(|p| !p.as_os_str().is_empty()), loaded: OnceLock::new() }
    }

    /// Loads the catalog if it is not loaded yet.
    ///
    /// A file whose top level is not an array loads as an empty catalog.
    pub fn ensure_loaded(&self) -> Result<()> {
        self.indexed().map(|_| ())
    }

    fn indexed(&self) -> Result<&Indexed> {
        if let Some(indexed) = self.loaded.get() {
            return Ok(indexed);
        }

        let path = self.path.as_deref().ok_or(CollectError::MissingCatalog)?;
        if !path.is_file() {
            return Err(CollectError::CatalogNotFound(path.to_path_buf()).into());
        }

        let indexed = Indexed::build(load_items(path)?);
        info!(
            "Loaded catalog {}: {} UPC(s), {} URL(s)",
            path.display(),
            indexed.by_upc.len(),
            indexed.by_url.len()
        );
        Ok(self.loaded.get_or_init(|| indexed))
    }

    pub fn get_by_upc(&self, upc: &str) -> Result<Option<&Value>> {
        Ok(self.indexed()?.by_upc.get(&normalize_upc(upc)))
    }

    pub fn get_by_url(&self, url: &str) -> Result<Option<&Value>> {
        Ok(self.indexed()?.by_url.get(url.trim()))
    }

    /// Product URL recorded for a UPC, if the catalog has one.
    pub fn find_product_url(&self, upc: &str) -> Result<Option<String>> {
        Ok(self
            .get_by_upc(upc)?
            .map(|record| value_text(record.get("product_url")).trim().to_string())
            .filter(|url| !url.is_empty()))
    }
}

fn load_items(path: &Path) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid catalog JSON: {}", path.display()))?;
    Ok(match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

/// Builds enriched output records from catalog entries.
pub struct CatalogEnricher;

impl CatalogEnricher {
    pub const HOMEPAGE: &'static str = "https://www.bradleycaldwell.com";

    /// Fixes `..` runs and closes long sentences with a period.
    pub fn normalize_description(description: &str) -> String {
        if description.is_empty() {
            return String::new();
        }
        let mut desc = DOUBLE_PERIOD.replace_all(description, ". ").trim().to_string();
        if !desc.is_empty() && !desc.ends_with('.') && desc.split_whitespace().count() > 8 {
            desc.push('.');
        }
        desc
    }

    /// Manufacturer block for a catalog record; an empty record gives an empty block.
    pub fn manufacturer(record: Option<&Value>) -> Manufacturer {
        let Some(record) = record.filter(|r| r.as_object().is_some_and(|o| !o.is_empty())) else {
            return Manufacturer { homepage: Self::HOMEPAGE.to_string(), ..Default::default() };
        };

        let title = text_only(&value_text(record.get("product_name")));
        let description_raw = text_only(&value_text(record.get("description")));

        let gallery = deduplicate_urls(
            record
                .get("image_urls")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .map(normalize_to_https)
                .filter(|u| !u.is_empty()),
        );

        Manufacturer {
            product_url: value_text(record.get("product_url")).trim().to_string(),
            homepage: Self::HOMEPAGE.to_string(),
            name: title.clone(),
            brand: text_only(&value_text(record.get("brand"))),
            product_name: title,
            description: Self::normalize_description(&description_raw),
            benefits_text: extract_bullet_points(&description_raw),
            ingredients_text: text_only(&value_text(record.get("ingredients"))),
            media: gallery,
            ..Default::default()
        }
    }

    /// The input row plus `manufacturer`, an empty `distributors_or_retailers`
    /// and `shopify.media` filenames (`<upc>_<i>.jpg`).
    pub fn enrich(row: &InputRow, record: Option<&Value>) -> Result<Map<String, Value>> {
        let upc = row.primary_upc().unwrap_or_default();
        let manufacturer = Self::manufacturer(record);
        let media: Vec<String> =
            (0..manufacturer.media.len()).map(|i| format!("{upc}_{i}.jpg")).collect();

        let mut out = row.columns().clone();
        out.insert("manufacturer".to_string(), serde_json::to_value(&manufacturer)?);
        out.insert("distributors_or_retailers".to_string(), json!([]));
        out.insert("shopify".to_string(), json!({ "media": media }));
        Ok(out)
    }
}

/// Catalog lookup exposed as a [`Locator`]; never touches the network.
pub struct CatalogLocator {
    catalog: CatalogIndex,
}

impl CatalogLocator {
    pub fn new(catalog: CatalogIndex) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &CatalogIndex {
        &self.catalog
    }

    /// Enriches a row from its catalog record.
    ///
    /// Returns the enriched record and whether the catalog knew the UPC.
    pub fn enrich(&self, row: &InputRow) -> Result<(Map<String, Value>, bool)> {
        let upc = row.primary_upc().unwrap_or_default();
        let record = self.catalog.get_by_upc(&upc)?;
        if record.is_none() {
            debug!("UPC {} not in {} catalog", upc, Vendor::BradleyCaldwell.display_name());
        }
        Ok((CatalogEnricher::enrich(row, record)?, record.is_some()))
    }
}

#[async_trait]
impl Locator for CatalogLocator {
    async fn locate(&self, row: &InputRow, _client: &dyn SiteFetch) -> Result<Option<String>> {
        match row.primary_upc() {
            Some(upc) => self.catalog.find_product_url(&upc),
            None => Ok(None),
        }
    }
}
