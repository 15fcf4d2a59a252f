//! Data models for input rows, scraped pages and output records.

use crate::normalize::text::{extract_bullet_points, plain_text};
use crate::normalize::upc::normalize_upc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// One product row from an input file.
///
/// Rows carry vendor-specific columns, so the row keeps every column as-is
/// and exposes typed accessors for the ones the collectors read. Numeric
/// cells (UPCs exported as numbers, prices) read back as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputRow {
    columns: Map<String, Value>,
}

impl InputRow {
    pub fn new(columns: Map<String, Value>) -> Self {
        Self { columns }
    }

    /// Builds a row from `(column, value)` string pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let columns = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        Self { columns }
    }

    /// Trimmed, non-empty string value of a column.
    pub fn get(&self, column: &str) -> Option<String> {
        let text = match self.columns.get(column)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    pub fn columns(&self) -> &Map<String, Value> {
        &self.columns
    }

    pub fn into_columns(self) -> Map<String, Value> {
        self.columns
    }

    pub fn upc(&self) -> Option<String> {
        self.get("upc")
    }

    /// First non-empty UPC column (`upc`, `upc_updated`, `upc_staged`), digits only.
    pub fn primary_upc(&self) -> Option<String> {
        ["upc", "upc_updated", "upc_staged"]
            .iter()
            .filter_map(|c| self.get(c))
            .map(|u| normalize_upc(&u))
            .find(|u| !u.is_empty())
    }

    /// Distributor description (`description_1`).
    pub fn description(&self) -> Option<String> {
        self.get("description_1")
    }

    /// Title looked up from a UPC database (`upcitemdb_title`).
    pub fn upcitemdb_title(&self) -> Option<String> {
        self.get("upcitemdb_title")
    }

    pub fn title(&self) -> Option<String> {
        self.get("title")
    }

    pub fn color(&self) -> Option<String> {
        self.get("color")
    }

    pub fn size(&self) -> Option<String> {
        self.get("size")
    }

    /// Distributor item number (`item_#`).
    pub fn item_number(&self) -> Option<String> {
        self.get("item_#")
    }

    /// Parent item number for variant grouping.
    pub fn parent(&self) -> Option<String> {
        self.get("parent")
    }

    /// Column name that supplies option `n` (1-4) for variants.
    pub fn option_field(&self, n: usize) -> Option<String> {
        self.get(&format!("option_{n}"))
    }
}

impl From<Map<String, Value>> for InputRow {
    fn from(columns: Map<String, Value>) -> Self {
        Self::new(columns)
    }
}

/// Product data extracted from a vendor product page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    pub url: String,
    pub title: String,
    pub description_html: String,
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub taxonomy: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_ld: Option<Value>,
}

/// Normalized manufacturer block attached to enriched rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manufacturer {
    pub product_url: String,
    pub homepage: String,
    pub name: String,
    pub brand: String,
    pub product_name: String,
    pub description: String,
    pub benefits_text: Vec<String>,
    pub ingredients_text: String,
    pub nutrition_text: Map<String, Value>,
    pub directions_for_use: String,
    pub media: Vec<String>,
    pub source_urls: Vec<String>,
    pub platform_guess: String,
    pub ui_cues: Vec<String>,
}

impl Manufacturer {
    /// Manufacturer block for a scraped product page.
    pub fn from_page(page: &PageData, homepage: &str, fallback_brand: &str) -> Self {
        let description = plain_text(&page.description_html);
        Self {
            product_url: page.url.clone(),
            homepage: homepage.to_string(),
            name: page.title.clone(),
            brand: page.brand.clone().unwrap_or_else(|| fallback_brand.to_string()),
            product_name: page.title.clone(),
            benefits_text: extract_bullet_points(&description),
            description,
            directions_for_use: page.specifications.as_deref().map(plain_text).unwrap_or_default(),
            media: page.images.clone(),
            source_urls: vec![page.url.clone()],
            platform_guess: page.platform.clone().unwrap_or_default(),
            ui_cues: page.collection.iter().cloned().collect(),
            ..Default::default()
        }
    }
}

/// Shopify product payload in the GraphQL `productCreate` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopifyProduct {
    pub product: ShopifyProductBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopifyProductBody {
    pub title: String,
    #[serde(rename = "descriptionHtml")]
    pub description_html: String,
    pub vendor: String,
    pub status: String,
    pub options: Vec<ShopifyOption>,
    pub variants: Vec<ShopifyVariant>,
    pub images: Vec<ShopifyImage>,
    pub metafields: Vec<Metafield>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopifyOption {
    pub name: String,
    pub position: usize,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopifyVariant {
    pub sku: String,
    pub price: String,
    pub position: usize,
    pub inventory_policy: String,
    pub compare_at_price: Option<String>,
    pub fulfillment_service: String,
    pub inventory_management: String,
    pub taxable: bool,
    pub barcode: String,
    pub grams: u32,
    pub weight: f64,
    pub weight_unit: String,
    pub inventory_quantity: i64,
    pub requires_shipping: bool,
    pub metafields: Vec<Metafield>,
    pub image_id: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
}

impl ShopifyVariant {
    /// Option values in position order (1-4).
    pub fn option(&self, n: usize) -> Option<&str> {
        match n {
            1 => self.option1.as_deref(),
            2 => self.option2.as_deref(),
            3 => self.option3.as_deref(),
            4 => self.option4.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopifyImage {
    pub position: usize,
    pub src: String,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metafield {
    pub namespace: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Metafield {
    pub fn custom(key: &str, value: String, kind: &str) -> Self {
        Self {
            namespace: "custom".to_string(),
            key: key.to_string(),
            value,
            kind: kind.to_string(),
        }
    }
}
