//! Shopify product payloads built from scraped pages and input rows.

use crate::models::{
    InputRow, Metafield, PageData, ShopifyImage, ShopifyOption, ShopifyProduct, ShopifyProductBody,
    ShopifyVariant,
};
use crate::vendors::Vendor;
use regex_lite::Regex;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::debug;

static DROPPED_BLOCKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["script", "noscript", "svg", "button", "deferred-media", "template", "iframe"]
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}[^>]*>.*?</{tag}>")).unwrap())
        .collect()
});
static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<img[^>]*>").unwrap());
static LAYOUT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(?:div|span)(?:\s[^>]*)?>").unwrap());
static NOISY_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\s+(?:role|aria-[a-z-]+|data-[a-z-]+|style|class|id|sizes|srcset|loading|width|height|alt|on[a-z]+)="[^"]*""#,
    )
    .unwrap()
});
static WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static SPACE_BEFORE_GT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+>").unwrap());
static EMPTY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<([a-z]+)>\s*</([a-z]+)>").unwrap());
static BR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static P_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<p[\s>]").unwrap());
static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)?$").unwrap());
static NUMBER_UNIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)([A-Za-z]+)$").unwrap());

const UPPERCASE_UNITS: &[&str] = &[
    "LB", "LBS", "OZ", "KG", "G", "MG", "ML", "L", "GAL", "QT", "PT", "FL", "CT", "EA", "PK", "BX", "CS",
];

const ALT_SKIP_VALUES: &[&str] = &["ea", "each", "none", "", "null"];

/// Strips layout markup and noisy attributes so a description renders in any theme.
pub fn clean_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let mut out = html.to_string();
    for block in DROPPED_BLOCKS.iter() {
        out = block.replace_all(&out, "").into_owned();
    }
    let out = IMG_TAG.replace_all(&out, "");
    let out = LAYOUT_TAG.replace_all(&out, "");
    let out = NOISY_ATTR.replace_all(&out, "");
    let out = WS.replace_all(&out, " ");
    let out = SPACE_BEFORE_GT.replace_all(&out, ">");
    let out = EMPTY_TAG.replace_all(&out, |caps: &regex_lite::Captures<'_>| {
        if caps[1].eq_ignore_ascii_case(&caps[2]) {
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    out.trim().to_string()
}

/// Cleans the HTML and wraps `<br>`-separated text in paragraphs.
pub fn format_body_html(html: &str) -> String {
    let cleaned = clean_html(html);
    if cleaned.is_empty() {
        return String::new();
    }

    let has_paragraphs = P_OPEN.is_match(&cleaned);
    let parts: Vec<String> = BR
        .split(&cleaned)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            if has_paragraphs && part.starts_with('<') {
                part.to_string()
            } else {
                format!("<p>{part}</p>")
            }
        })
        .collect();

    if parts.is_empty() {
        format!("<p>{cleaned}</p>")
    } else {
        parts.concat()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn is_unit(word: &str) -> bool {
    UPPERCASE_UNITS.contains(&word.to_uppercase().as_str())
}

/// Normalizes size capitalization: `"2 GALLON"` -> `"2 Gallon"`, `"50lb"` -> `"50 LB"`.
pub fn normalize_size(size: &str) -> String {
    size.split_whitespace()
        .map(|word| {
            if NUMBER.is_match(word) {
                word.to_string()
            } else if is_unit(word) {
                word.to_uppercase()
            } else if let Some(caps) = NUMBER_UNIT.captures(word) {
                let unit = &caps[2];
                let unit = if is_unit(unit) { unit.to_uppercase() } else { capitalize(unit) };
                format!("{} {}", &caps[1], unit)
            } else {
                capitalize(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Alt text with variant filter tags: `"Layena #50_LB#EA_PACK"`.
pub fn generate_alt_tags(name: &str, options: &[&str]) -> String {
    let tags: String = options
        .iter()
        .filter(|v| !ALT_SKIP_VALUES.contains(&v.trim().to_lowercase().as_str()))
        .map(|v| format!("#{}", v.to_uppercase().replace([' ', '-', '&'], "_")))
        .collect();
    format!("{name} {tags}").trim().to_string()
}

/// Option column name as a display label (`"flavor_name"` -> `"Flavor Name"`).
fn option_label(field: &str) -> String {
    field
        .replace('_', " ")
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn money(value: &str) -> String {
    value.replace(['$', ','], "")
}

/// A parent row and the rows that name it in their `parent` column.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantGroup {
    pub parent: InputRow,
    pub variants: Vec<InputRow>,
}

fn parent_of(row: &InputRow) -> Option<String> {
    row.parent().filter(|p| Some(p) != row.item_number().as_ref())
}

/// Groups rows into products by their `parent` item number.
///
/// Rows whose parent is missing from the input stand on their own.
pub fn group_variants(rows: Vec<InputRow>) -> Vec<VariantGroup> {
    let heads: HashSet<String> = rows
        .iter()
        .filter(|r| parent_of(r).is_none())
        .filter_map(InputRow::item_number)
        .collect();

    let mut groups: Vec<VariantGroup> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut children = Vec::new();

    for row in rows {
        match parent_of(&row).filter(|p| heads.contains(p)) {
            Some(parent) => children.push((parent, row)),
            None => {
                if let Some(item) = row.item_number() {
                    slots.entry(item).or_insert(groups.len());
                }
                groups.push(VariantGroup { parent: row, variants: Vec::new() });
            }
        }
    }

    for (parent, row) in children {
        if let Some(&slot) = slots.get(&parent) {
            groups[slot].variants.push(row);
        }
    }

    groups
}

/// Option source columns from the parent row, falling back to `size`.
fn option_fields(parent: &InputRow) -> [Option<String>; 4] {
    let fields = [1, 2, 3, 4].map(|n| parent.option_field(n));
    if fields.iter().all(Option::is_none) && parent.size().is_some() {
        debug!("No explicit options found, using 'size' as option 1");
        return [Some("size".to_string()), None, None, None];
    }
    fields
}

fn build_variant(
    record: &InputRow,
    position: usize,
    fields: &[Option<String>; 4],
    sku_prefix: &str,
) -> ShopifyVariant {
    let [o1, o2, o3, o4] = fields.each_ref().map(|field| {
        let field = field.as_deref()?;
        let value = record.get(field)?;
        Some(if field == "size" { normalize_size(&value) } else { value })
    });

    let price = record
        .get("sold_ext_price_adj")
        .or_else(|| record.get("avg_price_/_unit"))
        .map(|p| money(&p))
        .unwrap_or_else(|| "0".to_string());
    let cost = record.get("sold_ext_cost_adj").map(|c| money(&c)).filter(|c| !c.is_empty());
    let sku = record.item_number().unwrap_or_else(|| format!("{sku_prefix}-{position:04}"));
    let barcode = ["sku", "upc", "upc_updated"]
        .iter()
        .find_map(|c| record.get(c))
        .unwrap_or_default();
    let inventory_quantity = record
        .get("inventory_qty")
        .and_then(|q| q.parse::<f64>().ok())
        .map(|q| q as i64)
        .unwrap_or(0);

    let mut metafields = Vec::new();
    if let (Some(value), Some("size")) = (&o1, fields[0].as_deref()) {
        let size_info = json!({ "label": value, "weight": value });
        metafields.push(Metafield::custom("size_info", size_info.to_string(), "json"));
    }

    ShopifyVariant {
        sku,
        price,
        position,
        inventory_policy: "deny".to_string(),
        compare_at_price: None,
        fulfillment_service: "manual".to_string(),
        inventory_management: "shopify".to_string(),
        taxable: true,
        barcode,
        grams: 0,
        weight: 0.0,
        weight_unit: "lb".to_string(),
        inventory_quantity,
        requires_shipping: true,
        metafields,
        image_id: position,
        option1: o1,
        option2: o2,
        option3: o3,
        option4: o4,
        cost,
    }
}

fn build_options(fields: &[Option<String>; 4], variants: &[ShopifyVariant]) -> Vec<ShopifyOption> {
    let mut options = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        let Some(field) = field else { continue };
        let position = i + 1;
        let mut values: Vec<String> = Vec::new();
        for value in variants.iter().filter_map(|v| v.option(position)) {
            if !values.iter().any(|seen| seen == value) {
                values.push(value.to_string());
            }
        }
        if !values.is_empty() {
            options.push(ShopifyOption { name: option_label(field), position, values });
        }
    }
    options
}

/// Builds the Shopify payload for a product page and its input rows.
///
/// `parent` is the first variant; `variants` follow in input order.
pub fn generate_shopify_product(
    page: &PageData,
    parent: &InputRow,
    variants: &[InputRow],
    vendor: Vendor,
) -> ShopifyProduct {
    let title = Some(page.title.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| parent.description())
        .unwrap_or_else(|| "Unknown Product".to_string());
    let brand = page
        .brand
        .clone()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| vendor.brand().to_string());
    debug!("Title: {}", title);
    debug!("Brand: {}", brand);

    let fields = option_fields(parent);
    let shopify_variants: Vec<ShopifyVariant> = std::iter::once(parent)
        .chain(variants)
        .enumerate()
        .map(|(i, record)| build_variant(record, i + 1, &fields, vendor.sku_prefix()))
        .collect();
    debug!("Created {} variant(s)", shopify_variants.len());

    let options = build_options(&fields, &shopify_variants);

    let alt = match shopify_variants.first() {
        Some(v) => generate_alt_tags(
            &title,
            &[1, 2, 3].map(|n| v.option(n).unwrap_or_default()),
        ),
        None => title.clone(),
    };
    let images = page
        .images
        .iter()
        .enumerate()
        .map(|(i, src)| ShopifyImage { position: i + 1, src: src.clone(), alt: alt.clone() })
        .collect();

    let mut metafields = Vec::new();
    if let Some(specs) = page.specifications.as_deref().map(clean_html).filter(|s| !s.is_empty()) {
        metafields.push(Metafield::custom("specifications", specs, "rich_text_field"));
    }

    ShopifyProduct {
        product: ShopifyProductBody {
            title,
            description_html: format_body_html(&page.description_html),
            vendor: brand,
            status: "ACTIVE".to_string(),
            options,
            variants: shopify_variants,
            images,
            metafields,
        },
    }
}
