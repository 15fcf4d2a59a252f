//! Collect command: locate, fetch and shape every row of an input file.

use crate::commands::{build_locator, load_index, open_catalog, pick_path};
use crate::config::{Config, OutputShape};
use crate::error::CollectError;
use crate::format::Formatter;
use crate::models::{InputRow, Manufacturer, PageData, ShopifyProduct};
use crate::normalize::normalize_upc;
use crate::shopify::{generate_shopify_product, group_variants};
use crate::site::{HttpClient, PageParser, SiteFetch};
use crate::sku::SkuRegistry;
use crate::vendors::cambridge_portal::PORTAL_ORIGIN;
use crate::vendors::{CambridgePortal, CatalogEnricher, CatalogLocator, Locator, PortalData, Vendor};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Arguments of one collect run.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub vendor: Vendor,
    pub input: PathBuf,
    pub output: PathBuf,
    pub catalog: Option<PathBuf>,
    pub index: Option<PathBuf>,
    /// First row to process (1-based, inclusive).
    pub start: Option<usize>,
    /// Last row to process (1-based, inclusive).
    pub end: Option<usize>,
    pub skip_existing: bool,
    /// Overrides the configured output shape.
    pub shape: Option<OutputShape>,
    /// Cambridge dealer portal index; adds a `portal` block to matched rows.
    pub portal_index: Option<PathBuf>,
    /// SKU registry for Shopify rows without an item number.
    pub sku_registry: Option<PathBuf>,
}

impl CollectOptions {
    pub fn new(vendor: Vendor, input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            vendor,
            input: input.into(),
            output: output.into(),
            catalog: None,
            index: None,
            start: None,
            end: None,
            skip_existing: false,
            shape: None,
            portal_index: None,
            sku_registry: None,
        }
    }
}

/// Counts for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub vendor: String,
    pub total: usize,
    pub enriched: usize,
    pub not_found: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Records in the output file, including merged existing ones.
    pub written: usize,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Enriched,
    NotFound,
    Failed,
}

impl RunSummary {
    fn tally(&mut self, outcome: Outcome, rows: usize) {
        match outcome {
            Outcome::Enriched => self.enriched += rows,
            Outcome::NotFound => self.not_found += rows,
            Outcome::Failed => self.failed += rows,
        }
    }
}

/// Where product data comes from for a vendor.
enum Source {
    Site { locator: Box<dyn Locator>, parser: PageParser },
    Catalog(CatalogLocator),
}

fn row_label(row: &InputRow) -> String {
    row.primary_upc()
        .or_else(|| row.item_number())
        .or_else(|| row.title())
        .or_else(|| row.description())
        .unwrap_or_else(|| "row".to_string())
}

fn has_identifier(row: &InputRow) -> bool {
    row.primary_upc().is_some()
        || row.title().is_some()
        || row.description().is_some()
        || row.upcitemdb_title().is_some()
}

/// Page data stand-in built from a catalog record.
fn page_from_catalog(record: &Value) -> PageData {
    let m = CatalogEnricher::manufacturer(Some(record));
    PageData {
        url: m.product_url,
        title: m.product_name,
        description_html: m.description,
        images: m.media,
        brand: Some(m.brand).filter(|b| !b.is_empty()),
        ..PageData::default()
    }
}

fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<CollectError>().is_some_and(CollectError::is_fatal)
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<CollectError>().is_some_and(CollectError::is_not_found)
}

fn classify(label: &str, err: &anyhow::Error) -> Outcome {
    if is_not_found(err) {
        info!("No match for {}: {}", label, err);
        Outcome::NotFound
    } else {
        warn!("Failed to collect {}: {:#}", label, err);
        Outcome::Failed
    }
}

impl Source {
    async fn page(&self, row: &InputRow, client: &dyn SiteFetch) -> Result<PageData> {
        match self {
            Source::Site { locator, parser } => {
                if !has_identifier(row) {
                    return Err(CollectError::NoIdentifier.into());
                }
                let url = locator
                    .locate(row, client)
                    .await?
                    .ok_or_else(|| CollectError::NotFound(row_label(row)))?;
                info!("Found product page: {}", url);

                let html = client.get(&url).await?;
                parser.parse_product(&html, &url)
            }
            Source::Catalog(catalog) => {
                let upc = row.primary_upc().ok_or(CollectError::NoIdentifier)?;
                let record = catalog
                    .catalog()
                    .get_by_upc(&upc)?
                    .ok_or_else(|| CollectError::NotFound(upc.clone()))?;
                Ok(page_from_catalog(record))
            }
        }
    }
}

/// Portal data for a row; lookup failures other than a rejected login only warn.
async fn portal_data(
    portal: Option<&CambridgePortal>,
    row: &InputRow,
    client: &dyn SiteFetch,
) -> Result<Option<PortalData>> {
    let Some(portal) = portal else {
        return Ok(None);
    };
    match portal.collect(row, client).await {
        Ok(data) => Ok(data),
        Err(e) if is_fatal(&e) => Err(e),
        Err(e) => {
            warn!("Portal lookup failed for {}: {:#}", row_label(row), e);
            Ok(None)
        }
    }
}

/// Replaces placeholder SKUs with registry numbers; rows with an item number keep it.
fn assign_registry_skus(
    product: &mut ShopifyProduct,
    rows: &[&InputRow],
    registry: &mut SkuRegistry,
) -> Result<()> {
    for (variant, row) in product.product.variants.iter_mut().zip(rows) {
        if row.item_number().is_none() {
            variant.sku = registry.generate()?;
            debug!("Assigned SKU {} to {}", variant.sku, row_label(row));
        }
    }
    Ok(())
}

/// Reads the input file; it must hold a JSON array of row objects.
fn load_rows(path: &Path) -> Result<Vec<InputRow>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse input file: {}", path.display()))?;

    let Value::Array(items) = value else {
        bail!("Input file must contain a JSON array of products: {}", path.display());
    };

    let total = items.len();
    let rows: Vec<InputRow> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(InputRow::new(map)),
            _ => None,
        })
        .collect();
    if rows.len() < total {
        warn!("Ignored {} non-object entries in {}", total - rows.len(), path.display());
    }
    Ok(rows)
}

/// Records already in the output file; a missing file is empty.
fn load_existing(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read existing output: {}", path.display()))?;
    match serde_json::from_str::<Value>(&content)
        .with_context(|| format!("Failed to parse existing output: {}", path.display()))?
    {
        Value::Array(items) => Ok(items),
        _ => bail!("Existing output is not a JSON array: {}", path.display()),
    }
}

/// UPCs of existing records, including Shopify variant barcodes.
fn existing_upcs(records: &[Value]) -> HashSet<String> {
    let mut upcs = HashSet::new();
    for record in records {
        let Some(map) = record.as_object() else { continue };
        if let Some(upc) = InputRow::new(map.clone()).primary_upc() {
            upcs.insert(upc);
        }
        let variants = record.pointer("/product/variants").and_then(Value::as_array);
        for variant in variants.into_iter().flatten() {
            let barcode = InputRow::new(variant.as_object().cloned().unwrap_or_default()).get("barcode");
            if let Some(b) = barcode.map(|b| normalize_upc(&b)).filter(|b| !b.is_empty()) {
                upcs.insert(b);
            }
        }
    }
    upcs
}

/// Keeps rows `start..=end` (1-based); out-of-range bounds are clamped.
fn select_range<T>(items: Vec<T>, start: Option<usize>, end: Option<usize>) -> Vec<T> {
    let len = items.len();
    let first = start.unwrap_or(1).max(1) - 1;
    let last = end.unwrap_or(len).min(len);
    if first >= last {
        return Vec::new();
    }
    items.into_iter().skip(first).take(last - first).collect()
}

fn write_records(path: &Path, records: &[Value]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).with_context(|| format!("Failed to write output file: {}", path.display()))
}

/// Runs a vendor collector over an input file.
pub struct CollectCommand {
    config: Config,
}

impl CollectCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Executes the run and returns the formatted summary.
    pub async fn execute(&self, options: &CollectOptions) -> Result<String> {
        let client = HttpClient::new(&self.config, options.vendor.origin())
            .context("Failed to create HTTP client")?;

        self.execute_with_client(&client, options).await
    }

    /// Executes the run with a provided client (for testing).
    pub async fn execute_with_client(
        &self,
        client: &dyn SiteFetch,
        options: &CollectOptions,
    ) -> Result<String> {
        let summary = self.run(client, options).await?;
        Ok(Formatter::new(self.config.format).format_summary(&summary))
    }

    fn source(&self, client: &dyn SiteFetch, options: &CollectOptions) -> Result<Source> {
        let vendor = options.vendor;
        if !vendor.fetches_pages() {
            return Ok(Source::Catalog(open_catalog(&self.config, options.catalog.as_deref())?));
        }
        let locator = build_locator(
            vendor,
            &self.config,
            client.origin(),
            options.catalog.as_deref(),
            options.index.as_deref(),
        )?;
        Ok(Source::Site { locator, parser: PageParser::new(client.origin()) })
    }

    fn portal(&self, options: &CollectOptions) -> Result<Option<CambridgePortal>> {
        let path = pick_path(options.portal_index.as_deref(), self.config.portal_index_path.as_ref());
        let Some(path) = path.filter(|_| options.vendor == Vendor::Cambridge) else {
            return Ok(None);
        };
        let credentials = self.config.portal_credentials();
        if credentials.is_none() {
            warn!("No portal credentials configured; dealer pages may be incomplete");
        }
        Ok(Some(CambridgePortal::new(
            load_index(&path)?,
            self.config.title_match_threshold,
            PORTAL_ORIGIN,
            credentials,
        )))
    }

    fn registry(&self, options: &CollectOptions) -> Result<Option<SkuRegistry>> {
        let path = pick_path(options.sku_registry.as_deref(), self.config.sku_registry_path.as_ref());
        path.map(SkuRegistry::open).transpose()
    }

    /// Processes the rows and writes the output file.
    pub async fn run(&self, client: &dyn SiteFetch, options: &CollectOptions) -> Result<RunSummary> {
        let vendor = options.vendor;
        let shape = options.shape.unwrap_or(self.config.output_shape);
        let source = self.source(client, options)?;
        let portal = self.portal(options)?;

        let rows = load_rows(&options.input)?;
        let rows = select_range(rows, options.start, options.end);

        let existing = if options.skip_existing { load_existing(&options.output)? } else { Vec::new() };
        let mut summary = RunSummary {
            vendor: vendor.to_string(),
            output: options.output.clone(),
            ..RunSummary::default()
        };

        let rows: Vec<InputRow> = if existing.is_empty() {
            rows
        } else {
            let known = existing_upcs(&existing);
            let before = rows.len();
            let kept: Vec<InputRow> = rows
                .into_iter()
                .filter(|r| r.primary_upc().is_none_or(|u| !known.contains(&u)))
                .collect();
            summary.skipped = before - kept.len();
            info!("Skipping {} row(s) already in {}", summary.skipped, options.output.display());
            kept
        };
        summary.total = rows.len();

        info!("Collecting {} row(s) for {} as {}", rows.len(), vendor.display_name(), shape);

        let records = match shape {
            OutputShape::Enriched => {
                Self::collect_enriched(vendor, &source, portal.as_ref(), rows, client, &mut summary)
                    .await?
            }
            OutputShape::Shopify => {
                let mut registry = self.registry(options)?;
                Self::collect_shopify(
                    vendor,
                    &source,
                    portal.as_ref(),
                    registry.as_mut(),
                    rows,
                    client,
                    &mut summary,
                )
                .await?
            }
        };

        let mut output = existing;
        output.extend(records);
        write_records(&options.output, &output)?;
        summary.written = output.len();

        info!(
            "Done: {} enriched, {} not found, {} failed, {} skipped",
            summary.enriched, summary.not_found, summary.failed, summary.skipped
        );
        Ok(summary)
    }

    async fn collect_enriched(
        vendor: Vendor,
        source: &Source,
        portal: Option<&CambridgePortal>,
        rows: Vec<InputRow>,
        client: &dyn SiteFetch,
        summary: &mut RunSummary,
    ) -> Result<Vec<Value>> {
        let total = rows.len();
        let mut records = Vec::with_capacity(total);

        for (i, row) in rows.into_iter().enumerate() {
            let label = row_label(&row);
            info!("[{}/{}] {}", i + 1, total, label);

            let (record, outcome) = match source {
                Source::Catalog(catalog) => match catalog.enrich(&row) {
                    Ok((record, true)) => (record, Outcome::Enriched),
                    Ok((record, false)) => {
                        info!("No catalog record for {}", label);
                        (record, Outcome::NotFound)
                    }
                    Err(e) => (row.clone().into_columns(), classify(&label, &e)),
                },
                Source::Site { .. } => {
                    let page = match source.page(&row, client).await {
                        Err(e) if is_fatal(&e) => return Err(e),
                        page => page,
                    };
                    let dealer = portal_data(portal, &row, client).await?;

                    let page = match (page, &dealer) {
                        (Ok(page), _) => Ok(page),
                        (Err(e), Some(data)) if is_not_found(&e) => {
                            info!("{} not on the public site ({}); using portal data", label, e);
                            Ok(data.to_page())
                        }
                        (Err(e), _) => Err(e),
                    };
                    match page {
                        Ok(page) => {
                            let manufacturer =
                                Manufacturer::from_page(&page, vendor.origin(), vendor.brand());
                            let mut record: Map<String, Value> = row.columns().clone();
                            record.insert("manufacturer".to_string(), serde_json::to_value(&manufacturer)?);
                            if let Some(data) = dealer {
                                record.insert("portal".to_string(), serde_json::to_value(&data)?);
                            }
                            (record, Outcome::Enriched)
                        }
                        Err(e) => (row.clone().into_columns(), classify(&label, &e)),
                    }
                }
            };

            summary.tally(outcome, 1);
            records.push(Value::Object(record));
        }

        Ok(records)
    }

    async fn collect_shopify(
        vendor: Vendor,
        source: &Source,
        portal: Option<&CambridgePortal>,
        mut registry: Option<&mut SkuRegistry>,
        rows: Vec<InputRow>,
        client: &dyn SiteFetch,
        summary: &mut RunSummary,
    ) -> Result<Vec<Value>> {
        if let Some(registry) = registry.as_deref_mut() {
            for item in rows.iter().filter_map(InputRow::item_number) {
                registry.mark_used(&item)?;
            }
        }

        let groups = group_variants(rows);
        let total = groups.len();
        debug!("Grouped into {} product(s)", total);

        let mut records = Vec::with_capacity(total);
        for (i, group) in groups.into_iter().enumerate() {
            let label = row_label(&group.parent);
            let size = 1 + group.variants.len();
            info!("[{}/{}] {} ({} variant(s))", i + 1, total, label, size);

            let page = match source.page(&group.parent, client).await {
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) if is_not_found(&e) => {
                    match portal_data(portal, &group.parent, client).await? {
                        Some(data) => {
                            info!("{} not on the public site; using portal data", label);
                            Ok(data.to_page())
                        }
                        None => Err(e),
                    }
                }
                page => page,
            };

            match page {
                Ok(page) => {
                    let mut product =
                        generate_shopify_product(&page, &group.parent, &group.variants, vendor);
                    if let Some(registry) = registry.as_deref_mut() {
                        let rows: Vec<&InputRow> =
                            std::iter::once(&group.parent).chain(&group.variants).collect();
                        assign_registry_skus(&mut product, &rows, registry)?;
                    }
                    records.push(serde_json::to_value(&product)?);
                    summary.tally(Outcome::Enriched, size);
                }
                Err(e) => {
                    summary.tally(classify(&label, &e), size);
                    records.push(Value::Object(group.parent.into_columns()));
                    records.extend(group.variants.into_iter().map(|v| Value::Object(v.into_columns())));
                }
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendors::testing::MockSite;
    use crate::vendors::{IndexEntry, SiteIndex};
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    const ETHICAL: &str = "https://www.ethicalpet.com";
    const SHOP: &str = "https://shop.purinamills.com";
    const CAMBRIDGE: &str = "https://www.cambridgepavers.com";

    fn test_config() -> Config {
        Config { delay_ms: 0, delay_jitter_ms: 0, ..Config::default() }
    }

    fn write_json(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
        path
    }

    fn read_json(path: &Path) -> Vec<Value> {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    fn catalog(dir: &TempDir) -> PathBuf {
        write_json(
            dir,
            "catalog.json",
            &json!([{
                "upc": "077234012345",
                "product_url": "https://www.bradleycaldwell.com/item/1",
                "product_name": "Feeder",
                "brand": "Pet Lodge",
                "description": "Galvanized steel",
                "image_urls": ["http://img.bc.com/a.jpg"]
            }]),
        )
    }

    #[test]
    fn test_select_range() {
        let items: Vec<u32> = (1..=5).collect();
        assert_eq!(select_range(items.clone(), None, None), vec![1, 2, 3, 4, 5]);
        assert_eq!(select_range(items.clone(), Some(2), Some(3)), vec![2, 3]);
        assert_eq!(select_range(items.clone(), Some(0), Some(1)), vec![1]);
        assert_eq!(select_range(items.clone(), Some(4), Some(99)), vec![4, 5]);
        assert!(select_range(items.clone(), Some(4), Some(2)).is_empty());
        assert!(select_range(items, Some(9), None).is_empty());
    }

    #[test]
    fn test_existing_upcs_reads_rows_and_variants() {
        let records = vec![
            json!({"upc": "0-77234-01234-5"}),
            json!({"product": {"variants": [{"barcode": "071859950010"}, {"barcode": ""}]}}),
            json!("not an object"),
        ];
        let upcs = existing_upcs(&records);
        assert_eq!(upcs.len(), 2);
        assert!(upcs.contains("077234012345"));
        assert!(upcs.contains("071859950010"));
    }

    #[test]
    fn test_load_rows_requires_array() {
        let dir = tempdir().unwrap();
        let path = write_json(&dir, "input.json", &json!({"upc": "1"}));
        let err = load_rows(&path).unwrap_err().to_string();
        assert!(err.contains("JSON array"));

        let path = write_json(&dir, "mixed.json", &json!([{"upc": "1"}, 5, null]));
        assert_eq!(load_rows(&path).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_collect_ethical_enriched() {
        let dir = tempdir().unwrap();
        let input = write_json(
            &dir,
            "input.json",
            &json!([
                {"upc": "0-77234-01234-5", "description_1": "Play Strong Scent Ball", "item_#": "E1"},
                {"upc": "077234099999", "description_1": "Mystery Widget"},
                {"item_#": "E3"}
            ]),
        );
        let output = dir.path().join("out").join("ethical.json");

        let pdp = format!("{ETHICAL}/product/play-strong-scent-ball/");
        let client = MockSite::new(ETHICAL)
            .page(
                &format!("{ETHICAL}/?s=PLAY+STRONG+SCENT+BALL"),
                &format!(r#"<a href="{pdp}">Play Strong Scent Ball</a>"#),
            )
            .page(
                &pdp,
                r#"<html><body><div class="product type-product product_cat-dog-toys">
                     <div class="summary"><h4>Play Strong Scent Ball</h4></div>
                     <div class="woocommerce-product-details__short-description">
                       <p>Durable rubber; Floats in water</p>
                     </div>
                   </div></body></html>"#,
            );

        let options = CollectOptions::new(Vendor::Ethical, &input, &output);
        let summary = CollectCommand::new(test_config()).run(&client, &options).await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.enriched, 1);
        assert_eq!(summary.not_found, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.written, 3);

        let records = read_json(&output);
        assert_eq!(records[0]["item_#"], "E1");
        assert_eq!(records[0]["manufacturer"]["product_name"], "Play Strong Scent Ball");
        assert_eq!(records[0]["manufacturer"]["brand"], "Ethical Products");
        assert_eq!(records[0]["manufacturer"]["product_url"], pdp.as_str());
        assert_eq!(records[1], json!({"upc": "077234099999", "description_1": "Mystery Widget"}));
        assert_eq!(records[2], json!({"item_#": "E3"}));
    }

    #[tokio::test]
    async fn test_collect_cambridge_fetch_failure_keeps_row() {
        let dir = tempdir().unwrap();
        let index = dir.path().join("cambridge_index.json");
        SiteIndex::new(vec![
            IndexEntry {
                title: "Toscana".into(),
                url: "/pavers-details?prodid=1".into(),
                ..IndexEntry::default()
            },
            IndexEntry {
                title: "Olde English Wall".into(),
                url: "/pavers-details?prodid=3".into(),
                ..IndexEntry::default()
            },
        ])
        .save(&index)
        .unwrap();

        let input = write_json(
            &dir,
            "input.json",
            &json!([
                {"title": "Sherwood Toscana", "color": "Onyx Natural"},
                {"title": "Olde English Wall"}
            ]),
        );
        let output = dir.path().join("cambridge.json");
        let client = MockSite::new(CAMBRIDGE).page(
            &format!("{CAMBRIDGE}/pavers-details?prodid=1"),
            r#"<html><head><title>Toscana | Cambridge</title></head><body>
                 <h1>Toscana</h1>
                 <p><strong>Description:</strong> Old world charm with a tumbled finish.</p>
               </body></html>"#,
        );

        let mut options = CollectOptions::new(Vendor::Cambridge, &input, &output);
        options.index = Some(index);
        let summary = CollectCommand::new(test_config()).run(&client, &options).await.unwrap();

        assert_eq!(summary.enriched, 1);
        assert_eq!(summary.failed, 1);

        let records = read_json(&output);
        assert_eq!(records[0]["manufacturer"]["product_name"], "Toscana");
        assert_eq!(records[0]["manufacturer"]["brand"], "Cambridge");
        assert_eq!(records[1], json!({"title": "Olde English Wall"}));
    }

    #[tokio::test]
    async fn test_collect_cambridge_without_index_fails() {
        let dir = tempdir().unwrap();
        let input = write_json(&dir, "input.json", &json!([]));
        let options = CollectOptions::new(Vendor::Cambridge, &input, dir.path().join("out.json"));

        let err = CollectCommand::new(test_config())
            .run(&MockSite::new(CAMBRIDGE), &options)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<CollectError>(), Some(CollectError::MissingIndex(_))));
        assert!(!dir.path().join("out.json").exists());
    }

    #[tokio::test]
    async fn test_collect_purina_shopify_groups_variants() {
        let dir = tempdir().unwrap();
        let input = write_json(
            &dir,
            "input.json",
            &json!([
                {
                    "item_#": "100",
                    "upc": "071859950010",
                    "description_1": "Layena SunFresh Pellets",
                    "size": "50LB",
                    "sold_ext_price_adj": "$24.99"
                },
                {"item_#": "101", "parent": "100", "upc": "071859950027", "size": "25 lb"}
            ]),
        );
        let output = dir.path().join("shopify.json");
        let pdp = format!("{SHOP}/products/layena-sunfresh-pellets");
        let client = MockSite::new(SHOP)
            .page(
                &format!("{SHOP}/search?q=Layena+SunFresh+Pellets"),
                r#"<a href="/products/layena-sunfresh-pellets?_pos=1">Purina Layena SunFresh Pellets</a>"#,
            )
            .page(
                &pdp,
                r#"<html><body><h1 class="product__title">Layena SunFresh Pellets</h1>
                     <div class="product__description"><p>Complete layer feed.</p></div>
                   </body></html>"#,
            );

        let mut options = CollectOptions::new(Vendor::PurinaMills, &input, &output);
        options.shape = Some(OutputShape::Shopify);
        let summary = CollectCommand::new(test_config()).run(&client, &options).await.unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.enriched, 2);
        assert_eq!(summary.written, 1);

        let records = read_json(&output);
        let product = &records[0]["product"];
        assert_eq!(product["title"], "Layena SunFresh Pellets");
        assert_eq!(product["vendor"], "Purina");
        assert_eq!(product["descriptionHtml"], "<p>Complete layer feed.</p>");
        assert_eq!(product["variants"][0]["sku"], "100");
        assert_eq!(product["variants"][0]["price"], "24.99");
        assert_eq!(product["variants"][1]["option1"], "25 LB");
        assert_eq!(product["variants"][1]["barcode"], "071859950027");
        assert_eq!(product["options"][0]["values"], json!(["50 LB", "25 LB"]));
    }

    #[tokio::test]
    async fn test_collect_stops_on_rejected_login() {
        let dir = tempdir().unwrap();
        let input = write_json(
            &dir,
            "input.json",
            &json!([{"upc": "012345678905"}, {"upc": "012345678912"}]),
        );
        let output = dir.path().join("orgill.json");
        let client = MockSite::new(Vendor::Orgill.origin());

        let options = CollectOptions::new(Vendor::Orgill, &input, &output);
        let err = CollectCommand::new(test_config()).run(&client, &options).await.unwrap_err();

        assert!(matches!(err.downcast_ref::<CollectError>(), Some(CollectError::LoginFailed { .. })));
        assert!(!output.exists());
        // one home page check, no second row
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_collect_cambridge_with_portal_data() {
        let dir = tempdir().unwrap();
        let index = dir.path().join("cambridge_index.json");
        SiteIndex::new(vec![IndexEntry {
            title: "Toscana".into(),
            url: "/pavers-details?prodid=1".into(),
            ..IndexEntry::default()
        }])
        .save(&index)
        .unwrap();

        let portal_index = dir.path().join("portal_index.json");
        SiteIndex::new(vec![
            IndexEntry {
                title: "Sherwood Toscana Onyx Natural".into(),
                url: "/Toscana-Onyx-Natural".into(),
                sku: Some("SCT-ONX".into()),
                stock: Some(8),
                ..IndexEntry::default()
            },
            IndexEntry {
                title: "Cambridge Paver Sealer Gloss".into(),
                url: "/Paver-Sealer-Gloss".into(),
                price: Some("39.00".into()),
                images: vec!["https://shop.cambridgepavers.com/img/sealer.jpg".into()],
                ..IndexEntry::default()
            },
        ])
        .save(&portal_index)
        .unwrap();

        let input = write_json(
            &dir,
            "input.json",
            &json!([
                {"title": "Sherwood Toscana", "color": "Onyx Natural"},
                {"title": "Paver Sealer Gloss"}
            ]),
        );
        let output = dir.path().join("cambridge.json");
        let client = MockSite::new(CAMBRIDGE)
            .page(
                &format!("{CAMBRIDGE}/pavers-details?prodid=1"),
                "<html><body><h1>Toscana</h1></body></html>",
            )
            .page(
                &format!("{PORTAL_ORIGIN}/Toscana-Onyx-Natural"),
                "<ul><li>Sales Unit: Pallet</li><li>Vendor SKU: SCT-ONX</li></ul><p>$512.00</p>",
            )
            .page(&format!("{PORTAL_ORIGIN}/Paver-Sealer-Gloss"), "<p>Sales Unit: Each</p>");

        let mut options = CollectOptions::new(Vendor::Cambridge, &input, &output);
        options.index = Some(index);
        options.portal_index = Some(portal_index);
        let summary = CollectCommand::new(test_config()).run(&client, &options).await.unwrap();

        assert_eq!(summary.enriched, 2);

        let records = read_json(&output);
        assert_eq!(records[0]["manufacturer"]["product_name"], "Toscana");
        assert_eq!(records[0]["portal"]["sku"], "SCT-ONX");
        assert_eq!(records[0]["portal"]["stock"], 8);
        assert_eq!(records[0]["portal"]["sales_unit"], "Pallet");
        assert_eq!(records[0]["portal"]["cost"], "$512.00");

        assert_eq!(records[1]["manufacturer"]["product_name"], "Cambridge Paver Sealer Gloss");
        assert_eq!(
            records[1]["manufacturer"]["product_url"],
            "https://shop.cambridgepavers.com/Paver-Sealer-Gloss"
        );
        assert_eq!(records[1]["portal"]["gallery_images"], json!(["https://shop.cambridgepavers.com/img/sealer.jpg"]));
        assert!(client.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_collect_shopify_uses_sku_registry() {
        let dir = tempdir().unwrap();
        let input = write_json(
            &dir,
            "input.json",
            &json!([
                {"item_#": "50000", "upc": "077234099999", "description_1": "Mystery Widget"},
                {"upc": "0-77234-01234-5", "description_1": "Play Strong Scent Ball"}
            ]),
        );
        let output = dir.path().join("shopify.json");
        let registry = dir.path().join("sku_registry.json");

        let pdp = format!("{ETHICAL}/product/play-strong-scent-ball/");
        let client = MockSite::new(ETHICAL)
            .page(
                &format!("{ETHICAL}/?s=PLAY+STRONG+SCENT+BALL"),
                &format!(r#"<a href="{pdp}">Play Strong Scent Ball</a>"#),
            )
            .page(
                &pdp,
                r#"<html><body><div class="product type-product product_cat-dog-toys">
                     <div class="summary"><h4>Play Strong Scent Ball</h4></div>
                     <div class="woocommerce-product-details__short-description">
                       <p>Durable rubber; Floats in water</p>
                     </div>
                   </div></body></html>"#,
            );

        let mut options = CollectOptions::new(Vendor::Ethical, &input, &output);
        options.shape = Some(OutputShape::Shopify);
        options.sku_registry = Some(registry.clone());
        let summary = CollectCommand::new(test_config()).run(&client, &options).await.unwrap();

        assert_eq!(summary.enriched, 1);
        assert_eq!(summary.not_found, 1);

        let records = read_json(&output);
        assert_eq!(records[0]["item_#"], "50000");
        assert_eq!(records[1]["product"]["variants"][0]["sku"], "50001");

        let registry = SkuRegistry::open(&registry).unwrap();
        assert!(registry.is_used("50000"));
        assert!(registry.is_used("50001"));
        assert_eq!(registry.next_sku(), 50002);
    }

    #[tokio::test]
    async fn test_collect_bradley_from_catalog() {
        let dir = tempdir().unwrap();
        let input = write_json(
            &dir,
            "input.json",
            &json!([{"upc": "077234012345", "item_#": "B1"}, {"upc": "000000000001"}]),
        );
        let output = dir.path().join("bci.json");
        let client = MockSite::new(Vendor::BradleyCaldwell.origin());

        let mut options = CollectOptions::new(Vendor::BradleyCaldwell, &input, &output);
        options.catalog = Some(catalog(&dir));
        let summary = CollectCommand::new(test_config()).run(&client, &options).await.unwrap();

        assert_eq!(summary.enriched, 1);
        assert_eq!(summary.not_found, 1);
        assert_eq!(client.call_count(), 0);

        let records = read_json(&output);
        assert_eq!(records[0]["manufacturer"]["brand"], "Pet Lodge");
        assert_eq!(records[0]["shopify"]["media"], json!(["077234012345_0.jpg"]));
        assert_eq!(records[1]["manufacturer"]["product_url"], "");
        assert_eq!(records[1]["manufacturer"]["homepage"], CatalogEnricher::HOMEPAGE);
    }

    #[tokio::test]
    async fn test_collect_skip_existing_merges_output() {
        let dir = tempdir().unwrap();
        let input = write_json(
            &dir,
            "input.json",
            &json!([{"upc": "0-77234-01234-5"}, {"upc": "000000000001"}]),
        );
        let output = write_json(&dir, "bci.json", &json!([{"upc": "077234012345", "done": true}]));

        let mut options = CollectOptions::new(Vendor::BradleyCaldwell, &input, &output);
        options.catalog = Some(catalog(&dir));
        options.skip_existing = true;
        let summary = CollectCommand::new(test_config())
            .run(&MockSite::new(Vendor::BradleyCaldwell.origin()), &options)
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total, 1);
        assert_eq!(summary.written, 2);

        let records = read_json(&output);
        assert_eq!(records[0], json!({"upc": "077234012345", "done": true}));
        assert_eq!(records[1]["upc"], "000000000001");
    }

    #[tokio::test]
    async fn test_collect_range_and_summary_text() {
        let dir = tempdir().unwrap();
        let input = write_json(
            &dir,
            "input.json",
            &json!([{"upc": "000000000001"}, {"upc": "077234012345"}, {"upc": "000000000003"}]),
        );
        let output = dir.path().join("bci.json");

        let mut options = CollectOptions::new(Vendor::BradleyCaldwell, &input, &output);
        options.catalog = Some(catalog(&dir));
        options.start = Some(2);
        options.end = Some(2);

        let text = CollectCommand::new(test_config())
            .execute_with_client(&MockSite::new(Vendor::BradleyCaldwell.origin()), &options)
            .await
            .unwrap();
        assert!(text.contains("Enriched:   1"));

        let records = read_json(&output);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["upc"], "077234012345");
    }
}
