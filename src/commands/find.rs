//! Find command: locate the product page for a single item.

use crate::commands::build_locator;
use crate::config::Config;
use crate::format::Formatter;
use crate::models::InputRow;
use crate::site::{HttpClient, SiteFetch};
use crate::vendors::Vendor;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// The item to look up.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub upc: Option<String>,
    pub title: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub catalog: Option<PathBuf>,
    pub index: Option<PathBuf>,
}

impl FindOptions {
    /// The item as an input row, using the column names collectors read.
    pub fn to_row(&self) -> InputRow {
        let pairs = [
            ("upc", &self.upc),
            ("title", &self.title),
            ("color", &self.color),
            ("description_1", &self.description),
        ];
        InputRow::from_pairs(
            pairs.into_iter().filter_map(|(column, value)| Some((column, value.as_deref()?))),
        )
    }

    fn query_label(&self) -> String {
        [&self.upc, &self.title, &self.description]
            .into_iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// Outcome of a single lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindResult {
    pub vendor: String,
    pub query: String,
    pub url: Option<String>,
}

/// Locates one product without fetching or parsing it.
pub struct FindCommand {
    config: Config,
}

impl FindCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn execute(&self, vendor: Vendor, options: &FindOptions) -> Result<String> {
        let client =
            HttpClient::new(&self.config, vendor.origin()).context("Failed to create HTTP client")?;

        self.execute_with_client(&client, vendor, options).await
    }

    /// Executes the lookup with a provided client (for testing).
    pub async fn execute_with_client(
        &self,
        client: &dyn SiteFetch,
        vendor: Vendor,
        options: &FindOptions,
    ) -> Result<String> {
        let result = self.find(client, vendor, options).await?;
        Ok(Formatter::new(self.config.format).format_find(&result))
    }

    pub async fn find(
        &self,
        client: &dyn SiteFetch,
        vendor: Vendor,
        options: &FindOptions,
    ) -> Result<FindResult> {
        let row = options.to_row();
        if row.columns().is_empty() {
            bail!("Nothing to search for: pass --upc, --title or --description");
        }

        let locator = build_locator(
            vendor,
            &self.config,
            client.origin(),
            options.catalog.as_deref(),
            options.index.as_deref(),
        )?;

        let query = options.query_label();
        info!("Looking up '{}' on {}", query, vendor.display_name());
        let url = locator.locate(&row, client).await?;

        Ok(FindResult { vendor: vendor.to_string(), query, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::vendors::testing::MockSite;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ETHICAL: &str = "https://www.ethicalpet.com";

    fn test_config() -> Config {
        Config { delay_ms: 0, delay_jitter_ms: 0, ..Config::default() }
    }

    #[test]
    fn test_to_row_skips_missing_fields() {
        let options = FindOptions {
            upc: Some("077234012345".into()),
            description: Some("Play Strong Ball".into()),
            ..FindOptions::default()
        };
        let row = options.to_row();
        assert_eq!(row.upc().as_deref(), Some("077234012345"));
        assert_eq!(row.description().as_deref(), Some("Play Strong Ball"));
        assert_eq!(row.columns().len(), 2);
        assert_eq!(options.query_label(), "077234012345 / Play Strong Ball");
    }

    #[tokio::test]
    async fn test_find_requires_query() {
        let client = MockSite::new(ETHICAL);
        let err = FindCommand::new(test_config())
            .find(&client, Vendor::Ethical, &FindOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Nothing to search for"));
    }

    #[tokio::test]
    async fn test_find_ethical_by_description() {
        let pdp = format!("{ETHICAL}/product/bambone-bacon/");
        let client = MockSite::new(ETHICAL)
            .page(
                &format!("{ETHICAL}/?s=BAMBONE+BACON"),
                r#"<a href="/product/bambone-bacon/">Bambone Bacon</a>"#,
            )
            .page(&pdp, r#"<div class="summary"><h4>Bambone Bacon</h4></div>"#);

        let options = FindOptions { description: Some("Bambone Bacon".into()), ..FindOptions::default() };
        let result = FindCommand::new(test_config()).find(&client, Vendor::Ethical, &options).await.unwrap();
        assert_eq!(result.url, Some(pdp));
        assert_eq!(result.vendor, "ethical");
    }

    #[tokio::test]
    async fn test_find_bradley_json_output() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"upc": "077234012345", "product_url": "https://www.bradleycaldwell.com/item/1"}}]"#)
            .unwrap();

        let config = Config { format: OutputFormat::Json, ..test_config() };
        let options = FindOptions {
            upc: Some("0-77234-01234-5".into()),
            catalog: Some(file.path().to_path_buf()),
            ..FindOptions::default()
        };
        let client = MockSite::new(Vendor::BradleyCaldwell.origin());
        let output = FindCommand::new(config)
            .execute_with_client(&client, Vendor::BradleyCaldwell, &options)
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["url"], "https://www.bradleycaldwell.com/item/1");
        assert_eq!(value["vendor"], "bradley-caldwell");
        assert_eq!(client.call_count(), 0);
    }
}
