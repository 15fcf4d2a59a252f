//! Index command: crawl a vendor's listing pages into a site index file.

use crate::config::Config;
use crate::format::Formatter;
use crate::site::{HttpClient, SiteFetch};
use crate::vendors::cambridge_portal::PORTAL_ORIGIN;
use crate::vendors::{IndexSource, PortalIndexer, SiteIndex, SiteIndexer, Vendor};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// What an index run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub vendor: String,
    pub total_products: usize,
    /// Products per listing category, for sources that record one.
    pub categories: BTreeMap<String, usize>,
    pub last_updated: String,
    pub output: PathBuf,
}

pub struct IndexCommand {
    config: Config,
}

impl IndexCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn execute(&self, vendor: Vendor, output: &Path) -> Result<String> {
        let client =
            HttpClient::new(&self.config, vendor.origin()).context("Failed to create HTTP client")?;

        self.execute_with_client(&client, vendor, output).await
    }

    /// Builds the Cambridge dealer portal index.
    pub async fn execute_portal(&self, output: &Path) -> Result<String> {
        let client =
            HttpClient::new(&self.config, PORTAL_ORIGIN).context("Failed to create HTTP client")?;

        let summary = self.build_portal(&client, output).await?;
        Ok(Formatter::new(self.config.format).format_index(&summary))
    }

    /// Executes the crawl with a provided client (for testing).
    pub async fn execute_with_client(
        &self,
        client: &dyn SiteFetch,
        vendor: Vendor,
        output: &Path,
    ) -> Result<String> {
        let summary = self.build(client, vendor, output).await?;
        Ok(Formatter::new(self.config.format).format_index(&summary))
    }

    /// Crawls, saves the index to `output` and summarizes it.
    pub async fn build(
        &self,
        client: &dyn SiteFetch,
        vendor: Vendor,
        output: &Path,
    ) -> Result<IndexSummary> {
        let source = IndexSource::for_vendor(vendor)
            .with_context(|| format!("{} has no listing pages to index", vendor.display_name()))?;

        info!("Building {} index (max {} pages)", vendor.display_name(), self.config.max_index_pages);
        let index = SiteIndexer::new(source, self.config.max_index_pages).build(client).await?;
        Self::save(index, vendor.to_string(), output)
    }

    /// Logs in to the portal when credentials are configured, then indexes every category.
    pub async fn build_portal(&self, client: &dyn SiteFetch, output: &Path) -> Result<IndexSummary> {
        info!("Building Cambridge portal index");
        let indexer = PortalIndexer::new(client.origin(), self.config.portal_credentials());
        let index = indexer.build(client).await?;
        Self::save(index, "cambridge-portal".to_string(), output)
    }

    fn save(index: SiteIndex, vendor: String, output: &Path) -> Result<IndexSummary> {
        index.save(output)?;
        info!("Saved {} products to {}", index.len(), output.display());

        let mut categories = BTreeMap::new();
        for category in index.products.iter().filter_map(|p| p.category.clone()) {
            *categories.entry(category).or_insert(0) += 1;
        }

        Ok(IndexSummary {
            vendor,
            total_products: index.total_products,
            categories,
            last_updated: index.last_updated,
            output: output.to_path_buf(),
        })
    }
}
