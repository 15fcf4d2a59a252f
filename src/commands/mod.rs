//! CLI command implementations.

pub mod collect;
pub mod find;
pub mod index;
pub mod upc;

pub use collect::{CollectCommand, CollectOptions, RunSummary};
pub use find::{FindCommand, FindOptions, FindResult};
pub use index::{IndexCommand, IndexSummary};
pub use upc::UpcReport;

use crate::config::Config;
use crate::error::CollectError;
use crate::vendors::purinamills::WWW_ORIGIN;
use crate::vendors::{
    CatalogIndex, CatalogLocator, EthicalSearcher, Locator, OrgillSearcher, PurinaMillsSearcher,
    SiteIndex, TallTailsSearcher, TitleIndexMatcher, UpcSearcher, UpcUrlCatalog, Vendor,
    INDEX_MAX_AGE_DAYS,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Explicit path wins over the configured one.
fn pick_path(explicit: Option<&Path>, configured: Option<&PathBuf>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| configured.cloned())
}

/// Loads a saved index, warning when it is due for a rebuild.
pub(crate) fn load_index(path: &Path) -> Result<SiteIndex> {
    let index = SiteIndex::load(path)
        .with_context(|| format!("Failed to load site index: {}", path.display()))?;
    if index.is_stale(INDEX_MAX_AGE_DAYS) {
        warn!(
            "Index {} is older than {} days (last updated {}); rebuild it with `index`",
            path.display(),
            INDEX_MAX_AGE_DAYS,
            index.last_updated
        );
    }
    Ok(index)
}

/// Opens the distributor catalog, failing early when it cannot be read.
pub(crate) fn open_catalog(config: &Config, catalog: Option<&Path>) -> Result<CatalogLocator> {
    let path = pick_path(catalog, config.catalog_path.as_ref());
    let index = CatalogIndex::new(path);
    index.ensure_loaded()?;
    Ok(CatalogLocator::new(index))
}

/// Builds the product locator for a vendor.
///
/// `origin` is the vendor site the client talks to; searchers issue their
/// queries against it.
pub(crate) fn build_locator(
    vendor: Vendor,
    config: &Config,
    origin: &str,
    catalog: Option<&Path>,
    index: Option<&Path>,
) -> Result<Box<dyn Locator>> {
    let index_path = pick_path(index, config.index_path.as_ref());

    let locator: Box<dyn Locator> = match vendor {
        Vendor::Cambridge => {
            let path = index_path.ok_or_else(|| CollectError::MissingIndex(vendor.to_string()))?;
            Box::new(TitleIndexMatcher::new(load_index(&path)?, config.title_match_threshold))
        }
        Vendor::Ethical => Box::new(EthicalSearcher::new(origin)),
        Vendor::PurinaMills => {
            let mut searcher =
                PurinaMillsSearcher::new(config.max_search_candidates, config.keyword_match_threshold)
                    .with_origins(origin, WWW_ORIGIN);
            if let Some(path) = index_path {
                debug!("Using site index {} as fallback", path.display());
                searcher = searcher.with_index(load_index(&path)?);
            }
            Box::new(searcher)
        }
        Vendor::BradleyCaldwell => Box::new(open_catalog(config, catalog)?),
        Vendor::IvyClassic => {
            let urls = UpcUrlCatalog::new(pick_path(catalog, config.catalog_path.as_ref()));
            urls.ensure_loaded()?;
            Box::new(urls)
        }
        Vendor::Kong => Box::new(UpcSearcher::kong(origin)?),
        Vendor::Chala => Box::new(UpcSearcher::chala(origin)?),
        Vendor::Coastal => Box::new(UpcSearcher::coastal(origin)?),
        Vendor::Fromm => Box::new(UpcSearcher::fromm(origin)),
        Vendor::TallTails => Box::new(TallTailsSearcher::new(origin)),
        Vendor::Orgill => Box::new(OrgillSearcher::new(origin, config.orgill_credentials())),
    };
    Ok(locator)
}
