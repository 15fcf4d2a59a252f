//! Supported vendors and the per-vendor product locators.

pub mod cambridge;
pub mod cambridge_portal;
pub mod catalog;
pub mod ethical;
pub mod ivyclassic;
pub mod orgill;
pub mod purinamills;
pub mod search;
pub mod site_index;
pub mod talltails;

pub use cambridge::TitleIndexMatcher;
pub use cambridge_portal::{CambridgePortal, PortalData, PortalIndexer, PortalParser};
pub use catalog::{CatalogEnricher, CatalogIndex, CatalogLocator};
pub use ethical::EthicalSearcher;
pub use ivyclassic::UpcUrlCatalog;
pub use orgill::{Credentials, OrgillSearcher};
pub use purinamills::PurinaMillsSearcher;
pub use search::UpcSearcher;
pub use site_index::{IndexEntry, IndexSource, SiteIndex, SiteIndexer, INDEX_MAX_AGE_DAYS};
pub use talltails::TallTailsSearcher;

use crate::models::InputRow;
use crate::site::SiteFetch;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Finds the vendor product page for an input row.
#[async_trait]
pub trait Locator: Send + Sync {
    /// Returns the product URL, or `None` when nothing matched.
    async fn locate(&self, row: &InputRow, client: &dyn SiteFetch) -> Result<Option<String>>;
}

/// Vendors with a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Vendor {
    Cambridge,
    Ethical,
    PurinaMills,
    BradleyCaldwell,
    Chala,
    Coastal,
    Fromm,
    IvyClassic,
    Kong,
    Orgill,
    TallTails,
}

impl Vendor {
    pub fn display_name(&self) -> &'static str {
        match self {
            Vendor::Cambridge => "Cambridge Pavers",
            Vendor::Ethical => "Ethical Products",
            Vendor::PurinaMills => "Purina Mills",
            Vendor::BradleyCaldwell => "Bradley Caldwell",
            Vendor::Chala => "Chala Handbags",
            Vendor::Coastal => "Coastal Pet Products",
            Vendor::Fromm => "Fromm Family Foods",
            Vendor::IvyClassic => "Ivy Classic",
            Vendor::Kong => "KONG Company",
            Vendor::Orgill => "Orgill",
            Vendor::TallTails => "Tall Tails",
        }
    }

    /// Site origin product URLs are resolved against.
    pub fn origin(&self) -> &'static str {
        match self {
            Vendor::Cambridge => "https://www.cambridgepavers.com",
            Vendor::Ethical => "https://www.ethicalpet.com",
            Vendor::PurinaMills => "https://shop.purinamills.com",
            Vendor::BradleyCaldwell => "https://www.bradleycaldwell.com",
            Vendor::Chala => "https://www.chalahandbags.com",
            Vendor::Coastal => "https://www.coastalpet.com",
            Vendor::Fromm => "https://frommfamily.com",
            Vendor::IvyClassic => "https://ivyclassic.com",
            Vendor::Kong => "https://www.kongcompany.com",
            Vendor::Orgill => "https://www.orgill.com",
            Vendor::TallTails => "https://www.talltailsdog.com",
        }
    }

    /// Brand used as the Shopify vendor when the page names none.
    pub fn brand(&self) -> &'static str {
        match self {
            Vendor::Cambridge => "Cambridge",
            Vendor::Ethical => "Ethical Products",
            Vendor::PurinaMills => "Purina",
            Vendor::Chala => "Chala",
            Vendor::Coastal => "Coastal Pet",
            Vendor::Fromm => "Fromm",
            Vendor::IvyClassic => "Ivy Classic",
            Vendor::Kong => "KONG",
            Vendor::TallTails => "Tall Tails",
            Vendor::BradleyCaldwell | Vendor::Orgill => "",
        }
    }

    /// Prefix for generated SKUs on rows without an item number.
    pub fn sku_prefix(&self) -> &'static str {
        match self {
            Vendor::Cambridge => "CAM",
            Vendor::Ethical => "ETH",
            Vendor::PurinaMills => "PUR",
            Vendor::BradleyCaldwell => "BCI",
            Vendor::Chala => "CHA",
            Vendor::Coastal => "CST",
            Vendor::Fromm => "FRM",
            Vendor::IvyClassic => "IVY",
            Vendor::Kong => "KNG",
            Vendor::Orgill => "ORG",
            Vendor::TallTails => "TTD",
        }
    }

    /// Vendors that need a `--catalog` file.
    pub fn requires_catalog(&self) -> bool {
        matches!(self, Vendor::BradleyCaldwell | Vendor::IvyClassic)
    }

    /// False when the catalog record is the product data and no page is fetched.
    pub fn fetches_pages(&self) -> bool {
        !matches!(self, Vendor::BradleyCaldwell)
    }

    /// Vendors whose locator logs in before searching.
    pub fn requires_login(&self) -> bool {
        matches!(self, Vendor::Orgill)
    }

    /// Vendors whose locator matches against a prebuilt site index.
    pub fn requires_index(&self) -> bool {
        matches!(self, Vendor::Cambridge)
    }

    /// Vendors the `index` command can crawl.
    pub fn supports_index(&self) -> bool {
        matches!(self, Vendor::Cambridge | Vendor::PurinaMills)
    }

    pub fn all() -> &'static [Vendor] {
        &[
            Vendor::Cambridge,
            Vendor::Ethical,
            Vendor::PurinaMills,
            Vendor::BradleyCaldwell,
            Vendor::Chala,
            Vendor::Coastal,
            Vendor::Fromm,
            Vendor::IvyClassic,
            Vendor::Kong,
            Vendor::Orgill,
            Vendor::TallTails,
        ]
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Vendor::Cambridge => "cambridge",
            Vendor::Ethical => "ethical",
            Vendor::PurinaMills => "purinamills",
            Vendor::BradleyCaldwell => "bradley-caldwell",
            Vendor::Chala => "chala",
            Vendor::Coastal => "coastal",
            Vendor::Fromm => "fromm",
            Vendor::IvyClassic => "ivyclassic",
            Vendor::Kong => "kong",
            Vendor::Orgill => "orgill",
            Vendor::TallTails => "talltails",
        };
        write!(f, "{}", code)
    }
}

impl FromStr for Vendor {
    type Err = VendorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "cambridge" | "cambridge-pavers" | "cambridgepavers" => Ok(Vendor::Cambridge),
            "ethical" | "ethical-pet" | "ethicalpet" | "ethical-products" | "spot" => {
                Ok(Vendor::Ethical)
            }
            "purinamills" | "purina-mills" | "purina" => Ok(Vendor::PurinaMills),
            "bradley-caldwell" | "bradleycaldwell" | "bradley" | "bci" => {
                Ok(Vendor::BradleyCaldwell)
            }
            "chala" | "chala-handbags" | "chalahandbags" => Ok(Vendor::Chala),
            "coastal" | "coastal-pet" | "coastalpet" => Ok(Vendor::Coastal),
            "fromm" | "fromm-family" | "frommfamily" => Ok(Vendor::Fromm),
            "ivyclassic" | "ivy-classic" | "ivy" => Ok(Vendor::IvyClassic),
            "kong" | "kong-company" | "kongcompany" => Ok(Vendor::Kong),
            "orgill" => Ok(Vendor::Orgill),
            "talltails" | "tall-tails" | "talltailsdog" => Ok(Vendor::TallTails),
            _ => Err(VendorParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VendorParseError(String);

impl fmt::Display for VendorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown vendor '{}'. Valid vendors: {}",
            self.0,
            Vendor::all().iter().map(Vendor::to_string).collect::<Vec<_>>().join(", ")
        )
    }
}

impl std::error::Error for VendorParseError {}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_parsing() {
        assert_eq!(Vendor::from_str("cambridge").unwrap(), Vendor::Cambridge);
        assert_eq!(Vendor::from_str("Cambridge_Pavers").unwrap(), Vendor::Cambridge);
        assert_eq!(Vendor::from_str("ethical").unwrap(), Vendor::Ethical);
        assert_eq!(Vendor::from_str("SPOT").unwrap(), Vendor::Ethical);
        assert_eq!(Vendor::from_str("purina").unwrap(), Vendor::PurinaMills);
        assert_eq!(Vendor::from_str("purina_mills").unwrap(), Vendor::PurinaMills);
        assert_eq!(Vendor::from_str("bradley_caldwell").unwrap(), Vendor::BradleyCaldwell);
        assert_eq!(Vendor::from_str("bci").unwrap(), Vendor::BradleyCaldwell);
        assert_eq!(Vendor::from_str("Tall_Tails").unwrap(), Vendor::TallTails);
        assert_eq!(Vendor::from_str("ivy").unwrap(), Vendor::IvyClassic);
        assert_eq!(Vendor::from_str("KONG").unwrap(), Vendor::Kong);

        let err = Vendor::from_str("acme").unwrap_err();
        assert!(err.to_string().contains("Valid vendors"));
        assert!(err.to_string().contains("talltails"));
        assert!(Vendor::from_str("").is_err());
    }

    #[test]
    fn test_vendor_display_round_trip() {
        for vendor in Vendor::all() {
            assert_eq!(Vendor::from_str(&vendor.to_string()).unwrap(), *vendor);
        }
    }

    #[test]
    fn test_vendor_properties() {
        assert!(Vendor::BradleyCaldwell.requires_catalog());
        assert!(!Vendor::BradleyCaldwell.fetches_pages());
        assert!(Vendor::IvyClassic.requires_catalog());
        assert!(Vendor::IvyClassic.fetches_pages());
        assert!(!Vendor::Ethical.requires_catalog());
        assert!(Vendor::Orgill.requires_login());
        assert!(!Vendor::Kong.requires_login());
        assert!(Vendor::Cambridge.requires_index());
        assert!(!Vendor::PurinaMills.requires_index());
        assert!(Vendor::PurinaMills.supports_index());
        assert!(!Vendor::Ethical.supports_index());
        assert_eq!(Vendor::PurinaMills.brand(), "Purina");
        assert!(Vendor::all().iter().all(|v| v.origin().starts_with("https://")));
        assert_eq!(Vendor::all().len(), 11);
    }
}
