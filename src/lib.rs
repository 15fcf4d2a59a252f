//! product-collector - per-vendor product collectors
//!
//! Locates vendor product pages from spreadsheet rows, scrapes them with
//! browser TLS emulation and writes enriched or Shopify-shaped JSON.

pub mod commands;
pub mod config;
pub mod error;
pub mod format;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod shopify;
pub mod site;
pub mod sku;
pub mod vendors;

pub use config::{Config, OutputShape};
pub use error::CollectError;
pub use models::{InputRow, Manufacturer, PageData, ShopifyProduct};
pub use vendors::Vendor;
