//! Typed per-row failures.
//!
//! Plumbing errors travel as `anyhow::Error`; these variants are the ones the
//! collect command inspects to decide how a row is counted.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("row has no UPC or title to search with")]
    NoIdentifier,

    #[error("no matching product found for {0}")]
    NotFound(String),

    #[error("request to {url} failed with status: {status}")]
    Fetch { url: String, status: u16 },

    #[error("blocked by {url} (status {status}). Try increasing --delay or using a proxy.")]
    Blocked { url: String, status: u16 },

    #[error("could not parse product page {0}")]
    Parse(String),

    #[error("No product catalog specified")]
    MissingCatalog,

    #[error("Product catalog not found: {}", .0.display())]
    CatalogNotFound(PathBuf),

    #[error("No site index specified for {0}; run `index` first or pass --index")]
    MissingIndex(String),

    #[error("login to {vendor} failed: {reason}")]
    LoginFailed { vendor: String, reason: String },
}

impl CollectError {
    /// True for outcomes that mean "nothing matched" rather than "something broke".
    pub fn is_not_found(&self) -> bool {
        matches!(self, CollectError::NotFound(_) | CollectError::NoIdentifier)
    }

    /// True for errors every later row would hit too; the run stops.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CollectError::LoginFailed { .. })
    }
}
