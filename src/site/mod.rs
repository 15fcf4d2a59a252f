//! Vendor site access: HTTP client, selectors and page parsing.

pub mod client;
pub mod parser;
pub mod selectors;

pub use client::{build_browser_headers, HttpClient, SiteFetch};
pub use parser::{listing_links, next_page_url, product_links, resolve_url, PageParser, ProductLink};
