//! Shared normalization helpers for UPCs, text and image URLs.

pub mod image;
pub mod text;
pub mod upc;

pub use image::{deduplicate_urls, make_absolute_url, normalize_image_url, normalize_to_https};
pub use text::{extract_bullet_points, normalize_whitespace, plain_text, text_only};
pub use upc::{is_valid_upc, normalize_upc, upc_12_to_13, upc_13_to_12};
