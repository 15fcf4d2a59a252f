//! UPC command: show the normalized forms of a code.

use crate::normalize::{is_valid_upc, normalize_upc, upc_12_to_13, upc_13_to_12};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcReport {
    pub input: String,
    pub normalized: String,
    pub upc_12: String,
    pub upc_13: String,
    pub valid: bool,
}

impl UpcReport {
    pub fn new(code: &str) -> Self {
        let normalized = normalize_upc(code);
        Self {
            input: code.to_string(),
            upc_12: upc_13_to_12(&normalized),
            upc_13: upc_12_to_13(&normalized),
            valid: is_valid_upc(&normalized),
            normalized,
        }
    }
}
