//! Ivy Classic: product URLs come from a UPC → URL catalog file.

use crate::error::CollectError;
use crate::models::InputRow;
use crate::site::SiteFetch;
use crate::vendors::Locator;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Either `{"<upc>": "<url>"}` or `[{"upc": .., "url": ..}]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Map(HashMap<String, Value>),
    Rows(Vec<Value>),
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

impl CatalogFile {
    fn into_map(self) -> HashMap<String, String> {
        let pairs: Vec<(String, String)> = match self {
            CatalogFile::Map(map) => map.into_iter().map(|(k, v)| (k.trim().to_string(), text(Some(&v)))).collect(),
            CatalogFile::Rows(rows) => {
                rows.iter().map(|row| (text(row.get("upc")), text(row.get("url")))).collect()
            }
        };
        pairs.into_iter().filter(|(k, v)| !k.is_empty() && !v.is_empty()).collect()
    }
}

/// Key forms a catalog may store a UPC under: 12/13/14 digits, padded or
/// cut from the right, and without leading zeros.
pub fn upc_variants(upc: &str) -> Vec<String> {
    let digits: String = upc.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Vec::new();
    }

    let fit = |code: &str, target: usize| -> String {
        if code.len() <= target {
            format!("{code:0>target$}")
        } else {
            code[code.len() - target..].to_string()
        }
    };

    let mut variants: Vec<String> = [12, 13, 14].iter().map(|&t| fit(&digits, t)).collect();
    let stripped = digits.trim_start_matches('0');
    if !stripped.is_empty() {
        variants.push(stripped.to_string());
        variants.extend([12, 13, 14].iter().map(|&t| fit(stripped, t)));
    }
    variants.push(digits.clone());

    let mut seen = std::collections::HashSet::new();
    variants.retain(|v| seen.insert(v.clone()));
    variants
}

/// Lazily loaded UPC → product URL catalog.
#[derive(Debug, Default)]
pub struct UpcUrlCatalog {
    path: Option<PathBuf>,
    loaded: OnceLock<HashMap<String, String>>,
}

impl UpcUrlCatalog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path: path.filter(|p| !p.as_os_str().is_empty()), loaded: OnceLock::new() }
    }

    fn entries(&self) -> Result<&HashMap<String, String>> {
        if let Some(entries) = self.loaded.get() {
            return Ok(entries);
        }

        let path = self.path.as_deref().ok_or(CollectError::MissingCatalog)?;
        if !path.is_file() {
            return Err(CollectError::CatalogNotFound(path.to_path_buf()).into());
        }
        let entries = load(path)?;
        info!("Loaded UPC catalog {}: {} entries", path.display(), entries.len());
        Ok(self.loaded.get_or_init(|| entries))
    }

    pub fn ensure_loaded(&self) -> Result<()> {
        self.entries().map(|_| ())
    }

    pub fn lookup(&self, upc: &str) -> Result<Option<String>> {
        let entries = self.entries()?;
        let raw = upc.trim().to_string();
        let found = std::iter::once(raw)
            .chain(upc_variants(upc))
            .find_map(|key| entries.get(&key).cloned());
        if found.is_none() {
            debug!("UPC {} not in catalog", upc);
        }
        Ok(found)
    }
}

fn load(path: &Path) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
    match serde_json::from_str::<CatalogFile>(&content) {
        Ok(file) => Ok(file.into_map()),
        Err(_) => {
            // valid JSON of another shape loads empty
            serde_json::from_str::<Value>(&content)
                .with_context(|| format!("Invalid catalog JSON: {}", path.display()))?;
            warn!("Catalog {} is neither an object nor an array", path.display());
            Ok(HashMap::new())
        }
    }
}

#[async_trait]
impl Locator for UpcUrlCatalog {
    async fn locate(&self, row: &InputRow, _client: &dyn SiteFetch) -> Result<Option<String>> {
        match row.upc() {
            Some(upc) => self.lookup(&upc),
            None => Ok(None),
        }
    }
}
