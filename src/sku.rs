//! Persistent registry of generated 5-digit SKUs.
//!
//! Rows without an item number get a SKU from this registry instead of the
//! vendor-prefixed placeholder. The registry file is shared by every vendor
//! run, so a number is never handed out twice.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// First SKU handed out by a new registry.
pub const DEFAULT_START_SKU: u32 = 50000;

/// Largest SKU that still has five digits.
pub const MAX_SKU: u32 = 99999;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    used_skus: BTreeSet<String>,
    #[serde(default)]
    next_auto_sku: Option<u32>,
}

#[derive(Debug)]
pub struct SkuRegistry {
    path: PathBuf,
    used: BTreeSet<String>,
    next: u32,
}

fn numeric(sku: &str) -> Option<u32> {
    if sku.is_empty() || !sku.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    sku.parse().ok()
}

impl SkuRegistry {
    /// `<data dir>/product-collector/sku_registry.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("product-collector").join("sku_registry.json"))
    }

    /// Opens the registry at `path`, creating it when missing.
    ///
    /// An unreadable or corrupt file is replaced with an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut registry = Self { path, used: BTreeSet::new(), next: DEFAULT_START_SKU };

        if !registry.path.exists() {
            registry.save()?;
            return Ok(registry);
        }

        match Self::read(&registry.path) {
            Ok(file) => {
                let highest = file.used_skus.iter().filter_map(|s| numeric(s)).max();
                let stored = file.next_auto_sku.unwrap_or(DEFAULT_START_SKU);
                registry.next = stored.max(highest.map_or(DEFAULT_START_SKU, |h| h + 1));
                registry.used = file.used_skus;
                debug!(
                    "Loaded SKU registry {}: {} used, next {}",
                    registry.path.display(),
                    registry.used.len(),
                    registry.next
                );
            }
            Err(e) => {
                warn!("Could not load SKU registry ({:#}). Starting fresh.", e);
                registry.save()?;
            }
        }
        Ok(registry)
    }

    fn read(path: &Path) -> Result<RegistryFile> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read SKU registry: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse SKU registry: {}", path.display()))
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = RegistryFile { used_skus: self.used.clone(), next_auto_sku: Some(self.next) };
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)
            .with_context(|| format!("Failed to write SKU registry: {}", self.path.display()))
    }

    /// Hands out the next unused SKU and persists the registry.
    pub fn generate(&mut self) -> Result<String> {
        while self.next <= MAX_SKU {
            let sku = self.next.to_string();
            self.next += 1;
            if self.used.insert(sku.clone()) {
                self.save()?;
                return Ok(sku);
            }
        }
        bail!("SKU registry exhausted: no 5-digit SKUs left after {}", MAX_SKU)
    }

    /// Records a SKU that exists elsewhere. Returns false if it was already known.
    pub fn mark_used(&mut self, sku: &str) -> Result<bool> {
        let sku = sku.trim();
        if sku.is_empty() || self.used.contains(sku) {
            return Ok(false);
        }
        self.used.insert(sku.to_string());
        if let Some(n) = numeric(sku).filter(|n| (self.next..=MAX_SKU).contains(n)) {
            self.next = n + 1;
        }
        self.save()?;
        Ok(true)
    }

    pub fn is_used(&self, sku: &str) -> bool {
        self.used.contains(sku.trim())
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn next_sku(&self) -> u32 {
        self.next
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
