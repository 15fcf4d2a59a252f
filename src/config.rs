//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::vendors::Credentials;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Base delay between requests in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Random jitter added to delay (0 to this value)
    #[serde(default = "default_delay_jitter_ms")]
    pub delay_jitter_ms: u64,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Output format for summaries
    #[serde(default)]
    pub format: OutputFormat,

    /// Minimum token-sort ratio (0-100) for title index matches
    #[serde(default = "default_title_match_threshold")]
    pub title_match_threshold: f64,

    /// Minimum keyword coverage (0-1) for search candidates
    #[serde(default = "default_keyword_match_threshold")]
    pub keyword_match_threshold: f64,

    /// Search results considered per query
    #[serde(default = "default_max_search_candidates")]
    pub max_search_candidates: usize,

    /// Listing pages crawled per start URL when indexing
    #[serde(default = "default_max_index_pages")]
    pub max_index_pages: usize,

    /// Distributor catalog JSON
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Prebuilt site index JSON
    #[serde(default)]
    pub index_path: Option<PathBuf>,

    /// Record shape written by `collect`
    #[serde(default)]
    pub output_shape: OutputShape,

    /// Orgill dealer login
    #[serde(default)]
    pub orgill_username: Option<String>,

    #[serde(default, skip_serializing)]
    pub orgill_password: Option<String>,

    /// Cambridge dealer portal login
    #[serde(default)]
    pub portal_username: Option<String>,

    #[serde(default, skip_serializing)]
    pub portal_password: Option<String>,

    /// Prebuilt Cambridge portal index JSON
    #[serde(default)]
    pub portal_index_path: Option<PathBuf>,

    /// SKU registry JSON; the data directory is used when unset
    #[serde(default)]
    pub sku_registry_path: Option<PathBuf>,
}

fn default_delay_ms() -> u64 {
    800
}

fn default_delay_jitter_ms() -> u64 {
    700
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_title_match_threshold() -> f64 {
    60.0
}

fn default_keyword_match_threshold() -> f64 {
    0.3
}

fn default_max_search_candidates() -> usize {
    10
}

fn default_max_index_pages() -> usize {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy: None,
            delay_ms: default_delay_ms(),
            delay_jitter_ms: default_delay_jitter_ms(),
            timeout_secs: default_timeout_secs(),
            format: OutputFormat::Table,
            title_match_threshold: default_title_match_threshold(),
            keyword_match_threshold: default_keyword_match_threshold(),
            max_search_candidates: default_max_search_candidates(),
            max_index_pages: default_max_index_pages(),
            catalog_path: None,
            index_path: None,
            output_shape: OutputShape::Enriched,
            orgill_username: None,
            orgill_password: None,
            portal_username: None,
            portal_password: None,
            portal_index_path: None,
            sku_registry_path: None,
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // 1. Explicit path takes precedence
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        // 2. Try current directory
        let local_config = Path::new("collector.toml");
        if local_config.exists() {
            debug!("Found collector.toml in current directory");
            return Self::from_file(local_config);
        }

        // 3. Try XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("product-collector").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        // 4. Return default config
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(proxy) = std::env::var("COLLECTOR_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Ok(delay) = std::env::var("COLLECTOR_DELAY") {
            if let Ok(d) = delay.parse() {
                self.delay_ms = d;
            }
        }

        if let Ok(catalog) = std::env::var("COLLECTOR_CATALOG") {
            self.catalog_path = Some(PathBuf::from(catalog));
        }

        if let Ok(index) = std::env::var("COLLECTOR_INDEX") {
            self.index_path = Some(PathBuf::from(index));
        }

        if let Ok(user) = std::env::var("COLLECTOR_ORGILL_USERNAME") {
            self.orgill_username = Some(user);
        }

        if let Ok(password) = std::env::var("COLLECTOR_ORGILL_PASSWORD") {
            self.orgill_password = Some(password);
        }

        if let Ok(user) = std::env::var("COLLECTOR_PORTAL_USERNAME") {
            self.portal_username = Some(user);
        }

        if let Ok(password) = std::env::var("COLLECTOR_PORTAL_PASSWORD") {
            self.portal_password = Some(password);
        }

        if let Ok(index) = std::env::var("COLLECTOR_PORTAL_INDEX") {
            self.portal_index_path = Some(PathBuf::from(index));
        }

        if let Ok(registry) = std::env::var("COLLECTOR_SKU_REGISTRY") {
            self.sku_registry_path = Some(PathBuf::from(registry));
        }

        self
    }

    /// Orgill login; incomplete credentials fail at login time.
    pub fn orgill_credentials(&self) -> Credentials {
        Credentials::new(
            self.orgill_username.clone().unwrap_or_default(),
            self.orgill_password.clone().unwrap_or_default(),
        )
    }

    /// Portal login, if both parts are set.
    pub fn portal_credentials(&self) -> Option<Credentials> {
        let credentials = Credentials::new(
            self.portal_username.clone().unwrap_or_default(),
            self.portal_password.clone().unwrap_or_default(),
        );
        credentials.is_complete().then_some(credentials)
    }
}

/// Output format for summaries and lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use: table, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Shape of the records `collect` writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputShape {
    /// Input row plus a `manufacturer` block.
    #[default]
    Enriched,
    /// One Shopify product payload per parent row.
    Shopify,
}

impl std::str::FromStr for OutputShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "enriched" => Ok(OutputShape::Enriched),
            "shopify" => Ok(OutputShape::Shopify),
            _ => Err(format!("Unknown shape: {}. Use: enriched, shopify", s)),
        }
    }
}

impl std::fmt::Display for OutputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputShape::Enriched => write!(f, "enriched"),
            OutputShape::Shopify => write!(f, "shopify"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.delay_ms, 800);
        assert_eq!(config.delay_jitter_ms, 700);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.format, OutputFormat::Table);
        assert_eq!(config.title_match_threshold, 60.0);
        assert_eq!(config.keyword_match_threshold, 0.3);
        assert_eq!(config.max_search_candidates, 10);
        assert_eq!(config.max_index_pages, 20);
        assert_eq!(config.output_shape, OutputShape::Enriched);
        assert!(config.proxy.is_none());
        assert!(config.catalog_path.is_none());
        assert!(config.index_path.is_none());
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);

        let err = "csv".parse::<OutputFormat>().unwrap_err();
        assert!(err.contains("Unknown format"));
        assert!(err.contains("table, json"));
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_output_shape_parsing() {
        assert_eq!("shopify".parse::<OutputShape>().unwrap(), OutputShape::Shopify);
        assert_eq!("Enriched".parse::<OutputShape>().unwrap(), OutputShape::Enriched);
        assert!("graphql".parse::<OutputShape>().unwrap_err().contains("enriched, shopify"));
        assert_eq!(OutputShape::Shopify.to_string(), "shopify");
        assert_eq!(OutputShape::default(), OutputShape::Enriched);
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            delay_ms = 1500
            title_match_threshold = 75.0
            output_shape = "shopify"
            catalog_path = "/data/bci_catalog.json"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.delay_ms, 1500);
        assert_eq!(config.delay_jitter_ms, 700);
        assert_eq!(config.title_match_threshold, 75.0);
        assert_eq!(config.output_shape, OutputShape::Shopify);
        assert_eq!(config.catalog_path, Some(PathBuf::from("/data/bci_catalog.json")));
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            proxy = "socks5://localhost:1080"
            max_search_candidates = 5
            format = "json"
            "#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.proxy, Some("socks5://localhost:1080".to_string()));
        assert_eq!(config.max_search_candidates, 5);
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_config_from_file_not_found() {
        let result = Config::from_file("/nonexistent/path/collector.toml");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Failed to read config file"));
    }

    #[test]
    fn test_config_from_file_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml {{{{").unwrap();

        let err = Config::from_file(file.path()).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_config_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_index_pages = 3").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.max_index_pages, 3);
    }

    #[test]
    fn test_config_with_env() {
        let vars = ["COLLECTOR_PROXY", "COLLECTOR_DELAY", "COLLECTOR_CATALOG", "COLLECTOR_INDEX"];
        let saved: Vec<_> = vars.iter().map(|v| std::env::var(v).ok()).collect();

        std::env::set_var("COLLECTOR_PROXY", "http://proxy:8080");
        std::env::set_var("COLLECTOR_DELAY", "not_a_number");
        std::env::set_var("COLLECTOR_CATALOG", "/tmp/catalog.json");
        std::env::set_var("COLLECTOR_INDEX", "/tmp/index.json");

        let config = Config::new().with_env();
        assert_eq!(config.proxy, Some("http://proxy:8080".to_string()));
        // unparseable values keep the default
        assert_eq!(config.delay_ms, 800);
        assert_eq!(config.catalog_path, Some(PathBuf::from("/tmp/catalog.json")));
        assert_eq!(config.index_path, Some(PathBuf::from("/tmp/index.json")));

        std::env::set_var("COLLECTOR_DELAY", "2500");
        assert_eq!(Config::new().with_env().delay_ms, 2500);

        for (var, value) in vars.iter().zip(saved) {
            match value {
                Some(v) => std::env::set_var(var, v),
                None => std::env::remove_var(var),
            }
        }
    }

    #[test]
    fn test_credentials_from_config() {
        let toml = r#"
            orgill_username = " dealer "
            orgill_password = "secret"
            portal_username = "dealer@example.com"
            portal_index_path = "portal_index.json"
            sku_registry_path = "/data/sku_registry.json"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        let orgill = config.orgill_credentials();
        assert_eq!(orgill.username, "dealer");
        assert!(orgill.is_complete());
        // no portal password
        assert!(config.portal_credentials().is_none());
        assert_eq!(config.portal_index_path, Some(PathBuf::from("portal_index.json")));
        assert_eq!(config.sku_registry_path, Some(PathBuf::from("/data/sku_registry.json")));

        assert!(!Config::default().orgill_credentials().is_complete());
    }

    #[test]
    fn test_passwords_not_serialized() {
        let config = Config {
            portal_username: Some("dealer@example.com".to_string()),
            portal_password: Some("secret".to_string()),
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("dealer@example.com"));
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = Config {
            proxy: Some("socks5://localhost:1080".to_string()),
            index_path: Some(PathBuf::from("cambridge_index.json")),
            output_shape: OutputShape::Shopify,
            ..Config::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.proxy, config.proxy);
        assert_eq!(parsed.index_path, config.index_path);
        assert_eq!(parsed.output_shape, config.output_shape);
        assert_eq!(parsed.delay_ms, config.delay_ms);
    }
}
