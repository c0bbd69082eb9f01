//! Runtime configuration
//!
//! Resolution order (later wins):
//! 1. Built-in defaults
//! 2. TOML file: `PANTRY_CONFIG`, else `~/.local/share/pantry/config.toml`
//! 3. Environment: `PHONE_NUMBER`, `PASSWORD`, `DATA_DIR`, `TIMEOUT`, `PANTRY_BASE_URL`
//!
//! Example config file:
//!
//! ```toml
//! data_dir = "/home/me/pantry"
//! timeout_secs = 30
//!
//! [api]
//! base_url = "https://app.pingodoce.pt"
//! page_size = 50
//!
//! [enrichment]
//! delay_ms = 1000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://app.pingodoce.pt";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_ENRICH_DELAY_MS: u64 = 500;
pub const DEFAULT_CATALOG_SEARCH_PATH: &str = "/api/v2/catalog/products/search";
pub const DEFAULT_CATALOG_PRODUCT_PATH: &str = "/api/v2/catalog/products";

/// Environment variable pointing at an alternate config file
pub const CONFIG_ENV: &str = "PANTRY_CONFIG";

/// Phone number placeholder shipped in sample env files
const PHONE_PLACEHOLDER: &str = "+351...";

/// Pantry configuration, passed explicitly to the components that need it
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Explicit database file; defaults to `<data_dir>/pantry.db`
    pub database_path: Option<PathBuf>,
    /// Single per-request timeout for the retailer API
    pub timeout: Duration,
    pub base_url: String,
    pub page_size: u32,
    /// Pause between catalog lookups during enrichment
    pub enrich_delay: Duration,
    pub phone_number: Option<String>,
    pub password: Option<String>,
    pub catalog_search_path: String,
    pub catalog_product_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            database_path: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            enrich_delay: Duration::from_millis(DEFAULT_ENRICH_DELAY_MS),
            phone_number: None,
            password: None,
            catalog_search_path: DEFAULT_CATALOG_SEARCH_PATH.to_string(),
            catalog_product_path: DEFAULT_CATALOG_PRODUCT_PATH.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; the default locations are optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let file = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        p.display()
                    )));
                }
                Some(p.to_path_buf())
            }
            None => std::env::var(CONFIG_ENV)
                .ok()
                .map(PathBuf::from)
                .or_else(default_config_path)
                .filter(|p| p.exists()),
        };

        if let Some(file) = file {
            debug!(path = %file.display(), "Loading config file");
            let content = fs::read_to_string(&file).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", file.display(), e))
            })?;
            config.apply_toml(&content)?;
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Build a config from TOML content layered over the defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config = Self::default();
        config.apply_toml(content)?;
        Ok(config)
    }

    /// Path of the SQLite database file
    pub fn db_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("pantry.db"))
    }

    /// Check that usable credentials are configured
    pub fn validate_credentials(&self) -> Result<(&str, &str)> {
        let phone = self
            .phone_number
            .as_deref()
            .filter(|p| !p.trim().is_empty() && *p != PHONE_PLACEHOLDER);
        let password = self.password.as_deref().filter(|p| !p.is_empty());

        match (phone, password) {
            (Some(phone), Some(password)) => Ok((phone, password)),
            _ => Err(Error::Authentication(
                "Please set PHONE_NUMBER and PASSWORD (e.g. PHONE_NUMBER=+351123456789)"
                    .to_string(),
            )),
        }
    }

    fn apply_toml(&mut self, content: &str) -> Result<()> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        if let Some(dir) = raw.data_dir {
            self.data_dir = dir;
        }
        if let Some(path) = raw.database_path {
            self.database_path = Some(path);
        }
        if let Some(secs) = raw.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(phone) = raw.phone_number {
            self.phone_number = Some(phone);
        }
        if let Some(password) = raw.password {
            self.password = Some(password);
        }

        if let Some(api) = raw.api {
            if let Some(url) = api.base_url {
                self.base_url = url;
            }
            if let Some(size) = api.page_size {
                self.page_size = size;
            }
            if let Some(path) = api.catalog_search_path {
                self.catalog_search_path = path;
            }
            if let Some(path) = api.catalog_product_path {
                self.catalog_product_path = path;
            }
        }

        if let Some(enrichment) = raw.enrichment {
            if let Some(ms) = enrichment.delay_ms {
                self.enrich_delay = Duration::from_millis(ms);
            }
        }

        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(phone) = lookup("PHONE_NUMBER") {
            self.phone_number = Some(phone);
        }
        if let Some(password) = lookup("PASSWORD") {
            self.password = Some(password);
        }
        if let Some(dir) = lookup("DATA_DIR").filter(|d| !d.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = lookup("TIMEOUT") {
            match timeout.trim().parse::<u64>() {
                Ok(secs) => self.timeout = Duration::from_secs(secs),
                Err(_) => warn!(value = %timeout, "Ignoring invalid TIMEOUT"),
            }
        }
        if let Some(url) = lookup("PANTRY_BASE_URL").filter(|u| !u.is_empty()) {
            self.base_url = url;
        }
    }
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("pantry").join("config.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    data_dir: Option<PathBuf>,
    database_path: Option<PathBuf>,
    timeout_secs: Option<u64>,
    phone_number: Option<String>,
    password: Option<String>,
    api: Option<RawApi>,
    enrichment: Option<RawEnrichment>,
}

#[derive(Debug, Deserialize)]
struct RawApi {
    base_url: Option<String>,
    page_size: Option<u32>,
    catalog_search_path: Option<String>,
    catalog_product_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEnrichment {
    delay_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.page_size, 20);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.db_path(), PathBuf::from("data").join("pantry.db"));
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = Config::from_toml_str(
            r#"
            data_dir = "/srv/pantry"
            timeout_secs = 30

            [api]
            page_size = 50

            [enrichment]
            delay_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/pantry"));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.enrich_delay, Duration::ZERO);
        assert_eq!(config.db_path(), PathBuf::from("/srv/pantry/pantry.db"));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml_str("timeout_secs = \"soon\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_env_wins_over_file() {
        let mut config = Config::from_toml_str("timeout_secs = 30").unwrap();
        let env: HashMap<&str, &str> = [
            ("TIMEOUT", "5"),
            ("DATA_DIR", "/tmp/pd"),
            ("PHONE_NUMBER", "+351900000000"),
        ]
        .into_iter()
        .collect();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/pd"));
        assert_eq!(config.phone_number.as_deref(), Some("+351900000000"));
    }

    #[test]
    fn test_invalid_timeout_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env(|k| (k == "TIMEOUT").then(|| "abc".to_string()));
        assert_eq!(config.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_validate_credentials() {
        let mut config = Config::default();
        assert!(config.validate_credentials().is_err());

        config.phone_number = Some("+351...".to_string());
        config.password = Some("secret".to_string());
        assert!(config.validate_credentials().is_err());

        config.phone_number = Some("+351912345678".to_string());
        config.password = Some(String::new());
        assert!(config.validate_credentials().is_err());

        config.password = Some("secret".to_string());
        assert_eq!(
            config.validate_credentials().unwrap(),
            ("+351912345678", "secret")
        );
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let result = Config::load(Some(Path::new("/nonexistent/pantry.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
