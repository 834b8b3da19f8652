use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::ticker::{fallback_tickers, TickerEntry};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Heading shown at the start of the strip
    #[serde(default = "default_title")]
    pub title: String,
    /// Refresh period in milliseconds, measured from activation
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Length of the highlight after a successful refresh
    #[serde(default = "default_flash_ms")]
    pub flash_ms: u64,
    #[serde(default)]
    pub source: SourceConfig,
    /// Replaces the built-in fallback set when non-empty
    #[serde(default)]
    pub fallback: Vec<TickerEntry>,
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_title() -> String {
    "AI Power Index".to_string()
}

fn default_refresh_interval_ms() -> u64 {
    60_000
}

fn default_flash_ms() -> u64 {
    600
}

fn default_database_url() -> String {
    "sqlite:fresh_ticker.db?mode=rwc".to_string()
}

fn default_table() -> String {
    "stock_tickers".to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Local SQLite table, seeded with the fallback set on first start
    Database {
        #[serde(default = "default_database_url")]
        url: String,
    },
    /// Hosted PostgREST table endpoint
    Rest {
        url: String,
        api_key: String,
        #[serde(default = "default_table")]
        table: String,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Database {
            url: default_database_url(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.refresh_interval_ms == 0 {
            anyhow::bail!("refresh_interval_ms must be greater than zero");
        }
        let mut ids = HashSet::new();
        for entry in &self.fallback {
            entry
                .validate()
                .map_err(|e| anyhow::anyhow!("invalid fallback entry: {}", e))?;
            if !ids.insert(entry.id) {
                anyhow::bail!("duplicate fallback id {}", entry.id);
            }
        }
        Ok(())
    }

    pub fn fallback_tickers(&self) -> Vec<TickerEntry> {
        if self.fallback.is_empty() {
            return fallback_tickers();
        }
        let mut entries = self.fallback.clone();
        entries.sort_by_key(|entry| entry.id);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticker::TickerKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        assert_eq!(default_refresh_interval_ms(), 60_000);
        assert_eq!(default_flash_ms(), 600);
        assert_eq!(default_bind(), "0.0.0.0:3000");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();

        assert_eq!(config.refresh_interval_ms, 60_000);
        assert_eq!(config.flash_ms, 600);
        assert_eq!(config.title, "AI Power Index");
        assert_eq!(config.source, SourceConfig::default());
        assert_eq!(config.fallback_tickers(), fallback_tickers());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            bind = "127.0.0.1:8080"
            refresh_interval_ms = 30000
            flash_ms = 400

            [source]
            kind = "rest"
            url = "https://project.example.co"
            api_key = "anon-key"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.refresh_interval_ms, 30_000);
        assert_eq!(config.flash_ms, 400);
        assert_eq!(
            config.source,
            SourceConfig::Rest {
                url: "https://project.example.co".to_string(),
                api_key: "anon-key".to_string(),
                table: "stock_tickers".to_string(),
            }
        );
    }

    #[test]
    fn test_database_source_default_url() {
        let content = r#"
            [source]
            kind = "database"
        "#;

        let config = Config::from_str(content).unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Database {
                url: "sqlite:fresh_ticker.db?mode=rwc".to_string()
            }
        );
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/ticker.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let content = "this is not valid toml {{{";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_rest_source_missing_api_key() {
        let content = r#"
            [source]
            kind = "rest"
            url = "https://project.example.co"
        "#;

        assert!(Config::from_str(content).is_err());
    }

    #[test]
    fn test_unknown_source_kind() {
        let content = r#"
            [source]
            kind = "carrier-pigeon"
        "#;

        assert!(Config::from_str(content).is_err());
    }

    #[test]
    fn test_zero_refresh_interval_rejected() {
        assert!(Config::from_str("refresh_interval_ms = 0").is_err());
    }

    #[test]
    fn test_fallback_override() {
        let content = r#"
            [[fallback]]
            id = 2
            symbol = "ETH"
            change_percent = -1.25
            kind = "crypto"

            [[fallback]]
            id = 1
            symbol = "BTC"
            name = "Bitcoin"
            change_percent = 3.5
            kind = "crypto"
        "#;

        let config = Config::from_str(content).unwrap();
        let fallback = config.fallback_tickers();

        assert_eq!(fallback.len(), 2);
        assert_eq!(fallback[0].symbol, "BTC");
        assert_eq!(fallback[0].name.as_deref(), Some("Bitcoin"));
        assert_eq!(fallback[1].kind, TickerKind::Crypto);
        assert!(fallback[1].name.is_none());
        assert!(fallback[1].updated_at.is_none());
    }

    #[test]
    fn test_fallback_with_blank_symbol_rejected() {
        let content = r#"
            [[fallback]]
            id = 1
            symbol = ""
            change_percent = 1.0
            kind = "stock"
        "#;

        assert!(Config::from_str(content).is_err());
    }

    #[test]
    fn test_fallback_with_duplicate_ids_rejected() {
        let content = r#"
            [[fallback]]
            id = 1
            symbol = "BTC"
            change_percent = 3.5
            kind = "crypto"

            [[fallback]]
            id = 1
            symbol = "ETH"
            change_percent = -1.25
            kind = "crypto"
        "#;

        let err = Config::from_str(content).unwrap_err();
        assert!(err.to_string().contains("duplicate fallback id 1"));
    }
}
