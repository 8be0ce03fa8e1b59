//! Runtime configuration.
//!
//! Values come from, in increasing precedence: built-in defaults,
//! `config/lectern.toml`, environment variables (a `.env` file is loaded
//! first), and command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Default location of the configuration file, relative to the working
/// directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/lectern.toml";

const ENV_DB: &str = "LECTERN_DB";
const ENV_CATALOG: &str = "LECTERN_CATALOG";
const ENV_LOG: &str = "LECTERN_LOG";

/// Settings for one CLI run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LecternConfig {
    /// SQLite file holding the key-value store.
    pub database_path: PathBuf,
    /// JSON catalog used by `seed`.
    pub catalog_path: PathBuf,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for LecternConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/lectern.db"),
            catalog_path: PathBuf::from("data/videos.json"),
            log_level: "info".to_string(),
        }
    }
}

impl LecternConfig {
    /// Load `path` if it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Self::from_toml(&content)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        } else {
            debug!(path = %path.display(), "no configuration file, using defaults");
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override fields from the variables `lookup` can resolve.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(db) = lookup(ENV_DB) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(catalog) = lookup(ENV_CATALOG) {
            self.catalog_path = PathBuf::from(catalog);
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.log_level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = LecternConfig::from_toml(r#"database_path = "/tmp/x.db""#).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(LecternConfig::from_toml("log_level = 3").is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = LecternConfig::default();
        config.apply_env(|name| match name {
            "LECTERN_LOG" => Some("debug".to_string()),
            _ => None,
        });
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.catalog_path, PathBuf::from("data/videos.json"));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lectern.toml");
        std::fs::write(&path, "catalog_path = \"catalog.json\"\n").unwrap();

        let config = LecternConfig::load(&path).unwrap();
        // LECTERN_CATALOG may be set in the environment running the tests.
        if std::env::var(ENV_CATALOG).is_err() {
            assert_eq!(config.catalog_path, PathBuf::from("catalog.json"));
        }
    }
}
