//! Runtime configuration.
//!
//! Settings come from an optional TOML file, then environment overrides:
//!
//! | Variable                        | Setting                 |
//! |---------------------------------|-------------------------|
//! | `WARDBOOK_CONFIG`               | path of the TOML file   |
//! | `WARDBOOK_DATA_DIR`             | `data_dir`              |
//! | `WARDBOOK_STORAGE`              | `storage` (text/sqlite) |
//! | `WARDBOOK_DB_PATH`              | `db_path`               |
//! | `WARDBOOK_LOG_MODE`             | `log_mode`              |
//! | `WARDBOOK_LOG_FILE`             | `log_file`              |
//! | `WARDBOOK_TELEGRAM_CREDENTIALS` | `telegram_credentials`  |

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::{Result, WardbookError};

const DEFAULT_CONFIG_PATH: &str = "wardbook.toml";

/// Which persistence adapter to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Text,
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = WardbookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(WardbookError::Config(format!(
                "unknown storage backend '{other}' (expected text or sqlite)"
            ))),
        }
    }
}

/// Where log output goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// File when attached to a terminal, stdout otherwise
    #[default]
    Auto,
    File,
    Stdout,
}

impl FromStr for LogMode {
    type Err = WardbookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "file" => Ok(Self::File),
            "stdout" => Ok(Self::Stdout),
            other => Err(WardbookError::Config(format!(
                "unknown log mode '{other}' (expected auto, file or stdout)"
            ))),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub storage: StorageBackend,
    pub db_path: PathBuf,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
    pub telegram_credentials: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            storage: StorageBackend::Text,
            db_path: PathBuf::from("data/wardbook.db"),
            log_mode: LogMode::Auto,
            log_file: PathBuf::from("data/wardbook.log"),
            telegram_credentials: None,
        }
    }
}

impl AppConfig {
    /// Load from `WARDBOOK_CONFIG` (default `wardbook.toml`) and the process
    /// environment.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be parsed, or an override
    /// holds an unknown value.
    pub fn load() -> Result<Self> {
        let path = std::env::var("WARDBOOK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a TOML file. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content).map_err(|e| {
                WardbookError::Config(format!("Failed to parse '{}': {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(WardbookError::Config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))),
        }
    }

    /// # Errors
    /// Returns error on invalid TOML or unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| WardbookError::Config(e.to_string()))
    }

    /// Apply `WARDBOOK_*` overrides from `lookup`.
    ///
    /// # Errors
    /// Returns error if an enum-valued override is unknown.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("WARDBOOK_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("WARDBOOK_STORAGE") {
            self.storage = v.parse()?;
        }
        if let Some(v) = get("WARDBOOK_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = get("WARDBOOK_LOG_MODE") {
            self.log_mode = v.parse()?;
        }
        if let Some(v) = get("WARDBOOK_LOG_FILE") {
            self.log_file = PathBuf::from(v);
        }
        if let Some(v) = get("WARDBOOK_TELEGRAM_CREDENTIALS") {
            self.telegram_credentials = Some(PathBuf::from(v));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.storage, StorageBackend::Text);
        assert!(config.telegram_credentials.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            storage = "sqlite"
            db_path = "/var/lib/wardbook/hospital.db"
            "#,
        )
        .expect("Should parse");
        assert_eq!(config.storage, StorageBackend::Sqlite);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/wardbook/hospital.db"));
        assert_eq!(config.log_mode, LogMode::Auto);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(AppConfig::from_toml_str("colour = \"blue\"").is_err());
        assert!(AppConfig::from_toml_str("storage = \"postgres\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("WARDBOOK_STORAGE", "SQLite"),
            ("WARDBOOK_LOG_MODE", "stdout"),
            ("WARDBOOK_DATA_DIR", "/tmp/ward"),
            ("WARDBOOK_TELEGRAM_CREDENTIALS", "/etc/wardbook/telegram.txt"),
            ("WARDBOOK_LOG_FILE", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| (*v).to_string()))
            .expect("Should apply");
        assert_eq!(config.storage, StorageBackend::Sqlite);
        assert_eq!(config.log_mode, LogMode::Stdout);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ward"));
        assert_eq!(config.log_file, PathBuf::from("data/wardbook.log"));
        assert!(config.telegram_credentials.is_some());

        let mut config = AppConfig::default();
        let bad = config.apply_overrides(|k| (k == "WARDBOOK_LOG_MODE").then(|| "loud".to_string()));
        assert!(bad.is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let config = AppConfig::from_file(&dir.path().join("none.toml")).expect("Should load");
        assert_eq!(config, AppConfig::default());
    }
}
