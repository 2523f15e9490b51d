// src/db/config.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::db::error::{StoreError, StoreResult};

/// Путь к базе по умолчанию (относительно рабочей директории).
pub const DEFAULT_DB_PATH: &str = "crm_database.db";

/// Переменная окружения, переопределяющая путь к базе.
pub const DB_PATH_ENV: &str = "CRM_DB_PATH";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    /// Сколько SQLite ждёт снятия блокировки, прежде чем вернуть SQLITE_BUSY.
    pub busy_timeout_secs: u64,
    /// Время жизни списков для автодополнения.
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            busy_timeout_secs: 30,
            cache_ttl_secs: 300,
            cache_capacity: 16,
        }
    }
}

impl StoreConfig {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { db_path: path.into(), ..Self::default() }
    }

    /// Значения по умолчанию + `CRM_DB_PATH`, если задана.
    pub fn from_env() -> Self {
        match std::env::var(DB_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::with_path(path),
            _ => Self::default(),
        }
    }

    pub fn from_json_file(path: &Path) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: StoreConfig = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(StoreError::Config("db_path must not be empty".to_string()));
        }
        if self.cache_capacity == 0 {
            return Err(StoreError::Config("cache_capacity must be nonzero".to_string()));
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.db_path, PathBuf::from("crm_database.db"));
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.busy_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_file_fills_missing_fields() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.json");
        let mut file = std::fs::File::create(&path).expect("Failed to create config file");
        write!(file, r#"{{ "db_path": "other.db", "cache_ttl_secs": 60 }}"#).unwrap();

        let config = StoreConfig::from_json_file(&path).expect("Failed to load config");
        assert_eq!(config.db_path, PathBuf::from("other.db"));
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.busy_timeout_secs, 30);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = StoreConfig { cache_capacity: 0, ..StoreConfig::default() };
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));
    }
}
