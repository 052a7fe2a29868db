//! Application configuration
//!
//! Stored as JSON next to the database (or wherever `--config` points).
//! Connection secrets can be supplied through the environment instead.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_URL: &str = "PROFILE_BUTTONS_URL";
pub const ENV_API_KEY: &str = "PROFILE_BUTTONS_API_KEY";
pub const ENV_ACCESS_TOKEN: &str = "PROFILE_BUTTONS_ACCESS_TOKEN";

const DEFAULT_DB_FILE: &str = "profile_buttons.db";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where buttons are stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Hosted REST backend with a session token
    Rest {
        url: String,
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_token: Option<String>,
    },
    /// Local SQLite database file
    Sqlite { path: PathBuf },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Sqlite {
            path: PathBuf::from(DEFAULT_DB_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Directory for rolling log files; stderr only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    /// Acting user for the SQLite backend (REST takes it from the session)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            request_timeout_ms: default_timeout_ms(),
            log_dir: None,
            user_id: None,
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Apply `PROFILE_BUTTONS_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`. A URL switches the backend to REST;
    /// the key and token only patch an existing REST backend.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(new_url) = non_empty(ENV_URL) {
            self.backend = match std::mem::take(&mut self.backend) {
                BackendConfig::Rest { api_key, access_token, .. } => BackendConfig::Rest {
                    url: new_url,
                    api_key,
                    access_token,
                },
                BackendConfig::Sqlite { .. } => BackendConfig::Rest {
                    url: new_url,
                    api_key: String::new(),
                    access_token: None,
                },
            };
        }

        if let BackendConfig::Rest { api_key, access_token, .. } = &mut self.backend {
            if let Some(key) = non_empty(ENV_API_KEY) {
                *api_key = key;
            }
            if let Some(token) = non_empty(ENV_ACCESS_TOKEN) {
                *access_token = Some(token);
            }
        }
    }
}

/// Read the config at `path`; a missing file yields the defaults
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        log::debug!("no config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let content = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, content).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("profile_buttons.json");
        let config = AppConfig {
            backend: BackendConfig::Rest {
                url: "https://project.example.co".to_string(),
                api_key: "anon".to_string(),
                access_token: None,
            },
            request_timeout_ms: 2500,
            log_dir: Some(dir.path().join("logs")),
            user_id: None,
        };

        save_config(&path, &config).unwrap();

        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.json");
        std::fs::write(&path, r#"{ "backend": { "kind": "sqlite", "path": "/tmp/x.db" } }"#).unwrap();

        let config = load_config(&path).unwrap();

        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(
            config.backend,
            BackendConfig::Sqlite {
                path: PathBuf::from("/tmp/x.db")
            }
        );
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Json { .. })));
    }

    #[test]
    fn test_overrides_switch_to_rest() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_URL, "https://project.example.co"),
            (ENV_API_KEY, "anon"),
            (ENV_ACCESS_TOKEN, "jwt"),
        ]);
        let mut config = AppConfig::default();

        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(
            config.backend,
            BackendConfig::Rest {
                url: "https://project.example.co".to_string(),
                api_key: "anon".to_string(),
                access_token: Some("jwt".to_string()),
            }
        );
    }

    #[test]
    fn test_token_alone_leaves_sqlite_alone() {
        let mut config = AppConfig::default();
        config.apply_overrides(|name| (name == ENV_ACCESS_TOKEN).then(|| "jwt".to_string()));
        assert_eq!(config.backend, BackendConfig::default());
    }
}
