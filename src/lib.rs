//! Profile Buttons Backend
//!
//! Layered architecture:
//! - domain: Core entities and business rules
//! - repository: Remote store abstractions and implementations
//! - sync: Snapshot cache and the button synchronizer
//! - commands: Command handlers used by the CLI

use std::sync::Arc;

pub mod commands;
pub mod config;
pub mod domain;
pub mod notify;
pub mod repository;
pub mod sync;

use config::{AppConfig, BackendConfig};
use domain::Identity;
use notify::NotificationSink;
use repository::{AccessControl, RemoteStore, RestStore, SessionAccess, SqliteStore, StoreAccess, StoreResult};
use sync::{ButtonSynchronizer, SyncOptions};

/// Application state shared across commands
pub struct AppState {
    pub sync: ButtonSynchronizer,
}

impl AppState {
    /// Connect the configured backend and build the synchronizer
    pub fn from_config(config: &AppConfig, sink: Arc<dyn NotificationSink>) -> StoreResult<Self> {
        let options = SyncOptions {
            request_timeout: config.request_timeout(),
        };

        let (store, access): (Arc<dyn RemoteStore>, Arc<dyn AccessControl>) = match &config.backend {
            BackendConfig::Rest {
                url,
                api_key,
                access_token,
            } => {
                log::info!("using REST backend at {}", url);
                let rest = Arc::new(RestStore::new(
                    url.as_str(),
                    api_key.as_str(),
                    access_token.clone(),
                    options.request_timeout,
                )?);
                let access: Arc<dyn AccessControl> = Arc::new(SessionAccess::new(rest.clone()));
                let store: Arc<dyn RemoteStore> = rest;
                (store, access)
            }
            BackendConfig::Sqlite { path } => {
                log::info!("using SQLite database {}", path.display());
                let db: Arc<dyn RemoteStore> = Arc::new(SqliteStore::open(path)?);
                let identity = config.user_id.as_deref().map(Identity::new);
                let access: Arc<dyn AccessControl> = Arc::new(StoreAccess::new(db.clone(), identity));
                (db, access)
            }
        };

        Ok(Self {
            sync: ButtonSynchronizer::new(store, access, sink, options),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogSink;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_state_from_sqlite_config() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            backend: BackendConfig::Sqlite {
                path: dir.path().join("buttons.db"),
            },
            user_id: Some("user-1".to_string()),
            ..AppConfig::default()
        };

        let state = AppState::from_config(&config, Arc::new(LogSink)).unwrap();

        assert!(state.sync.fetch("p1").await.unwrap().is_empty());
        assert!(dir.path().join("buttons.db").exists());
    }

    #[test]
    fn test_state_from_rest_config() {
        let config = AppConfig {
            backend: BackendConfig::Rest {
                url: "https://project.example.co/".to_string(),
                api_key: "anon".to_string(),
                access_token: None,
            },
            log_dir: Some(PathBuf::from("logs")),
            ..AppConfig::default()
        };
        assert!(AppState::from_config(&config, Arc::new(LogSink)).is_ok());
    }
}
