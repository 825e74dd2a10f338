//! Layered configuration loading using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`TASKBOARD_*` prefix, `__` as separator)
//! 2. `./taskboard.toml`
//! 3. User-level `<config dir>/taskboard/config.toml`
//! 4. Built-in defaults
//!
//! `TASKBOARD_STORAGE__DATABASE_PATH` maps to `storage.database_path`,
//! `TASKBOARD_BOARD__NOTICE_TTL_MS` to `board.notice_ttl_ms`, and so on.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::app::StorageEnvironment;
use crate::impls::FileKeyValue;
use crate::ports::KeyValueSurface;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config: {0}")]
    Figment(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the persistent backends live. An unset path means that capability is absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub key_value_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BoardConfig {
    /// How long a failed-move notice stays visible.
    pub notice_ttl_ms: u64,
    /// Seed the example tasks when the store is empty on first load.
    pub seed_defaults: bool,
    /// Patch the in-memory collection after each successful store call.
    pub patch_local_state: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            notice_ttl_ms: 3_000,
            seed_defaults: true,
            patch_local_state: true,
        }
    }
}

impl BoardConfig {
    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self::figment().extract()?)
    }

    /// Build the figment provider chain.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        figment = figment.merge(Toml::file("taskboard.toml"));
        figment.merge(Env::prefixed("TASKBOARD_").split("__"))
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("taskboard").join("config.toml"))
    }

    /// Turn the storage section into the selector's probe input.
    ///
    /// A key-value directory that cannot be created is reported as absent.
    pub fn storage_environment(&self) -> StorageEnvironment {
        let key_value = self.storage.key_value_dir.as_ref().and_then(|dir| {
            match FileKeyValue::open(dir) {
                Ok(kv) => Some(Arc::new(kv) as Arc<dyn KeyValueSurface>),
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "key-value directory unavailable");
                    None
                }
            }
        });
        StorageEnvironment {
            database_path: self.storage.database_path.clone(),
            key_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_files() {
        Jail::expect_with(|_jail| {
            let config: Config = Config::figment().extract()?;
            assert_eq!(config.storage, StorageConfig::default());
            assert_eq!(config.board.notice_ttl(), Duration::from_secs(3));
            assert!(config.board.seed_defaults);
            assert_eq!(config.logging.filter, "info");
            Ok(())
        });
    }

    #[test]
    fn toml_file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "taskboard.toml",
                r#"
                [storage]
                database_path = "board.redb"

                [board]
                notice_ttl_ms = 500
                seed_defaults = false
                patch_local_state = true
                "#,
            )?;
            jail.set_env("TASKBOARD_BOARD__NOTICE_TTL_MS", "1200");
            jail.set_env("TASKBOARD_STORAGE__KEY_VALUE_DIR", "kv");

            let config: Config = Config::figment().extract()?;
            assert_eq!(config.storage.database_path, Some(PathBuf::from("board.redb")));
            assert_eq!(config.storage.key_value_dir, Some(PathBuf::from("kv")));
            assert_eq!(config.board.notice_ttl_ms, 1200);
            assert!(!config.board.seed_defaults);
            Ok(())
        });
    }

    #[test]
    fn storage_environment_opens_key_value_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            storage: StorageConfig {
                database_path: None,
                key_value_dir: Some(dir.path().join("kv")),
            },
            ..Config::default()
        };

        let env = config.storage_environment();
        assert!(env.database_path.is_none());
        assert!(env.key_value.is_some());
        assert!(dir.path().join("kv").is_dir());
    }
}
