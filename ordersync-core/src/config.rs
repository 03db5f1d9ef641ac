//! Configuration: `<home>/.ordersync/config.yaml` plus environment overrides.
//!
//! # API pattern
//!
//! - `load_at(home)` / `save_at(home, …)`: explicit home; used in tests
//! - `load()`: derives home from `dirs::home_dir()` and applies the process
//!   environment
//!
//! Every file field is optional; environment variables win over the file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::feed::StatusFilter;
use crate::paths::{self, set_dir_permissions, set_file_permissions};

pub const DEFAULT_API_VERSION: &str = "2024-07";
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PAGE_SIZE: u32 = 250;

pub const ENV_STORE_URL: &str = "SHOPIFY_STORE_URL";
pub const ENV_API_VERSION: &str = "SHOPIFY_API_VERSION";
pub const ENV_ACCESS_TOKEN: &str = "SHOPIFY_ACCESS_TOKEN";
pub const ENV_SYNC_INTERVAL: &str = "ORDERSYNC_SYNC_INTERVAL_SECS";
pub const ENV_STATUS: &str = "ORDERSYNC_STATUS";
const ENV_API_VERSION_LEGACY: &str = "API_VERSION";
const ENV_ACCESS_TOKEN_LEGACY: &str = "ACCESS_TOKEN";

/// Contents of `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the shop, e.g. `https://example.myshopify.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// Everything a source feed needs, with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub store_url: String,
    pub api_version: String,
    pub access_token: String,
    pub page_size: u32,
    pub timeout: Duration,
}

impl Config {
    /// Load `config.yaml` under `home`. A missing file yields the defaults.
    /// Environment overrides are not applied.
    pub fn load_at(home: &Path) -> Result<Self, ConfigError> {
        let path = paths::config_path(home);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Load from `dirs::home_dir()` and apply the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        let mut config = Self::load_at(&home)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Atomically write `config.yaml` (mode 0600).
    pub fn save_at(&self, home: &Path) -> Result<(), ConfigError> {
        let root = paths::ordersync_root(home);
        let io = |path: &Path, source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| io(&root, e))?;
            set_dir_permissions(&root).map_err(|e| io(&root, e))?;
        }
        let path = paths::config_path(home);
        let tmp = path.with_extension("yaml.tmp");
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(&tmp, yaml).map_err(|e| io(&tmp, e))?;
        set_file_permissions(&tmp).map_err(|e| io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io(&path, e))?;
        Ok(())
    }

    /// Overlay values from `lookup` (normally `std::env::var`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_STORE_URL) {
            self.store_url = Some(url);
        }
        if let Some(version) = get(ENV_API_VERSION).or_else(|| get(ENV_API_VERSION_LEGACY)) {
            self.api_version = Some(version);
        }
        if let Some(token) = get(ENV_ACCESS_TOKEN).or_else(|| get(ENV_ACCESS_TOKEN_LEGACY)) {
            self.access_token = Some(token);
        }
        if let Some(raw) = get(ENV_SYNC_INTERVAL) {
            let secs = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                env: ENV_SYNC_INTERVAL,
                value: raw.clone(),
            })?;
            self.sync_interval_secs = Some(secs);
        }
        if let Some(raw) = get(ENV_STATUS) {
            let status = raw.parse().map_err(|_| ConfigError::InvalidEnv {
                env: ENV_STATUS,
                value: raw.clone(),
            })?;
            self.status = Some(status);
        }
        Ok(())
    }

    pub fn status(&self) -> StatusFilter {
        self.status.unwrap_or_default()
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(
            self.sync_interval_secs
                .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS)
                .max(1),
        )
    }

    /// Resolve the feed settings, failing if the shop URL or token is unset.
    pub fn feed_settings(&self) -> Result<FeedSettings, ConfigError> {
        let store_url = self.store_url.clone().ok_or(ConfigError::Missing {
            field: "store_url",
            env: ENV_STORE_URL,
        })?;
        let access_token = self.access_token.clone().ok_or(ConfigError::Missing {
            field: "access_token",
            env: ENV_ACCESS_TOKEN,
        })?;
        Ok(FeedSettings {
            store_url: store_url.trim_end_matches('/').to_string(),
            api_version: self
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            access_token,
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 250),
            timeout: Duration::from_secs(
                self.request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let home = TempDir::new().unwrap();
        let config = Config::load_at(home.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.status(), StatusFilter::Open);
        assert_eq!(config.sync_interval(), Duration::from_secs(300));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = TempDir::new().unwrap();
        let config = Config {
            store_url: Some("https://shop.example".into()),
            access_token: Some("shpat_x".into()),
            status: Some(StatusFilter::Any),
            ..Config::default()
        };
        config.save_at(home.path()).unwrap();
        assert_eq!(Config::load_at(home.path()).unwrap(), config);
        assert!(!paths::config_path(home.path())
            .with_extension("yaml.tmp")
            .exists());
    }

    #[test]
    fn env_overrides_file_values_and_legacy_names_apply() {
        let mut config = Config {
            store_url: Some("https://old.example".into()),
            ..Config::default()
        };
        config
            .apply_overrides(env(&[
                (ENV_STORE_URL, "https://new.example/"),
                ("API_VERSION", "2023-10"),
                ("ACCESS_TOKEN", "tok"),
            ]))
            .unwrap();
        let feed = config.feed_settings().unwrap();
        assert_eq!(feed.store_url, "https://new.example");
        assert_eq!(feed.api_version, "2023-10");
        assert_eq!(feed.access_token, "tok");
        assert_eq!(feed.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn invalid_interval_env_is_reported() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(env(&[(ENV_SYNC_INTERVAL, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
        assert!(err.to_string().contains(ENV_SYNC_INTERVAL));
    }

    #[test]
    fn feed_settings_require_url_and_token() {
        let err = Config::default().feed_settings().unwrap_err();
        assert!(err.to_string().contains("store_url"));

        let config = Config {
            store_url: Some("https://shop.example".into()),
            ..Config::default()
        };
        let err = config.feed_settings().unwrap_err();
        assert!(err.to_string().contains(ENV_ACCESS_TOKEN));
    }

    #[test]
    fn corrupt_yaml_reports_path() {
        let home = TempDir::new().unwrap();
        let path = paths::config_path(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "store_url: [unclosed").unwrap();
        let err = Config::load_at(home.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.yaml"));
    }
}
