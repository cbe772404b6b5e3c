//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (RAPHAEL_SW_*)
//! 2. TOML config file (if RAPHAEL_SW_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Only host-level settings live here. The worker's release constants are in
//! [`crate::manifest`] and are not read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (RAPHAEL_SW_*)
/// 2. TOML config file (if RAPHAEL_SW_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via RAPHAEL_SW_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Keep the cache in memory instead of SQLite.
    ///
    /// Set via RAPHAEL_SW_IN_MEMORY environment variable.
    #[serde(default)]
    pub in_memory: bool,

    /// Origin and base path the worker controls. Relative manifest paths
    /// resolve against it and responses from its origin count as same-origin.
    ///
    /// Set via RAPHAEL_SW_SCOPE environment variable.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via RAPHAEL_SW_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via RAPHAEL_SW_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum redirects to follow per fetch.
    ///
    /// Set via RAPHAEL_SW_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./raphael-sw-cache.sqlite")
}

fn default_scope() -> String {
    "http://localhost:8080/".into()
}

fn default_user_agent() -> String {
    "raphael-sw/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            in_memory: false,
            scope: default_scope(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed scope URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the scope is not an absolute URL.
    pub fn scope_url(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.scope)
            .map_err(|e| ConfigError::Invalid { field: "scope".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `RAPHAEL_SW_`
    /// 2. TOML file from `RAPHAEL_SW_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("RAPHAEL_SW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("RAPHAEL_SW_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
