use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::CoreError;

/// Default CoinGecko API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// User-configurable settings, loaded from an optional JSON file.
///
/// Every field has a default, so a partial file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite file holding the transactions. `None` means the platform data
    /// directory (see `default_database_path`).
    pub database_path: Option<PathBuf>,

    /// Quote currency for all prices (CoinGecko `vs_currencies` code).
    pub vs_currency: String,

    /// Root of the price provider's REST API.
    pub api_base_url: String,

    /// Timeout of a single outbound price request.
    pub request_timeout_secs: u64,

    /// Maximum outbound price calls within the rate window.
    pub rate_limit_max_calls: usize,

    /// Length of the trailing rate window.
    pub rate_limit_window_secs: u64,

    /// Seconds between live refresh passes.
    pub refresh_interval_secs: u64,

    /// How long the coin catalog is reused before it is fetched again.
    pub coin_list_ttl_secs: u64,

    /// Pause after a failed refresh pass before the live loop retries.
    pub refresh_error_backoff_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            vs_currency: "usd".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 5,
            rate_limit_max_calls: 50,
            rate_limit_window_secs: 60,
            refresh_interval_secs: 30,
            coin_list_ttl_secs: 3600,
            refresh_error_backoff_secs: 5,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            log::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the gateway and scheduler cannot work with.
    pub fn validate(&self) -> Result<(), CoreError> {
        let currency = self.vs_currency.trim();
        if currency.is_empty() || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::Config(format!(
                "Invalid currency code '{}': must be ASCII letters (e.g., usd, eur)",
                self.vs_currency
            )));
        }
        if self.rate_limit_max_calls == 0 {
            return Err(CoreError::Config("rate_limit_max_calls must be at least 1".into()));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(CoreError::Config("rate_limit_window_secs must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config("request_timeout_secs must be at least 1".into()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(CoreError::Config("refresh_interval_secs must be at least 1".into()));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(CoreError::Config("api_base_url must not be empty".into()));
        }
        Ok(())
    }

    /// The configured database path, or the platform default.
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn coin_list_ttl(&self) -> Duration {
        Duration::from_secs(self.coin_list_ttl_secs)
    }

    pub fn refresh_error_backoff(&self) -> Duration {
        Duration::from_secs(self.refresh_error_backoff_secs)
    }
}

/// `<data dir>/crypto-portfolio/crypto_transactions.db`, falling back to the
/// working directory when the platform has no data directory.
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crypto-portfolio")
        .join("crypto_transactions.db")
}

/// `<config dir>/crypto-portfolio/settings.json`.
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crypto-portfolio")
        .join("settings.json")
}
