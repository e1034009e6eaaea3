//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     AURUM_DB_PATH=/var/lib/aurum/aurum.db                              │
//! │     AURUM_TAX_RATE_BPS=300                                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/aurum-backoffice/aurum.toml (Linux)                      │
//! │     ~/Library/Application Support/com.aurum.backoffice/aurum.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/aurum/aurum.db"
//! max_connections = 5
//!
//! [sales]
//! tax_rate_bps = 300              # 3% GST
//! points_per_currency_units = 100 # 1 point per 100.00 spent
//! max_conflict_retries = 3
//!
//! [rates]
//! live_url = "https://www.goldapi.io/api"
//! currency = "INR"
//! api_key = "goldapi-xxxx"
//! request_timeout_secs = 5
//! utc_offset_minutes = 330        # IST; decides which date is "today"
//!
//! [rates.default_rates]
//! "22K" = 650000
//!
//! [app]
//! debug = false
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use chrono::{FixedOffset, Offset, Utc};

use aurum_core::{Money, PricingCalculator, TaxRate};
use aurum_db::DbConfig;

use crate::error::{ConfigError, ConfigResult};

/// Name of the config file inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "aurum.toml";

/// Upper bound for `sales.points_per_currency_units`.
pub const MAX_POINTS_PER_CURRENCY_UNITS: i64 = 1_000_000_000;

/// Largest accepted `rates.utc_offset_minutes` magnitude (UTC+14).
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

// =============================================================================
// Database Settings
// =============================================================================

/// Where the SQLite file lives and how the pool is sized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on the SQLite lock (milliseconds).
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "aurum", "backoffice")
        .map(|dirs| dirs.data_dir().join("aurum.db"))
        .unwrap_or_else(|| PathBuf::from("aurum.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

// =============================================================================
// Sales Settings
// =============================================================================

/// Pricing and write-path settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesSettings {
    /// Sales tax in basis points (300 = 3%).
    #[serde(default = "default_tax_rate_bps")]
    pub tax_rate_bps: u32,

    /// Major currency units of final amount that earn one loyalty point.
    #[serde(default = "default_points_per_currency_units")]
    pub points_per_currency_units: i64,

    /// Extra attempts for a sale that hit lock contention.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    /// First backoff delay between conflict retries (milliseconds).
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_tax_rate_bps() -> u32 {
    aurum_core::DEFAULT_TAX_RATE_BPS
}

fn default_points_per_currency_units() -> i64 {
    aurum_core::DEFAULT_POINTS_UNIT_CENTS / 100
}

fn default_max_conflict_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    50
}

impl Default for SalesSettings {
    fn default() -> Self {
        SalesSettings {
            tax_rate_bps: default_tax_rate_bps(),
            points_per_currency_units: default_points_per_currency_units(),
            max_conflict_retries: default_max_conflict_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

// =============================================================================
// Rate Settings
// =============================================================================

/// Live quote source and fallback defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSettings {
    /// Base URL of the bullion quote API. `None` disables the live tier.
    #[serde(default)]
    pub live_url: Option<String>,

    /// Quote currency, appended to the URL path.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// API key sent as `x-access-token`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// HTTP request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Store's offset from UTC in minutes. Manual quotes belong to the
    /// calendar date at this offset.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Last-resort per-gram rates in cents, keyed by category.
    #[serde(default)]
    pub default_rates: BTreeMap<String, i64>,
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_request_timeout() -> u64 {
    5
}

impl Default for RateSettings {
    fn default() -> Self {
        RateSettings {
            live_url: None,
            currency: default_currency(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
            utc_offset_minutes: 0,
            default_rates: BTreeMap::new(),
        }
    }
}

/// Application-level switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    /// Expose storage error detail to the operator.
    #[serde(default)]
    pub debug: bool,
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub sales: SalesSettings,

    #[serde(default)]
    pub rates: RateSettings,

    #[serde(default)]
    pub app: AppSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (aurum.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.sales.tax_rate_bps > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "sales.tax_rate_bps must be at most 10000, got {}",
                self.sales.tax_rate_bps
            )));
        }

        if self.sales.points_per_currency_units <= 0
            || self.sales.points_per_currency_units > MAX_POINTS_PER_CURRENCY_UNITS
        {
            return Err(ConfigError::Invalid(format!(
                "sales.points_per_currency_units must be between 1 and {}, got {}",
                MAX_POINTS_PER_CURRENCY_UNITS, self.sales.points_per_currency_units
            )));
        }

        if let Some(ref url) = self.rates.live_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!(
                    "rates.live_url must start with http:// or https://, got: {}",
                    url
                )));
            }
        }

        if self.rates.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "rates.request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.rates.utc_offset_minutes.unsigned_abs() > MAX_UTC_OFFSET_MINUTES.unsigned_abs() {
            return Err(ConfigError::Invalid(format!(
                "rates.utc_offset_minutes must be within ±{}, got {}",
                MAX_UTC_OFFSET_MINUTES, self.rates.utc_offset_minutes
            )));
        }

        if let Some((category, rate)) = self.rates.default_rates.iter().find(|(_, r)| **r <= 0) {
            return Err(ConfigError::Invalid(format!(
                "rates.default_rates.{} must be positive, got {}",
                category, rate
            )));
        }

        Ok(())
    }

    /// Applies `AURUM_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("AURUM_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(value) = lookup("AURUM_DB_MAX_CONNECTIONS") {
            match value.parse() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %value, "Ignoring invalid AURUM_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(value) = lookup("AURUM_TAX_RATE_BPS") {
            match value.parse() {
                Ok(bps) => {
                    debug!(bps, "Overriding tax rate from environment");
                    self.sales.tax_rate_bps = bps;
                }
                Err(_) => warn!(value = %value, "Ignoring invalid AURUM_TAX_RATE_BPS"),
            }
        }

        if let Some(value) = lookup("AURUM_POINTS_PER_UNITS") {
            match value.parse() {
                Ok(units) => self.sales.points_per_currency_units = units,
                Err(_) => warn!(value = %value, "Ignoring invalid AURUM_POINTS_PER_UNITS"),
            }
        }

        if let Some(value) = lookup("AURUM_MAX_CONFLICT_RETRIES") {
            match value.parse() {
                Ok(n) => self.sales.max_conflict_retries = n,
                Err(_) => warn!(value = %value, "Ignoring invalid AURUM_MAX_CONFLICT_RETRIES"),
            }
        }

        if let Some(url) = lookup("AURUM_RATES_URL") {
            debug!(url = %url, "Overriding live rate URL from environment");
            self.rates.live_url = Some(url);
        }

        if let Some(key) = lookup("AURUM_RATES_API_KEY") {
            self.rates.api_key = Some(key);
        }

        if let Some(value) = lookup("AURUM_RATES_TIMEOUT_SECS") {
            match value.parse() {
                Ok(secs) => self.rates.request_timeout_secs = secs,
                Err(_) => warn!(value = %value, "Ignoring invalid AURUM_RATES_TIMEOUT_SECS"),
            }
        }

        if let Some(value) = lookup("AURUM_RATES_UTC_OFFSET_MINUTES") {
            match value.parse() {
                Ok(minutes) => self.rates.utc_offset_minutes = minutes,
                Err(_) => warn!(value = %value, "Ignoring invalid AURUM_RATES_UTC_OFFSET_MINUTES"),
            }
        }

        if let Some(value) = lookup("AURUM_DEBUG") {
            self.app.debug = matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "aurum", "backoffice")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// The configured sales tax.
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.sales.tax_rate_bps)
    }

    /// Final amount that earns one loyalty point.
    pub fn points_unit(&self) -> Money {
        Money::from_cents(self.sales.points_per_currency_units.saturating_mul(100))
    }

    /// Offset whose calendar date is "today" for manual quotes. Out-of-range
    /// values fall back to UTC.
    pub fn business_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.rates.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }

    /// Pricing calculator built from the sales settings.
    pub fn pricing(&self) -> PricingCalculator {
        PricingCalculator::new(self.tax_rate()).with_points_unit(self.points_unit())
    }

    /// Pool configuration for `aurum_db::Database::new`.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    /// HTTP timeout for the live quote source.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.rates.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sales.tax_rate_bps, 300);
        assert_eq!(config.sales.points_per_currency_units, 100);
        assert_eq!(config.sales.max_conflict_retries, 3);
        assert_eq!(config.points_unit().cents(), 10_000);
        assert!(config.rates.live_url.is_none());
        assert!(config.rates.default_rates.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_file() {
        let toml = r#"
            [sales]
            tax_rate_bps = 500

            [rates]
            live_url = "https://quotes.example.com/api"

            [rates.default_rates]
            "22K" = 650000
        "#;
        let config: EngineConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.tax_rate().bps(), 500);
        assert_eq!(config.sales.max_conflict_retries, 3);
        assert_eq!(config.rates.currency, "INR");
        assert_eq!(config.rates.default_rates.get("22K"), Some(&650_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("AURUM_DB_PATH", "/tmp/override.db"),
            ("AURUM_TAX_RATE_BPS", "0"),
            ("AURUM_MAX_CONFLICT_RETRIES", "not-a-number"),
            ("AURUM_DEBUG", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.sales.tax_rate_bps, 0);
        assert_eq!(config.sales.max_conflict_retries, 3);
        assert!(config.app.debug);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.rates.live_url = Some("ftp://quotes".into());
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.sales.points_per_currency_units = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.rates.default_rates.insert("18K".into(), -1);
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.rates.utc_offset_minutes = 15 * 60;
        assert!(config.validate().is_err());
        config.rates.utc_offset_minutes = i32::MIN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_points_unit_bounded() {
        let env: HashMap<&str, &str> = [("AURUM_POINTS_PER_UNITS", "9223372036854775807")]
            .into_iter()
            .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.points_unit().cents(), i64::MAX);
        assert!(config.validate().is_err());

        config.sales.points_per_currency_units = MAX_POINTS_PER_CURRENCY_UNITS;
        assert!(config.validate().is_ok());
        assert_eq!(config.points_unit().cents(), MAX_POINTS_PER_CURRENCY_UNITS * 100);
    }

    #[test]
    fn test_business_offset() {
        assert_eq!(EngineConfig::default().business_offset().local_minus_utc(), 0);

        let env: HashMap<&str, &str> = [("AURUM_RATES_UTC_OFFSET_MINUTES", "330")]
            .into_iter()
            .collect();
        let mut config = EngineConfig::default();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert!(config.validate().is_ok());
        assert_eq!(config.business_offset().local_minus_utc(), 330 * 60);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = EngineConfig::default();
        config.database.path = dir.path().join("aurum.db");
        config.sales.tax_rate_bps = 250;
        config.save(Some(path.clone())).unwrap();

        let loaded: EngineConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        loaded.validate().unwrap();
        assert_eq!(loaded.sales.tax_rate_bps, 250);
        assert_eq!(loaded.database.path, dir.path().join("aurum.db"));
    }
}
