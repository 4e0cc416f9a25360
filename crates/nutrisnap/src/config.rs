//! Configuration management for nutrisnap.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{NutritionGoals, DEFAULT_CALORIES, DEFAULT_PROTEIN};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "nutrisnap";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "nutrisnap.db";

/// Largest page size the food database accepts.
const MAX_PAGE_SIZE: u32 = 200;

/// Upper bound for every interval and timeout, one day.
const MAX_INTERVAL_SECS: u64 = 86_400;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `NUTRISNAP_`, sections split by `__`)
/// 2. TOML config file at `~/.config/nutrisnap/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Backend sync configuration.
    pub sync: SyncConfig,
    /// Food log configuration.
    pub tracker: TrackerConfig,
    /// Online food database configuration.
    pub food_search: FoodSearchConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/nutrisnap/nutrisnap.db`
    pub database_path: Option<PathBuf>,
}

/// Backend sync configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Push and pull against the backend when signed in.
    pub enabled: bool,
    /// Base URL of the nutrisnap backend.
    pub server_url: String,
    /// Seconds between periodic pushes.
    pub interval_secs: u64,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Food log configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Calorie goal used until the user sets one.
    pub default_calories: f64,
    /// Protein goal used until the user sets one.
    pub default_protein: f64,
    /// Seconds between checks for a new calendar day.
    pub day_check_interval_secs: u64,
}

/// Online food database configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoodSearchConfig {
    /// Base URL of the FoodData Central API.
    pub base_url: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Number of results requested per search.
    pub page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_url: "http://127.0.0.1:8787".to_string(),
            interval_secs: 30,
            request_timeout_secs: 10,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_calories: DEFAULT_CALORIES,
            default_protein: DEFAULT_PROTEIN,
            day_check_interval_secs: 60,
        }
    }
}

impl Default for FoodSearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.nal.usda.gov/fdc/v1".to_string(),
            api_key: "DEMO_KEY".to_string(),
            page_size: 25,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("NUTRISNAP_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("sync.interval_secs", self.sync.interval_secs),
            ("sync.request_timeout_secs", self.sync.request_timeout_secs),
            (
                "tracker.day_check_interval_secs",
                self.tracker.day_check_interval_secs,
            ),
        ] {
            if secs == 0 || secs > MAX_INTERVAL_SECS {
                return Err(validation(format!(
                    "{name} must be between 1 and {MAX_INTERVAL_SECS}, got {secs}"
                )));
            }
        }
        if self.food_search.page_size == 0 || self.food_search.page_size > MAX_PAGE_SIZE {
            return Err(validation(format!(
                "food_search.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.food_search.page_size
            )));
        }

        self.default_goals()
            .validate()
            .map_err(|e| validation(format!("tracker defaults: {e}")))?;

        for (name, value) in [
            ("sync.server_url", &self.sync.server_url),
            ("food_search.base_url", &self.food_search.base_url),
        ] {
            if let Err(e) = url::Url::parse(value) {
                return Err(validation(format!("{name} is not a valid URL ({e}): {value}")));
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    ///
    /// A leading `~` is expanded to the home directory.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        match &self.storage.database_path {
            Some(path) => expand_home(path),
            None => Self::default_data_dir().join(DATABASE_FILE_NAME),
        }
    }

    /// Goals used when nothing has been stored yet.
    #[must_use]
    pub fn default_goals(&self) -> NutritionGoals {
        NutritionGoals::new(self.tracker.default_calories, self.tracker.default_protein)
    }

    /// Get the sync interval as a Duration.
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.request_timeout_secs)
    }

    /// Get the day-change check interval as a Duration.
    #[must_use]
    pub fn day_check_interval(&self) -> Duration {
        Duration::from_secs(self.tracker.day_check_interval_secs)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn validation(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.sync.enabled);
        assert_eq!(config.sync.interval_secs, 30);
        assert_eq!(config.tracker.day_check_interval_secs, 60);
        assert_eq!(config.food_search.page_size, 25);
        assert_eq!(config.food_search.api_key, "DEMO_KEY");
    }

    #[test]
    fn test_default_goals() {
        let config = Config::default();
        assert_eq!(config.default_goals(), NutritionGoals::default());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_sync_interval() {
        let mut config = Config::default();
        config.sync.interval_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("sync.interval_secs"));
    }

    #[test]
    fn test_validate_zero_day_check_interval() {
        let mut config = Config::default();
        config.tracker.day_check_interval_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("day_check_interval_secs"));
    }

    #[test]
    fn test_validate_interval_upper_bounds() {
        let mut config = Config::default();
        config.sync.interval_secs = u64::MAX;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("sync.interval_secs"));

        let mut config = Config::default();
        config.sync.request_timeout_secs = MAX_INTERVAL_SECS + 1;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("sync.request_timeout_secs"));

        let mut config = Config::default();
        config.tracker.day_check_interval_secs = MAX_INTERVAL_SECS + 1;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("day_check_interval_secs"));

        let mut config = Config::default();
        config.sync.interval_secs = MAX_INTERVAL_SECS;
        config.tracker.day_check_interval_secs = MAX_INTERVAL_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_page_size_bounds() {
        let mut config = Config::default();
        config.food_search.page_size = 0;
        assert!(config.validate().is_err());

        config.food_search.page_size = 500;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("page_size"));
    }

    #[test]
    fn test_validate_negative_default_goal() {
        let mut config = Config::default();
        config.tracker.default_protein = -10.0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("protein"));
    }

    #[test]
    fn test_validate_bad_url() {
        let mut config = Config::default();
        config.sync.server_url = "not a url".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("sync.server_url"));
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        assert!(config
            .database_path()
            .to_string_lossy()
            .contains("nutrisnap.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_database_path_expands_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("~/data/nutrisnap.db"));

        assert_eq!(config.database_path(), home.join("data/nutrisnap.db"));
    }

    #[test]
    fn test_intervals() {
        let config = Config::default();
        assert_eq!(config.sync_interval(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.day_check_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("nutrisnap"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    // Loading tests run inside a jail so environment overrides from one test
    // never leak into another.

    #[test]
    fn test_load_nonexistent_config() {
        Jail::expect_with(|_| {
            let config =
                Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                "[sync]\nserver_url = \"http://10.0.0.2:9000\"\ninterval_secs = 5\n\n[tracker]\ndefault_calories = 1800.0\n",
            )?;

            let config = Config::load_from(Some(jail.directory().join("config.toml"))).unwrap();
            assert_eq!(config.sync.server_url, "http://10.0.0.2:9000");
            assert_eq!(config.sync.interval_secs, 5);
            assert!((config.tracker.default_calories - 1800.0).abs() < f64::EPSILON);
            assert_eq!(config.food_search, FoodSearchConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                "[sync]\nserver_url = \"http://10.0.0.2:9000\"\ninterval_secs = 5\n\n[tracker]\ndefault_protein = 90.0\n",
            )?;
            jail.set_env("NUTRISNAP_SYNC__SERVER_URL", "http://backend.test:8080");
            jail.set_env("NUTRISNAP_TRACKER__DEFAULT_PROTEIN", "150");

            let config = Config::load_from(Some(jail.directory().join("config.toml"))).unwrap();
            assert_eq!(config.sync.server_url, "http://backend.test:8080");
            assert!((config.tracker.default_protein - 150.0).abs() < f64::EPSILON);
            assert_eq!(config.sync.interval_secs, 5);
            Ok(())
        });
    }

    #[test]
    fn test_env_override_is_validated() {
        Jail::expect_with(|jail| {
            jail.set_env("NUTRISNAP_SYNC__INTERVAL_SECS", "0");

            let err = Config::load_from(Some(jail.directory().join("missing.toml")))
                .unwrap_err()
                .to_string();
            assert!(err.contains("sync.interval_secs"));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[sync]\ninterval_secs = 0\n")?;

            assert!(Config::load_from(Some(jail.directory().join("config.toml"))).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_sync_config_deserialize() {
        let json = r#"{"enabled": false, "interval_secs": 120}"#;
        let sync: SyncConfig = serde_json::from_str(json).unwrap();
        assert!(!sync.enabled);
        assert_eq!(sync.interval_secs, 120);
        assert_eq!(sync.request_timeout_secs, 10);
    }
}
