//! Layered pipeline settings
//!
//! Built-in defaults, then an optional TOML file, then `PRICE_FORECAST_`
//! environment variables. Nested keys use `__`, e.g.
//! `PRICE_FORECAST_STORE__LOCAL__FEATURES_DIR`.

use feature_store::{EnvSnapshot, Mode, StoreSettings};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "price_forecast.toml";

/// Prefix of the environment variables that override file settings
pub const ENV_PREFIX: &str = "PRICE_FORECAST_";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for SettingsError {
    fn from(err: figment::Error) -> Self {
        SettingsError::Invalid(err.to_string())
    }
}

/// Where the tracker keeps its log and where it finds observed prices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    pub log_path: PathBuf,
    pub feature_group: String,
    pub feature_group_version: u32,
    /// Column of the feature group holding the observed value
    pub actual_column: String,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("outputs/prediction_tracking.csv"),
            feature_group: "electricity_price".to_string(),
            feature_group_version: 1,
            actual_column: "price_sek_kwh_mean".to_string(),
        }
    }
}

/// Everything the pipeline tools read at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Explicit mode; auto-detected from the credential when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    pub store: StoreSettings,
    pub tracking: TrackingSettings,
}

impl PipelineSettings {
    /// Load settings from `path`, or from `price_forecast.toml` if it exists
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let file = match path {
            Some(path) if !path.is_file() => {
                return Err(SettingsError::MissingFile(path.to_path_buf()))
            }
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        Self::figment(&file).extract().map_err(SettingsError::from)
    }

    fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(PipelineSettings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Resolve the storage mode, letting `explicit` win over the configured one
    pub fn resolve_mode(&self, explicit: Option<Mode>, env: &EnvSnapshot) -> Mode {
        self.store
            .mode_resolver()
            .resolve(explicit.or(self.mode), env)
    }
}
