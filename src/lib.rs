//! # Price Forecast
//!
//! Storage and accuracy tracking for a daily commodity-price forecast
//! pipeline. The same code runs against files on the local disk or against a
//! managed feature store, chosen once at startup:
//!
//! - [`feature_store`]: mode resolution, feature groups and model artifacts
//! - [`forecast_tracker`]: the forecast log, reconciliation and metrics
//! - [`settings`]: layered configuration shared by the tools
//!
//! ## Example
//!
//! ```no_run
//! use price_forecast::settings::PipelineSettings;
//! use price_forecast::feature_store::{EnvSnapshot, StorageBackend};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = PipelineSettings::load(None)?;
//! let env = EnvSnapshot::capture();
//! let mode = settings.resolve_mode(None, &env);
//! let backend = StorageBackend::open(mode, &settings.store, &env)?;
//! let prices = backend.get_feature_group("electricity_price", 1)?;
//! println!("{}", prices.read(None)?);
//! # Ok(())
//! # }
//! ```

pub mod settings;

pub use feature_store;
pub use forecast_tracker;

pub use crate::settings::{PipelineSettings, SettingsError, TrackingSettings};
