//! # Feature Store
//!
//! Storage for a date-keyed feature group and versioned model artifacts that
//! runs the same pipeline code against local files or a managed store.
//!
//! ## Modes
//!
//! A [`Mode`] is resolved once per process by [`ModeResolver`]: an explicit
//! choice wins, otherwise the presence of the store credential
//! (`HOPSWORKS_API_KEY` by default) selects the remote backend.
//!
//! ## Quick Start
//!
//! ```no_run
//! use feature_store::{EnvSnapshot, ModeResolver, StorageBackend, StoreSettings};
//! use polars::prelude::*;
//!
//! let settings = StoreSettings::default();
//! let env = EnvSnapshot::capture();
//! let mode = ModeResolver::default().resolve(None, &env);
//! let backend = StorageBackend::open(mode, &settings, &env)?;
//!
//! let group = backend.get_or_create_feature_group(
//!     "electricity_price",
//!     1,
//!     "date",
//!     "Daily electricity prices with weather features",
//! )?;
//! let batch = df!(
//!     "date" => &["2024-01-01", "2024-01-02"],
//!     "price_sek_kwh_mean" => &[0.82, 0.91]
//! )?;
//! group.insert(&batch, true)?;
//! let history = group.read(None)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod atomic;
pub mod backend;
pub mod config;
pub mod error;
pub mod frame;
pub mod local;
pub mod mode;
pub mod model;
pub mod range;
pub mod remote;

// Re-export commonly used types
pub use crate::backend::{FeatureGroup, GroupMetadata, InsertSummary, ModelStore, StorageBackend};
pub use crate::config::{LocalSettings, RemoteSettings, StoreSettings};
pub use crate::error::{Result, StoreError};
pub use crate::frame::{FeatureRow, FeatureTable};
pub use crate::mode::{EnvSnapshot, Mode, ModeResolver, DEFAULT_CREDENTIAL_VAR};
pub use crate::model::{ModelArtifact, ModelDraft, ModelMetadata};
pub use crate::range::DateRange;
