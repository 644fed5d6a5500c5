//! The storage capability shared by the local and remote backends
//!
//! Pipeline code talks to [`StorageBackend`], [`FeatureGroup`] and
//! [`ModelStore`]. Each is a tagged union over the two variants, selected once
//! from the resolved [`Mode`], so the same code runs against local files or
//! the managed store.

use crate::config::StoreSettings;
use crate::error::{Result, StoreError};
use crate::frame::FeatureTable;
use crate::local::{LocalBackend, LocalFeatureGroup, LocalModelStore};
use crate::mode::{EnvSnapshot, Mode};
use crate::model::{ModelArtifact, ModelDraft};
use crate::range::DateRange;
use crate::remote::{RemoteBackend, RemoteFeatureGroup, RemoteModelStore};
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Descriptive metadata of a feature group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMetadata {
    pub name: String,
    pub version: u32,
    pub primary_key: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Counts reported by a feature-group insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InsertSummary {
    /// Rows with keys new to the group
    pub inserted: usize,
    /// Rows that replaced an existing row (overwrite only)
    pub replaced: usize,
    /// Rows in the group after the insert
    pub total: usize,
}

/// A concrete storage implementation chosen by [`Mode`]
#[derive(Debug, Clone)]
pub enum StorageBackend {
    Local(LocalBackend),
    Remote(RemoteBackend),
}

impl StorageBackend {
    /// Open the backend for an already-resolved mode.
    ///
    /// The remote variant reads its credential from `env`; a missing key
    /// surfaces here as `BackendUnavailable`.
    pub fn open(mode: Mode, settings: &StoreSettings, env: &EnvSnapshot) -> Result<Self> {
        let backend = match mode {
            Mode::Local => StorageBackend::Local(LocalBackend::from_settings(&settings.local)),
            Mode::Remote => {
                StorageBackend::Remote(RemoteBackend::connect(&settings.remote, env)?)
            }
        };
        info!(mode = %mode, "opened storage backend");
        Ok(backend)
    }

    pub fn mode(&self) -> Mode {
        match self {
            StorageBackend::Local(_) => Mode::Local,
            StorageBackend::Remote(_) => Mode::Remote,
        }
    }

    /// Return the group `(name, version)`, creating it with this metadata if absent.
    ///
    /// An existing group is returned as stored; its primary key and description
    /// are not compared with the arguments.
    pub fn get_or_create_feature_group(
        &self,
        name: &str,
        version: u32,
        primary_key: &str,
        description: &str,
    ) -> Result<FeatureGroup> {
        validate_name("feature group", name)?;
        validate_name("primary key", primary_key)?;
        match self {
            StorageBackend::Local(b) => b
                .get_or_create_feature_group(name, version, primary_key, description)
                .map(FeatureGroup::Local),
            StorageBackend::Remote(b) => b
                .get_or_create_feature_group(name, version, primary_key, description)
                .map(FeatureGroup::Remote),
        }
    }

    /// Return an existing group, failing with `NotFound` if it was never created
    pub fn get_feature_group(&self, name: &str, version: u32) -> Result<FeatureGroup> {
        validate_name("feature group", name)?;
        match self {
            StorageBackend::Local(b) => b.get_feature_group(name, version).map(FeatureGroup::Local),
            StorageBackend::Remote(b) => {
                b.get_feature_group(name, version).map(FeatureGroup::Remote)
            }
        }
    }

    pub fn get_model_store(&self) -> ModelStore {
        match self {
            StorageBackend::Local(b) => ModelStore::Local(b.model_store()),
            StorageBackend::Remote(b) => ModelStore::Remote(b.model_store()),
        }
    }
}

/// Handle to one versioned, date-keyed feature group
#[derive(Debug, Clone)]
pub enum FeatureGroup {
    Local(LocalFeatureGroup),
    Remote(RemoteFeatureGroup),
}

impl FeatureGroup {
    pub fn metadata(&self) -> &GroupMetadata {
        match self {
            FeatureGroup::Local(g) => g.metadata(),
            FeatureGroup::Remote(g) => g.metadata(),
        }
    }

    /// Upsert a batch keyed by the group's primary key.
    ///
    /// With `overwrite` rows sharing a key are replaced; without it any
    /// collision fails with `DuplicateKey` and nothing is written.
    pub fn insert(&self, batch: &DataFrame, overwrite: bool) -> Result<InsertSummary> {
        let incoming = FeatureTable::from_dataframe(batch, &self.metadata().primary_key)?;
        match self {
            FeatureGroup::Local(g) => g.insert_table(incoming, overwrite),
            FeatureGroup::Remote(g) => g.insert_table(incoming, overwrite),
        }
    }

    /// A copy of the group's rows, optionally restricted to an inclusive date range
    pub fn read(&self, range: Option<DateRange>) -> Result<DataFrame> {
        self.read_table(range)?.to_dataframe()
    }

    /// Like [`FeatureGroup::read`] but returning the typed table
    pub fn read_table(&self, range: Option<DateRange>) -> Result<FeatureTable> {
        match self {
            FeatureGroup::Local(g) => g.read_table(range),
            FeatureGroup::Remote(g) => g.read_table(range),
        }
    }
}

/// Versioned model persistence of a backend
#[derive(Debug, Clone)]
pub enum ModelStore {
    Local(LocalModelStore),
    Remote(RemoteModelStore),
}

impl ModelStore {
    /// Save a new version of `name`; the store assigns the version number
    pub fn save(&self, name: &str, draft: ModelDraft) -> Result<ModelArtifact> {
        validate_name("model", name)?;
        draft.validate()?;
        match self {
            ModelStore::Local(s) => s.save(name, draft),
            ModelStore::Remote(s) => s.save(name, draft),
        }
    }

    pub fn get(&self, name: &str, version: u32) -> Result<ModelArtifact> {
        validate_name("model", name)?;
        match self {
            ModelStore::Local(s) => s.get(name, version),
            ModelStore::Remote(s) => s.get(name, version),
        }
    }

    /// The version the latest pointer names
    pub fn latest(&self, name: &str) -> Result<ModelArtifact> {
        validate_name("model", name)?;
        match self {
            ModelStore::Local(s) => s.latest(name),
            ModelStore::Remote(s) => s.latest(name),
        }
    }

    /// All saved versions of `name`, ascending
    pub fn versions(&self, name: &str) -> Result<Vec<u32>> {
        validate_name("model", name)?;
        match self {
            ModelStore::Local(s) => s.versions(name),
            ModelStore::Remote(s) => s.versions(name),
        }
    }
}

/// Names end up in file paths and URLs, so they must be single plain segments
pub(crate) fn validate_name(kind: &str, name: &str) -> Result<()> {
    let plain = !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(&['/', '\\', '?', '#'][..])
        && !name.chars().any(char::is_control);
    if plain {
        Ok(())
    } else {
        Err(StoreError::Validation(format!("invalid {} name: '{}'", kind, name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("electricity_price", true)]
    #[case("model.json", true)]
    #[case("", false)]
    #[case("..", false)]
    #[case("a/b", false)]
    #[case("a\\b", false)]
    fn test_validate_name(#[case] name: &str, #[case] ok: bool) {
        assert_eq!(validate_name("test", name).is_ok(), ok);
    }
}
