//! File-backed storage backend
//!
//! Feature groups live under `<features_dir>` as one parquet file per
//! `(name, version)` next to a JSON metadata file; the metadata file is what
//! makes a group exist. Models live under `<models_dir>/<name>/v<version>/`
//! with a `LATEST` pointer file per name.

use crate::atomic::{write_atomic, write_bytes_atomic};
use crate::backend::{GroupMetadata, InsertSummary};
use crate::config::LocalSettings;
use crate::error::{Result, StoreError};
use crate::frame::FeatureTable;
use crate::model::{ModelArtifact, ModelDraft, ModelMetadata, METADATA_FILE};
use crate::range::DateRange;
use chrono::Utc;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Pointer file naming the latest version of a model
pub const LATEST_FILE: &str = "LATEST";

/// Local file-system backend
#[derive(Debug, Clone)]
pub struct LocalBackend {
    features_dir: PathBuf,
    models_dir: PathBuf,
}

impl LocalBackend {
    pub fn new(features_dir: impl Into<PathBuf>, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            features_dir: features_dir.into(),
            models_dir: models_dir.into(),
        }
    }

    pub fn from_settings(settings: &LocalSettings) -> Self {
        Self::new(&settings.features_dir, &settings.models_dir)
    }

    pub fn features_dir(&self) -> &Path {
        &self.features_dir
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn get_or_create_feature_group(
        &self,
        name: &str,
        version: u32,
        primary_key: &str,
        description: &str,
    ) -> Result<LocalFeatureGroup> {
        let (data_path, meta_path) = self.group_paths(name, version);
        if meta_path.exists() {
            debug!(name, version, "feature group already exists");
            return LocalFeatureGroup::open(data_path, meta_path);
        }

        let metadata = GroupMetadata {
            name: name.to_string(),
            version,
            primary_key: primary_key.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        write_atomic(&meta_path, |file: &mut File| -> Result<()> {
            serde_json::to_writer_pretty(file, &metadata)?;
            Ok(())
        })?;
        info!(name, version, path = %meta_path.display(), "created feature group");

        Ok(LocalFeatureGroup {
            metadata,
            data_path,
            meta_path,
        })
    }

    pub fn get_feature_group(&self, name: &str, version: u32) -> Result<LocalFeatureGroup> {
        let (data_path, meta_path) = self.group_paths(name, version);
        if !meta_path.exists() {
            return Err(group_not_found(name, version));
        }
        LocalFeatureGroup::open(data_path, meta_path)
    }

    pub fn model_store(&self) -> LocalModelStore {
        LocalModelStore {
            root: self.models_dir.clone(),
        }
    }

    fn group_paths(&self, name: &str, version: u32) -> (PathBuf, PathBuf) {
        let stem = format!("{}_v{}", name, version);
        (
            self.features_dir.join(format!("{}.parquet", stem)),
            self.features_dir.join(format!("{}.meta.json", stem)),
        )
    }
}

/// A feature group stored as a parquet file
#[derive(Debug, Clone)]
pub struct LocalFeatureGroup {
    metadata: GroupMetadata,
    data_path: PathBuf,
    meta_path: PathBuf,
}

impl LocalFeatureGroup {
    fn open(data_path: PathBuf, meta_path: PathBuf) -> Result<Self> {
        let metadata: GroupMetadata = serde_json::from_reader(File::open(&meta_path)?)?;
        Ok(Self {
            metadata,
            data_path,
            meta_path,
        })
    }

    pub fn metadata(&self) -> &GroupMetadata {
        &self.metadata
    }

    /// Path of the parquet file holding the rows
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Load, merge and atomically re-persist the whole group
    pub fn insert_table(&self, incoming: FeatureTable, overwrite: bool) -> Result<InsertSummary> {
        self.ensure_exists()?;
        let batch_rows = incoming.len();
        let mut table = self.load()?;
        let outcome = table.merge(incoming, overwrite)?;
        self.persist(&table)?;

        info!(
            group = %self.metadata.name,
            version = self.metadata.version,
            batch_rows,
            inserted = outcome.inserted,
            replaced = outcome.replaced,
            total = table.len(),
            "inserted rows into feature group"
        );
        Ok(InsertSummary {
            inserted: outcome.inserted,
            replaced: outcome.replaced,
            total: table.len(),
        })
    }

    pub fn read_table(&self, range: Option<DateRange>) -> Result<FeatureTable> {
        self.ensure_exists()?;
        let table = self.load()?;
        debug!(
            group = %self.metadata.name,
            rows = table.len(),
            path = %self.data_path.display(),
            "loaded feature group"
        );
        Ok(match range {
            Some(range) => table.filter_range(&range),
            None => table,
        })
    }

    fn ensure_exists(&self) -> Result<()> {
        if self.meta_path.exists() {
            Ok(())
        } else {
            Err(group_not_found(&self.metadata.name, self.metadata.version))
        }
    }

    fn load(&self) -> Result<FeatureTable> {
        if !self.data_path.exists() {
            return Ok(FeatureTable::new(self.metadata.primary_key.clone()));
        }
        let file = File::open(&self.data_path)?;
        let df = ParquetReader::new(file).finish()?;
        FeatureTable::from_dataframe(&df, &self.metadata.primary_key)
    }

    fn persist(&self, table: &FeatureTable) -> Result<()> {
        let mut df = table.to_dataframe()?;
        write_atomic(&self.data_path, |file: &mut File| -> Result<()> {
            ParquetWriter::new(file).finish(&mut df)?;
            Ok(())
        })
    }
}

/// Model artifacts stored as one directory per version
#[derive(Debug, Clone)]
pub struct LocalModelStore {
    root: PathBuf,
}

impl LocalModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write the version directory, rename it into place, then move the pointer.
    ///
    /// The next version is one past the highest directory on disk, not the
    /// pointer, so a failure between the rename and the pointer update never
    /// hands out the same number twice.
    pub fn save(&self, name: &str, draft: ModelDraft) -> Result<ModelArtifact> {
        let model_dir = self.root.join(name);
        fs::create_dir_all(&model_dir)?;
        let version = scan_versions(&model_dir)?.last().copied().unwrap_or(0) + 1;

        let metadata = ModelMetadata {
            name: name.to_string(),
            version,
            created_at: Utc::now(),
            description: draft.description,
            metrics: draft.metrics,
        };

        let staging = model_dir.join(format!(".v{}.partial", version));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        if let Err(err) = write_version_dir(&staging, &metadata, &draft.files) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }
        fs::rename(&staging, model_dir.join(version_dir_name(version)))?;
        write_bytes_atomic(model_dir.join(LATEST_FILE), version.to_string().as_bytes())?;

        info!(model = name, version, files = draft.files.len(), "saved model artifact");
        Ok(ModelArtifact {
            metadata,
            files: draft.files,
        })
    }

    pub fn get(&self, name: &str, version: u32) -> Result<ModelArtifact> {
        let dir = self.root.join(name).join(version_dir_name(version));
        if !dir.is_dir() {
            return Err(StoreError::NotFound(format!(
                "Model {} v{} not found",
                name, version
            )));
        }

        let metadata: ModelMetadata =
            serde_json::from_reader(File::open(dir.join(METADATA_FILE))?)?;
        let mut files = BTreeMap::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name == METADATA_FILE || !entry.file_type()?.is_file() {
                continue;
            }
            files.insert(file_name, fs::read(entry.path())?);
        }
        debug!(model = name, version, files = files.len(), "loaded model artifact");
        Ok(ModelArtifact { metadata, files })
    }

    pub fn latest(&self, name: &str) -> Result<ModelArtifact> {
        let pointer = self.root.join(name).join(LATEST_FILE);
        if !pointer.exists() {
            return Err(StoreError::NotFound(format!(
                "Model {} has no saved versions",
                name
            )));
        }
        let text = fs::read_to_string(&pointer)?;
        let version = text.trim().parse::<u32>().map_err(|_| {
            StoreError::Validation(format!(
                "latest pointer {} is corrupt: '{}'",
                pointer.display(),
                text.trim()
            ))
        })?;
        self.get(name, version)
    }

    pub fn versions(&self, name: &str) -> Result<Vec<u32>> {
        let model_dir = self.root.join(name);
        let versions = if model_dir.is_dir() {
            scan_versions(&model_dir)?
        } else {
            Vec::new()
        };
        if versions.is_empty() {
            return Err(StoreError::NotFound(format!(
                "Model {} has no saved versions",
                name
            )));
        }
        Ok(versions)
    }
}

fn version_dir_name(version: u32) -> String {
    format!("v{}", version)
}

/// Completed version directories under a model directory, ascending
fn scan_versions(model_dir: &Path) -> Result<Vec<u32>> {
    let mut versions = Vec::new();
    for entry in fs::read_dir(model_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let version = entry
            .file_name()
            .to_str()
            .and_then(|n| n.strip_prefix('v'))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(version) = version {
            versions.push(version);
        }
    }
    versions.sort_unstable();
    Ok(versions)
}

fn write_version_dir(
    dir: &Path,
    metadata: &ModelMetadata,
    files: &BTreeMap<String, Vec<u8>>,
) -> Result<()> {
    fs::create_dir_all(dir)?;
    for (name, bytes) in files {
        let mut file = File::create(dir.join(name))?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    let mut file = File::create(dir.join(METADATA_FILE))?;
    serde_json::to_writer_pretty(&mut file, metadata)?;
    file.sync_all()?;
    Ok(())
}

fn group_not_found(name: &str, version: u32) -> StoreError {
    StoreError::NotFound(format!("Feature group {} v{} not found", name, version))
}
