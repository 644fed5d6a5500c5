//! Versioned model artifacts

use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File name reserved for artifact metadata inside a version directory
pub const METADATA_FILE: &str = "metadata.json";

/// Metadata the store keeps for every saved model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    /// Assigned by the store, starting at 1 and increasing per name
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub description: String,
    /// Training metric summary, e.g. `test_rmse`
    pub metrics: BTreeMap<String, f64>,
}

/// A model that has not been saved yet: opaque files plus descriptive metadata
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelDraft {
    pub description: String,
    pub metrics: BTreeMap<String, f64>,
    pub files: BTreeMap<String, Vec<u8>>,
}

impl ModelDraft {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.into(), bytes.into());
        self
    }

    /// A draft needs at least one file, and file names must be plain names
    pub fn validate(&self) -> Result<()> {
        if self.files.is_empty() {
            return Err(StoreError::Validation(
                "model draft has no files".to_string(),
            ));
        }
        for name in self.files.keys() {
            if name == METADATA_FILE {
                return Err(StoreError::Validation(format!(
                    "'{}' is reserved for artifact metadata",
                    METADATA_FILE
                )));
            }
            crate::backend::validate_name("model file", name)?;
        }
        if let Some((name, _)) = self.metrics.iter().find(|(_, v)| !v.is_finite()) {
            return Err(StoreError::Validation(format!(
                "metric '{}' is not a finite number",
                name
            )));
        }
        Ok(())
    }
}

/// A saved model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub files: BTreeMap<String, Vec<u8>>,
}

impl ModelArtifact {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> u32 {
        self.metadata.version
    }

    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }
}

impl std::fmt::Display for ModelMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Model {} v{}", self.name, self.version)?;
        writeln!(f, "  Created:     {}", self.created_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        if !self.description.is_empty() {
            writeln!(f, "  Description: {}", self.description)?;
        }
        for (name, value) in &self.metrics {
            writeln!(f, "  {:<12} {:.4}", format!("{}:", name), value)?;
        }
        Ok(())
    }
}
