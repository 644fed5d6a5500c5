//! Settings for constructing storage backends

use crate::mode::{ModeResolver, DEFAULT_CREDENTIAL_VAR};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for both backend variants
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub local: LocalSettings,
    pub remote: RemoteSettings,
}

impl StoreSettings {
    /// The resolver recognizing the configured credential variable
    pub fn mode_resolver(&self) -> ModeResolver {
        ModeResolver::new(self.remote.credential_var.clone())
    }
}

/// Where the local backend keeps its files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    pub features_dir: PathBuf,
    pub models_dir: PathBuf,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            features_dir: PathBuf::from("data/processed"),
            models_dir: PathBuf::from("data/models"),
        }
    }
}

/// How to reach the managed store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Base URL of the managed store API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Environment variable holding the access key
    pub credential_var: String,
    pub timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            credential_var: DEFAULT_CREDENTIAL_VAR.to_string(),
            timeout_secs: 30,
        }
    }
}
