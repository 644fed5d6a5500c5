//! Managed feature store and model registry over HTTP
//!
//! The remote variant forwards every call to the managed store's REST API
//! and inherits its consistency: reads after writes are strong within one
//! client session, other sessions may see the write later. Batches are
//! validated with the same [`FeatureTable`] conversion the local backend
//! uses, so schema and in-batch duplicate errors are raised before any
//! request is sent.

use crate::backend::{GroupMetadata, InsertSummary};
use crate::config::RemoteSettings;
use crate::error::{Result, StoreError};
use crate::frame::{FeatureRow, FeatureTable};
use crate::mode::EnvSnapshot;
use crate::model::{ModelArtifact, ModelDraft, ModelMetadata};
use crate::range::DateRange;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::AUTHORIZATION;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct CreateGroupRequest<'a> {
    primary_key: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct InsertRequest {
    columns: Vec<String>,
    rows: Vec<FeatureRow>,
}

#[derive(Debug, Deserialize)]
struct RowsResponse {
    #[serde(default)]
    columns: Vec<String>,
    rows: Vec<FeatureRow>,
}

#[derive(Debug, Serialize)]
struct SaveModelRequest<'a> {
    description: &'a str,
    metrics: &'a BTreeMap<String, f64>,
    files: &'a BTreeMap<String, Vec<u8>>,
}

/// Authenticated HTTP client shared by every handle of one backend
struct RemoteSession {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl RemoteSession {
    /// Endpoint with `segments` appended, each percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                StoreError::BackendUnavailable(format!(
                    "endpoint {} cannot take a path",
                    self.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send with credentials and map the status onto the store's error taxonomy
    fn execute(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .header(AUTHORIZATION, format!("ApiKey {}", self.api_key))
            .send()
            .map_err(|e| StoreError::BackendUnavailable(format!("{}: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let detail = if body.trim().is_empty() {
            format!("{}: HTTP {}", what, status)
        } else {
            format!("{}: HTTP {}: {}", what, status, body.trim())
        };
        Err(match status {
            StatusCode::NOT_FOUND => StoreError::NotFound(detail),
            StatusCode::CONFLICT => StoreError::DuplicateKey(detail),
            StatusCode::UNPROCESSABLE_ENTITY => StoreError::Schema(detail),
            _ => StoreError::BackendUnavailable(detail),
        })
    }

    fn execute_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        self.execute(request, what)?.json::<T>().map_err(|e| {
            StoreError::BackendUnavailable(format!("{}: malformed response: {}", what, e))
        })
    }
}

/// Backend talking to the managed store
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    session: Arc<RemoteSession>,
}

impl RemoteBackend {
    /// Build an authenticated client. No request is made until the first call.
    pub fn connect(settings: &RemoteSettings, env: &EnvSnapshot) -> Result<Self> {
        let api_key = env.non_empty(&settings.credential_var).ok_or_else(|| {
            StoreError::BackendUnavailable(format!(
                "{} not found in environment; set it or use --mode local",
                settings.credential_var
            ))
        })?;
        let endpoint = settings
            .endpoint
            .as_deref()
            .map(|e| e.trim().trim_end_matches('/'))
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                StoreError::BackendUnavailable("no remote endpoint configured".to_string())
            })?;
        let endpoint = Url::parse(endpoint).map_err(|e| {
            StoreError::BackendUnavailable(format!("invalid remote endpoint {}: {}", endpoint, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| StoreError::BackendUnavailable(format!("http client: {}", e)))?;

        info!(endpoint = %endpoint, "connected to managed feature store");
        Ok(Self {
            session: Arc::new(RemoteSession {
                client,
                endpoint,
                api_key: api_key.to_string(),
            }),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.session.endpoint.as_str()
    }

    pub fn get_or_create_feature_group(
        &self,
        name: &str,
        version: u32,
        primary_key: &str,
        description: &str,
    ) -> Result<RemoteFeatureGroup> {
        let version_text = version.to_string();
        let url = self.session.url(&["feature-groups", name, version_text.as_str()])?;
        let request = self.session.client.put(url).json(&CreateGroupRequest {
            primary_key,
            description,
        });
        let metadata: GroupMetadata = self
            .session
            .execute_json(request, "get or create feature group")?;
        Ok(RemoteFeatureGroup {
            metadata,
            session: Arc::clone(&self.session),
        })
    }

    pub fn get_feature_group(&self, name: &str, version: u32) -> Result<RemoteFeatureGroup> {
        let version_text = version.to_string();
        let url = self.session.url(&["feature-groups", name, version_text.as_str()])?;
        let metadata: GroupMetadata = self
            .session
            .execute_json(self.session.client.get(url), "get feature group")?;
        Ok(RemoteFeatureGroup {
            metadata,
            session: Arc::clone(&self.session),
        })
    }

    pub fn model_store(&self) -> RemoteModelStore {
        RemoteModelStore {
            session: Arc::clone(&self.session),
        }
    }
}

/// A feature group held by the managed store
#[derive(Debug, Clone)]
pub struct RemoteFeatureGroup {
    metadata: GroupMetadata,
    session: Arc<RemoteSession>,
}

impl RemoteFeatureGroup {
    pub fn metadata(&self) -> &GroupMetadata {
        &self.metadata
    }

    fn rows_url(&self) -> Result<Url> {
        let version_text = self.metadata.version.to_string();
        self.session
            .url(&["feature-groups", self.metadata.name.as_str(), version_text.as_str(), "rows"])
    }

    pub fn insert_table(&self, incoming: FeatureTable, overwrite: bool) -> Result<InsertSummary> {
        let body = InsertRequest {
            columns: incoming.columns().to_vec(),
            rows: incoming.rows(),
        };
        let request = self
            .session
            .client
            .post(self.rows_url()?)
            .query(&[("overwrite", overwrite)])
            .json(&body);
        let summary: InsertSummary = self.session.execute_json(request, "insert rows")?;
        info!(
            group = %self.metadata.name,
            version = self.metadata.version,
            inserted = summary.inserted,
            replaced = summary.replaced,
            total = summary.total,
            "inserted rows into managed feature group"
        );
        Ok(summary)
    }

    pub fn read_table(&self, range: Option<DateRange>) -> Result<FeatureTable> {
        let mut request = self.session.client.get(self.rows_url()?);
        if let Some(range) = range {
            request = request.query(&[
                ("start", range.start().to_string()),
                ("end", range.end().to_string()),
            ]);
        }
        let response: RowsResponse = self.session.execute_json(request, "read rows")?;
        debug!(group = %self.metadata.name, rows = response.rows.len(), "read managed feature group");
        FeatureTable::from_rows(
            self.metadata.primary_key.clone(),
            response.columns,
            response.rows,
        )
    }
}

/// The managed store's model registry
#[derive(Debug, Clone)]
pub struct RemoteModelStore {
    session: Arc<RemoteSession>,
}

impl RemoteModelStore {
    pub fn save(&self, name: &str, draft: ModelDraft) -> Result<ModelArtifact> {
        let url = self.session.url(&["models", name, "versions"])?;
        let request = self.session.client.post(url).json(&SaveModelRequest {
            description: &draft.description,
            metrics: &draft.metrics,
            files: &draft.files,
        });
        let metadata: ModelMetadata = self.session.execute_json(request, "save model")?;
        info!(model = name, version = metadata.version, "registered model artifact");
        Ok(ModelArtifact {
            metadata,
            files: draft.files,
        })
    }

    pub fn get(&self, name: &str, version: u32) -> Result<ModelArtifact> {
        let version_text = version.to_string();
        let url = self.session.url(&["models", name, "versions", version_text.as_str()])?;
        self.session
            .execute_json(self.session.client.get(url), "get model")
    }

    pub fn latest(&self, name: &str) -> Result<ModelArtifact> {
        let url = self.session.url(&["models", name, "latest"])?;
        self.session
            .execute_json(self.session.client.get(url), "get latest model")
    }

    pub fn versions(&self, name: &str) -> Result<Vec<u32>> {
        let url = self.session.url(&["models", name, "versions"])?;
        let mut versions: Vec<u32> = self
            .session
            .execute_json(self.session.client.get(url), "list model versions")?;
        versions.sort_unstable();
        Ok(versions)
    }
}
