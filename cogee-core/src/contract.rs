//! # contract: interfaces to Cloud Storage and Earth Engine
//!
//! Two traits describe everything the pipeline needs from the outside world:
//!
//! - [`StorageCatalog`]: enumerate buckets and objects in Cloud Storage.
//! - [`AssetStore`]: look up, list, create, delete and register Earth Engine assets.
//!
//! The `cogee` crate implements both over REST. Tests use the `mockall`
//! mocks (`MockStorageCatalog`, `MockAssetStore`) exported under the default
//! `test-export-mocks` feature.
//!
//! Implementations paginate internally and return complete results in service order.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A listed Cloud Storage object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Full object key, e.g. `tiles/a.tif`.
    pub name: String,
    pub size: Option<u64>,
    /// RFC 3339 creation time.
    pub time_created: Option<String>,
    /// RFC 3339 last update time.
    pub updated: Option<String>,
}

impl ObjectEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            time_created: None,
            updated: None,
        }
    }

    /// Directory part of the key; empty for objects at the bucket root.
    pub fn subfolder(&self) -> &str {
        self.name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// File name with the directory and final extension stripped.
    pub fn base_name(&self) -> &str {
        let file = self.file_name();
        file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file)
    }

    pub fn gcs_uri(&self, bucket: &str) -> String {
        format!("gs://{bucket}/{}", self.name)
    }
}

/// Earth Engine asset types the pipeline distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    ImageCollection,
    Folder,
    Other,
}

impl From<&str> for AssetKind {
    fn from(s: &str) -> Self {
        match s {
            "IMAGE" => AssetKind::Image,
            "IMAGE_COLLECTION" => AssetKind::ImageCollection,
            "FOLDER" => AssetKind::Folder,
            _ => AssetKind::Other,
        }
    }
}

/// Minimal view of an asset returned by lookups and listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    /// Full cloud path, `projects/{p}/assets/...`.
    pub name: String,
    pub kind: AssetKind,
}

/// How an object is turned into an Earth Engine asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationMode {
    /// `image:importExternal` with an image manifest.
    #[default]
    Manifest,
    /// `assets.create` with an `IMAGE` asset pointing at the object.
    Legacy,
}

impl FromStr for RegistrationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manifest" => Ok(RegistrationMode::Manifest),
            "legacy" => Ok(RegistrationMode::Legacy),
            other => Err(format!("unknown registration mode {other:?} (expected manifest or legacy)")),
        }
    }
}

impl fmt::Display for RegistrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationMode::Manifest => f.write_str("manifest"),
            RegistrationMode::Legacy => f.write_str("legacy"),
        }
    }
}

/// One external image registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRegistration {
    /// Target asset path, `{collection}/{base_name}`.
    pub asset_id: String,
    /// Source object, `gs://{bucket}/{name}`.
    pub uri: String,
    /// Explicit band ids in file band order; empty lets Earth Engine name them.
    pub band_names: Vec<String>,
    pub file_size_bytes: Option<u64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Replace an asset already at `asset_id`.
    pub overwrite: bool,
    pub mode: RegistrationMode,
}

/// Read access to Cloud Storage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StorageCatalog: Send + Sync {
    /// Names of all buckets in `project` visible to the caller.
    async fn list_buckets(&self, project: &str) -> Result<Vec<String>, ApiError>;

    /// All objects in `bucket` whose key starts with `prefix` (empty for all).
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>, ApiError>;
}

/// Asset management in Earth Engine.
///
/// All asset ids are cloud paths (see [`crate::asset_id::normalize`]).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// `Ok(None)` when the asset does not exist.
    async fn get_asset(&self, asset_id: &str) -> Result<Option<AssetInfo>, ApiError>;

    /// Direct children of a folder or collection.
    async fn list_children(&self, parent: &str) -> Result<Vec<AssetInfo>, ApiError>;

    /// Create an empty image collection. The parent must exist.
    async fn create_collection(&self, asset_id: &str) -> Result<AssetInfo, ApiError>;

    async fn delete_asset(&self, asset_id: &str) -> Result<(), ApiError>;

    /// Register an external image backed by a Cloud Storage object.
    async fn register_image(&self, registration: ImageRegistration) -> Result<(), ApiError>;
}
