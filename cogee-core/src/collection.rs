//! Make sure a target image collection exists.
//!
//! Only the leaf is ever created. A missing parent folder is a configuration
//! error and leaves the asset tree untouched.

use tracing::{error, info, warn};

use crate::asset_id;
use crate::contract::{AssetKind, AssetStore};
use crate::error::{ApiError, CogeeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The collection was already there.
    Existing,
    Created,
}

/// Checks `collection` (a cloud asset path) and creates it when absent.
pub async fn ensure_collection<S>(store: &S, collection: &str) -> Result<EnsureOutcome, CogeeError>
where
    S: AssetStore + ?Sized,
{
    match store.get_asset(collection).await? {
        Some(info) if info.kind == AssetKind::ImageCollection => {
            info!(collection, "Collection exists");
            return Ok(EnsureOutcome::Existing);
        }
        Some(info) => {
            error!(collection, kind = ?info.kind, "Asset exists but is not an image collection");
            return Err(CogeeError::Configuration(format!(
                "{collection} exists but is a {:?}, not an image collection",
                info.kind
            )));
        }
        None => info!(collection, "Collection does not exist, creating"),
    }

    if let Some(parent) = asset_id::parent(collection) {
        if !asset_id::is_project_root(parent) {
            match store.get_asset(parent).await? {
                Some(info) if matches!(info.kind, AssetKind::Folder | AssetKind::ImageCollection) => {}
                Some(info) => {
                    return Err(CogeeError::Configuration(format!(
                        "parent {parent} of {collection} is a {:?}, not a folder",
                        info.kind
                    )));
                }
                None => {
                    error!(collection, parent, "Parent folder does not exist");
                    return Err(missing_parent(collection, parent));
                }
            }
        }
    }

    match store.create_collection(collection).await {
        Ok(created) => {
            info!(collection = %created.name, "Created image collection");
            Ok(EnsureOutcome::Created)
        }
        Err(ApiError::NotFound(body)) => {
            warn!(collection, body = %body, "Service reported a missing parent while creating collection");
            Err(missing_parent(
                collection,
                asset_id::parent(collection).unwrap_or(collection),
            ))
        }
        Err(e) => {
            error!(collection, error = ?e, "Failed to create collection");
            Err(e.into())
        }
    }
}

fn missing_parent(collection: &str, parent: &str) -> CogeeError {
    CogeeError::Configuration(format!(
        "cannot create {collection}: parent {parent} does not exist (create it first, cogee only creates the collection itself)"
    ))
}
