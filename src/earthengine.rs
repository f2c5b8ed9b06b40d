//! Earth Engine REST client implementing [`AssetStore`].
//!
//! Asset lookups, listings, creation and deletion use the `v1` surface.
//! Manifest registration goes through `v1alpha/projects/{project}/image:importExternal`,
//! the legacy mode creates an `IMAGE` asset with a `gcsLocation` through `v1`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use cogee_core::asset_id;
use cogee_core::contract::{AssetInfo, AssetKind, AssetStore, ImageRegistration, RegistrationMode};
use cogee_core::ApiError;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::Session;
use crate::http::{check, decode};

pub const DEFAULT_BASE_URL: &str = "https://earthengine.googleapis.com";

#[derive(Debug, Deserialize)]
struct AssetResource {
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
}

impl From<AssetResource> for AssetInfo {
    fn from(resource: AssetResource) -> Self {
        AssetInfo {
            kind: AssetKind::from(resource.kind.as_str()),
            name: resource.name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetPage {
    #[serde(default)]
    assets: Vec<AssetResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportExternalRequest {
    image_manifest: ImageManifest,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    overwrite: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageManifest {
    name: String,
    tilesets: Vec<Tileset>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bands: Vec<Band>,
    properties: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<String>,
}

#[derive(Debug, Serialize)]
struct Tileset {
    id: String,
    sources: Vec<Source>,
}

#[derive(Debug, Serialize)]
struct Source {
    uris: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Band {
    id: String,
    tileset_id: String,
    tileset_band_index: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExternalImageAsset {
    #[serde(rename = "type")]
    kind: &'static str,
    gcs_location: Source,
    properties: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<String>,
}

fn properties(registration: &ImageRegistration) -> BTreeMap<String, Value> {
    let mut properties = BTreeMap::new();
    if let Some(size) = registration.file_size_bytes {
        properties.insert("file_size_bytes".to_string(), Value::from(size));
    }
    properties
}

fn manifest_request(registration: &ImageRegistration) -> ImportExternalRequest {
    let tileset_id = "0".to_string();
    ImportExternalRequest {
        image_manifest: ImageManifest {
            name: registration.asset_id.clone(),
            tilesets: vec![Tileset {
                id: tileset_id.clone(),
                sources: vec![Source {
                    uris: vec![registration.uri.clone()],
                }],
            }],
            bands: registration
                .band_names
                .iter()
                .enumerate()
                .map(|(index, id)| Band {
                    id: id.clone(),
                    tileset_id: tileset_id.clone(),
                    tileset_band_index: index,
                })
                .collect(),
            properties: properties(registration),
            start_time: registration.start_time.clone(),
            end_time: registration.end_time.clone(),
        },
        overwrite: registration.overwrite,
    }
}

fn legacy_asset(registration: &ImageRegistration) -> ExternalImageAsset {
    ExternalImageAsset {
        kind: "IMAGE",
        gcs_location: Source {
            uris: vec![registration.uri.clone()],
        },
        properties: properties(registration),
        start_time: registration.start_time.clone(),
        end_time: registration.end_time.clone(),
    }
}

/// `projects/p/assets/a/b` → (`projects/p`, `a/b`), the `assets.create` parent and id.
fn create_target(asset: &str) -> Result<(String, String), ApiError> {
    let project = asset_id::project_of(asset)
        .ok_or_else(|| ApiError::Rejected { status: 400, body: format!("{asset} is not a cloud asset path") })?;
    let prefix = format!("projects/{project}/assets/");
    let relative = asset
        .strip_prefix(&prefix)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::Rejected { status: 400, body: format!("{asset} has no asset id below the project root") })?;
    Ok((format!("projects/{project}"), relative.to_string()))
}

pub struct EarthEngineClient {
    base_url: String,
    client: Client,
    session: Arc<Session>,
}

impl EarthEngineClient {
    pub fn new(session: Arc<Session>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, session)
    }

    pub fn with_base_url(base_url: impl Into<String>, session: Arc<Session>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            session,
        }
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let token = self.session.access_token().await?;
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.client.request(method, url).bearer_auth(token);
        if let Some(project) = self.session.project() {
            request = request.header("x-goog-user-project", project);
        }
        Ok(request)
    }

    /// Project billed for registration calls: the session's, else the asset's own.
    fn quota_project<'a>(&'a self, asset: &'a str) -> Result<&'a str, ApiError> {
        self.session
            .project()
            .or_else(|| asset_id::project_of(asset))
            .ok_or_else(|| ApiError::Auth("no project available for Earth Engine requests".into()))
    }

    /// Lists the project's asset root; proves the project is registered for Earth Engine.
    pub async fn verify_project(&self, project: &str) -> Result<usize, ApiError> {
        let path = format!("v1/projects/{project}:listAssets");
        let page: AssetPage = decode(
            self.request(Method::GET, &path)
                .await?
                .query(&[("pageSize", "1")])
                .send()
                .await
                .map_err(ApiError::transport)?,
        )
        .await?;
        info!(project, "Earth Engine project is reachable");
        Ok(page.assets.len())
    }
}

#[async_trait]
impl AssetStore for EarthEngineClient {
    async fn get_asset(&self, asset_id: &str) -> Result<Option<AssetInfo>, ApiError> {
        let response = self
            .request(Method::GET, &format!("v1/{asset_id}"))
            .await?
            .send()
            .await
            .map_err(ApiError::transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(asset_id, "Asset not found");
            return Ok(None);
        }
        let resource: AssetResource = decode(response).await?;
        Ok(Some(resource.into()))
    }

    async fn list_children(&self, parent: &str) -> Result<Vec<AssetInfo>, ApiError> {
        let path = format!("v1/{parent}:listAssets");
        let mut assets = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.request(Method::GET, &path).await?;
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }
            let page: AssetPage =
                decode(request.send().await.map_err(ApiError::transport)?).await?;
            assets.extend(page.assets.into_iter().map(AssetInfo::from));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        debug!(parent, count = assets.len(), "Listed child assets");
        Ok(assets)
    }

    async fn create_collection(&self, asset_id: &str) -> Result<AssetInfo, ApiError> {
        let (parent, relative) = create_target(asset_id)?;
        let response = self
            .request(Method::POST, &format!("v1/{parent}/assets"))
            .await?
            .query(&[("assetId", relative.as_str())])
            .json(&serde_json::json!({ "type": "IMAGE_COLLECTION" }))
            .send()
            .await
            .map_err(ApiError::transport)?;
        let created: AssetResource = decode(response).await?;
        Ok(created.into())
    }

    async fn delete_asset(&self, asset_id: &str) -> Result<(), ApiError> {
        let response = self
            .request(Method::DELETE, &format!("v1/{asset_id}"))
            .await?
            .send()
            .await
            .map_err(ApiError::transport)?;
        check(response).await?;
        Ok(())
    }

    async fn register_image(&self, registration: ImageRegistration) -> Result<(), ApiError> {
        let response = match registration.mode {
            RegistrationMode::Manifest => {
                let project = self.quota_project(&registration.asset_id)?;
                self.request(
                    Method::POST,
                    &format!("v1alpha/projects/{project}/image:importExternal"),
                )
                .await?
                .json(&manifest_request(&registration))
                .send()
                .await
            }
            RegistrationMode::Legacy => {
                let (parent, relative) = create_target(&registration.asset_id)?;
                self.request(Method::POST, &format!("v1/{parent}/assets"))
                    .await?
                    .query(&[("assetId", relative.as_str())])
                    .json(&legacy_asset(&registration))
                    .send()
                    .await
            }
        }
        .map_err(ApiError::transport)?;

        check(response).await?;
        debug!(asset_id = %registration.asset_id, mode = %registration.mode, "Registration accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registration(band_names: Vec<String>, overwrite: bool) -> ImageRegistration {
        ImageRegistration {
            asset_id: "projects/p/assets/col/a".into(),
            uri: "gs://b1/tiles/a.tif".into(),
            band_names,
            file_size_bytes: Some(4096),
            start_time: Some("2024-01-01T00:00:00Z".into()),
            end_time: Some("2024-01-02T00:00:00Z".into()),
            overwrite,
            mode: RegistrationMode::Manifest,
        }
    }

    #[test]
    fn manifest_payload_without_bands() {
        let body = serde_json::to_value(manifest_request(&registration(vec![], false))).unwrap();
        assert_eq!(
            body,
            json!({
                "imageManifest": {
                    "name": "projects/p/assets/col/a",
                    "tilesets": [{"id": "0", "sources": [{"uris": ["gs://b1/tiles/a.tif"]}]}],
                    "properties": {"file_size_bytes": 4096},
                    "startTime": "2024-01-01T00:00:00Z",
                    "endTime": "2024-01-02T00:00:00Z"
                }
            })
        );
    }

    #[test]
    fn manifest_payload_with_bands_and_overwrite() {
        let body = serde_json::to_value(manifest_request(&registration(
            vec!["red".into(), "nir".into()],
            true,
        )))
        .unwrap();
        assert_eq!(body["overwrite"], json!(true));
        assert_eq!(
            body["imageManifest"]["bands"],
            json!([
                {"id": "red", "tilesetId": "0", "tilesetBandIndex": 0},
                {"id": "nir", "tilesetId": "0", "tilesetBandIndex": 1}
            ])
        );
    }

    #[test]
    fn legacy_payload_points_at_the_object() {
        let body = serde_json::to_value(legacy_asset(&registration(vec![], false))).unwrap();
        assert_eq!(body["type"], json!("IMAGE"));
        assert_eq!(body["gcsLocation"]["uris"], json!(["gs://b1/tiles/a.tif"]));
        assert_eq!(body["properties"]["file_size_bytes"], json!(4096));
    }

    #[test]
    fn create_target_splits_project_and_relative_id() {
        assert_eq!(
            create_target("projects/p/assets/folder/col").unwrap(),
            ("projects/p".to_string(), "folder/col".to_string())
        );
        assert_eq!(
            create_target("projects/earthengine-legacy/assets/users/me/col").unwrap(),
            (
                "projects/earthengine-legacy".to_string(),
                "users/me/col".to_string()
            )
        );
        assert!(create_target("projects/p/assets/").is_err());
        assert!(create_target("users/me/col").is_err());
    }

    #[test]
    fn asset_listing_decodes_types() {
        let page: AssetPage = serde_json::from_str(
            r#"{"assets": [{"name": "projects/p/assets/col/a", "type": "IMAGE", "id": "col/a"}]}"#,
        )
        .unwrap();
        let infos: Vec<AssetInfo> = page.assets.into_iter().map(AssetInfo::from).collect();
        assert_eq!(infos[0].kind, AssetKind::Image);
        assert_eq!(infos[0].name, "projects/p/assets/col/a");
    }
}
