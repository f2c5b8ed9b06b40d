//! Cloud Storage JSON API client implementing [`StorageCatalog`].
//!
//! Both listings follow `nextPageToken` until the service stops returning one.

use std::sync::Arc;

use async_trait::async_trait;
use cogee_core::contract::{ObjectEntry, StorageCatalog};
use cogee_core::ApiError;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::Session;
use crate::http::decode;

pub const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com/storage/v1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketPage {
    #[serde(default)]
    items: Vec<BucketResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BucketResource {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectPage {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    name: String,
    /// The API encodes sizes as decimal strings.
    size: Option<String>,
    time_created: Option<String>,
    updated: Option<String>,
}

impl From<ObjectResource> for ObjectEntry {
    fn from(resource: ObjectResource) -> Self {
        ObjectEntry {
            name: resource.name,
            size: resource.size.and_then(|s| s.parse().ok()),
            time_created: resource.time_created,
            updated: resource.updated,
        }
    }
}

pub struct GcsClient {
    base_url: String,
    client: Client,
    session: Arc<Session>,
}

impl GcsClient {
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

    async fn get_page<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let token = self.session.access_token().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(ApiError::transport)?;
        decode(response).await
    }
}

#[async_trait]
impl StorageCatalog for GcsClient {
    async fn list_buckets(&self, project: &str) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/b", self.base_url);
        let mut buckets = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("project", project), ("fields", "items/name,nextPageToken")];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }
            let page: BucketPage = self.get_page(&url, &query).await?;
            debug!(project, page_size = page.items.len(), "Fetched bucket page");
            buckets.extend(page.items.into_iter().map(|b| b.name));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        info!(project, count = buckets.len(), "Fetched buckets from Cloud Storage");
        Ok(buckets)
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>, ApiError> {
        let url = format!("{}/b/{}/o", self.base_url, bucket);
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![(
                "fields",
                "items(name,size,timeCreated,updated),nextPageToken",
            )];
            if !prefix.is_empty() {
                query.push(("prefix", prefix));
            }
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }
            let page: ObjectPage = self.get_page(&url, &query).await?;
            debug!(bucket, prefix, page_size = page.items.len(), "Fetched object page");
            objects.extend(page.items.into_iter().map(ObjectEntry::from));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        info!(bucket, prefix, count = objects.len(), "Fetched objects from Cloud Storage");
        Ok(objects)
    }
}
