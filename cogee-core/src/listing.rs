//! Bucket and prefix discovery.
//!
//! [`list_prefixes`] never fails: on any access error it logs and returns an
//! empty list. Callers rely on that empty-result contract.

use std::collections::BTreeSet;

use tracing::{debug, error, info};

use crate::contract::StorageCatalog;
use crate::error::CogeeError;

/// Bucket names in `project`, in the order the service returns them.
pub async fn list_buckets<C>(catalog: &C, project: &str) -> Result<Vec<String>, CogeeError>
where
    C: StorageCatalog + ?Sized,
{
    let project = project.trim();
    if project.is_empty() {
        return Err(CogeeError::Configuration(
            "no project id given and none associated with the credentials".into(),
        ));
    }

    info!(project, "Listing buckets");
    match catalog.list_buckets(project).await {
        Ok(buckets) => {
            info!(project, count = buckets.len(), "Listed buckets");
            Ok(buckets)
        }
        Err(e) => {
            error!(project, error = ?e, "Failed to list buckets");
            Err(e.into())
        }
    }
}

/// Distinct immediate subfolder names below `prefix` in `bucket`, sorted.
pub async fn list_prefixes<C>(catalog: &C, bucket: &str, prefix: Option<&str>) -> Vec<String>
where
    C: StorageCatalog + ?Sized,
{
    let prefix = folder_prefix(prefix.unwrap_or(""));
    let prefix = prefix.as_str();
    info!(bucket, prefix, "Fetching subfolders/prefixes in bucket");
    match catalog.list_objects(bucket, prefix).await {
        Ok(objects) => {
            let folders = immediate_subfolders(objects.iter().map(|o| o.name.as_str()), prefix);
            debug!(bucket, count = folders.len(), "Collected subfolders");
            folders
        }
        Err(e) => {
            error!(bucket, prefix, error = ?e, "Failed to fetch subfolders");
            Vec::new()
        }
    }
}

/// `landsat` and `landsat/` both name the folder `landsat/`.
fn folder_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

/// First path segment of every key below `prefix` that has more than one segment.
pub fn immediate_subfolders<'a, I>(names: I, prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter_map(|name| name.strip_prefix(prefix))
        .filter_map(|relative| relative.split_once('/'))
        .map(|(first, _)| first)
        .filter(|first| !first.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subfolders_are_deduplicated_first_segments() {
        let names = ["a/1.tif", "a/2.tif", "b/c/3.tif", "root.tif"];
        assert_eq!(immediate_subfolders(names, ""), vec!["a", "b"]);
    }

    #[test]
    fn subfolders_are_relative_to_prefix() {
        let names = ["tiles/x/1.tif", "tiles/y/2.tif", "tiles/3.tif", "other/z/4.tif"];
        assert_eq!(immediate_subfolders(names, "tiles/"), vec!["x", "y"]);
    }

    #[test]
    fn folder_prefix_gains_a_trailing_slash() {
        assert_eq!(folder_prefix("landsat"), "landsat/");
        assert_eq!(folder_prefix("landsat/"), "landsat/");
        assert_eq!(folder_prefix(""), "");
    }
}
