//! Earth Engine asset path helpers.
//!
//! The REST API addresses every asset as `projects/{project}/assets/{path}`.
//! Legacy paths (`users/...`) live under the `earthengine-legacy` project and
//! are rewritten here so the rest of the pipeline only sees cloud paths.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::CogeeError;

/// Asset root that hosts legacy `users/...` paths.
pub const LEGACY_ROOT: &str = "projects/earthengine-legacy/assets";

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static asset name pattern"))
}

/// Rewrites a user supplied asset path into its cloud form.
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.starts_with("projects/") {
        trimmed.to_string()
    } else {
        format!("{LEGACY_ROOT}/{trimmed}")
    }
}

/// Normalizes and checks that the path names an asset below a project root.
pub fn collection_path(path: &str) -> Result<String, CogeeError> {
    let normalized = normalize(path);
    let segments: Vec<&str> = normalized.split('/').collect();
    let well_formed = segments.len() > 3
        && segments[0] == "projects"
        && !segments[1].is_empty()
        && segments[2] == "assets"
        && segments[3..].iter().all(|s| !s.is_empty());
    if !well_formed {
        return Err(CogeeError::Configuration(format!(
            "collection path {path:?} is not of the form projects/<project>/assets/<path> or users/<user>/<path>"
        )));
    }
    Ok(normalized)
}

/// `projects/{p}/assets` with nothing below it.
pub fn is_project_root(path: &str) -> bool {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    segments.len() == 3 && segments[0] == "projects" && segments[2] == "assets"
}

/// Parent container of an asset, `None` for a bare project root.
pub fn parent(asset: &str) -> Option<&str> {
    if is_project_root(asset) {
        return None;
    }
    asset.trim_end_matches('/').rsplit_once('/').map(|(p, _)| p)
}

/// Cloud project that owns an asset path.
pub fn project_of(asset: &str) -> Option<&str> {
    let mut segments = asset.split('/');
    match (segments.next(), segments.next()) {
        (Some("projects"), Some(project)) if !project.is_empty() => Some(project),
        _ => None,
    }
}

/// Last path segment, the asset's own name.
pub fn leaf(asset: &str) -> &str {
    asset.rsplit('/').next().unwrap_or(asset)
}

pub fn child(collection: &str, name: &str) -> String {
    format!("{}/{}", collection.trim_end_matches('/'), name)
}

/// Earth Engine accepts letters, digits, `_` and `-` in an asset name.
pub fn is_valid_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloud_paths_are_kept() {
        assert_eq!(normalize("projects/p/assets/col/"), "projects/p/assets/col");
    }

    #[test]
    fn legacy_paths_move_under_legacy_root() {
        assert_eq!(
            normalize("users/alice/col"),
            "projects/earthengine-legacy/assets/users/alice/col"
        );
    }

    #[test]
    fn collection_path_rejects_project_root_and_garbage() {
        assert!(collection_path("projects/p/assets").is_err());
        assert!(collection_path("projects/p/col").is_err());
        assert!(collection_path("projects//assets/col").is_err());
        assert_eq!(
            collection_path("projects/p/assets/a/b").unwrap(),
            "projects/p/assets/a/b"
        );
    }

    #[test]
    fn parent_of_top_level_asset_is_project_root() {
        let root = parent("projects/p/assets/col").unwrap();
        assert_eq!(root, "projects/p/assets");
        assert!(is_project_root(root));
        assert_eq!(parent("projects/p/assets/a/b"), Some("projects/p/assets/a"));
        assert_eq!(parent("projects/p/assets"), None);
    }

    #[test]
    fn project_and_leaf() {
        assert_eq!(project_of("projects/p/assets/col"), Some("p"));
        assert_eq!(project_of("users/alice"), None);
        assert_eq!(leaf("projects/p/assets/col/a"), "a");
        assert_eq!(child("projects/p/assets/col/", "a"), "projects/p/assets/col/a");
    }

    #[test]
    fn asset_names() {
        assert!(is_valid_name("tile_01-a"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("a.b"));
        assert!(!is_valid_name("with space"));
    }
}
