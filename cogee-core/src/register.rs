//! Registration pipeline: list → filter → register, one object at a time.
//!
//! The run is partial-failure tolerant. A malformed object name, a naming
//! collision under [`CollisionPolicy::Fail`], or a rejected request is recorded
//! in the [`RegistrationReport`] and the batch moves on. Only failing to list
//! the source objects or the target collection aborts the run.
//!
//! The limit counts successful registrations; once reached, every remaining
//! candidate is reported as not attempted.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::asset_id;
use crate::contract::{AssetStore, ImageRegistration, ObjectEntry, RegistrationMode, StorageCatalog};
use crate::error::{CogeeError, ObjectError};

/// Extensions accepted by the default filter.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".tif", ".tiff"];

/// Decides which listed objects are registration candidates.
pub trait ObjectFilter: Send + Sync {
    fn accepts(&self, entry: &ObjectEntry) -> bool;
}

impl<F> ObjectFilter for F
where
    F: Fn(&ObjectEntry) -> bool + Send + Sync,
{
    fn accepts(&self, entry: &ObjectEntry) -> bool {
        self(entry)
    }
}

/// Case-insensitive match on the object key's extension.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| {
                let e = e.as_ref().trim().to_ascii_lowercase();
                if e.starts_with('.') {
                    e
                } else {
                    format!(".{e}")
                }
            })
            .collect();
        Self { extensions }
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

impl ObjectFilter for ExtensionFilter {
    fn accepts(&self, entry: &ObjectEntry) -> bool {
        let name = entry.name.to_ascii_lowercase();
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

/// What to do when the target asset already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    #[default]
    Skip,
    Overwrite,
    Fail,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(CollisionPolicy::Skip),
            "overwrite" => Ok(CollisionPolicy::Overwrite),
            "fail" => Ok(CollisionPolicy::Fail),
            other => Err(format!("unknown collision policy {other:?} (expected skip, overwrite or fail)")),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollisionPolicy::Skip => f.write_str("skip"),
            CollisionPolicy::Overwrite => f.write_str("overwrite"),
            CollisionPolicy::Fail => f.write_str("fail"),
        }
    }
}

/// Everything one `register` invocation needs.
pub struct RegistrationJob {
    pub bucket: String,
    /// Object key prefix; `None` is the bucket root.
    pub prefix: Option<String>,
    /// Target collection as a cloud asset path.
    pub collection: String,
    /// Maximum number of successful registrations.
    pub limit: Option<usize>,
    pub mode: RegistrationMode,
    pub on_existing: CollisionPolicy,
    pub band_names: Vec<String>,
    pub filter: Box<dyn ObjectFilter>,
}

impl RegistrationJob {
    pub fn new(bucket: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
            collection: collection.into(),
            limit: None,
            mode: RegistrationMode::default(),
            on_existing: CollisionPolicy::default(),
            band_names: Vec::new(),
            filter: Box::new(ExtensionFilter::default()),
        }
    }

    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_mode(mut self, mode: RegistrationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.on_existing = policy;
        self
    }

    pub fn with_band_names(mut self, band_names: Vec<String>) -> Self {
        self.band_names = band_names;
        self
    }

    pub fn with_filter(mut self, filter: impl ObjectFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }
}

impl fmt::Debug for RegistrationJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationJob")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("collection", &self.collection)
            .field("limit", &self.limit)
            .field("mode", &self.mode)
            .field("on_existing", &self.on_existing)
            .field("band_names", &self.band_names)
            .finish_non_exhaustive()
    }
}

/// A candidate object that was not registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFailure {
    pub object: String,
    pub asset_id: Option<String>,
    pub reason: ObjectError,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistrationReport {
    pub registered: Vec<String>,
    pub skipped_existing: Vec<String>,
    pub failed: Vec<RegistrationFailure>,
    /// Listed objects rejected by the filter.
    pub filtered_out: usize,
    /// Candidates left untouched because the limit was reached.
    pub not_attempted: usize,
}

impl RegistrationReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl fmt::Display for RegistrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Registered: {}", self.registered.len())?;
        writeln!(f, "Already existing (skipped): {}", self.skipped_existing.len())?;
        writeln!(f, "Failed: {}", self.failed.len())?;
        for failure in &self.failed {
            match &failure.asset_id {
                Some(id) => writeln!(f, "  {} -> {}: {}", failure.object, id, failure.reason)?,
                None => writeln!(f, "  {}: {}", failure.object, failure.reason)?,
            }
        }
        writeln!(f, "Not attempted (limit reached): {}", self.not_attempted)?;
        write!(f, "Ignored (not matching filter): {}", self.filtered_out)
    }
}

/// Registers every matching object under `bucket/prefix` into the job's collection.
pub async fn register<C, S>(
    catalog: &C,
    store: &S,
    job: &RegistrationJob,
) -> Result<RegistrationReport, CogeeError>
where
    C: StorageCatalog + ?Sized,
    S: AssetStore + ?Sized,
{
    let prefix = job.prefix.as_deref().unwrap_or("");
    info!(bucket = %job.bucket, prefix, collection = %job.collection, limit = ?job.limit, mode = %job.mode, "Fetching objects to register");

    let objects = catalog
        .list_objects(&job.bucket, prefix)
        .await
        .map_err(|e| {
            error!(bucket = %job.bucket, prefix, error = ?e, "Failed to list objects");
            CogeeError::from(e)
        })?;

    let mut report = RegistrationReport::default();
    let candidates: Vec<&ObjectEntry> = objects
        .iter()
        .filter(|entry| {
            let accepted = job.filter.accepts(entry);
            if !accepted {
                debug!(object = %entry.name, "Skipping object not matching filter");
            }
            accepted
        })
        .collect();
    report.filtered_out = objects.len() - candidates.len();

    let existing: HashSet<String> = store
        .list_children(&job.collection)
        .await
        .map_err(|e| {
            error!(collection = %job.collection, error = ?e, "Failed to list collection contents");
            CogeeError::from(e)
        })?
        .into_iter()
        .map(|asset| asset_id::leaf(&asset.name).to_string())
        .collect();

    let mut registered_now: HashSet<String> = HashSet::new();

    info!(
        candidates = candidates.len(),
        existing = existing.len(),
        filtered_out = report.filtered_out,
        "Starting registration"
    );

    for (index, entry) in candidates.iter().enumerate() {
        if job.limit.is_some_and(|limit| report.registered.len() >= limit) {
            report.not_attempted = candidates.len() - index;
            info!(not_attempted = report.not_attempted, "Registration limit reached");
            break;
        }

        let base_name = entry.base_name();
        if !asset_id::is_valid_name(base_name) {
            warn!(object = %entry.name, base_name, "Object name does not yield a valid asset id");
            report.failed.push(RegistrationFailure {
                object: entry.name.clone(),
                asset_id: None,
                reason: ObjectError::MalformedName,
            });
            continue;
        }
        let target = asset_id::child(&job.collection, base_name);

        // Two objects in one run mapping to the same asset never replace each other.
        if registered_now.contains(base_name) {
            warn!(asset_id = %target, object = %entry.name, "Asset already registered from another object in this run");
            report.failed.push(RegistrationFailure {
                object: entry.name.clone(),
                asset_id: Some(target),
                reason: ObjectError::AlreadyExists,
            });
            continue;
        }

        let mut overwrite = false;
        if existing.contains(base_name) {
            match job.on_existing {
                CollisionPolicy::Skip => {
                    info!(asset_id = %target, "Asset already exists: skipping");
                    report.skipped_existing.push(target);
                    continue;
                }
                CollisionPolicy::Fail => {
                    warn!(asset_id = %target, "Asset already exists");
                    report.failed.push(RegistrationFailure {
                        object: entry.name.clone(),
                        asset_id: Some(target),
                        reason: ObjectError::AlreadyExists,
                    });
                    continue;
                }
                CollisionPolicy::Overwrite => {
                    overwrite = true;
                    if job.mode == RegistrationMode::Legacy {
                        if let Err(e) = store.delete_asset(&target).await {
                            error!(asset_id = %target, error = ?e, "Failed to delete asset before overwrite");
                            report.failed.push(RegistrationFailure {
                                object: entry.name.clone(),
                                asset_id: Some(target),
                                reason: ObjectError::Rejected(e.to_string()),
                            });
                            continue;
                        }
                    }
                }
            }
        }

        let registration = ImageRegistration {
            asset_id: target.clone(),
            uri: entry.gcs_uri(&job.bucket),
            band_names: job.band_names.clone(),
            file_size_bytes: entry.size,
            start_time: entry.time_created.clone(),
            end_time: entry.updated.clone(),
            overwrite,
            mode: job.mode,
        };

        match store.register_image(registration).await {
            Ok(()) => {
                info!(asset_id = %target, object = %entry.name, "Registered");
                registered_now.insert(base_name.to_string());
                report.registered.push(target);
            }
            Err(e) => {
                error!(asset_id = %target, object = %entry.name, error = ?e, "Failed to register");
                report.failed.push(RegistrationFailure {
                    object: entry.name.clone(),
                    asset_id: Some(target),
                    reason: ObjectError::Rejected(e.to_string()),
                });
            }
        }
    }

    info!(
        registered = report.registered.len(),
        skipped = report.skipped_existing.len(),
        failed = report.failed.len(),
        not_attempted = report.not_attempted,
        "Registration finished"
    );
    Ok(report)
}
