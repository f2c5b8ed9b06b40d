//! Loads and saves the optional YAML configuration.
//!
//! Lookup order: `--config PATH`, then `$COGEE_CONFIG`, then
//! `~/.config/cogee/config.yaml`. Only an explicitly named file must exist.

use std::fs;
use std::path::{Path, PathBuf};

use cogee_core::contract::RegistrationMode;
use cogee_core::register::CollisionPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "COGEE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config YAML {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to write config file {path:?}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("no home directory to place the config file in")]
    NoHome,
}

/// Defaults stored on disk. Every value can be overridden by a CLI flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<PathBuf>,
    #[serde(default)]
    pub register: RegisterSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSection {
    /// Accepted object extensions; `None` keeps `.tif`/`.tiff`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_existing: Option<CollisionPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RegistrationMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bands: Vec<String>,
}

/// `~/.config/cogee/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("cogee").join("config.yaml"))
}

/// Where the config lives: explicit path, then `$COGEE_CONFIG`, then the default.
/// The flag is `true` when the location was asked for and must therefore exist.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<(PathBuf, bool)> {
    if let Some(path) = explicit {
        return Some((path.to_path_buf(), true));
    }
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.is_empty() => Some((PathBuf::from(path), false)),
        _ => default_config_path().map(|path| (path, false)),
    }
}

/// Loads the CLI configuration. A missing file yields defaults unless it was
/// named explicitly with `--config`.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig, ConfigError> {
    let Some((path, required)) = resolve_config_path(explicit) else {
        info!("No home directory; using built-in defaults");
        return Ok(CliConfig::default());
    };
    if !required && !path.exists() {
        info!(config_path = ?path, "No config file found; using built-in defaults");
        return Ok(CliConfig::default());
    }
    load_config_from(&path)
}

pub fn load_config_from<P: AsRef<Path>>(path: P) -> Result<CliConfig, ConfigError> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(ConfigError::Read {
                path: path_ref.to_path_buf(),
                source: e,
            });
        }
    };

    // An empty file is a valid, empty config.
    if config_content.trim().is_empty() {
        return Ok(CliConfig::default());
    }

    match serde_yaml::from_str::<CliConfig>(&config_content) {
        Ok(config) => {
            info!(
                config_path = ?path_ref,
                project = config.project.as_deref().unwrap_or("<none>"),
                "Parsed config YAML successfully"
            );
            Ok(config)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(ConfigError::Parse {
                path: path_ref.to_path_buf(),
                source: e,
            })
        }
    }
}

/// Stores `project` as the default, keeping the rest of an existing file.
pub fn save_project<P: AsRef<Path>>(path: P, project: &str) -> Result<CliConfig, ConfigError> {
    let path_ref = path.as_ref();
    let mut config = if path_ref.exists() {
        load_config_from(path_ref)?
    } else {
        CliConfig::default()
    };
    config.project = Some(project.to_string());

    let write_err = |reason: String| ConfigError::Write {
        path: path_ref.to_path_buf(),
        reason,
    };
    if let Some(dir) = path_ref.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| write_err(e.to_string()))?;
    }
    let yaml = serde_yaml::to_string(&config).map_err(|e| write_err(e.to_string()))?;
    fs::write(path_ref, yaml).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to write config file");
        write_err(e.to_string())
    })?;
    info!(config_path = ?path_ref, project, "Saved default project");
    Ok(config)
}
