//! `cli` module: clap commands and the async [`run`] entrypoint.
//!
//! Each command merges its flags over the YAML config, opens one [`Session`]
//! and drives the `cogee-core` operations through the REST clients.
//! Argument and collection-path checks happen before any network call.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cogee_core::asset_id;
use cogee_core::collection::{ensure_collection, EnsureOutcome};
use cogee_core::contract::RegistrationMode;
use cogee_core::listing::{list_buckets, list_prefixes};
use cogee_core::register::{register, CollisionPolicy, ExtensionFilter, RegistrationJob};
use cogee_core::CogeeError;
use tracing::{info, warn};

use crate::auth::{AuthConfig, Session};
use crate::earthengine::EarthEngineClient;
use crate::gcs::GcsClient;
use crate::load_config::{load_config, resolve_config_path, save_project, CliConfig, ConfigError};

/// CLI for cogee: list Cloud Storage buckets and register COGs into Earth Engine.
#[derive(Parser, Debug)]
#[clap(
    name = "cogee",
    version,
    about = "List Cloud Storage buckets and register Cloud-Optimized GeoTIFFs into Earth Engine image collections"
)]
pub struct Cli {
    /// YAML config file (default: $COGEE_CONFIG, then ~/.config/cogee/config.yaml)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate, verify the Earth Engine project and store it as the default
    Init {
        /// Cloud project registered for Earth Engine
        #[clap(long)]
        project: String,
    },
    /// List the buckets of a project
    Buckets {
        /// Project id (default: the configured or credential project)
        #[clap(long)]
        pid: Option<String>,
    },
    /// List the immediate subfolders of a bucket prefix as JSON
    Recursive {
        #[clap(long)]
        bucket: String,
        /// Object prefix, e.g. `tiles/2024/`
        #[clap(long)]
        prefix: Option<String>,
    },
    /// Register COGs from a bucket into an image collection
    Register {
        #[clap(long)]
        bucket: String,
        /// Target collection: projects/<project>/assets/<path> or users/<user>/<path>
        #[clap(long)]
        collection: String,
        #[clap(long)]
        prefix: Option<String>,
        /// Stop after this many successful registrations
        #[clap(long)]
        limit: Option<usize>,
        /// Service-account key file (requires --account)
        #[clap(long)]
        cred: Option<PathBuf>,
        /// Service-account email (requires --cred)
        #[clap(long)]
        account: Option<String>,
        /// Comma separated band ids, e.g. red,green,blue
        #[clap(long)]
        bands: Option<String>,
        /// Create IMAGE assets directly instead of importing a manifest
        #[clap(long)]
        legacy: bool,
        /// What to do when the asset already exists: skip, overwrite or fail
        #[clap(long)]
        on_existing: Option<CollisionPolicy>,
        /// Project billed for Earth Engine requests
        #[clap(long)]
        project: Option<String>,
    },
}

/// Flags win over the config file. The service-account pair is taken as a unit.
fn auth_config(
    config: &CliConfig,
    account: Option<String>,
    cred: Option<PathBuf>,
    project: Option<String>,
) -> AuthConfig {
    let (account, credentials_file) = if account.is_some() || cred.is_some() {
        (account, cred)
    } else {
        (config.account.clone(), config.credentials.clone())
    };
    AuthConfig {
        account,
        credentials_file,
        project: project.or_else(|| config.project.clone()),
    }
}

fn parse_bands(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect()
}

async fn open_session(auth: &AuthConfig) -> Result<Arc<Session>> {
    let session = Session::establish(auth)
        .await
        .context("could not authenticate with Google Cloud")?;
    Ok(Arc::new(session))
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { project } => {
            let auth = auth_config(&config, None, None, Some(project.clone()));
            let session = open_session(&auth).await?;
            let earth_engine = EarthEngineClient::new(session.clone());
            earth_engine
                .verify_project(&project)
                .await
                .map_err(CogeeError::from)
                .with_context(|| format!("project {project} is not usable with Earth Engine"))?;

            let (path, _) = resolve_config_path(cli.config.as_deref()).ok_or(ConfigError::NoHome)?;
            save_project(&path, &project)?;
            println!(
                "Earth Engine initialised for project {project} as {}",
                session.identity()
            );
            println!("Default project saved to {}", path.display());
        }

        Commands::Buckets { pid } => {
            let auth = auth_config(&config, None, None, pid);
            let session = open_session(&auth).await?;
            let project = session.project().unwrap_or("").to_string();
            let storage = GcsClient::new(session);
            match list_buckets(&storage, &project).await {
                Ok(buckets) if buckets.is_empty() => println!("No buckets found"),
                Ok(buckets) => {
                    for bucket in buckets {
                        println!("{bucket}");
                    }
                }
                Err(e @ CogeeError::Configuration(_)) => return Err(e.into()),
                Err(e) => {
                    // Reported, not fatal: an unusable project yields no buckets.
                    eprintln!("[ERROR] Could not list buckets for project {project}: {e}");
                }
            }
        }

        Commands::Recursive { bucket, prefix } => {
            let auth = auth_config(&config, None, None, None);
            let session = open_session(&auth).await?;
            let storage = GcsClient::new(session);
            let folders = list_prefixes(&storage, &bucket, prefix.as_deref()).await;
            println!("{}", serde_json::to_string_pretty(&folders)?);
        }

        Commands::Register {
            bucket,
            collection,
            prefix,
            limit,
            cred,
            account,
            bands,
            legacy,
            on_existing,
            project,
        } => {
            // Both checks run before any network activity.
            let collection = asset_id::collection_path(&collection)?;
            let auth = auth_config(&config, account, cred, project);
            auth.credential_source()?;

            let session = open_session(&auth).await?;
            let storage = GcsClient::new(session.clone());
            let earth_engine = EarthEngineClient::new(session);

            match ensure_collection(&earth_engine, &collection).await? {
                EnsureOutcome::Existing => info!(collection = %collection, "Using existing collection"),
                EnsureOutcome::Created => println!("Created image collection {collection}"),
            }

            let mode = if legacy {
                RegistrationMode::Legacy
            } else {
                config.register.mode.unwrap_or_default()
            };
            let filter = match &config.register.extensions {
                Some(extensions) => ExtensionFilter::new(extensions),
                None => ExtensionFilter::default(),
            };
            let job = RegistrationJob::new(bucket, collection)
                .with_prefix(prefix)
                .with_limit(limit)
                .with_mode(mode)
                .with_collision_policy(on_existing.or(config.register.on_existing).unwrap_or_default())
                .with_band_names(match bands {
                    Some(list) => parse_bands(&list),
                    None => config.register.bands.clone(),
                })
                .with_filter(filter);

            println!("Registration starting...");
            let report = register(&storage, &earth_engine, &job).await?;
            if report.has_failures() {
                warn!(failed = report.failed.len(), "Some objects could not be registered");
            }
            println!("Registration complete.\n{report}");
        }
    }

    Ok(())
}
