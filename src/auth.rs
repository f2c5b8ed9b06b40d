//! `auth` module: turns CLI/config credential options into an explicit [`Session`].
//!
//! The session owns the OAuth token source and the resolved project, and is
//! handed to both REST clients.
//!
//! # Credential resolution
//! 1. `--account` + `--cred` (both or neither): the service-account key file.
//! 2. A saved key at `~/.config/sa_earthengine/sa_credentials.json`.
//! 3. Application Default Credentials (`GOOGLE_APPLICATION_CREDENTIALS`,
//!    gcloud ADC file or the metadata server).

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cogee_core::{ApiError, CogeeError};
use google_cloud_auth::credentials::CredentialsFile;
use google_cloud_auth::project::{
    create_token_source, create_token_source_from_credentials, project as default_project, Config,
};
use google_cloud_auth::token_source::TokenSource;
use tracing::{error, info, warn};

/// OAuth scopes for Earth Engine asset management and Cloud Storage reads.
pub const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/earthengine",
    "https://www.googleapis.com/auth/devstorage.read_only",
];

/// Credential options as given on the command line or in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthConfig {
    /// Service-account email.
    pub account: Option<String>,
    /// Service-account JSON key file.
    pub credentials_file: Option<PathBuf>,
    /// Explicit project; wins over anything derived from credentials.
    pub project: Option<String>,
}

/// Which credentials a session will be built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    ServiceAccount { account: String, key_file: PathBuf },
    SavedServiceAccount(PathBuf),
    ApplicationDefault,
}

impl AuthConfig {
    /// Validates flag combinations without touching the network.
    pub fn credential_source(&self) -> Result<CredentialSource, CogeeError> {
        match (&self.account, &self.credentials_file) {
            (Some(account), Some(key_file)) => Ok(CredentialSource::ServiceAccount {
                account: account.clone(),
                key_file: key_file.clone(),
            }),
            (Some(_), None) => Err(CogeeError::Configuration(
                "--account requires --cred (service-account key file); provide both or neither".into(),
            )),
            (None, Some(_)) => Err(CogeeError::Configuration(
                "--cred requires --account (service-account email); provide both or neither".into(),
            )),
            (None, None) => match saved_service_account_key() {
                Some(path) if path.exists() => Ok(CredentialSource::SavedServiceAccount(path)),
                _ => Ok(CredentialSource::ApplicationDefault),
            },
        }
    }
}

/// Location of a service-account key saved for unattended use.
pub fn saved_service_account_key() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(".config")
            .join("sa_earthengine")
            .join("sa_credentials.json")
    })
}

/// `name@project.iam.gserviceaccount.com` → `project`.
pub fn project_from_account(account: &str) -> Option<String> {
    let (_, domain) = account.split_once('@')?;
    let (project, rest) = domain.split_once('.')?;
    if project.is_empty() || !rest.starts_with("iam.gserviceaccount.com") {
        return None;
    }
    Some(project.to_string())
}

/// Anything that can hand out a bearer token for Google APIs.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, ApiError>;
}

/// OAuth token source from `google-cloud-auth`; caches and refreshes tokens.
struct OAuthTokens(Box<dyn TokenSource>);

#[async_trait]
impl AccessTokenSource for OAuthTokens {
    async fn access_token(&self) -> Result<String, ApiError> {
        self.0
            .token()
            .await
            .map(|token| token.access_token)
            .map_err(|e| ApiError::Auth(e.to_string()))
    }
}

/// A pre-minted token, e.g. from `gcloud auth print-access-token`.
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, ApiError> {
        Ok(self.0.clone())
    }
}

/// Authenticated handle shared by the storage and Earth Engine clients.
pub struct Session {
    tokens: Box<dyn AccessTokenSource>,
    project: Option<String>,
    identity: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("project", &self.project)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Builds the token source and proves it by minting a first token.
    pub async fn establish(config: &AuthConfig) -> Result<Self, CogeeError> {
        let source = config.credential_source()?;
        let auth_config = Config::default().with_scopes(&SCOPES);

        let (token_source, derived_project, identity) = match &source {
            CredentialSource::ServiceAccount { account, key_file } => {
                let credentials = read_key_file(key_file).await?;
                if credentials.client_email.as_deref() != Some(account.as_str()) {
                    error!(account, key_file = %key_file.display(), "Key file belongs to a different service account");
                    return Err(CogeeError::Authentication(format!(
                        "key file {} does not belong to {account}",
                        key_file.display()
                    )));
                }
                let ts = create_token_source_from_credentials(&credentials, &auth_config)
                    .await
                    .map_err(|e| CogeeError::Authentication(e.to_string()))?;
                let project = project_from_account(account).or(credentials.project_id.clone());
                (ts, project, account.clone())
            }
            CredentialSource::SavedServiceAccount(key_file) => {
                let credentials = read_key_file(key_file).await?;
                let account = credentials.client_email.clone().unwrap_or_default();
                let ts = create_token_source_from_credentials(&credentials, &auth_config)
                    .await
                    .map_err(|e| CogeeError::Authentication(e.to_string()))?;
                let project = project_from_account(&account).or(credentials.project_id.clone());
                (ts, project, account)
            }
            CredentialSource::ApplicationDefault => {
                let ts = create_token_source(auth_config)
                    .await
                    .map_err(|e| CogeeError::Authentication(format!(
                        "no application default credentials ({e}); run `gcloud auth application-default login` or pass --account and --cred"
                    )))?;
                let project = match std::env::var("GOOGLE_CLOUD_PROJECT") {
                    Ok(project) if !project.is_empty() => Some(project),
                    _ => default_project()
                        .await
                        .ok()
                        .and_then(|p| p.project_id().cloned()),
                };
                (ts, project, "application default credentials".to_string())
            }
        };

        let session = Session {
            tokens: Box::new(OAuthTokens(token_source)),
            project: config.project.clone().or(derived_project),
            identity,
        };
        session
            .access_token()
            .await
            .map_err(|e| CogeeError::Authentication(e.to_string()))?;
        match &session.project {
            Some(project) => info!(identity = %session.identity, project, "Authenticated"),
            None => warn!(identity = %session.identity, "Authenticated, but no project could be determined"),
        }
        Ok(session)
    }

    /// Session over any token source; no token is minted up front.
    pub fn from_token_source(
        tokens: impl AccessTokenSource + 'static,
        project: Option<String>,
        identity: impl Into<String>,
    ) -> Self {
        Session {
            tokens: Box::new(tokens),
            project,
            identity: identity.into(),
        }
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// A fresh or cached bearer token.
    pub async fn access_token(&self) -> Result<String, ApiError> {
        self.tokens.access_token().await
    }
}

async fn read_key_file(path: &Path) -> Result<CredentialsFile, CogeeError> {
    CredentialsFile::new_from_file(path.to_string_lossy().into_owned())
        .await
        .map_err(|e| {
            error!(error = ?e, key_file = %path.display(), "Failed to read service-account key");
            CogeeError::Authentication(format!("cannot read key file {}: {e}", path.display()))
        })
}
