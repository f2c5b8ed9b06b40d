//! Error taxonomy shared by the core pipeline and the remote clients.

use thiserror::Error;

/// Failure reported by a remote service client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("credentials unavailable: {0}")]
    Auth(String),
}

impl ApiError {
    pub fn transport(e: impl std::fmt::Display) -> Self {
        ApiError::Transport(e.to_string())
    }

    pub fn decode(e: impl std::fmt::Display) -> Self {
        ApiError::Decode(e.to_string())
    }
}

/// Run-level errors. `Authentication` and `Configuration` are fatal.
#[derive(Debug, Error)]
pub enum CogeeError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("access error: {0}")]
    Access(ApiError),
}

impl From<ApiError> for CogeeError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Unauthorized(msg) | ApiError::Auth(msg) => CogeeError::Authentication(msg),
            other => CogeeError::Access(other),
        }
    }
}

/// Why a single object was not registered. Never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    #[error("object name does not yield a valid asset id")]
    MalformedName,

    #[error("asset already exists")]
    AlreadyExists,

    #[error("registration rejected: {0}")]
    Rejected(String),
}
