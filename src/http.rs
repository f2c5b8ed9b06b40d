//! Response handling shared by the REST clients.

use cogee_core::ApiError;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

/// Passes successful responses through and maps failures onto [`ApiError`].
pub(crate) async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, body))
}

/// Decodes a JSON body after [`check`].
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    check(response).await?.json::<T>().await.map_err(ApiError::decode)
}

pub(crate) fn status_error(status: StatusCode, body: String) -> ApiError {
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(body),
        _ => ApiError::Rejected {
            status: status.as_u16(),
            body,
        },
    }
}
