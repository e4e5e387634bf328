//! Error type for calls against the compression API.
//!
//! [`ApiError::Unauthorized`] is kept apart from every other HTTP failure so
//! the token guard can classify it without looking at status codes or
//! message text.

use thiserror::Error;

/// Errors that can occur while talking to the compression API.
///
/// - [`Unauthorized`](ApiError::Unauthorized): HTTP 401, the token is stale
/// - [`Status`](ApiError::Status): any other non-2xx response
/// - [`Network`](ApiError::Network): transport failure, timeout or undecodable body
/// - [`Io`](ApiError::Io): reading the upload or writing the download failed
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the bearer token (HTTP 401).
    #[error("unauthorized: token rejected by the server")]
    Unauthorized,

    /// Non-success status other than 401, with the response body.
    #[error("API error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// True when the failure should trigger a token refresh.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}
