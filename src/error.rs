use thiserror::Error;

use crate::storage::StoreError;

/// Failures surfaced by [`crate::network::ApiClient`].
///
/// Callers only need to special-case [`ApiError::ExpiredSession`]: it means
/// the bearer token was rejected and the local session must be dropped.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received (connect refused, DNS, TLS, timeout...).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The backend rejected the submitted fields (typically on register).
    #[error("{message}")]
    Validation {
        status: u16,
        message: String,
        fields: Vec<String>,
    },

    /// Bad credentials on login.
    #[error("{message}")]
    Auth { status: u16, message: String },

    /// 401/403 whose detail mentions the token; the session is no longer valid.
    #[error("session expired: {detail}")]
    ExpiredSession { status: u16, detail: String },

    #[error("{message}")]
    RequestFailed {
        status: u16,
        message: String,
        detail: Option<String>,
    },

    /// The stored bearer token could not be decoded as a JWT.
    #[error("malformed bearer token: {0}")]
    InvalidToken(String),

    #[error("session storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// `true` when the caller should force a logout and send the user back to login.
    pub fn is_expired_session(&self) -> bool {
        matches!(self, ApiError::ExpiredSession { .. })
    }
}
