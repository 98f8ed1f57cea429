use std::sync::Arc;

use reqwest::Client;

use crate::error::ApiError;
use crate::network::cookies::SessionCookies;
use crate::storage::SessionStore;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by every call. Cookies go through the session store;
/// timeouts stay at the reqwest defaults.
pub fn build_transport(session: Arc<dyn SessionStore>) -> Result<Client, ApiError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .cookie_provider(Arc::new(SessionCookies::new(session)))
        .build()
        .map_err(ApiError::Network)
}

/// Joins the backend root and an endpoint path, tolerating a trailing slash on the root.
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}
