use std::sync::Arc;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::common::jwt::decode_claims;
use crate::common::types::{LoginResponse, is_placeholder_id};
use crate::common::{
    CurrentUser, LoginOutcome, Message, NewMessage, ProfileUpdate, Registration, User,
};
use crate::error::ApiError;
use crate::storage::{SessionKey, SessionStore};

use super::classify::{FailureMode, classify};
use super::request::{CSRF_BODY_FIELD, CSRF_PATH, RequestPlan, build_plan, needs_csrf_fetch};
use super::transport::{build_transport, endpoint_url};

/// Single point of contact with the chat backend.
///
/// Owns the CSRF and bearer token lifecycle through the [`SessionStore`] it
/// holds. Every operation is an independent request; the client keeps no
/// other state, so it can be shared by reference across tasks.
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<dyn SessionStore>,
}

/// One outgoing call before credentials are applied.
struct Call<'a> {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    /// Logged on success
    done: &'a str,
    /// Prefix of the composed error message
    failed: &'a str,
    mode: FailureMode,
}

impl<'a> Call<'a> {
    fn new(method: Method, path: impl Into<String>, done: &'a str, failed: &'a str) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            done,
            failed,
            mode: FailureMode::General,
        }
    }

    fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    fn mode(mut self, mode: FailureMode) -> Self {
        self.mode = mode;
        self
    }
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_transport(session.clone())?,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========== Session ==========

    /// Performs the CSRF handshake and caches the returned token.
    pub async fn fetch_csrf_token(&self) -> Result<String, ApiError> {
        let call = Call::new(
            Method::PATCH,
            CSRF_PATH,
            "CSRF token fetched",
            "Failed to fetch CSRF token",
        );
        let plan = build_plan(call.method.clone(), CSRF_PATH, Vec::new(), None, None, None);
        let (status, text) = self.dispatch(&plan, &call).await?;

        let value: Value = serde_json::from_str(&text)?;
        let token = value
            .get(CSRF_BODY_FIELD)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::RequestFailed {
                status: status.as_u16(),
                message: "CSRF handshake returned no token".to_string(),
                detail: None,
            })?;

        self.session.set(SessionKey::CsrfToken, token)?;
        log::debug!("Cached CSRF token");
        Ok(token.to_string())
    }

    /// Clears every cached credential. Never contacts the server and never fails.
    pub fn logout(&self) {
        if let Err(err) = self.session.clear() {
            log::warn!("Failed to clear session in one pass ({err}); removing keys individually");
            for key in SessionKey::ALL {
                if let Err(err) = self.session.remove(key) {
                    log::error!("Failed to remove {key} from session: {err}");
                }
            }
        }
        log::info!("Logged out successfully.");
    }

    /// Identity from the stored bearer token, overlaid with the cached
    /// username/avatar. An undecodable token is dropped from the session.
    pub fn current_user(&self) -> Result<Option<CurrentUser>, ApiError> {
        let Some(token) = self.session.get(SessionKey::Token)? else {
            return Ok(None);
        };

        let claims = match decode_claims(&token) {
            Ok(claims) => claims,
            Err(err) => {
                log::warn!("Discarding stored bearer token: {err}");
                self.session.remove(SessionKey::Token)?;
                return Ok(None);
            }
        };

        let username = self.session.get(SessionKey::Username)?.or(claims.username);
        let avatar = self.session.get(SessionKey::Avatar)?.or(claims.avatar);

        Ok(Some(CurrentUser {
            id: claims.id,
            username,
            avatar,
            token,
        }))
    }

    // ========== Auth ==========

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        avatar: &str,
    ) -> Result<Value, ApiError> {
        let body = serde_json::to_value(Registration {
            username,
            email,
            password,
            avatar,
        })?;
        let call = Call::new(
            Method::POST,
            "/auth/register",
            "Registration successful",
            "Registration failed",
        )
        .body(body)
        .mode(FailureMode::Register);
        self.request_or_default(call).await
    }

    /// Exchanges credentials for a bearer token and stores it in the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let call = Call::new(Method::POST, "/auth/token", "Login successful", "Login failed")
            .body(json!({ "username": username, "password": password }))
            .mode(FailureMode::Login);
        let response: LoginResponse = self.request(call).await?;
        let claims = decode_claims(&response.token)?;

        self.session.set(SessionKey::Token, &response.token)?;
        self.session
            .set(SessionKey::Username, claims.username.as_deref().unwrap_or(username))?;
        match claims.avatar.as_deref() {
            Some(avatar) => self.session.set(SessionKey::Avatar, avatar)?,
            None => self.session.remove(SessionKey::Avatar)?,
        }

        Ok(LoginOutcome {
            token: response.token,
            claims,
        })
    }

    // ========== Users ==========

    pub async fn get_user(&self, user_id: &str) -> Result<User, ApiError> {
        let call = Call::new(
            Method::GET,
            format!("/users/{user_id}"),
            "User fetched",
            "Failed to fetch user",
        );
        self.request(call).await
    }

    /// Sends only the fields set on `update`. When the current user is the
    /// target, the cached username/avatar follow the change.
    pub async fn update_user(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let call = Call::new(Method::PUT, "/user", "User updated", "Failed to update user")
            .body(update.to_body());
        let user: User = self.request_or_default(call).await?;

        let is_current = self
            .current_user()?
            .and_then(|current| current.id)
            .is_some_and(|id| id == update.user_id);
        if is_current {
            if let Some(username) = &update.username {
                self.session.set(SessionKey::Username, username)?;
            }
            if let Some(avatar) = &update.avatar {
                self.session.set(SessionKey::Avatar, avatar)?;
            }
        }

        Ok(user)
    }

    /// Deleting the logged-in account leaves the caller responsible for [`ApiClient::logout`].
    pub async fn delete_user(&self, user_id: &str) -> Result<(), ApiError> {
        let call = Call::new(
            Method::DELETE,
            format!("/users/{user_id}"),
            "User deleted",
            "Failed to delete user",
        );
        self.send(call).await.map(|_| ())
    }

    // ========== Messages ==========

    /// All messages in server order (oldest first).
    pub async fn get_all_messages(&self) -> Result<Vec<Message>, ApiError> {
        let call = Call::new(
            Method::GET,
            "/messages",
            "Fetched all messages",
            "Failed to fetch messages",
        );
        self.request_or_default(call).await
    }

    pub async fn get_messages_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, ApiError> {
        let call = Call::new(
            Method::GET,
            "/messages",
            "Fetched conversation messages",
            "Failed to fetch conversation messages",
        )
        .query("conversationId", conversation_id);
        self.request_or_default(call).await
    }

    pub async fn post_message(
        &self,
        text: &str,
        conversation_id: Option<&str>,
        avatar: Option<&str>,
        username: &str,
    ) -> Result<Message, ApiError> {
        let body = serde_json::to_value(NewMessage {
            text,
            conversation_id,
            avatar,
            username,
        })?;
        let call = Call::new(
            Method::POST,
            "/messages",
            "Message sent",
            "Failed to send message",
        )
        .body(body);
        self.request(call).await
    }

    /// Placeholder ids only exist locally and are never sent.
    pub async fn delete_message(&self, message_id: &str) -> Result<(), ApiError> {
        if is_placeholder_id(message_id) {
            log::debug!("Skipping delete of local placeholder {message_id}");
            return Ok(());
        }
        let call = Call::new(
            Method::DELETE,
            format!("/messages/{message_id}"),
            "Message deleted",
            "Failed to delete message",
        );
        self.send(call).await.map(|_| ())
    }

    // ========== Plumbing ==========

    /// Ensure-prerequisite step: fetches a CSRF token when a mutating call
    /// finds none cached. Returns the token to embed, if any.
    async fn ensure_csrf(&self, method: &Method, path: &str) -> Result<Option<String>, ApiError> {
        let cached = self.session.get(SessionKey::CsrfToken)?;
        if needs_csrf_fetch(method, path, cached.as_deref()) {
            log::debug!("No CSRF token cached before {method} {path}; fetching one");
            return self.fetch_csrf_token().await.map(Some);
        }
        Ok(cached)
    }

    async fn send(&self, call: Call<'_>) -> Result<String, ApiError> {
        let csrf = self.ensure_csrf(&call.method, &call.path).await?;
        let bearer = self.session.get(SessionKey::Token)?;
        let plan = build_plan(
            call.method.clone(),
            &call.path,
            call.query.clone(),
            call.body.clone(),
            csrf.as_deref(),
            bearer.as_deref(),
        );
        self.dispatch(&plan, &call).await.map(|(_, text)| text)
    }

    async fn dispatch(
        &self,
        plan: &RequestPlan,
        call: &Call<'_>,
    ) -> Result<(StatusCode, String), ApiError> {
        let url = endpoint_url(&self.base_url, &plan.path);
        let mut request = self.http.request(plan.method.clone(), &url);
        if !plan.query.is_empty() {
            request = request.query(&plan.query);
        }
        if let Some(bearer) = &plan.bearer {
            request = request.bearer_auth(bearer);
        }
        if let Some(body) = &plan.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            log::error!("{} ({err})", call.failed);
            ApiError::Network(err)
        })?;
        let status = response.status();
        let text = response.text().await.map_err(ApiError::Network)?;

        if !status.is_success() {
            return Err(classify(status, &text, call.failed, call.mode));
        }

        log::info!("{} (status {})", call.done, status.as_u16());
        Ok((status, text))
    }

    async fn request<T: DeserializeOwned>(&self, call: Call<'_>) -> Result<T, ApiError> {
        let text = self.send(call).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Like [`ApiClient::request`], but an empty or `null` body yields `T::default()`.
    async fn request_or_default<T: DeserializeOwned + Default>(
        &self,
        call: Call<'_>,
    ) -> Result<T, ApiError> {
        let text = self.send(call).await?;
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(T::default());
        }
        Ok(serde_json::from_str(trimmed)?)
    }
}
