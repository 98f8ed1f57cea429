//! In-process stand-in for the chat backend.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};

/// Name of the cookie paired with the CSRF body token.
pub const CSRF_COOKIE: &str = "_csrf";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub bearer: Option<String>,
    pub csrf_in_body: Option<String>,
    pub csrf_cookie: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredUser {
    id: u64,
    username: String,
    email: String,
    password: String,
    avatar: String,
}

impl StoredUser {
    fn public(&self) -> Value {
        json!({
            "id": self.id,
            "username": self.username,
            "email": self.email,
            "avatar": self.avatar,
        })
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    users: Vec<StoredUser>,
    messages: Vec<Value>,
    csrf_tokens: HashSet<String>,
    csrf_cookies: HashSet<String>,
    sessions: HashMap<String, u64>,
    requests: Vec<RecordedRequest>,
}

#[derive(Default)]
pub struct MockBackend {
    inner: Mutex<Inner>,
    handshakes: AtomicUsize,
}

impl MockBackend {
    pub fn csrf_handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Invalidates every issued bearer token, as a server restart or expiry would.
    pub fn revoke_sessions(&self) {
        self.inner.lock().unwrap().sessions.clear();
    }

    pub fn message_count(&self) -> usize {
        self.inner.lock().unwrap().messages.len()
    }

    /// Seeds a message written by someone else.
    pub fn seed_foreign_message(&self, text: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.messages.push(json!({
            "id": id,
            "text": text,
            "username": "mallory",
            "avatar": "https://i.pravatar.cc/150?img=9",
            "authorId": 999,
        }));
        id.to_string()
    }
}

pub fn fake_jwt(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.bW9jay1zaWduYXR1cmU")
}

/// Starts the mock on an ephemeral port and returns its base URL.
pub async fn spawn_backend() -> (String, Arc<MockBackend>) {
    let mock = Arc::new(MockBackend::default());
    let app = Router::new()
        .route("/csrf", patch(csrf))
        .route("/auth/register", post(register))
        .route("/auth/token", post(login))
        .route("/users/{id}", get(get_user).delete(delete_user))
        .route("/user", put(update_user))
        .route("/messages", get(list_messages).post(create_message))
        .route("/messages/{id}", delete(delete_message))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), mock)
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn parse_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn record(inner: &mut Inner, method: &str, path: &str, headers: &HeaderMap, body: &Value) {
    inner.requests.push(RecordedRequest {
        method: method.to_string(),
        path: path.to_string(),
        bearer: bearer(headers),
        csrf_in_body: body.get("csrfToken").and_then(Value::as_str).map(str::to_string),
        csrf_cookie: csrf_cookie(headers),
    });
}

fn csrf_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|line| line.split(';'))
        .find_map(|pair| pair.trim().strip_prefix(CSRF_COOKIE))
        .and_then(|rest| rest.strip_prefix('='))
        .map(str::to_string)
}

/// Double-submit check: the body token and the handshake cookie must both
/// have been issued by `/csrf`.
fn check_csrf(inner: &Inner, headers: &HeaderMap, body: &Value) -> Result<(), Response> {
    let token_ok = body
        .get("csrfToken")
        .and_then(Value::as_str)
        .is_some_and(|token| inner.csrf_tokens.contains(token));
    let cookie_ok = csrf_cookie(headers).is_some_and(|cookie| inner.csrf_cookies.contains(&cookie));
    if token_ok && cookie_ok {
        Ok(())
    } else {
        Err(reply(StatusCode::FORBIDDEN, json!({ "message": "Invalid CSRF token" })))
    }
}

fn authenticate(inner: &Inner, headers: &HeaderMap) -> Result<u64, Response> {
    bearer(headers)
        .and_then(|token| inner.sessions.get(&token).copied())
        .ok_or_else(|| reply(StatusCode::UNAUTHORIZED, json!({ "message": "Invalid token" })))
}

async fn csrf(State(mock): State<Arc<MockBackend>>) -> Response {
    let n = mock.handshakes.fetch_add(1, Ordering::SeqCst) + 1;
    let token = format!("csrf-{n}");
    let secret = format!("secret-{n}");
    let mut inner = mock.inner.lock().unwrap();
    inner.csrf_tokens.insert(token.clone());
    inner.csrf_cookies.insert(secret.clone());
    let cookie = format!("{CSRF_COOKIE}={secret}; Path=/; HttpOnly; SameSite=Lax");
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "csrfToken": token })),
    )
        .into_response()
}

async fn register(
    State(mock): State<Arc<MockBackend>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);
    let mut inner = mock.inner.lock().unwrap();
    record(&mut inner, "POST", "/auth/register", &headers, &body);
    if let Err(response) = check_csrf(&inner, &headers, &body) {
        return response;
    }

    let field = |key: &str| body.get(key).and_then(Value::as_str).unwrap_or("").to_string();
    let username = field("username");
    let mut errors = Vec::new();
    if inner.users.iter().any(|user| user.username == username) {
        errors.push(json!("Username already taken"));
    }
    if field("password").len() < 6 {
        errors.push(json!({
            "msg": "Password must be at least 6 characters",
            "path": "password",
        }));
    }
    if !errors.is_empty() {
        return reply(StatusCode::BAD_REQUEST, json!({ "errors": errors }));
    }

    inner.next_id += 1;
    let user = StoredUser {
        id: inner.next_id,
        username,
        email: field("email"),
        password: field("password"),
        avatar: field("avatar"),
    };
    let created = user.public();
    inner.users.push(user);
    reply(StatusCode::CREATED, created)
}

async fn login(
    State(mock): State<Arc<MockBackend>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);
    let mut inner = mock.inner.lock().unwrap();
    record(&mut inner, "POST", "/auth/token", &headers, &body);
    if let Err(response) = check_csrf(&inner, &headers, &body) {
        return response;
    }

    let username = body.get("username").and_then(Value::as_str).unwrap_or("");
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");
    let Some(user) = inner
        .users
        .iter()
        .find(|user| user.username == username && user.password == password)
        .cloned()
    else {
        return reply(
            StatusCode::UNAUTHORIZED,
            json!({ "message": "Wrong username or password" }),
        );
    };

    let token = fake_jwt(json!({
        "id": user.id,
        "username": user.username,
        "avatar": user.avatar,
        "exp": 4_102_444_800i64,
        "nonce": inner.sessions.len(),
    }));
    inner.sessions.insert(token.clone(), user.id);
    reply(StatusCode::OK, json!({ "token": token }))
}

async fn get_user(
    State(mock): State<Arc<MockBackend>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut inner = mock.inner.lock().unwrap();
    record(&mut inner, "GET", &format!("/users/{id}"), &headers, &Value::Null);
    if let Err(response) = authenticate(&inner, &headers) {
        return response;
    }
    match inner.users.iter().find(|user| user.id.to_string() == id) {
        Some(user) => reply(StatusCode::OK, user.public()),
        None => reply(StatusCode::NOT_FOUND, json!({ "error": "User not found" })),
    }
}

async fn update_user(
    State(mock): State<Arc<MockBackend>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);
    let mut inner = mock.inner.lock().unwrap();
    record(&mut inner, "PUT", "/user", &headers, &body);
    let caller = match authenticate(&inner, &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(response) = check_csrf(&inner, &headers, &body) {
        return response;
    }
    if body.get("userId").and_then(Value::as_str) != Some(caller.to_string().as_str()) {
        return reply(
            StatusCode::FORBIDDEN,
            json!({ "message": "You can only edit your own profile" }),
        );
    }
    if let Some(avatar) = body.get("avatar").and_then(Value::as_str) {
        if !avatar.starts_with("http") {
            return reply(StatusCode::FORBIDDEN, json!({ "error": "Invalid avatar URL" }));
        }
    }

    let Some(user) = inner.users.iter_mut().find(|user| user.id == caller) else {
        return reply(StatusCode::NOT_FOUND, json!({ "error": "User not found" }));
    };
    if let Some(username) = body.get("username").and_then(Value::as_str) {
        user.username = username.to_string();
    }
    if let Some(email) = body.get("email").and_then(Value::as_str) {
        user.email = email.to_string();
    }
    if let Some(avatar) = body.get("avatar").and_then(Value::as_str) {
        user.avatar = avatar.to_string();
    }
    reply(StatusCode::OK, user.public())
}

async fn delete_user(
    State(mock): State<Arc<MockBackend>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);
    let mut inner = mock.inner.lock().unwrap();
    record(&mut inner, "DELETE", &format!("/users/{id}"), &headers, &body);
    let caller = match authenticate(&inner, &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(response) = check_csrf(&inner, &headers, &body) {
        return response;
    }
    if caller.to_string() != id {
        return reply(StatusCode::FORBIDDEN, json!({ "message": "You can only delete yourself" }));
    }
    inner.users.retain(|user| user.id != caller);
    inner.sessions.retain(|_, user| *user != caller);
    reply(StatusCode::OK, json!({ "message": "User deleted" }))
}

async fn list_messages(
    State(mock): State<Arc<MockBackend>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut inner = mock.inner.lock().unwrap();
    record(&mut inner, "GET", "/messages", &headers, &Value::Null);
    if let Err(response) = authenticate(&inner, &headers) {
        return response;
    }
    let conversation = params.get("conversationId");
    let messages: Vec<Value> = inner
        .messages
        .iter()
        .filter(|message| match conversation {
            Some(id) => message.get("conversationId").and_then(Value::as_str) == Some(id.as_str()),
            None => true,
        })
        .cloned()
        .collect();
    reply(StatusCode::OK, Value::Array(messages))
}

async fn create_message(
    State(mock): State<Arc<MockBackend>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);
    let mut inner = mock.inner.lock().unwrap();
    record(&mut inner, "POST", "/messages", &headers, &body);
    let caller = match authenticate(&inner, &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(response) = check_csrf(&inner, &headers, &body) {
        return response;
    }

    inner.next_id += 1;
    let message = json!({
        "id": inner.next_id,
        "text": body.get("text").cloned().unwrap_or(Value::Null),
        "username": body.get("username").cloned().unwrap_or(Value::Null),
        "avatar": body.get("avatar").cloned().unwrap_or(Value::Null),
        "conversationId": body.get("conversationId").cloned().unwrap_or(Value::Null),
        "userId": caller,
    });
    inner.messages.push(message.clone());
    reply(StatusCode::CREATED, message)
}

async fn delete_message(
    State(mock): State<Arc<MockBackend>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);
    let mut inner = mock.inner.lock().unwrap();
    record(&mut inner, "DELETE", &format!("/messages/{id}"), &headers, &body);
    let caller = match authenticate(&inner, &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(response) = check_csrf(&inner, &headers, &body) {
        return response;
    }

    let Some(position) = inner.messages.iter().position(|message| {
        message.get("id").map(Value::to_string).as_deref() == Some(id.as_str())
    }) else {
        return reply(StatusCode::NOT_FOUND, json!({ "error": "Message not found" }));
    };
    let owner = inner.messages[position].get("userId").and_then(Value::as_u64);
    if owner != Some(caller) {
        return reply(StatusCode::FORBIDDEN, json!({ "message": "Not your message" }));
    }
    inner.messages.remove(position);
    reply(StatusCode::OK, json!({ "message": "Message deleted" }))
}
