use reqwest::Method;
use serde_json::{Map, Value};

/// Handshake endpoint; never goes through the CSRF prerequisite itself.
pub const CSRF_PATH: &str = "/csrf";

/// Body key the backend reads the anti-forgery token from.
pub const CSRF_BODY_FIELD: &str = "csrfToken";

/// A request with session credentials already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPlan {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// First step of the protocol: does a CSRF handshake have to happen before
/// this request can be sent?
pub fn needs_csrf_fetch(method: &Method, path: &str, cached_csrf: Option<&str>) -> bool {
    path != CSRF_PATH && is_mutating(method) && cached_csrf.is_none()
}

/// Second step: apply the cached credentials.
///
/// Mutating requests carry the CSRF token inside the JSON body. The bearer
/// token goes on every request, reads included. The handshake is sent bare.
pub fn build_plan(
    method: Method,
    path: &str,
    query: Vec<(String, String)>,
    body: Option<Value>,
    csrf: Option<&str>,
    bearer: Option<&str>,
) -> RequestPlan {
    if path == CSRF_PATH {
        return RequestPlan {
            method,
            path: path.to_string(),
            query,
            body,
            bearer: None,
        };
    }

    let body = match csrf {
        Some(csrf) if is_mutating(&method) => {
            let mut object = match body {
                Some(Value::Object(object)) => object,
                _ => Map::new(),
            };
            object.insert(CSRF_BODY_FIELD.to_string(), Value::String(csrf.to_string()));
            Some(Value::Object(object))
        }
        _ => body,
    };

    RequestPlan {
        method,
        path: path.to_string(),
        query,
        body,
        bearer: bearer.map(str::to_string),
    }
}
