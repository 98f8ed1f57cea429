use reqwest::StatusCode;
use serde_json::Value;

use crate::error::ApiError;

/// How a failed call maps 4xx responses before the general rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    General,
    /// 4xx means bad credentials.
    Login,
    /// 4xx means the submitted fields were rejected.
    Register,
}

/// Pulls a human-readable detail out of an error body.
///
/// Order: plain-string body, `message`, `error`, then the `errors` array
/// joined with ", ".
pub fn extract_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(_) => return Some(trimmed.to_string()),
    };

    match &value {
        Value::String(s) => non_empty(s),
        Value::Object(map) => map
            .get("message")
            .and_then(string_field)
            .or_else(|| map.get("error").and_then(string_field))
            .or_else(|| {
                let entries = error_entries(&value);
                (!entries.is_empty()).then(|| entries.join(", "))
            }),
        _ => None,
    }
}

/// Individual entries of an `errors` array. Items may be plain strings or
/// objects carrying `msg`/`message`.
pub fn error_entries(value: &Value) -> Vec<String> {
    let Some(items) = value.get("errors").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => non_empty(s),
            Value::Object(obj) => obj
                .get("msg")
                .or_else(|| obj.get("message"))
                .and_then(Value::as_str)
                .and_then(non_empty),
            _ => None,
        })
        .collect()
}

fn string_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Object(obj) => obj.get("message").and_then(Value::as_str).and_then(non_empty),
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// `"<intent>. Server says: <detail>"`, or just the intent without a detail.
pub fn compose_message(intent: &str, detail: Option<&str>) -> String {
    match detail {
        Some(detail) => format!("{intent}. Server says: {detail}"),
        None => intent.to_string(),
    }
}

/// 401/403 whose detail mentions "token", case-insensitively.
pub fn is_expired_token(status: StatusCode, detail: Option<&str>) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        && detail.is_some_and(|detail| detail.to_lowercase().contains("token"))
}

/// Turns an error response into an [`ApiError`].
pub fn classify(status: StatusCode, body: &str, intent: &str, mode: FailureMode) -> ApiError {
    let detail = extract_detail(body);
    let message = compose_message(intent, detail.as_deref());
    log::error!("{message} (status {})", status.as_u16());

    let code = status.as_u16();
    if status.is_client_error() {
        match mode {
            FailureMode::Login => return ApiError::Auth { status: code, message },
            FailureMode::Register => {
                let fields = serde_json::from_str::<Value>(body)
                    .map(|value| error_entries(&value))
                    .unwrap_or_default();
                return ApiError::Validation {
                    status: code,
                    message,
                    fields,
                };
            }
            FailureMode::General => {}
        }
    }

    if is_expired_token(status, detail.as_deref()) {
        return ApiError::ExpiredSession {
            status: code,
            detail: detail.unwrap_or_default(),
        };
    }

    ApiError::RequestFailed {
        status: code,
        message,
        detail,
    }
}
