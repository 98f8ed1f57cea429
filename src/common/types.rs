use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

use super::jwt::Claims;

/// Prefix of messages that only exist on this client and are never sent to the server.
pub const PLACEHOLDER_ID_PREFIX: &str = "local-";

/// Keys some backend versions use for the message body instead of `text`.
const TEXT_FALLBACK_FIELDS: [&str; 3] = ["message", "content", "body"];

/// Account as returned by `/users/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, alias = "_id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: String,
}

/// Domain model for a chat message.
///
/// Everything except `id` is optional on the wire; unknown keys (including
/// whichever author-id key the backend uses) land in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(alias = "_id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(
        rename = "conversationId",
        default,
        deserialize_with = "opt_id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub conversation_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Builds a message that lives only in the local feed.
    pub fn placeholder(username: &str, avatar: Option<&str>, text: &str) -> Self {
        Self {
            id: format!("{PLACEHOLDER_ID_PREFIX}{}", uuid::Uuid::new_v4()),
            text: Some(text.to_string()),
            username: Some(username.to_string()),
            avatar: avatar.map(str::to_string),
            conversation_id: None,
            extra: Map::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        is_placeholder_id(&self.id)
    }

    /// Message body, falling back to the alternative keys older backends use.
    pub fn body(&self) -> &str {
        if let Some(text) = self.text.as_deref() {
            return text;
        }
        TEXT_FALLBACK_FIELDS
            .iter()
            .find_map(|field| self.extra.get(*field).and_then(Value::as_str))
            .unwrap_or("")
    }
}

pub fn is_placeholder_id(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_ID_PREFIX)
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage<'a> {
    pub text: &'a str,
    #[serde(rename = "conversationId")]
    pub conversation_id: Option<&'a str>,
    pub avatar: Option<&'a str>,
    pub username: &'a str,
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub avatar: &'a str,
}

/// Partial profile update; only the fields set here are sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub user_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

impl ProfileUpdate {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.avatar.is_none()
    }

    /// The backend reads the target from either `userId` or `id`, so both are sent.
    pub fn to_body(&self) -> Value {
        let mut body = json!({ "userId": self.user_id, "id": self.user_id });
        let fields = [
            ("username", &self.username),
            ("email", &self.email),
            ("avatar", &self.avatar),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                body[key] = Value::String(value.clone());
            }
        }
        body
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginResponse {
    pub token: String,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub claims: Claims,
}

/// Identity of the logged-in user as seen by this client.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub token: String,
}

/// Accepts ids encoded as JSON strings or numbers.
pub(crate) fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_as_id(&value).ok_or_else(|| {
        serde::de::Error::custom(format!("expected string or number id, got {value}"))
    })
}

pub(crate) fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_id))
}
