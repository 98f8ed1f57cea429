use crate::common::{CurrentUser, Message, is_mine};
use crate::error::ApiError;

pub const DEFAULT_AVATAR: &str = "https://i.pravatar.cc/150?img=1";
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// How the caller should react to a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Drop the session and go back to login.
    ForceLogout,
    /// Show the message next to the triggering command.
    ShowError(String),
}

impl Reaction {
    pub fn from_error(err: &ApiError) -> Self {
        if err.is_expired_session() {
            Reaction::ForceLogout
        } else {
            Reaction::ShowError(err.to_string())
        }
    }
}

/// One rendered line of the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRow {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub text: String,
    pub mine: bool,
    /// Own server-side messages only; placeholders are never deletable.
    pub deletable: bool,
}

/// Local view of the message feed.
///
/// The list is never reconciled with the server: after any mutation the
/// caller re-fetches and calls [`FeedState::replace`].
#[derive(Debug, Default)]
pub struct FeedState {
    pub placeholders: Vec<Message>,
    pub messages: Vec<Message>,
    pub error: Option<String>,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placeholders(placeholders: Vec<Message>) -> Self {
        Self {
            placeholders,
            ..Self::default()
        }
    }

    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.error = None;
    }

    /// Drops a message after the server confirmed the delete.
    pub fn remove(&mut self, id: &str) {
        self.messages.retain(|message| message.id != id);
        self.placeholders.retain(|message| message.id != id);
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn len(&self) -> usize {
        self.placeholders.len() + self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Placeholders first, then server messages in server order.
    pub fn all(&self) -> impl Iterator<Item = &Message> {
        self.placeholders.iter().chain(self.messages.iter())
    }

    /// For the current user's own messages the session identity wins over
    /// whatever username/avatar the message echoes.
    pub fn rows(&self, current: Option<&CurrentUser>) -> Vec<FeedRow> {
        self.all()
            .map(|message| {
                let mine = current.is_some_and(|user| is_mine(message, user));
                let own = current.filter(|_| mine);

                let name = own
                    .and_then(|user| user.username.as_deref())
                    .or(message.username.as_deref())
                    .unwrap_or(UNKNOWN_AUTHOR);
                let avatar = if mine {
                    own.and_then(|user| user.avatar.as_deref())
                        .unwrap_or(DEFAULT_AVATAR)
                } else {
                    message.avatar.as_deref().unwrap_or(DEFAULT_AVATAR)
                };

                FeedRow {
                    id: message.id.clone(),
                    name: printable(name),
                    avatar: avatar.to_string(),
                    text: printable(message.body()),
                    mine,
                    deletable: mine && !message.is_placeholder(),
                }
            })
            .collect()
    }
}

/// Server-supplied text made safe for a terminal line: whitespace controls
/// become spaces, every other control character (ESC, BEL, ...) is dropped.
pub(crate) fn printable(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}
