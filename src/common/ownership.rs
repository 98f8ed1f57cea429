use super::types::{CurrentUser, Message, value_as_id};

/// Author-id keys in the order they are trusted. The backend has used each
/// of these at some point.
pub const AUTHOR_ID_FIELDS: [&str; 3] = ["userId", "authorId", "ownerId"];

/// First author id present on the message, following [`AUTHOR_ID_FIELDS`].
pub fn resolve_author_id(message: &Message) -> Option<String> {
    AUTHOR_ID_FIELDS
        .iter()
        .find_map(|field| message.extra.get(*field).and_then(value_as_id))
}

/// Whether `message` was written by `user`.
///
/// Any author-id key matching the user id wins; otherwise the username is
/// compared.
pub fn is_mine(message: &Message, user: &CurrentUser) -> bool {
    if let Some(user_id) = user.id.as_deref() {
        let id_match = AUTHOR_ID_FIELDS.iter().any(|field| {
            message
                .extra
                .get(*field)
                .and_then(value_as_id)
                .is_some_and(|author| author == user_id)
        });
        if id_match {
            return true;
        }
    }

    match (message.username.as_deref(), user.username.as_deref()) {
        (Some(author), Some(me)) => author == me,
        _ => false,
    }
}
