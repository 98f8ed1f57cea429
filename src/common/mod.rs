pub mod jwt;
pub mod ownership;
pub mod types;

pub use jwt::Claims;
pub use ownership::{AUTHOR_ID_FIELDS, is_mine, resolve_author_id};
pub use types::{CurrentUser, LoginOutcome, Message, NewMessage, ProfileUpdate, Registration, User};
