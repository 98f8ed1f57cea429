//! Command-line client for a REST chat backend: registration, login, a
//! message feed and profile editing over an authenticated, CSRF-protected
//! session.

pub mod common;
pub mod config;
pub mod error;
pub mod network;
pub mod storage;
pub mod ui;

pub use error::ApiError;
pub use network::ApiClient;
pub use storage::{MemorySessionStore, SessionDatabase, SessionKey, SessionStore};
