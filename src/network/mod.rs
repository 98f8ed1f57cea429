pub mod classify;
pub mod client;
pub mod cookies;
pub mod request;
pub mod transport;

pub use classify::FailureMode;
pub use client::ApiClient;
pub use request::{CSRF_PATH, RequestPlan};
