/// Contacts API
///
/// REST backend for personal contact books: user accounts with JWT
/// sessions, a cache-aside user snapshot layer, owner-scoped contact CRUD,
/// search and upcoming-birthday lookups, and avatar uploads.
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod contacts;
pub mod context;
pub mod db;
pub mod error;
pub mod image_host;
pub mod mailer;
pub mod rate_limit;
pub mod server;
pub mod users;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{ApiError, ApiResult};
