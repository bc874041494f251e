pub mod admin;
pub mod auth;
pub mod guard;
pub mod pages;
pub mod responses;
pub mod router;
pub mod session_api;
pub mod state;
pub mod templates;
pub mod uploads;

pub use auth::{Professor, SESSION_COOKIE, SESSION_TTL_DAYS};
pub use responses::{ApiError, access_denied, internal_error, json_error};
pub use state::AppState;
pub use templates::escape_html;
