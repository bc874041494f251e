//! Administrator-only JSON APIs: professor accounts, resource moderation and
//! session oversight. Every handler goes through [`require_admin`] before
//! touching data.

use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, put},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    authz::{self, Action},
    web::{ApiError, AppState, access_denied, auth, auth::Professor, json_error},
};

mod professors;
mod resources;
mod sessions;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/professors",
            get(professors::list).post(professors::create),
        )
        .route(
            "/api/admin/professors/:id",
            put(professors::update).delete(professors::remove),
        )
        .route(
            "/api/admin/resources",
            get(resources::list).delete(resources::remove),
        )
        .route(
            "/api/admin/sessions",
            get(sessions::list).delete(sessions::force_close),
        )
        .route(
            "/api/admin/sessions/cleanup",
            get(sessions::cleanup_probe).post(sessions::cleanup),
        )
}

/// Resolves the calling professor and checks the given capability.
///
/// Missing or invalid sessions get 401; authenticated professors without the
/// capability get 403.
pub async fn require_admin(
    state: &AppState,
    jar: &CookieJar,
    action: Action,
) -> Result<Professor, (StatusCode, Json<ApiError>)> {
    let professor = auth::current_professor(state.pool_ref(), state.jwt_secret(), jar)
        .await
        .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "No autenticado"))?;

    if !authz::can(&professor, action) {
        return Err(access_denied());
    }

    Ok(professor)
}
