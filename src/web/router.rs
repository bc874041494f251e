use axum::{
    Router,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    chat, resources,
    web::{AppState, admin, guard, pages, session_api},
};

pub fn build_router(state: AppState) -> Router {
    let pages = Router::new()
        .route("/admin/login", get(pages::login_page))
        .route("/admin/dashboard", get(pages::dashboard_page))
        .route("/admin/add-notes", get(pages::notes_page))
        .route_layer(middleware::from_fn_with_state(state.clone(), guard::guard));

    Router::new()
        .merge(pages)
        .route("/api/auth/login", post(session_api::login))
        .route("/api/auth/logout", post(session_api::logout))
        .route("/api/auth/me", get(session_api::me))
        .route("/healthz", get(healthz))
        .merge(admin::router())
        .merge(chat::router())
        .merge(resources::router())
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
