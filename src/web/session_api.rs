use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::web::{
    AppState,
    auth::{self, AuthError, Professor},
};

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    professor: Option<Professor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct MeResponse {
    authenticated: bool,
    professor: Option<Professor>,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    success: bool,
}

/// `POST /api/auth/login`: authenticate and set the canonical session cookie.
/// Bad credentials get one uniform message regardless of the failing check.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> (CookieJar, (StatusCode, Json<LoginResponse>)) {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return (
            jar,
            (
                StatusCode::BAD_REQUEST,
                Json(LoginResponse {
                    success: false,
                    professor: None,
                    error: Some("Email y contraseña son requeridos".to_string()),
                }),
            ),
        );
    }

    match auth::authenticate(
        state.pool_ref(),
        state.jwt_secret(),
        &request.email,
        &request.password,
    )
    .await
    {
        Ok(outcome) => {
            let jar = jar.add(auth::build_session_cookie(outcome.token));
            (
                jar,
                (
                    StatusCode::OK,
                    Json(LoginResponse {
                        success: true,
                        professor: Some(outcome.professor),
                        error: None,
                    }),
                ),
            )
        }
        Err(AuthError::InvalidCredentials) => (
            jar,
            (
                StatusCode::UNAUTHORIZED,
                Json(LoginResponse {
                    success: false,
                    professor: None,
                    error: Some("Email o contraseña incorrectos".to_string()),
                }),
            ),
        ),
        Err(err) => {
            error!(?err, "login failed with backend error");
            (
                jar,
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(LoginResponse {
                        success: false,
                        professor: None,
                        error: Some("Error interno del servidor".to_string()),
                    }),
                ),
            )
        }
    }
}

/// `POST /api/auth/logout`: always succeeds from the client's perspective.
/// The session row is removed when a token is present; the cookies are
/// cleared either way.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    if let Some(token) = auth::token_from_jar(&jar) {
        if let Err(err) = auth::logout_session(state.pool_ref(), &token).await {
            error!(?err, "failed to remove session during logout");
        }
    }

    let jar = auth::clear_session_cookies(jar);
    (jar, Json(LogoutResponse { success: true }))
}

/// `GET /api/auth/me`: resolve the current session. Failure clears both
/// cookie names alongside the 401.
pub async fn me(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, (StatusCode, Json<MeResponse>)) {
    let Some(token) = auth::token_from_jar(&jar) else {
        return (
            jar,
            (
                StatusCode::UNAUTHORIZED,
                Json(MeResponse {
                    authenticated: false,
                    professor: None,
                }),
            ),
        );
    };

    match auth::validate_session(state.pool_ref(), state.jwt_secret(), &token).await {
        Ok(Some(professor)) => (
            jar,
            (
                StatusCode::OK,
                Json(MeResponse {
                    authenticated: true,
                    professor: Some(professor),
                }),
            ),
        ),
        Ok(None) => (
            auth::clear_session_cookies(jar),
            (
                StatusCode::UNAUTHORIZED,
                Json(MeResponse {
                    authenticated: false,
                    professor: None,
                }),
            ),
        ),
        Err(err) => {
            error!(?err, "failed to validate session for /api/auth/me");
            (
                jar,
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(MeResponse {
                        authenticated: false,
                        professor: None,
                    }),
                ),
            )
        }
    }
}
