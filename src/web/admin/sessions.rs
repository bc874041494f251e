//! Session oversight: list recent sessions, force-close one, and sweep the
//! expired rows on demand. The scheduled sweep lives in the maintenance task;
//! these endpoints give administrators the manual lever.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    authz::Action,
    web::{ApiError, AppState, auth, internal_error, json_error},
};

use super::require_admin;

const SESSION_LIST_LIMIT: i64 = 100;

#[derive(Debug, Clone, sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    professor_id: Uuid,
    professor_name: Option<String>,
    professor_email: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Session as reported to the dashboard. `is_active` is computed against the
/// clock at response time, not stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub professor_id: Uuid,
    pub professor_name: Option<String>,
    pub professor_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Serialize)]
pub struct SessionListResponse {
    success: bool,
    sessions: Vec<SessionSummary>,
}

pub async fn list(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<SessionListResponse>, (StatusCode, Json<ApiError>)> {
    require_admin(&state, &jar, Action::ManageSessions).await?;

    let rows = sqlx::query_as::<_, SessionRow>(
        "SELECT s.id, s.professor_id, p.name AS professor_name, p.email AS professor_email,
                s.created_at, s.expires_at
         FROM professor_sessions s
         LEFT JOIN professors p ON p.id = s.professor_id
         ORDER BY s.created_at DESC
         LIMIT $1",
    )
    .bind(SESSION_LIST_LIMIT)
    .fetch_all(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, "failed to list sessions");
        internal_error()
    })?;

    let now = Utc::now();
    let sessions = rows
        .into_iter()
        .map(|row| SessionSummary {
            is_active: row.expires_at > now,
            id: row.id,
            professor_id: row.professor_id,
            professor_name: row.professor_name,
            professor_email: row.professor_email,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
        .collect();

    Ok(Json(SessionListResponse {
        success: true,
        sessions,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ForceCloseQuery {
    id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    success: bool,
    message: String,
}

pub async fn force_close(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ForceCloseQuery>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ApiError>)> {
    require_admin(&state, &jar, Action::ManageSessions).await?;

    let session_id = query
        .id
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "ID de sesión requerido"))?;

    let deleted = sqlx::query("DELETE FROM professor_sessions WHERE id = $1")
        .bind(session_id)
        .execute(state.pool_ref())
        .await
        .map_err(|err| {
            error!(?err, "failed to force-close session");
            internal_error()
        })?;

    if deleted.rows_affected() == 0 {
        return Err(json_error(StatusCode::NOT_FOUND, "Sesión no encontrada"));
    }

    info!(session_id = %session_id, "session force-closed by administrator");

    Ok(Json(MessageResponse {
        success: true,
        message: "Sesión cerrada exitosamente".to_string(),
    }))
}

#[derive(Serialize)]
pub struct CleanupResponse {
    success: bool,
    message: String,
    #[serde(rename = "deletedCount")]
    deleted_count: u64,
}

pub async fn cleanup(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<CleanupResponse>, (StatusCode, Json<ApiError>)> {
    require_admin(&state, &jar, Action::ManageSessions).await?;

    let deleted_count = auth::clean_expired_sessions(state.pool_ref())
        .await
        .map_err(|err| {
            error!(?err, "failed to clean expired sessions");
            internal_error()
        })?;

    info!(deleted = deleted_count, "expired sessions cleaned on demand");

    Ok(Json(CleanupResponse {
        success: true,
        message: format!("Se eliminaron {deleted_count} sesiones expiradas"),
        deleted_count,
    }))
}

#[derive(Serialize)]
pub struct CleanupProbeResponse {
    success: bool,
    #[serde(rename = "expiredSessionsCount")]
    expired_sessions_count: i64,
}

pub async fn cleanup_probe(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<CleanupProbeResponse>, (StatusCode, Json<ApiError>)> {
    require_admin(&state, &jar, Action::ManageSessions).await?;

    let expired_sessions_count = auth::count_expired_sessions(state.pool_ref())
        .await
        .map_err(|err| {
            error!(?err, "failed to count expired sessions");
            internal_error()
        })?;

    Ok(Json(CleanupProbeResponse {
        success: true,
        expired_sessions_count,
    }))
}
