//! Resource moderation endpoints. Administrators see every resource with its
//! owner attached and can remove any of them.

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
    web::{ApiError, AppState, internal_error, json_error},
};

use super::require_admin;

/// Resource row plus the owning professor's display fields.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ModeratedResource {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub resource_type: String,
    pub file_url: Option<String>,
    pub professor_id: Option<Uuid>,
    pub professor_name: Option<String>,
    pub professor_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ModeratedResourceListResponse {
    success: bool,
    resources: Vec<ModeratedResource>,
}

pub async fn list(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<ModeratedResourceListResponse>, (StatusCode, Json<ApiError>)> {
    require_admin(&state, &jar, Action::ModerateResources).await?;

    let resources = sqlx::query_as::<_, ModeratedResource>(
        "SELECT r.id, r.title, r.type, r.file_url, r.professor_id,
                p.name AS professor_name, p.email AS professor_email, r.created_at
         FROM resources r
         LEFT JOIN professors p ON p.id = r.professor_id
         ORDER BY r.created_at DESC",
    )
    .fetch_all(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, "failed to list resources for moderation");
        internal_error()
    })?;

    Ok(Json(ModeratedResourceListResponse {
        success: true,
        resources,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RemoveQuery {
    id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct RemoveResponse {
    success: bool,
    message: String,
}

pub async fn remove(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<RemoveQuery>,
) -> Result<Json<RemoveResponse>, (StatusCode, Json<ApiError>)> {
    require_admin(&state, &jar, Action::ModerateResources).await?;

    let resource_id = query
        .id
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "ID de recurso requerido"))?;

    let deleted = sqlx::query("DELETE FROM resources WHERE id = $1")
        .bind(resource_id)
        .execute(state.pool_ref())
        .await
        .map_err(|err| {
            error!(?err, "failed to delete resource");
            internal_error()
        })?;

    if deleted.rows_affected() == 0 {
        return Err(json_error(StatusCode::NOT_FOUND, "Recurso no encontrado"));
    }

    info!(resource_id = %resource_id, "resource removed by administrator");

    Ok(Json(RemoveResponse {
        success: true,
        message: "Recurso eliminado exitosamente".to_string(),
    }))
}
