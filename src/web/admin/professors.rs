//! Professor account management for administrators.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    authz::{self, Action},
    web::{ApiError, AppState, auth, auth::AuthError, internal_error, json_error},
};

use super::require_admin;

const SUMMARY_COLUMNS: &str =
    "id, name, email, department, role, is_active, created_at, updated_at";

/// Account row as exposed to the admin dashboard. Never carries the hash.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ProfessorListResponse {
    success: bool,
    professors: Vec<ProfessorSummary>,
}

#[derive(Serialize)]
pub struct ProfessorResponse {
    success: bool,
    professor: ProfessorSummary,
}

#[derive(Serialize)]
pub struct MessageResponse {
    success: bool,
    message: String,
}

pub async fn list(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<ProfessorListResponse>, (StatusCode, Json<ApiError>)> {
    require_admin(&state, &jar, Action::ManageProfessors).await?;

    let professors = sqlx::query_as::<_, ProfessorSummary>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM professors ORDER BY created_at DESC"
    ))
    .fetch_all(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, "failed to list professors");
        internal_error()
    })?;

    Ok(Json(ProfessorListResponse {
        success: true,
        professors,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateProfessorRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    department: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<CreateProfessorRequest>,
) -> Result<(StatusCode, Json<ProfessorResponse>), (StatusCode, Json<ApiError>)> {
    require_admin(&state, &jar, Action::ManageProfessors).await?;

    if request.name.trim().is_empty()
        || request.email.trim().is_empty()
        || request.password.is_empty()
    {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "Nombre, email y contraseña son requeridos",
        ));
    }

    let created = auth::create_professor(
        state.pool_ref(),
        &request.name,
        &request.email,
        &request.password,
        request.department.as_deref(),
    )
    .await
    .map_err(|err| match err {
        AuthError::DuplicateEmail => json_error(
            StatusCode::BAD_REQUEST,
            "Ya existe un profesor con este email",
        ),
        err => {
            error!(?err, "failed to create professor");
            internal_error()
        }
    })?;

    info!(professor_id = %created.id, email = %created.email, "professor account created");

    let professor = fetch_summary(state.pool_ref(), created.id)
        .await
        .map_err(|err| {
            error!(?err, "failed to load created professor");
            internal_error()
        })?
        .ok_or_else(internal_error)?;

    Ok((
        StatusCode::CREATED,
        Json(ProfessorResponse {
            success: true,
            professor,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfessorRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    department: Option<String>,
    is_active: Option<bool>,
}

pub async fn update(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(professor_id): Path<Uuid>,
    Json(request): Json<UpdateProfessorRequest>,
) -> Result<Json<ProfessorResponse>, (StatusCode, Json<ApiError>)> {
    require_admin(&state, &jar, Action::ManageProfessors).await?;

    let existing = fetch_summary(state.pool_ref(), professor_id)
        .await
        .map_err(|err| {
            error!(?err, "failed to load professor for update");
            internal_error()
        })?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Profesor no encontrado"))?;

    let name = match request.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => existing.name.clone(),
    };
    let email = match request.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => email.to_lowercase(),
        _ => existing.email.clone(),
    };
    let department = request.department.or(existing.department.clone());
    let is_active = request.is_active.unwrap_or(existing.is_active);

    if email != existing.email {
        let taken: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM professors WHERE email = $1 AND id <> $2")
                .bind(&email)
                .bind(professor_id)
                .fetch_optional(state.pool_ref())
                .await
                .map_err(|err| {
                    error!(?err, "failed to check email uniqueness");
                    internal_error()
                })?;
        if taken.is_some() {
            return Err(json_error(
                StatusCode::BAD_REQUEST,
                "Ya existe un profesor con este email",
            ));
        }
    }

    // Re-derive the role so allowlisted emails keep admin access after edits.
    let role = if authz::is_admin_email(&email) {
        authz::ROLE_ADMIN
    } else {
        existing.role.as_str()
    };

    let password_hash = match request.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(auth::hash_password(password).map_err(|err| {
            error!(%err, "failed to hash replacement password");
            internal_error()
        })?),
        None => None,
    };

    let professor = sqlx::query_as::<_, ProfessorSummary>(&format!(
        "UPDATE professors SET name = $2, email = $3, department = $4, role = $5, \
         is_active = $6, password_hash = COALESCE($7, password_hash), updated_at = NOW()
         WHERE id = $1
         RETURNING {SUMMARY_COLUMNS}"
    ))
    .bind(professor_id)
    .bind(&name)
    .bind(&email)
    .bind(department.as_deref())
    .bind(role)
    .bind(is_active)
    .bind(password_hash.as_deref())
    .fetch_one(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, "failed to update professor");
        internal_error()
    })?;

    Ok(Json(ProfessorResponse {
        success: true,
        professor,
    }))
}

pub async fn remove(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(professor_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ApiError>)> {
    let caller = require_admin(&state, &jar, Action::ManageProfessors).await?;

    if caller.id == professor_id {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "No puedes eliminar tu propia cuenta",
        ));
    }

    let target = fetch_summary(state.pool_ref(), professor_id)
        .await
        .map_err(|err| {
            error!(?err, "failed to load professor for deletion");
            internal_error()
        })?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Profesor no encontrado"))?;

    if authz::Role::from_str(&target.role) == authz::Role::Admin {
        return Err(json_error(
            StatusCode::FORBIDDEN,
            "No se puede eliminar otra cuenta de administrador",
        ));
    }

    // Sessions cascade with the account row.
    sqlx::query("DELETE FROM professors WHERE id = $1")
        .bind(professor_id)
        .execute(state.pool_ref())
        .await
        .map_err(|err| {
            error!(?err, "failed to delete professor");
            internal_error()
        })?;

    info!(professor_id = %professor_id, "professor account deleted");

    Ok(Json(MessageResponse {
        success: true,
        message: "Profesor eliminado exitosamente".to_string(),
    }))
}

async fn fetch_summary(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<ProfessorSummary>> {
    sqlx::query_as::<_, ProfessorSummary>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM professors WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}
