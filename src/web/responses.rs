use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

/// Canonical JSON payload for error responses: `{"success": false, "error": ...}`.
#[derive(Debug, Serialize, Clone)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Helper for handlers that return `(StatusCode, Json<ApiError>)`.
pub fn json_error(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError::new(error)))
}

pub fn internal_error() -> (StatusCode, Json<ApiError>) {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Error interno del servidor",
    )
}

pub fn access_denied() -> (StatusCode, Json<ApiError>) {
    json_error(
        StatusCode::FORBIDDEN,
        "Acceso denegado: se requieren privilegios de administrador",
    )
}
