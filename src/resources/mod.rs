//! Educational-resource CRUD.
//!
//! Professors create and maintain resources; listing is public so the student
//! UI can render the catalog without a session. Uploaded files land under the
//! storage root and are persisted as `/uploads/...` URLs that this module
//! also serves.

use std::path::{Path, PathBuf};

use axum::{
    Json, Router,
    extract::{Multipart, Path as AxumPath, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    authz::{self, Action},
    web::{
        ApiError, AppState, auth,
        auth::Professor,
        json_error,
        uploads::{FileFieldConfig, SavedFile, process_upload_form},
    },
};

pub const PLACEHOLDER_COVER_URL: &str = "https://placehold.co/300x200.png";
const UPLOADS_PREFIX: &str = "/uploads/";

const MAIN_FILE_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "gif", "webp"];
const COVER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/resources", get(list_resources).post(create_resource))
        .route(
            "/api/resources/:id",
            put(update_resource).delete(delete_resource),
        )
        .route("/uploads/:name", get(serve_upload))
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ResourceType {
    Pdf,
    Video,
    Image,
    Article,
    Assessment,
}

impl ResourceType {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pdf" => Some(ResourceType::Pdf),
            "video" => Some(ResourceType::Video),
            "image" => Some(ResourceType::Image),
            "article" => Some(ResourceType::Article),
            "assessment" => Some(ResourceType::Assessment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Pdf => "pdf",
            ResourceType::Video => "video",
            ResourceType::Image => "image",
            ResourceType::Article => "article",
            ResourceType::Assessment => "assessment",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub resource_type: String,
    pub link: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub cover_image_url: Option<String>,
    pub cover_image_name: Option<String>,
    pub ai_hint: Option<String>,
    pub google_form_url: Option<String>,
    pub professor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const RESOURCE_COLUMNS: &str = "id, title, description, type, link, file_url, file_name, \
     cover_image_url, cover_image_name, ai_hint, google_form_url, professor_id, created_at, updated_at";

/// Reference to a stored upload as it will be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UploadedRef {
    url: String,
    name: String,
}

impl UploadedRef {
    fn from_saved(file: &SavedFile) -> Self {
        Self {
            url: format!("{UPLOADS_PREFIX}{}", file.stored_name),
            name: file.original_name.clone(),
        }
    }
}

/// Derived media columns for a resource: the explicit cover wins, then the
/// main file doubles as the cover, then the placeholder image.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MediaFields {
    file_url: Option<String>,
    file_name: Option<String>,
    cover_image_url: String,
    cover_image_name: Option<String>,
}

fn derive_media(file: Option<&UploadedRef>, cover: Option<&UploadedRef>) -> MediaFields {
    let (cover_image_url, cover_image_name) = match (cover, file) {
        (Some(cover), _) => (cover.url.clone(), Some(cover.name.clone())),
        (None, Some(file)) => (file.url.clone(), Some(file.name.clone())),
        (None, None) => (PLACEHOLDER_COVER_URL.to_string(), None),
    };

    MediaFields {
        file_url: file.map(|f| f.url.clone()),
        file_name: file.map(|f| f.name.clone()),
        cover_image_url,
        cover_image_name,
    }
}

/// Assessments treat the link as the authoritative Google Form URL.
fn google_form_url(resource_type: ResourceType, link: Option<&str>) -> Option<String> {
    match resource_type {
        ResourceType::Assessment => link.map(str::to_string),
        _ => None,
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    resource_type: Option<String>,
}

#[derive(Serialize)]
pub struct ResourceListResponse {
    success: bool,
    resources: Vec<ResourceRow>,
}

#[derive(Serialize)]
pub struct ResourceResponse {
    success: bool,
    resource: ResourceRow,
}

pub async fn fetch_resources(
    pool: &PgPool,
    resource_type: Option<ResourceType>,
) -> sqlx::Result<Vec<ResourceRow>> {
    match resource_type {
        Some(kind) => {
            sqlx::query_as::<_, ResourceRow>(&format!(
                "SELECT {RESOURCE_COLUMNS} FROM resources WHERE type = $1 ORDER BY created_at DESC"
            ))
            .bind(kind.as_str())
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, ResourceRow>(&format!(
                "SELECT {RESOURCE_COLUMNS} FROM resources ORDER BY created_at DESC"
            ))
            .fetch_all(pool)
            .await
        }
    }
}

async fn list_resources(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ResourceListResponse>, (StatusCode, Json<ApiError>)> {
    let filter = match query.resource_type.as_deref() {
        Some(raw) => Some(ResourceType::from_str(raw).ok_or_else(|| {
            json_error(StatusCode::BAD_REQUEST, "Tipo de recurso no válido")
        })?),
        None => None,
    };

    let resources = fetch_resources(state.pool_ref(), filter)
        .await
        .map_err(|err| {
            error!(?err, "failed to list resources");
            crate::web::internal_error()
        })?;

    Ok(Json(ResourceListResponse {
        success: true,
        resources,
    }))
}

async fn require_professor(
    state: &AppState,
    jar: &CookieJar,
) -> Result<Professor, (StatusCode, Json<ApiError>)> {
    auth::current_professor(state.pool_ref(), state.jwt_secret(), jar)
        .await
        .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "No autenticado"))
}

fn can_touch(professor: &Professor, resource: &ResourceRow) -> bool {
    resource.professor_id == Some(professor.id)
        || authz::can(professor, Action::ModerateResources)
}

async fn create_resource(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Json<ResourceResponse>, (StatusCode, Json<ApiError>)> {
    let professor = require_professor(&state, &jar).await?;
    if !authz::can(&professor, Action::ManageResources) {
        return Err(crate::web::access_denied());
    }

    let upload = parse_resource_form(&state, multipart).await?;
    let fields = validate_resource_fields(&upload.title, &upload.resource_type)?;
    let (title, resource_type) = fields;

    let media = derive_media(upload.file.as_ref(), upload.cover.as_ref());
    let form_url = google_form_url(resource_type, upload.link.as_deref());

    let resource = sqlx::query_as::<_, ResourceRow>(&format!(
        "INSERT INTO resources (id, title, description, type, link, file_url, file_name, \
         cover_image_url, cover_image_name, ai_hint, google_form_url, professor_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         RETURNING {RESOURCE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&title)
    .bind(upload.description.as_deref())
    .bind(resource_type.as_str())
    .bind(upload.link.as_deref())
    .bind(media.file_url.as_deref())
    .bind(media.file_name.as_deref())
    .bind(&media.cover_image_url)
    .bind(media.cover_image_name.as_deref())
    .bind(upload.ai_hint.as_deref())
    .bind(form_url.as_deref())
    .bind(professor.id)
    .fetch_one(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, "failed to insert resource");
        crate::web::internal_error()
    })?;

    Ok(Json(ResourceResponse {
        success: true,
        resource,
    }))
}

async fn update_resource(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(resource_id): AxumPath<Uuid>,
    multipart: Multipart,
) -> Result<Json<ResourceResponse>, (StatusCode, Json<ApiError>)> {
    let professor = require_professor(&state, &jar).await?;

    let existing = fetch_resource(state.pool_ref(), resource_id)
        .await
        .map_err(|err| {
            error!(?err, "failed to load resource for update");
            crate::web::internal_error()
        })?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Recurso no encontrado"))?;

    if !can_touch(&professor, &existing) {
        return Err(crate::web::access_denied());
    }

    let upload = parse_resource_form(&state, multipart).await?;

    let title = match upload.title {
        Some(title) if !title.trim().is_empty() => title.trim().to_string(),
        _ => existing.title.clone(),
    };
    let resource_type = match upload.resource_type.as_deref() {
        Some(raw) => ResourceType::from_str(raw)
            .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "Tipo de recurso no válido"))?,
        None => ResourceType::from_str(&existing.resource_type)
            .unwrap_or(ResourceType::Article),
    };
    let description = upload.description.or(existing.description.clone());
    let link = upload.link.or(existing.link.clone());
    let ai_hint = upload.ai_hint.or(existing.ai_hint.clone());

    // New uploads replace the stored references; otherwise the old media
    // stands, deriving a cover only when there was none.
    let (file_url, file_name) = match upload.file.as_ref() {
        Some(file) => (Some(file.url.clone()), Some(file.name.clone())),
        None => (existing.file_url.clone(), existing.file_name.clone()),
    };
    let (cover_image_url, cover_image_name) = match upload.cover.as_ref() {
        Some(cover) => (cover.url.clone(), Some(cover.name.clone())),
        None => match existing.cover_image_url.clone() {
            Some(url) => (url, existing.cover_image_name.clone()),
            None => {
                let derived = derive_media(upload.file.as_ref(), None);
                (derived.cover_image_url, derived.cover_image_name)
            }
        },
    };

    let form_url = google_form_url(resource_type, link.as_deref());

    let resource = sqlx::query_as::<_, ResourceRow>(&format!(
        "UPDATE resources SET title = $2, description = $3, type = $4, link = $5, file_url = $6, \
         file_name = $7, cover_image_url = $8, cover_image_name = $9, ai_hint = $10, \
         google_form_url = $11, updated_at = NOW()
         WHERE id = $1
         RETURNING {RESOURCE_COLUMNS}"
    ))
    .bind(resource_id)
    .bind(&title)
    .bind(description.as_deref())
    .bind(resource_type.as_str())
    .bind(link.as_deref())
    .bind(file_url.as_deref())
    .bind(file_name.as_deref())
    .bind(&cover_image_url)
    .bind(cover_image_name.as_deref())
    .bind(ai_hint.as_deref())
    .bind(form_url.as_deref())
    .fetch_one(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, "failed to update resource");
        crate::web::internal_error()
    })?;

    Ok(Json(ResourceResponse {
        success: true,
        resource,
    }))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    success: bool,
    message: String,
}

async fn delete_resource(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(resource_id): AxumPath<Uuid>,
) -> Result<Json<DeleteResponse>, (StatusCode, Json<ApiError>)> {
    let professor = require_professor(&state, &jar).await?;

    let existing = fetch_resource(state.pool_ref(), resource_id)
        .await
        .map_err(|err| {
            error!(?err, "failed to load resource for deletion");
            crate::web::internal_error()
        })?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Recurso no encontrado"))?;

    if !can_touch(&professor, &existing) {
        return Err(crate::web::access_denied());
    }

    sqlx::query("DELETE FROM resources WHERE id = $1")
        .bind(resource_id)
        .execute(state.pool_ref())
        .await
        .map_err(|err| {
            error!(?err, "failed to delete resource");
            crate::web::internal_error()
        })?;

    // Best-effort cleanup of stored files; the row is already gone.
    remove_stored_files(&state, &existing).await;

    Ok(Json(DeleteResponse {
        success: true,
        message: "Recurso eliminado exitosamente".to_string(),
    }))
}

pub async fn fetch_resource(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<ResourceRow>> {
    sqlx::query_as::<_, ResourceRow>(&format!(
        "SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

async fn remove_stored_files(state: &AppState, resource: &ResourceRow) {
    let urls = [resource.file_url.as_deref(), resource.cover_image_url.as_deref()];

    for url in urls.into_iter().flatten() {
        let Some(name) = url.strip_prefix(UPLOADS_PREFIX) else {
            continue;
        };
        let path = PathBuf::from(state.storage_root()).join(name);
        if let Err(err) = tokio::fs::remove_file(&path).await {
            warn!(?err, file = %path.display(), "failed to remove stored resource file");
        }
    }
}

/// Text + file fields extracted from the multipart form.
struct ResourceForm {
    title: Option<String>,
    description: Option<String>,
    resource_type: Option<String>,
    link: Option<String>,
    ai_hint: Option<String>,
    file: Option<UploadedRef>,
    cover: Option<UploadedRef>,
}

async fn parse_resource_form(
    state: &AppState,
    multipart: Multipart,
) -> Result<ResourceForm, (StatusCode, Json<ApiError>)> {
    let configs = [
        FileFieldConfig::new("file", MAIN_FILE_EXTENSIONS, 1),
        FileFieldConfig::new("cover_image", COVER_EXTENSIONS, 1),
    ];

    let outcome = process_upload_form(multipart, Path::new(state.storage_root()), &configs)
        .await
        .map_err(|err| json_error(StatusCode::BAD_REQUEST, err.message().to_string()))?;

    let text = |name: &str| {
        outcome
            .first_text(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    Ok(ResourceForm {
        title: text("title"),
        description: text("description"),
        resource_type: text("type"),
        link: text("link"),
        ai_hint: text("ai_hint"),
        file: outcome.first_file_for("file").map(UploadedRef::from_saved),
        cover: outcome
            .first_file_for("cover_image")
            .map(UploadedRef::from_saved),
    })
}

fn validate_resource_fields(
    title: &Option<String>,
    resource_type: &Option<String>,
) -> Result<(String, ResourceType), (StatusCode, Json<ApiError>)> {
    let title = title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "El título es obligatorio"))?;

    let resource_type = resource_type
        .as_deref()
        .and_then(ResourceType::from_str)
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "Tipo de recurso no válido"))?;

    Ok((title.to_string(), resource_type))
}

async fn serve_upload(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    // Stored names never contain separators; reject anything that does.
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(json_error(StatusCode::BAD_REQUEST, "Nombre de archivo no válido"));
    }

    let path = PathBuf::from(state.storage_root()).join(&name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| json_error(StatusCode::NOT_FOUND, "Archivo no encontrado"))?;

    let mut headers = axum::http::HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(content_type_for(&name)),
    );

    Ok((headers, bytes).into_response())
}

fn content_type_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploaded(url: &str, name: &str) -> UploadedRef {
        UploadedRef {
            url: url.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn explicit_cover_wins() {
        let file = uploaded("/uploads/1-doc.pdf", "doc.pdf");
        let cover = uploaded("/uploads/2-cover.png", "cover.png");
        let media = derive_media(Some(&file), Some(&cover));

        assert_eq!(media.cover_image_url, "/uploads/2-cover.png");
        assert_eq!(media.cover_image_name.as_deref(), Some("cover.png"));
        assert_eq!(media.file_url.as_deref(), Some("/uploads/1-doc.pdf"));
    }

    #[test]
    fn main_file_doubles_as_cover() {
        let file = uploaded("/uploads/1-doc.pdf", "doc.pdf");
        let media = derive_media(Some(&file), None);

        assert_eq!(media.cover_image_url, "/uploads/1-doc.pdf");
        assert_eq!(media.cover_image_name.as_deref(), Some("doc.pdf"));
    }

    #[test]
    fn placeholder_when_nothing_uploaded() {
        let media = derive_media(None, None);

        assert_eq!(media.cover_image_url, PLACEHOLDER_COVER_URL);
        assert_eq!(media.cover_image_name, None);
        assert_eq!(media.file_url, None);
    }

    #[test]
    fn assessments_copy_the_link_into_google_form_url() {
        assert_eq!(
            google_form_url(ResourceType::Assessment, Some("https://forms.example/f")),
            Some("https://forms.example/f".to_string())
        );
        assert_eq!(google_form_url(ResourceType::Pdf, Some("https://x")), None);
        assert_eq!(google_form_url(ResourceType::Assessment, None), None);
    }

    #[test]
    fn resource_type_round_trips() {
        for raw in ["pdf", "video", "image", "article", "assessment"] {
            let parsed = ResourceType::from_str(raw).expect("known type");
            assert_eq!(parsed.as_str(), raw);
        }
        assert_eq!(ResourceType::from_str("podcast"), None);
    }

    #[test]
    fn content_types_cover_known_extensions() {
        assert_eq!(content_type_for("a.pdf"), "application/pdf");
        assert_eq!(content_type_for("a.PNG"), "image/png");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
    }
}
