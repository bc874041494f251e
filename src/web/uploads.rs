use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use axum::extract::Multipart;
use chrono::Utc;
use tokio::{fs::File, io::AsyncWriteExt};

/// Result type used by the shared upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when validating or persisting uploaded files.
#[derive(Debug)]
pub struct UploadError {
    message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UploadError {}

/// Stored names prefix the sanitized original with the upload timestamp,
/// keeping concurrent uploads of the same file apart.
fn timestamped_name(sanitized_original: &str) -> String {
    format!("{}-{}", Utc::now().timestamp_millis(), sanitized_original)
}

/// Expectations for a single multipart file field.
#[derive(Debug, Clone, Copy)]
pub struct FileFieldConfig<'a> {
    pub field_name: &'a str,
    pub allowed_extensions: &'a [&'a str],
    pub max_files: usize,
}

impl<'a> FileFieldConfig<'a> {
    pub fn new(field_name: &'a str, allowed_extensions: &'a [&'a str], max_files: usize) -> Self {
        Self {
            field_name,
            allowed_extensions,
            max_files,
        }
    }
}

/// Metadata describing a stored upload on disk.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub field_name: String,
    pub original_name: String,
    pub stored_name: String,
}

/// Aggregated output of the upload processor.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub files: Vec<SavedFile>,
    pub text_fields: HashMap<String, Vec<String>>,
}

impl UploadOutcome {
    pub fn first_file_for(&self, field_name: &str) -> Option<&SavedFile> {
        self.files
            .iter()
            .find(|file| file.field_name == field_name)
    }

    pub fn first_text(&self, field_name: &str) -> Option<&str> {
        self.text_fields
            .get(field_name)
            .and_then(|values| values.first().map(|s| s.as_str()))
    }
}

/// Ensures the destination directory exists.
pub async fn ensure_directory(path: &Path) -> UploadResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|err| UploadError::new(format!("No se pudo crear el directorio de subida: {err}")))
}

/// Parses multipart form data, persisting files according to the provided
/// configuration. Unknown file fields and disallowed extensions are rejected
/// before anything is written for them.
pub async fn process_upload_form(
    mut multipart: Multipart,
    dest_dir: &Path,
    field_configs: &[FileFieldConfig<'_>],
) -> UploadResult<UploadOutcome> {
    ensure_directory(dest_dir).await?;

    let mut field_states = HashMap::new();
    for config in field_configs {
        field_states.insert(
            config.field_name.to_string(),
            FieldState {
                config: *config,
                count: 0,
            },
        );
    }

    let allowed_lookup: HashMap<&str, HashSet<String>> = field_configs
        .iter()
        .map(|config| {
            let set = config
                .allowed_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect();
            (config.field_name, set)
        })
        .collect();

    let mut text_fields: HashMap<String, Vec<String>> = HashMap::new();
    let mut saved_files: Vec<SavedFile> = Vec::new();
    let mut used_names: HashSet<String> = HashSet::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::new(format!("Error al procesar el formulario: {err}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field.file_name().is_none() {
            let value = field.text().await.map_err(|err| {
                UploadError::new(format!("Error al leer el campo `{field_name}`: {err}"))
            })?;
            text_fields
                .entry(field_name.clone())
                .or_default()
                .push(value);
            continue;
        }

        let Some(state) = field_states.get_mut(field_name.as_str()) else {
            return Err(UploadError::new(format!(
                "Campo de archivo no soportado: `{field_name}`"
            )));
        };

        if state.count >= state.config.max_files {
            return Err(UploadError::new(format!(
                "El campo `{}` admite como máximo {} archivo(s)",
                state.config.field_name, state.config.max_files
            )));
        }

        let file_name = field.file_name().unwrap_or("upload.bin").to_string();
        let mut sanitized = sanitize_filename::sanitize(&file_name);
        let extension = Path::new(&file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if sanitized.is_empty() {
            sanitized = if extension.is_empty() {
                format!("file_{}", state.count)
            } else {
                format!("file_{}.{}", state.count, extension)
            };
        }

        let allowed = allowed_lookup
            .get(state.config.field_name)
            .expect("allowed lookup should exist");

        if !allowed.is_empty() && !allowed.contains(&extension) {
            return Err(UploadError::new(format!(
                "El campo `{}` no admite archivos `{extension}`",
                state.config.field_name
            )));
        }

        let stored_name = unique_name(timestamped_name(&sanitized), &mut used_names);
        let stored_path = dest_dir.join(&stored_name);
        let mut file = File::create(&stored_path)
            .await
            .map_err(|err| UploadError::new(format!("Error al guardar el archivo: {err}")))?;

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| UploadError::new(format!("Error al leer los datos subidos: {err}")))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|err| UploadError::new(format!("Error al escribir el archivo: {err}")))?;
        }
        file.flush()
            .await
            .map_err(|err| UploadError::new(format!("Error al cerrar el archivo: {err}")))?;

        saved_files.push(SavedFile {
            field_name: state.config.field_name.to_string(),
            original_name: file_name,
            stored_name,
        });

        state.count += 1;
    }

    Ok(UploadOutcome {
        files: saved_files,
        text_fields,
    })
}

#[derive(Clone, Copy, Debug)]
struct FieldState<'a> {
    config: FileFieldConfig<'a>,
    count: usize,
}

fn unique_name(candidate: String, used: &mut HashSet<String>) -> String {
    if used.insert(candidate.clone()) {
        return candidate;
    }

    let (stem, extension) = split_name(&candidate);
    let mut counter = 1usize;
    loop {
        let attempt = if extension.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, extension)
        };
        if used.insert(attempt.clone()) {
            return attempt;
        }
        counter += 1;
    }
}

fn split_name(name: &str) -> (String, String) {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_string();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string();
    (stem, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_names_are_timestamp_prefixed() {
        let name = timestamped_name("doc.pdf");
        let (prefix, rest) = name.split_once('-').expect("timestamp separator");
        assert!(prefix.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(rest, "doc.pdf");
    }

    #[test]
    fn unique_name_appends_counter() {
        let mut used = HashSet::new();
        let first = unique_name("file.pdf".to_string(), &mut used);
        let second = unique_name("file.pdf".to_string(), &mut used);
        assert_eq!(first, "file.pdf");
        assert_eq!(second, "file_1.pdf");
    }

    #[test]
    fn split_name_handles_extension() {
        let (stem, ext) = split_name("report.final.pdf");
        assert_eq!(stem, "report.final");
        assert_eq!(ext, "pdf");
    }

    #[tokio::test]
    async fn ensure_directory_creates_nested_paths() {
        let root = tempfile::tempdir().expect("tempdir");
        let nested = root.path().join("a").join("b");

        ensure_directory(&nested).await.expect("create nested dir");
        assert!(nested.is_dir());

        // Idempotent on an existing directory.
        ensure_directory(&nested).await.expect("re-create");
    }
}
