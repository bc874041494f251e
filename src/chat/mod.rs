//! Chat orchestration for the student-facing assistant.
//!
//! Builds a system + history + user message sequence, optionally grounded in
//! text extracted from an uploaded PDF, and forwards it to the OpenRouter
//! chat-completion API. Upstream failures never surface raw: they become
//! apologetic `answer` strings so the client always receives well-formed JSON.

use std::{env, time::Duration};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::{
    pdf::{self, PdfError},
    web::{ApiError, AppState, json_error},
};

const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const CHAT_MODEL: &str = "mistralai/mistral-7b-instruct";
const MAX_TOKENS: u32 = 256;
const REQUEST_TIMEOUT_SECS: u64 = 60;

const SYSTEM_PERSONA: &str = "Eres un tutor inteligente/asistente de IA útil para \"Primary Care Companion\", una pagina diseñada para ayudar a los estudiantes a aprender y consultar sobre temas de atención primaria. Responde siempre en español. Contesta las preguntas de manera precisa y concisa, y organizada, basándote en tu conocimiento sobre atención primaria.";

const PDF_UNREADABLE_NOTE: &str = "Se intentó leer un PDF proporcionado por el usuario, pero no se pudo extraer su contenido.\n\n";

const FALLBACK_ANSWER: &str = "Lo siento, no pude obtener una respuesta clara en este momento.";

pub fn router() -> Router<AppState> {
    Router::new().route("/api/chat", post(chat_turn))
}

/// Thin OpenRouter client. The API key is optional at construction so a
/// misconfigured deployment still boots and reports the problem per request.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    api_key: Option<String>,
}

/// Failures of a completion call, kept apart so the handler can template the
/// right user-facing message.
#[derive(Debug)]
pub enum ChatApiError {
    MissingApiKey,
    Upstream { status: String, body: String },
    Transport(String),
}

impl ChatClient {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENROUTER_API_KEY").ok();
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http, api_key })
    }

    /// Execute one chat completion and return the assistant text.
    pub async fn complete(&self, messages: &[serde_json::Value]) -> Result<String, ChatApiError> {
        let Some(api_key) = self.api_key.as_ref() else {
            return Err(ChatApiError::MissingApiKey);
        };

        let payload = serde_json::json!({
            "model": CHAT_MODEL,
            "messages": messages,
            "max_tokens": MAX_TOKENS,
        });

        let response = self
            .http
            .post(OPENROUTER_CHAT_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ChatApiError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let status_text = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            let body = response.text().await.unwrap_or_default();
            return Err(ChatApiError::Upstream {
                status: status_text,
                body,
            });
        }

        let body: CompletionPayload = response
            .json()
            .await
            .map_err(|err| ChatApiError::Transport(err.to_string()))?;

        let answer = body
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| FALLBACK_ANSWER.to_string());

        Ok(answer)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionPayload {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Validated by hand: a missing or non-string question is a 400, not a
    /// deserialization failure.
    #[serde(default)]
    question: Option<serde_json::Value>,
    #[serde(default)]
    history: Vec<HistoryMessage>,
    #[serde(default)]
    pdf_context_data_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: HistoryRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub answer: String,
}

/// How the optional PDF context resolved for this turn.
enum PdfContext {
    None,
    Extracted(String),
    Unreadable,
}

fn system_prompt(context: &PdfContext) -> String {
    match context {
        PdfContext::None => SYSTEM_PERSONA.to_string(),
        PdfContext::Extracted(text) => format!(
            "El usuario ha proporcionado el siguiente contenido de un PDF como contexto adicional:\n---\n{text}\n---\nConsidera esta información al responder.\n\n{SYSTEM_PERSONA}"
        ),
        PdfContext::Unreadable => format!("{PDF_UNREADABLE_NOTE}{SYSTEM_PERSONA}"),
    }
}

/// System message first, history in order, user question last.
fn assemble_messages(
    question: &str,
    history: &[HistoryMessage],
    context: &PdfContext,
) -> Vec<serde_json::Value> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(serde_json::json!({
        "role": "system",
        "content": system_prompt(context),
    }));

    for entry in history {
        messages.push(serde_json::json!({
            "role": entry.role,
            "content": entry.content,
        }));
    }

    messages.push(serde_json::json!({
        "role": "user",
        "content": question,
    }));

    messages
}

fn upstream_apology(status: &str) -> String {
    format!(
        "Lo siento, no se pudo obtener una respuesta del asistente IA (Error: {status}). Inténtalo de nuevo más tarde."
    )
}

fn transport_apology(detail: &str) -> String {
    format!(
        "Lo siento, ha ocurrido un error al contactar al asistente IA ({detail}). Inténtalo de nuevo más tarde."
    )
}

async fn resolve_pdf_context(data_uri: Option<String>) -> PdfContext {
    let Some(data_uri) = data_uri else {
        return PdfContext::None;
    };

    // Extraction is CPU-bound; keep it off the async workers.
    let outcome = tokio::task::spawn_blocking(move || pdf::extract_text_from_data_uri(&data_uri))
        .await
        .unwrap_or_else(|err| Err(PdfError::ParseFailed(err.to_string())));

    match outcome {
        Ok(text) if !text.is_empty() => PdfContext::Extracted(text),
        Ok(_) => PdfContext::Unreadable,
        Err(err) => {
            warn!(%err, "PDF context extraction failed, degrading chat turn");
            PdfContext::Unreadable
        }
    }
}

/// The question must be a non-empty string value; anything else is malformed
/// input, not a degradable condition.
fn validated_question(request: &ChatRequest) -> Option<String> {
    request
        .question
        .as_ref()
        .and_then(|q| q.as_str())
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
}

async fn chat_turn(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), (StatusCode, Json<ApiError>)> {
    let question = validated_question(&request).ok_or_else(|| {
        json_error(
            StatusCode::BAD_REQUEST,
            "La pregunta es obligatoria y debe ser texto",
        )
    })?;

    // PDF degradation never aborts the turn: a bad upload only changes the
    // system instruction.
    let context = resolve_pdf_context(request.pdf_context_data_uri).await;
    let messages = assemble_messages(&question, &request.history, &context);

    let response = match state.chat_client().complete(&messages).await {
        Ok(answer) => (
            StatusCode::OK,
            Json(ChatResponse {
                error: None,
                answer,
            }),
        ),
        Err(ChatApiError::MissingApiKey) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ChatResponse {
                error: Some("OpenRouter API key not configured".to_string()),
                answer: "El asistente IA no está configurado (falta la clave de API). Contacta al administrador.".to_string(),
            }),
        ),
        Err(ChatApiError::Upstream { status, body }) => {
            error!(%status, %body, "OpenRouter returned an error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse {
                    error: Some("OpenRouter API error".to_string()),
                    answer: upstream_apology(&status),
                }),
            )
        }
        Err(ChatApiError::Transport(detail)) => {
            error!(%detail, "chat completion call failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse {
                    error: Some("Internal server error".to_string()),
                    answer: transport_apology(&detail),
                }),
            )
        }
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Vec<HistoryMessage> {
        vec![
            HistoryMessage {
                role: HistoryRole::User,
                content: "¿Qué es la atención primaria?".to_string(),
            },
            HistoryMessage {
                role: HistoryRole::Assistant,
                content: "Es el primer nivel de contacto...".to_string(),
            },
        ]
    }

    #[test]
    fn messages_are_system_history_question_in_order() {
        let messages = assemble_messages("hola", &history(), &PdfContext::None);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"], "hola");
    }

    #[test]
    fn system_prompt_wraps_extracted_pdf_text() {
        let prompt = system_prompt(&PdfContext::Extracted("contenido del pdf".to_string()));

        assert!(prompt.starts_with("El usuario ha proporcionado"));
        assert!(prompt.contains("---\ncontenido del pdf\n---"));
        assert!(prompt.ends_with(SYSTEM_PERSONA));
    }

    #[test]
    fn unreadable_pdf_degrades_to_note() {
        let prompt = system_prompt(&PdfContext::Unreadable);

        assert!(prompt.starts_with(PDF_UNREADABLE_NOTE));
        assert!(prompt.ends_with(SYSTEM_PERSONA));
    }

    #[test]
    fn plain_turn_uses_bare_persona() {
        assert_eq!(system_prompt(&PdfContext::None), SYSTEM_PERSONA);
    }

    #[test]
    fn apologies_embed_details() {
        assert!(upstream_apology("Bad Gateway").contains("(Error: Bad Gateway)"));
        assert!(transport_apology("connection refused").contains("connection refused"));
    }

    #[test]
    fn question_must_be_a_non_empty_string() {
        let from = |body: &str| serde_json::from_str::<ChatRequest>(body).expect("parse");

        assert_eq!(
            validated_question(&from(r#"{"question":"  hola  "}"#)).as_deref(),
            Some("hola")
        );
        assert_eq!(validated_question(&from(r#"{}"#)), None);
        assert_eq!(validated_question(&from(r#"{"question":""}"#)), None);
        assert_eq!(validated_question(&from(r#"{"question":42}"#)), None);
        assert_eq!(validated_question(&from(r#"{"question":null}"#)), None);
    }

    #[test]
    fn malformed_question_maps_to_structured_error_body() {
        let (status, body) = json_error(
            StatusCode::BAD_REQUEST,
            "La pregunta es obligatoria y debe ser texto",
        );
        let value = serde_json::to_value(body.0).expect("serialize");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "La pregunta es obligatoria y debe ser texto");
        assert!(value.get("answer").is_none());
    }

    #[test]
    fn history_roles_serialize_lowercase() {
        let value = serde_json::to_value(HistoryRole::Assistant).expect("serialize");
        assert_eq!(value, "assistant");
    }
}
