//! REST API route handlers
//!
//! Endpoints for model discovery, streaming chat, history swap, upload
//! spooling, and the input reset affordance.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::{DEFAULT_MAX_TOKENS, MAX_MAX_TOKENS, MIN_MAX_TOKENS};
use crate::llm::AnswerEvent;
use crate::router::RouterError;
use crate::web::{frontend, AppState};

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

/// Serve the embedded chat page with the configured title filled in.
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(frontend::INDEX_HTML.replace("{{web_name}}", &state.settings.web_name))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Response payload for the `/api/status` endpoint.
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub name: String,
    pub version: &'static str,
    pub model_count: usize,
}

/// Return basic liveness information.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        name: state.settings.web_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        model_count: state.router.model_names().len(),
    })
}

// ---------------------------------------------------------------------------
// GET /api/models
// ---------------------------------------------------------------------------

/// Response payload for the `/api/models` endpoint.
#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default_model: Option<String>,
    pub system_message: String,
    pub min_max_tokens: u32,
    pub max_max_tokens: u32,
    pub default_max_tokens: u32,
}

/// List the configured models plus the UI defaults.
pub async fn models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let names = state.router.model_names();
    Json(ModelsResponse {
        models: names.to_vec(),
        default_model: names.first().cloned(),
        system_message: state.settings.default_system().to_string(),
        min_max_tokens: MIN_MAX_TOKENS,
        max_max_tokens: MAX_MAX_TOKENS,
        default_max_tokens: DEFAULT_MAX_TOKENS,
    })
}

// ---------------------------------------------------------------------------
// POST /api/chat
// ---------------------------------------------------------------------------

/// Request body for the streaming chat endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    /// Target model name
    pub model: String,
    /// The user message
    pub message: String,
    /// Requested answer budget; clamped to the UI bounds
    pub max_tokens: Option<u32>,
    /// System message override; empty keeps the current one
    #[serde(default)]
    pub system_message: String,
    /// Spooled image path from `/api/upload`
    pub image_path: Option<PathBuf>,
    /// Spooled file path from `/api/upload`
    pub file_path: Option<PathBuf>,
}

fn clamp_max_tokens(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_MAX_TOKENS)
        .clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS)
}

fn sse_event(event: AnswerEvent) -> Event {
    let (kind, payload) = match event {
        AnswerEvent::Delta(answer) => ("delta", json!({ "answer": answer })),
        AnswerEvent::Done(answer) => ("done", json!({ "answer": answer })),
        AnswerEvent::Failed(error) => ("error", json!({ "error": error.to_string() })),
    };
    Event::default()
        .event(kind)
        .json_data(payload)
        .unwrap_or_else(|_| Event::default().event(kind))
}

fn error_response(error: &RouterError) -> Response {
    let status = match error {
        RouterError::UnknownModel(_) => StatusCode::NOT_FOUND,
        RouterError::Attachment { .. } => StatusCode::BAD_REQUEST,
    };
    (status, Json(json!({"error": error.to_string()}))).into_response()
}

fn answer_stream(
    receiver: mpsc::Receiver<AnswerEvent>,
) -> impl futures_util::Stream<Item = Result<Event, Infallible>> {
    futures_util::stream::unfold(receiver, |mut receiver| async move {
        receiver
            .recv()
            .await
            .map(|event| (Ok(sse_event(event)), receiver))
    })
}

/// Dispatch a message and stream the cumulative answer back as SSE.
pub async fn chat(State(state): State<Arc<AppState>>, Json(body): Json<ChatBody>) -> Response {
    let max_tokens = clamp_max_tokens(body.max_tokens);

    let routed = state
        .router
        .route(
            &body.model,
            &body.message,
            max_tokens,
            &body.system_message,
            body.image_path,
            body.file_path,
        )
        .await;

    match routed {
        Ok(receiver) => Sse::new(answer_stream(receiver)).into_response(),
        Err(error) => error_response(&error),
    }
}

// ---------------------------------------------------------------------------
// GET /api/history/{model}
// ---------------------------------------------------------------------------

/// Return the finished exchanges for one model, oldest first.
pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
) -> Response {
    match state.router.history(&model).await {
        Ok(records) => (StatusCode::OK, Json(json!(records))).into_response(),
        Err(error) => error_response(&error),
    }
}

// ---------------------------------------------------------------------------
// POST /api/upload
// ---------------------------------------------------------------------------

fn sanitize_file_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .filter(|part| !part.is_empty())
        .unwrap_or("upload")
        .to_string()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
}

/// Spool one uploaded file and return its stored path.
pub async fn upload(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => return bad_request("no file field in upload".to_string()),
        Err(error) => return bad_request(error.to_string()),
    };

    let original = field
        .file_name()
        .map_or_else(|| "upload".to_string(), sanitize_file_name);

    let data = match field.bytes().await {
        Ok(data) => data,
        Err(error) => return bad_request(error.to_string()),
    };

    let stored = state
        .upload_dir
        .join(format!("{}-{original}", Uuid::new_v4()));

    if let Err(error) = tokio::fs::write(&stored, &data).await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": error.to_string()})),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(json!({"path": stored, "file_name": original})),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// POST /api/reset
// ---------------------------------------------------------------------------

/// Report the upload fields as cleared after the fixed settle delay.
pub async fn reset(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.router.reset_inputs().await;
    Json(json!({"image": null, "file": null}))
}
