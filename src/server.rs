//! HTTP server.
//!
//! Thin JSON layer over [`ChatService`]. The corpus and template registry are
//! built once before the router is created and shared read-only by every
//! handler.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/openai/chat` | Plain chat, optional system prompt or template |
//! | `POST` | `/api/openai/chat-with-template` | Chat through a rendered template |
//! | `POST` | `/api/rag/chat` | Knowledge-base augmented chat |
//! | `GET`  | `/api/prompts` | List loaded templates |
//! | `GET`  | `/api/prompts/{name}` | One template body |
//! | `GET`  | `/health` | Health check with load counts |
//! | `GET`  | `/` | Service info |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "prompt template 'x' not found" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `provider_error` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends can
//! call the API directly.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::Instrument;
use uuid::Uuid;

use kb_chat_core::models::TemplateInfo;

use crate::chat::{ChatError, ChatRequest, ChatResponse, ChatService, RagChatRequest, RagChatResponse};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    chat: Arc<ChatService>,
    started_at: DateTime<Utc>,
}

/// Builds the router without binding a socket.
pub fn router(chat: ChatService) -> Router {
    let state = AppState {
        chat: Arc::new(chat),
        started_at: Utc::now(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/api/openai/chat", post(handle_chat))
        .route("/api/openai/chat-with-template", post(handle_chat_with_template))
        .route("/api/rag/chat", post(handle_rag_chat))
        .route("/api/prompts", get(handle_list_prompts))
        .route("/api/prompts/{name}", get(handle_get_prompt))
        .layer(cors)
        .with_state(state)
}

/// Binds `bind` and serves until the process is terminated.
pub async fn run_server(bind: &str, chat: ChatService) -> anyhow::Result<()> {
    tracing::info!(
        bind = %bind,
        model = chat.model(),
        fragments = chat.corpus().len(),
        templates = chat.templates().len(),
        "chat server listening"
    );

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, router(chat)).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn provider_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "provider_error".to_string(),
        message: message.into(),
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        if err.is_client_error() {
            bad_request(err.to_string())
        } else {
            provider_error(err.to_string())
        }
    }
}

/// Decodes a request body via `serde_json::Value` so that syntax errors and
/// schema errors (e.g. an unknown message role) share the JSON envelope.
fn decode<T: DeserializeOwned>(body: Result<Json<serde_json::Value>, JsonRejection>) -> Result<T, AppError> {
    let Json(value) = body.map_err(|e| bad_request(e.body_text()))?;
    serde_json::from_value(value).map_err(|e| bad_request(format!("invalid request body: {}", e)))
}

fn request_span(route: &'static str) -> tracing::Span {
    tracing::info_span!("request", id = %Uuid::new_v4(), route)
}

// ============ POST /api/openai/chat ============

async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let request: ChatRequest = decode(body)?;
    let response = state
        .chat
        .chat(&request)
        .instrument(request_span("chat"))
        .await?;
    Ok(Json(response))
}

// ============ POST /api/openai/chat-with-template ============

async fn handle_chat_with_template(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let request: ChatRequest = decode(body)?;
    let response = state
        .chat
        .chat_with_template(&request)
        .instrument(request_span("chat_with_template"))
        .await?;
    Ok(Json(response))
}

// ============ POST /api/rag/chat ============

async fn handle_rag_chat(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<RagChatResponse>, AppError> {
    let request: RagChatRequest = decode(body)?;
    let response = state
        .chat
        .rag_chat(&request)
        .instrument(request_span("rag_chat"))
        .await?;
    Ok(Json(response))
}

// ============ GET /api/prompts ============

async fn handle_list_prompts(State(state): State<AppState>) -> Json<Vec<TemplateInfo>> {
    Json(state.chat.templates().list())
}

#[derive(Serialize)]
struct PromptResponse {
    name: String,
    content: String,
}

async fn handle_get_prompt(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PromptResponse>, AppError> {
    let content = state
        .chat
        .templates()
        .content(&name)
        .ok_or_else(|| not_found(format!("prompt template '{}' not found", name)))?;
    Ok(Json(PromptResponse {
        content: content.to_string(),
        name,
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    model: String,
    prompts_loaded: usize,
    fragments_loaded: usize,
    version: String,
    started_at: DateTime<Utc>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.chat.model().to_string(),
        prompts_loaded: state.chat.templates().len(),
        fragments_loaded: state.chat.corpus().len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: state.started_at,
    })
}

// ============ GET / ============

async fn handle_root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.chat.model(),
        "prompts_loaded": state.chat.templates().len(),
        "endpoints": {
            "chat": "POST /api/openai/chat",
            "chat_with_template": "POST /api/openai/chat-with-template",
            "rag_chat": "POST /api/rag/chat",
            "prompts": "GET /api/prompts",
            "prompt": "GET /api/prompts/{name}",
            "health": "GET /health",
        },
    }))
}
