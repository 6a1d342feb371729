//! JSON HTTP server for multi-session question answering.
//!
//! Each session owns its documents, indexes and pipeline. Sessions are
//! isolated from each other; the session map is the only shared state.
//! Sessions idle for `[server].session_ttl_secs` are discarded, and at most
//! `[server].max_sessions` are kept (least recently used goes first).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/sessions` | Create a session from documents or a transcript |
//! | `POST`   | `/sessions/{id}/ask` | Run a question through the pipeline |
//! | `POST`   | `/sessions/{id}/summarize` | Summarize the session's documents |
//! | `DELETE` | `/sessions/{id}` | Discard a session |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `model_mismatch` (409),
//! `unparsable_verification` (502), `provider_unavailable` (503), `internal` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use docgate_core::models::Document;
use docgate_core::pipeline::PipelineRun;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::session::{Providers, Session};
use crate::transcript::{self, Segment};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    providers: Providers,
    sessions: Arc<Mutex<SessionStore<Arc<Session>>>>,
}

impl AppState {
    pub fn new(config: Config, providers: Providers) -> Self {
        let store = SessionStore::new(
            config.server.max_sessions,
            Duration::from_secs(config.server.session_ttl_secs),
        );
        Self {
            config: Arc::new(config),
            providers,
            sessions: Arc::new(Mutex::new(store)),
        }
    }
}

struct Entry<T> {
    value: T,
    last_used: Instant,
}

/// Sessions keyed by id, bounded in count and idle time.
///
/// Idle entries are pruned on every access. Inserting beyond `max`
/// evicts the least recently used entry.
pub struct SessionStore<T> {
    entries: HashMap<Uuid, Entry<T>>,
    max: usize,
    ttl: Duration,
}

impl<T: Clone> SessionStore<T> {
    pub fn new(max: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max: max.max(1),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, id: Uuid, value: T, now: Instant) {
        self.prune(now);
        while self.entries.len() >= self.max {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(id, _)| *id);
            match oldest {
                Some(old) => {
                    self.entries.remove(&old);
                    info!(session = %old, "session evicted");
                }
                None => break,
            }
        }
        self.entries.insert(
            id,
            Entry {
                value,
                last_used: now,
            },
        );
    }

    /// Look up `id`, refreshing its idle timer.
    pub fn get(&mut self, id: &Uuid, now: Instant) -> Option<T> {
        self.prune(now);
        let entry = self.entries.get_mut(id)?;
        entry.last_used = now;
        Some(entry.value.clone())
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<T> {
        self.entries.remove(id).map(|e| e.value)
    }

    fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.last_used) < ttl);
        let expired = before - self.entries.len();
        if expired > 0 {
            info!(expired, "idle sessions discarded");
        }
    }
}

/// Build the router with CORS open to all origins.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/{id}", delete(handle_delete_session))
        .route("/sessions/{id}/ask", post(handle_ask))
        .route("/sessions/{id}/summarize", post(handle_summarize))
        .layer(cors)
        .with_state(state)
}

/// Serve on an already bound listener.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let providers = Providers::from_config(config)?;
    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "docgate server listening");
    serve(listener, AppState::new(config.clone(), providers)).await
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// Map pipeline errors to the most appropriate HTTP status.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        use docgate_core::Error as CoreError;

        let message = format!("{:#}", err);
        let (status, code) = match err.chain().find_map(|e| e.downcast_ref::<CoreError>()) {
            Some(CoreError::InvalidArgument(_)) | Some(CoreError::NoContext) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            Some(CoreError::ModelMismatch { .. }) | Some(CoreError::IndexNotReady) => {
                (StatusCode::CONFLICT, "model_mismatch")
            }
            Some(CoreError::UnparsableVerification { .. }) => {
                (StatusCode::BAD_GATEWAY, "unparsable_verification")
            }
            Some(CoreError::ProviderUnavailable { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "provider_unavailable")
            }
            None => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            warn!(code, error = %message, "request failed");
        }
        AppError {
            status,
            code,
            message,
        }
    }
}

async fn lookup(state: &AppState, id: &str) -> Result<Arc<Session>, AppError> {
    let uuid = Uuid::parse_str(id).map_err(|_| not_found(format!("no session: {}", id)))?;
    state
        .sessions
        .lock()
        .await
        .get(&uuid, Instant::now())
        .ok_or_else(|| not_found(format!("no session: {}", id)))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /sessions ============

#[derive(Deserialize)]
struct DocumentInput {
    #[serde(default)]
    id: Option<String>,
    text: String,
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    documents: Option<Vec<DocumentInput>>,
    #[serde(default)]
    transcript: Option<Vec<Segment>>,
}

#[derive(Serialize)]
struct CreateSessionResponse {
    session_id: Uuid,
    documents: usize,
    chunks: usize,
}

async fn handle_create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let documents: Vec<Document> = match (req.documents, req.transcript) {
        (Some(docs), None) if !docs.is_empty() => docs
            .into_iter()
            .enumerate()
            .map(|(i, d)| {
                let id = d.id.unwrap_or_else(|| format!("doc-{}", i));
                Document::with_id(id.clone(), id, d.text, chrono::Utc::now())
            })
            .collect(),
        (None, Some(segments)) if !segments.is_empty() => {
            vec![transcript::to_document("transcript", &segments)]
        }
        (Some(_), Some(_)) => {
            return Err(bad_request(
                "provide either documents or transcript, not both",
            ))
        }
        _ => return Err(bad_request("documents or transcript must not be empty")),
    };

    let session = Session::build(&state.config, &state.providers, documents).await?;
    let response = CreateSessionResponse {
        session_id: session.id(),
        documents: session.documents().len(),
        chunks: session.chunks().len(),
    };
    state
        .sessions
        .lock()
        .await
        .insert(session.id(), Arc::new(session), Instant::now());

    Ok((StatusCode::CREATED, Json(response)))
}

// ============ POST /sessions/{id}/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AskRequest>,
) -> Result<Json<PipelineRun>, AppError> {
    let session = lookup(&state, &id).await?;
    let run = session.ask(&req.question).await?;
    Ok(Json(run))
}

// ============ POST /sessions/{id}/summarize ============

#[derive(Serialize)]
struct SummaryResponse {
    summary: String,
}

async fn handle_summarize(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>, AppError> {
    let session = lookup(&state, &id).await?;
    let summary = session.summarize().await?;
    Ok(Json(SummaryResponse { summary }))
}

// ============ DELETE /sessions/{id} ============

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let session = lookup(&state, &id).await?;
    state.sessions.lock().await.remove(&session.id());
    info!(session = %session.id(), "session discarded");
    Ok(StatusCode::NO_CONTENT)
}
