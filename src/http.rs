//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question in one response |
//! | `POST` | `/ask/stream` | Answer a question as an SSE token stream |
//! | `POST` | `/ingest` | Ingest park documents into the vector index |
//! | `GET`  | `/health` | Per-module health roll-up |
//!
//! # Error Contract
//!
//! Every error response carries the same body shape:
//!
//! ```json
//! { "error": "Question is required." }
//! ```
//!
//! Client cancellation is never mapped onto an error response; a dropped
//! connection drops the in-flight work with it.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

use crate::agent::{AskError, ParkAssistant};
use crate::bridge::ToolBridge;
use crate::config::Config;
use crate::embedding::{self, EmbeddingGenerator};
use crate::models::{AskRequest, AskResponse, ErrorResponse, IngestRequest};
use crate::pipeline::{self, IngestError};
use crate::qdrant::{QdrantIndex, VectorIndex};
use crate::search_tool::SearchTool;
use crate::stream::{self, StreamEvent};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub embedder: Arc<dyn EmbeddingGenerator>,
    pub index: Arc<dyn VectorIndex>,
    pub agent: Arc<ParkAssistant>,
}

/// Start the HTTP server and the tool bridge, and serve until interrupted.
///
/// The bridge is started once before the first request and torn down after
/// the listener stops accepting connections.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let config = Arc::new(config.clone());

    let index: Arc<dyn VectorIndex> = Arc::new(QdrantIndex::new(&config.qdrant)?);
    let embedder = embedding::create_generator(&config.embedding)?;

    let search = Arc::new(SearchTool::new(embedder.clone(), index.clone()));
    let bridge = Arc::new(ToolBridge::start(search).await?);

    let agent = Arc::new(ParkAssistant::new(&config.llm, bridge.clone())?);

    let state = AppState {
        config: config.clone(),
        embedder,
        index,
        agent,
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("park-knowledge listening on http://{}", config.server.bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    bridge.shutdown().await;
    Ok(())
}

/// Build the router. Separated from [`run_server`] so tests can mount the
/// same routes over mock state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/ask/stream", post(handle_ask_stream))
        .route("/ingest", post(handle_ingest))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// Internal error type that converts into an HTTP response with the stable
/// `{"error": ...}` body.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

/// 499 Client Closed Request. The connection is already gone when this is
/// returned, so the response is never written; the distinct status keeps
/// cancellation out of the failure paths and the logs.
fn client_closed_request() -> Response {
    let status = StatusCode::from_u16(499).unwrap_or(StatusCode::NO_CONTENT);
    status.into_response()
}

// ============ POST /ask ============

async fn handle_ask(State(state): State<AppState>, Json(body): Json<AskRequest>) -> Response {
    if body.question.trim().is_empty() {
        eprintln!("warning: received ask request with empty question");
        return bad_request("Question is required.").into_response();
    }

    println!("Ask endpoint called with question: {}", body.question);

    match state.agent.ask(&body.question).await {
        Ok(answer) => Json(AskResponse { answer }).into_response(),
        Err(AskError::Cancelled) => client_closed_request(),
        Err(AskError::Failed(error)) => {
            eprintln!("error: failed to process question: {:#}", error);
            internal_error("An error occurred while processing your question.").into_response()
        }
    }
}

// ============ POST /ask/stream ============

async fn handle_ask_stream(
    State(state): State<AppState>,
    Json(body): Json<AskRequest>,
) -> Response {
    if body.question.trim().is_empty() {
        return bad_request("Question is required.").into_response();
    }

    println!("AskStream endpoint called with question: {}", body.question);

    let (tx, rx) = mpsc::channel::<StreamEvent>(16);
    let agent = state.agent.clone();
    let question = body.question;

    // Production runs detached from the response future; the channel is the
    // cancellation signal in both directions.
    tokio::spawn(async move {
        let outcome = agent.ask_stream(&question, &tx).await;
        stream::finish(&tx, outcome).await;
    });

    stream::sse_response(rx)
}

// ============ POST /ingest ============

async fn handle_ingest(
    State(state): State<AppState>,
    Json(body): Json<IngestRequest>,
) -> Response {
    println!("Ingest endpoint called");

    match pipeline::ingest_documents(&state.embedder, &state.index, &body.documents).await {
        Ok(summary) => Json(summary).into_response(),
        Err(IngestError::Validation(message)) => bad_request(message).into_response(),
        Err(IngestError::Upstream(error)) => {
            eprintln!("error: failed to ingest documents: {:#}", error);
            internal_error("An error occurred during ingestion.").into_response()
        }
    }
}

// ============ GET /health ============

/// Per-module health roll-up: `degraded` when any single module is down.
/// The vector index is actually pinged; the LLM and embedding checks are
/// config-only so a health probe never spends tokens or rate limit.
async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let qdrant = match state.index.ping().await {
        Ok(count) => module_health(true, format!("{} collection(s)", count)),
        Err(error) => {
            eprintln!("warning: qdrant health check failed: {:#}", error);
            module_health(false, error.to_string())
        }
    };

    let llm = if std::env::var(&state.config.llm.api_key_env).is_ok() {
        module_health(
            true,
            format!(
                "model={}, endpoint={}",
                state.config.llm.model, state.config.llm.endpoint
            ),
        )
    } else {
        module_health(
            false,
            format!("API key not configured ({})", state.config.llm.api_key_env),
        )
    };

    let embedding = module_health(
        true,
        format!(
            "provider={}, model={}, dims={}",
            state.config.embedding.provider,
            state.config.embedding.model,
            state.config.embedding.dims
        ),
    );

    let all_healthy = [&qdrant, &llm, &embedding]
        .iter()
        .all(|module| module["status"] == "healthy");

    Json(json!({
        "status": if all_healthy { "healthy" } else { "degraded" },
        "modules": {
            "qdrant": qdrant,
            "llm": llm,
            "embedding": embedding,
        }
    }))
}

fn module_health(healthy: bool, details: String) -> serde_json::Value {
    json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "details": details,
    })
}
