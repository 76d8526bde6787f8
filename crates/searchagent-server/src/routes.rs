use std::any::Any;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use searchagent::{ConversationTurn, Orchestrator, ResearchDepth, SearchQuery};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, Level};

use crate::envelope::{outcome_envelope, Echo};

pub const SERVICE_NAME: &str = "search-agent";
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");
const NUM_RESULTS_RANGE: std::ops::RangeInclusive<u32> = 1..=20;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        Self::Validation(r.body_text())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn default_num_results() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(flatten)]
    pub search: SearchQuery,
    /// Accepted for client compatibility; the hosted tool picks its own sources.
    #[serde(default = "default_num_results")]
    pub num_results: u32,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Option<Vec<ConversationTurn>>,
    #[serde(default = "default_true")]
    pub enable_search: bool,
}

#[derive(Debug, Deserialize)]
pub struct MultiQueryRequest {
    pub queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
    #[serde(default)]
    pub depth: ResearchDepth,
}

/// Operation routes, served both at the root and under `/api`.
fn operations() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/search", post(search))
        .route("/chat", post(chat))
        .route("/search/multi-query", post(multi_query_search))
        .route("/research", post(research))
        .route("/agent/info", get(agent_info))
}

pub fn app(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|req: &axum::http::Request<_>| {
            tracing::info_span!("http_request", method = %req.method(), uri = %req.uri())
        })
        .on_response(
            tower_http::trace::DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(tower_http::LatencyUnit::Millis),
        );

    Router::new()
        .route("/", get(welcome))
        .route("/api", get(api_info))
        .route("/api/", get(api_info))
        .merge(operations())
        .nest("/api", operations())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(trace)
        .with_state(state)
}

/// Turns a handler panic into a 500 `{"detail"}`; the panic text is only logged.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let msg = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    error!(panic = msg, "handler panicked");
    ApiError::Internal("internal server error".to_string()).into_response()
}

async fn welcome() -> Json<Value> {
    Json(json!({
        "message": "Welcome to Search Agent API",
        "docs": "/api/",
        "api": "/api",
    }))
}

/// Liveness only: never touches the gateway.
async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

fn endpoints() -> Value {
    json!({
        "search": "/api/search",
        "chat": "/api/chat",
        "multi_query_search": "/api/search/multi-query",
        "research": "/api/research",
        "health": "/api/health",
    })
}

async fn api_info() -> Json<Value> {
    Json(json!({
        "message": "Search Agent API",
        "version": API_VERSION,
        "endpoints": endpoints(),
    }))
}

async fn agent_info(State(state): State<AppState>) -> Json<Value> {
    let o = &state.orchestrator;
    Json(json!({
        "name": "SearchAssistant",
        "provider": o.provider(),
        "model": o.model(),
        "default_context_size": o.default_context_size(),
        "capabilities": [
            "Web search",
            "Content summarization",
            "Question answering",
            "Conversational interaction",
            "Real-time web search",
            "Multi-query synthesis",
            "In-depth research",
            "Configurable search context",
        ],
        "tools": [searchagent::WEB_SEARCH_TOOL],
        "endpoints": endpoints(),
    }))
}

async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let SearchRequest {
        search: SearchQuery {
            query,
            context_size,
        },
        num_results,
    } = req;
    require_text("query", &query)?;
    if !NUM_RESULTS_RANGE.contains(&num_results) {
        return Err(ApiError::Validation(format!(
            "num_results must be between {} and {}",
            NUM_RESULTS_RANGE.start(),
            NUM_RESULTS_RANGE.end()
        )));
    }
    info!(query = %query, context_size = ?context_size, "search");
    let out = state.orchestrator.search(&query, context_size).await;
    Ok(Json(outcome_envelope(out, Echo::new("query", query))?))
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    require_text("message", &req.message)?;
    let history = req.conversation_history.unwrap_or_default();
    info!(
        history_len = history.len(),
        enable_search = req.enable_search,
        "chat"
    );
    let out = state
        .orchestrator
        .chat(&req.message, &history, req.enable_search)
        .await;
    Ok(Json(outcome_envelope(out, Echo::new("message", req.message))?))
}

async fn multi_query_search(
    State(state): State<AppState>,
    payload: Result<Json<MultiQueryRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    if req.queries.is_empty() {
        return Err(ApiError::Validation(
            "queries must contain at least one query".to_string(),
        ));
    }
    if req.queries.iter().any(|q| q.trim().is_empty()) {
        return Err(ApiError::Validation(
            "queries must not contain empty entries".to_string(),
        ));
    }
    info!(num_queries = req.queries.len(), "multi-query search");
    let out = state.orchestrator.multi_query_search(&req.queries).await;
    Ok(Json(outcome_envelope(out, Echo::new("queries", req.queries))?))
}

async fn research(
    State(state): State<AppState>,
    payload: Result<Json<ResearchRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    require_text("topic", &req.topic)?;
    info!(topic = %req.topic, depth = %req.depth, "research");
    let out = state.orchestrator.research_topic(&req.topic, req.depth).await;
    Ok(Json(outcome_envelope(out, Echo::new("topic", req.topic))?))
}
