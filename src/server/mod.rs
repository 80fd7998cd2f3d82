//! # HTTP server
//!
//! | Route | Description |
//! |-------|-------------|
//! | `POST /api/llm/chat` | Chat request in, `text/event-stream` out |
//! | `GET /api/info` | Server version and platform |
//! | `GET /api/config/services` | Retrieval service base URL for the UI |
//! | `GET /shutdown` | Graceful shutdown |
//!
//! CORS is permissive for `GET`/`POST`; the server is meant to be reached from a
//! locally served inspector page.

pub mod sse;

use crate::client::ChatService;
use crate::types::ChatRequest;
use crate::{Error, ErrorContext, Result};
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{json, Value};
use std::convert::Infallible;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

pub use sse::SseEncoder;

pub const REQUEST_ID_HEADER: &str = "x-uiautodev-request-id";

#[derive(Debug, Clone)]
pub struct AppState {
    pub service: ChatService,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(service: ChatService) -> Self {
        Self {
            service,
            shutdown: CancellationToken::new(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/llm/chat", post(chat))
        .route("/api/info", get(app_info))
        .route("/api/config/services", get(service_config))
        .route("/shutdown", get(shutdown))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Serve until `/shutdown` is called or `state.shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let token = state.shutdown.clone();
    let addr = listener.local_addr().map_err(|e| {
        Error::runtime_with_context(
            format!("listener has no local address: {}", e),
            ErrorContext::new().with_source("server"),
        )
    })?;
    info!(%addr, "uiautodev server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;
    info!("uiautodev server stopped");
    Ok(())
}

async fn chat(State(state): State<AppState>, headers: HeaderMap, Json(request): Json<ChatRequest>) -> Response {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let events = state.service.generate_with_id(request, request_id.clone());
    let mut encoder = SseEncoder::new();
    let body = events.map(move |ev| Ok::<_, Infallible>(Bytes::from(encoder.encode(&ev))));

    let mut response = Response::new(Body::from_stream(body));
    let h = response.headers_mut();
    h.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    h.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(v) = HeaderValue::from_str(&request_id) {
        h.insert(REQUEST_ID_HEADER, v);
    }
    response
}

async fn app_info() -> Json<Value> {
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Local uiautodev server.",
        "platform": std::env::consts::OS,
        "code_language": "Python",
        "cwd": cwd,
        "drivers": Vec::<String>::new(),
    }))
}

async fn service_config(State(state): State<AppState>) -> Json<Value> {
    let base = state.service.config().rag_api_base_url();
    info!(rag_api_base_url = ?base, "providing service configuration to frontend");
    Json(json!({ "ragApiBaseUrl": base }))
}

async fn shutdown(State(state): State<AppState>) -> Json<Value> {
    info!("shutdown endpoint called");
    state.shutdown.cancel();
    Json(json!({"message": "Server shutting down..."}))
}

async fn cors(request: Request, next: Next) -> Response {
    let preflight = request.method() == Method::OPTIONS;
    let mut response = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let h = response.headers_mut();
    h.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    h.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    h.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    h.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(REQUEST_ID_HEADER),
    );
    response
}
