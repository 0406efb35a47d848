// Relay endpoint: forwards prompts to the upstream completions API

use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::TryStreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::api::UpstreamClient;
use crate::config::{RelayConfig, RelayMode};
use crate::models::{CompletionRequest, ErrorBody, PromptRequest};

/// Failures the relay can still report with a status code. Once bytes have
/// started flowing to the caller there is no way back to an error status.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream credential not set (looked in ${0})")]
    MissingCredential(String),
    #[error("malformed request body: {0}")]
    BadRequest(#[from] serde_json::Error),
    #[error("upstream call failed: {0:#}")]
    Upstream(#[from] anyhow::Error),
    #[error("failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        error!(error = %self, "relay request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::internal())).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct RelayState {
    upstream: UpstreamClient,
    config: Arc<RelayConfig>,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Result<Self> {
        let upstream = UpstreamClient::new(config.upstream_url.clone(), config.connect_timeout)?;
        Ok(Self {
            upstream,
            config: Arc::new(config),
        })
    }

    fn api_key(&self) -> Result<String, RelayError> {
        self.config
            .api_key()
            .ok_or_else(|| RelayError::MissingCredential(self.config.api_key_env.clone()))
    }
}

pub fn router(state: RelayState) -> Router {
    let completion = match state.config.mode {
        RelayMode::Streaming => post(stream_completion),
        RelayMode::Buffering => post(forward_completion),
    };

    Router::new()
        .route("/api/openai", completion)
        .route("/healthz", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl+C.
pub async fn serve(config: RelayConfig) -> Result<()> {
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    info!(
        addr = %listener.local_addr()?,
        mode = ?config.mode,
        upstream = %config.upstream_url,
        "relay listening"
    );

    let state = RelayState::new(config)?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Relay server failed")?;

    info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Buffering variant: body forwarded verbatim, full JSON reply returned.
#[instrument(skip_all, fields(request_id = %Uuid::new_v4(), mode = "buffering"))]
async fn forward_completion(
    State(state): State<RelayState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, RelayError> {
    let api_key = state.api_key()?;
    let body: serde_json::Value = serde_json::from_slice(&body)?;
    let reply = state.upstream.forward(&api_key, &body).await?;
    info!("forwarded completion");
    Ok(Json(reply))
}

/// Streaming variant: fixed payload built around the prompt, upstream body
/// piped back untouched.
#[instrument(skip_all, fields(request_id = %Uuid::new_v4(), mode = "streaming"))]
async fn stream_completion(
    State(state): State<RelayState>,
    body: Bytes,
) -> Result<Response, RelayError> {
    let api_key = state.api_key()?;
    let PromptRequest { prompt } = serde_json::from_slice(&body)?;
    let request = CompletionRequest::streaming(&state.config.model, prompt, state.config.max_tokens);

    let upstream = state.upstream.open_stream(&api_key, &request).await?;
    let status = upstream.status();
    info!(%status, "piping upstream stream");

    let mut builder = Response::builder().status(status);
    for (name, value) in upstream.headers() {
        if !is_hop_by_hop(name) {
            builder = builder.header(name.clone(), value.clone());
        }
    }

    let stream = upstream
        .bytes_stream()
        .inspect_err(|e| warn!(error = %e, "upstream stream broke mid-pipe"));

    Ok(builder.body(Body::from_stream(stream))?)
}

/// Headers that describe the upstream connection rather than the body. The
/// relay frames its own response, so these are not copied.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "content-length"
    )
}
