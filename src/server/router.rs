//! HTTP front door: routes, shared state, and the serve loop.

use std::any::Any;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use super::stream::{stream_by_path, stream_by_query};
use crate::analysis::CapabilityRegistry;
use crate::config::{AnalyzerConfig, StreamConfig};
use crate::error::{AnalyzerError, Result};
use crate::jobs::JobDispatcher;
use crate::types::JobId;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Shared by every handler.
pub struct AppState {
    pub dispatcher: JobDispatcher,
    pub stream: StreamConfig,
}

impl AppState {
    pub fn new(dispatcher: JobDispatcher, stream: StreamConfig) -> Self {
        Self { dispatcher, stream }
    }

    /// State with the default registry, built from `config`.
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        let dispatcher = JobDispatcher::new(CapabilityRegistry::with_defaults(), &config.jobs);
        Self::new(dispatcher, config.stream.clone())
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the application router.
pub fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    with_service_layers(api_routes(), max_body_bytes).with_state(state)
}

/// Every API route plus the JSON 404 fallback, without middleware.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/analyze", post(submit_analysis))
        .route("/stream", get(stream_by_query))
        .route("/stream/{job_id}", get(stream_by_path))
        .route("/jobs/{job_id}", get(job_status))
        .route("/health", get(health))
        .fallback(not_found)
}

/// Body limit, panic-to-500 conversion, and request tracing.
///
/// Layers only wrap routes already on `router`, so add routes first.
pub fn with_service_layers<S>(router: Router<S>, max_body_bytes: usize) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

/// Bind `config.server.addr` and serve until ctrl-c.
pub async fn run_server(config: AnalyzerConfig) -> Result<()> {
    let state = Arc::new(AppState::from_config(&config));
    let sweeper = state
        .dispatcher
        .spawn_sweeper(config.jobs.sweep_interval());
    let router = build_router(Arc::clone(&state), config.server.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.addr).await?;
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "codescope listening");

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down HTTP server");
        })
        .await;
    sweeper.abort();
    served?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /analyze`
///
/// The body is decoded by hand so malformed JSON gets the same
/// `{"error": ...}` shape as every other rejection.
async fn submit_analysis(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            state.dispatcher.metrics().record_rejected();
            return AnalyzerError::Validation(format!("invalid JSON body: {e}")).into_response();
        }
    };

    match state.dispatcher.submit(&value) {
        Ok(submission) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "jobId": submission.job_id,
                "status": "accepted",
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// `GET /jobs/{job_id}`
async fn job_status(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> Response {
    let id = JobId::from(job_id);
    match state.dispatcher.table().get(&id) {
        Some(entry) => Json(entry).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("job {id} not found") })),
        )
            .into_response(),
    }
}

/// `GET /health`
async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "jobs": state.dispatcher.metrics().to_json(),
    }))
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "not found" })),
    )
        .into_response()
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_default();
    tracing::error!(panic = %detail, "request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "internal server error" })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnalysisKind;
    use http_body_util::BodyExt;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::from_config(&AnalyzerConfig::default()))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn submit_returns_accepted_with_job_id() {
        let state = test_state();
        let response = submit_analysis(
            State(Arc::clone(&state)),
            Bytes::from_static(br#"{"file": "x = 1", "type": "structure"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let json = body_json(response).await;
        assert_eq!(json["status"], "accepted");
        let id = JobId::from(json["jobId"].as_str().unwrap());
        assert!(state.dispatcher.table().get(&id).is_some());
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let response = submit_analysis(State(test_state()), Bytes::from_static(b"{not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid JSON body"));
    }

    #[tokio::test]
    async fn job_status_reports_entry() {
        let state = test_state();
        let id = JobId::from("known");
        state
            .dispatcher
            .table()
            .create(id.clone(), AnalysisKind::Structure);

        let response = job_status(State(Arc::clone(&state)), Path("known".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["jobId"], "known");
        assert_eq!(json["state"], "created");

        let response = job_status(State(state), Path("unknown".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_includes_job_counters() {
        let Json(json) = health(State(test_state())).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["jobs"]["submitted"], 0);
    }

    #[tokio::test]
    async fn panic_response_is_json_500() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "internal server error");
    }
}
