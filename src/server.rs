//! HTTP surface: health check, single-clip and batch processing.
//!
//! Every route is mounted twice, at the bare path and under `/api`, so both
//! the old and the namespaced URLs keep working.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::types::{BatchOutcome, BatchRequest, ClipRequest};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    service_name: Arc<str>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, service_name: &str, shutdown: CancellationToken) -> Self {
        Self {
            pipeline,
            service_name: Arc::from(service_name),
            shutdown,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: String,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClipSummary {
    clip_id: String,
    video_with_subtitles_url: String,
    transcript_public_id: String,
}

#[derive(Serialize)]
struct ProcessClipResponse {
    success: bool,
    message: &'static str,
    data: ClipSummary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessClipFailure {
    success: bool,
    error: String,
    clip_data: Value,
}

fn clip_failure(error: String, clip_data: Value) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ProcessClipFailure {
            success: false,
            error,
            clip_data,
        }),
    )
        .into_response()
}

#[derive(Serialize)]
struct BatchResponse {
    success: bool,
    #[serde(flatten)]
    outcome: BatchOutcome,
}

pub fn router(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/health", get(health))
        .route("/process-clip", post(process_clip))
        .route("/api/clips/process-clip", post(process_clip))
        .route("/process-clips-batch", post(process_clips_batch))
        .route("/api/clips/process-clips-batch", post(process_clips_batch))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .with_state(state)
}

/// Bind and serve until `shutdown` is cancelled. Cancelling also stops any
/// clip that is still waiting for its transcript.
pub async fn serve(config: &ServerConfig, pipeline: Arc<Pipeline>, shutdown: CancellationToken) -> Result<()> {
    let state = AppState::new(pipeline, &config.service_name, shutdown.clone());
    let app = router(state, config.body_limit_bytes);

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Server running on port {}", listener.local_addr()?.port());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: state.service_name.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
}

/// Clip work runs in its own task so that cleanup still happens when the
/// client goes away: dropping the handler cancels the token, which stops
/// polling, and the task then removes its temporary file.
///
/// The body is read by hand so that a malformed clip gets the same failure
/// shape as one that fails during processing.
async fn process_clip(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("request", %request_id, route = "process-clip");

    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => {
            span.in_scope(|| error!("Unreadable clip body: {}", e));
            let clip_data = Value::String(String::from_utf8_lossy(&body).into_owned());
            return clip_failure(format!("Invalid JSON body: {}", e), clip_data);
        }
    };
    let request = match ClipRequest::from_value(&raw) {
        Ok(request) => request,
        Err(e) => {
            span.in_scope(|| error!("Error processing clip: {}", e));
            return clip_failure(e.to_string(), raw);
        }
    };

    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let pipeline = state.pipeline.clone();
    let task = tokio::spawn(
        async move { pipeline.process_and_dispatch(&request, &cancel).await }.instrument(span.clone()),
    );

    let outcome = match task.await {
        Ok(outcome) => outcome.map_err(|e| e.to_string()),
        Err(e) => Err(format!("processing task aborted: {}", e)),
    };

    match outcome {
        Ok(result) => {
            span.in_scope(|| info!("Successfully processed and sent {}", result.video_public_id));
            let clip_id = result.original_clip_data.clip_id().unwrap_or_default().to_string();
            Json(ProcessClipResponse {
                success: true,
                message: "Clip processed successfully",
                data: ClipSummary {
                    clip_id,
                    video_with_subtitles_url: result.video_with_subtitles_url,
                    transcript_public_id: result.transcript_public_id,
                },
            })
            .into_response()
        }
        Err(message) => {
            span.in_scope(|| error!("Error processing clip: {}", message));
            clip_failure(message, raw)
        }
    }
}

/// Only a body that is not `{"clips": [...]}` fails as a whole; individual
/// entries fail on their own inside the batch outcome.
async fn process_clips_batch(
    State(state): State<AppState>,
    payload: std::result::Result<Json<BatchRequest>, JsonRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("request", %request_id, route = "process-clips-batch");

    let batch = match payload {
        Ok(Json(batch)) => batch,
        Err(rejection) => {
            span.in_scope(|| error!("Unreadable batch body: {}", rejection.body_text()));
            return (
                rejection.status(),
                Json(serde_json::json!({ "success": false, "error": rejection.body_text() })),
            )
                .into_response();
        }
    };

    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let pipeline = state.pipeline.clone();
    let task = tokio::spawn(
        async move { pipeline.process_batch(&batch.clips, &cancel).await }.instrument(span.clone()),
    );

    match task.await {
        Ok(outcome) => Json(BatchResponse { success: true, outcome }).into_response(),
        Err(e) => {
            span.in_scope(|| error!("Batch task aborted: {}", e));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
