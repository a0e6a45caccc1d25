//! Axum REST API handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post},
    extract::{State, Multipart, Query, DefaultBodyLimit},
    response::Json,
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::FailurePolicy;
use crate::engine::{FaceResult, ModelKind, ModelRegistry, ModelSelection};
use crate::service::InferenceOrchestrator;
use crate::utils::image::decode_image;

use super::dto::*;
use super::error::{ApiError, ApiResult};
use super::ws::ws_handler;

/// Multipart field names accepted for the uploaded image
const IMAGE_FIELDS: &[&str] = &["file", "image"];

/// Application state shared across handlers
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub policy: FailurePolicy,
    pub body_limit: usize,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>, policy: FailurePolicy, body_limit: usize) -> Self {
        Self {
            registry,
            policy,
            body_limit,
            start_time: Instant::now(),
        }
    }
}

/// Create the API router
pub fn create_rest_router(state: Arc<AppState>) -> Router {
    let body_limit = state.body_limit;

    Router::new()
        .route("/predict", post(predict_handler))
        .route("/ws", get(ws_handler))
        .route("/models", get(models_handler))
        // System endpoints
        .route("/health", get(health_handler))
        .route("/api/v1/health", get(health_handler))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Detect faces and recognize their emotions in one uploaded image
async fn predict_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PredictQuery>,
    multipart: Multipart,
) -> ApiResult<Json<PredictResponse>> {
    let start = Instant::now();
    let selection = query.selection();

    match predict(&state, &selection, multipart).await {
        Ok(result) => {
            info!(
                "predict ({}): {} faces in {}ms",
                selection,
                result.len(),
                start.elapsed().as_millis()
            );
            Ok(Json(PredictResponse { result }))
        }
        Err(e) => {
            e.log("predict", &selection);
            Err(e)
        }
    }
}

async fn predict(
    state: &AppState,
    selection: &ModelSelection,
    mut multipart: Multipart,
) -> ApiResult<Vec<FaceResult>> {
    // Reject unknown names before reading the body
    state.registry.validate(selection)?;

    let mut image_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        if IMAGE_FIELDS.contains(&name.as_str()) && image_data.is_none() {
            image_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Multipart(e.to_string()))?
                    .to_vec(),
            );
        }
    }

    let image_data = image_data.ok_or(ApiError::MissingImage)?;

    let registry = state.registry.clone();
    let policy = state.policy;
    let selection = selection.clone();

    tokio::task::spawn_blocking(move || -> ApiResult<Vec<FaceResult>> {
        let image = decode_image(&image_data)?;
        let pipeline = registry.create_pipeline(&selection)?;
        let mut orchestrator = InferenceOrchestrator::new(pipeline, policy);
        Ok(orchestrator.process(&image)?)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("inference worker failed: {}", e)))?
}

/// Registered model names
async fn models_handler(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        detectors: state.registry.list_names(ModelKind::Detector),
        recognizers: state.registry.list_names(ModelKind::Recognizer),
    })
}

/// Health check
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        detectors: state.registry.list_names(ModelKind::Detector),
        recognizers: state.registry.list_names(ModelKind::Recognizer),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
