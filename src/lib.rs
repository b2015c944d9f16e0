//! Core library for Fossistant. Wires the API-key gate, request
//! normalization, model invocation and response assembly behind a single
//! difficulty-scoring endpoint.

pub mod auth;
pub mod classifier;
mod config;
pub mod normalize;

pub use config::{AppConfig, DEFAULT_MODEL};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{rejection::JsonRejection, DefaultBodyLimit, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::auth::{authorize, CredentialSource, EnvCredentials, API_KEY_HEADER};
use crate::classifier::{classify, Classifier, HttpClassifier};
use crate::normalize::{normalize, DifficultyRequest, Shape};

/// Scored difficulty for one issue.
#[derive(Debug, Serialize, Clone)]
pub struct Difficulty {
    pub difficulty: String,
    pub score: f64,
}

/// Batch response: the echoed model identifier plus one result per issue, in
/// input order.
#[derive(Debug, Serialize, Clone)]
pub struct Difficulties {
    pub model: String,
    pub results: Vec<Difficulty>,
}

#[derive(Debug, Serialize, Clone)]
struct ErrorDetail {
    detail: String,
}

/// Application state shared across handlers. The classifier and credential
/// source are trait objects so tests can inject doubles.
#[derive(Clone)]
pub struct AppState {
    pub model_name: String,
    pub classifier: Arc<dyn Classifier>,
    pub credentials: Arc<dyn CredentialSource>,
    pub max_request_bytes: Option<usize>,
    pub metric_requests_total: Arc<AtomicU64>,
    pub metric_inference_errors_total: Arc<AtomicU64>,
}

impl AppState {
    /// State with explicitly injected collaborators; counters start at zero.
    pub fn new(
        model_name: String,
        classifier: Arc<dyn Classifier>,
        credentials: Arc<dyn CredentialSource>,
        max_request_bytes: Option<usize>,
    ) -> Self {
        Self {
            model_name,
            classifier,
            credentials,
            max_request_bytes,
            metric_requests_total: Arc::new(AtomicU64::new(0)),
            metric_inference_errors_total: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Build state from environment variables: `FOSSISTANT_MODEL`,
/// `FOSSISTANT_MODEL_URL`, `FOSSISTANT_MODEL_TIMEOUT_MS` and
/// `FOSSISTANT_MAX_REQUEST_BYTES`. `VALID_API_KEYS` is read per request, not
/// here.
pub fn build_state_from_env() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;
    let classifier = HttpClassifier::new(config.model_url.clone(), config.model_timeout_ms);
    Ok(AppState::new(
        config.model_name,
        Arc::new(classifier),
        Arc::new(EnvCredentials),
        config.max_request_bytes,
    ))
}

/// Build the axum router. Every response gains an `X-Process-Time` header.
pub fn app(state: AppState) -> Router {
    let max_request_bytes = state.max_request_bytes;

    let router = Router::new()
        .route("/v1/fossistant/difficulty/", post(difficulty_handler))
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler));

    let router = if let Some(limit) = max_request_bytes {
        router.layer(DefaultBodyLimit::max(limit))
    } else {
        router
    };

    router
        .layer(middleware::from_fn(process_time))
        .with_state(state)
}

/// Records elapsed handler time (seconds) in an `X-Process-Time` response
/// header. Informational only.
async fn process_time(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = start.elapsed().as_secs_f64();
    if let Ok(value) = HeaderValue::from_str(&elapsed.to_string()) {
        response.headers_mut().insert("x-process-time", value);
    }
    response
}

/// Handler for `POST /v1/fossistant/difficulty/`. Runs the gate, normalizes
/// the payload, classifies each issue in order and assembles a response in
/// the caller's shape.
async fn difficulty_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<DifficultyRequest>, JsonRejection>,
) -> Response {
    state.metric_requests_total.fetch_add(1, Ordering::Relaxed);

    let presented = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if let Err(err) = authorize(presented, state.credentials.as_ref()) {
        return err.into_response();
    }

    let payload = match payload {
        Ok(Json(inner)) => inner,
        Err(rejection) => return validation_rejection(rejection),
    };

    let normalized = normalize(payload, &state.model_name);

    // Sequential by design; the model server is not assumed reentrant.
    let mut results = Vec::with_capacity(normalized.prompts.len());
    for prompt in &normalized.prompts {
        match classify(state.classifier.as_ref(), prompt).await {
            Ok(top) => results.push(Difficulty {
                difficulty: top.label,
                score: top.score,
            }),
            Err(err) => {
                state
                    .metric_inference_errors_total
                    .fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %err, "classification failed");
                let body = ErrorDetail {
                    detail: format!("Inference failed: {}", err),
                };
                return (StatusCode::BAD_GATEWAY, Json(body)).into_response();
            }
        }
    }

    assemble(normalized.shape, normalized.model, results)
}

/// Single payloads get a bare result; batches keep the echoed model wrapper.
/// Strictly 1:1 positional, no filtering or reordering.
fn assemble(shape: Shape, model: String, results: Vec<Difficulty>) -> Response {
    match shape {
        Shape::Single => match results.into_iter().next() {
            Some(single) => (StatusCode::OK, Json(single)).into_response(),
            // A single payload always normalizes to one prompt.
            None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        },
        Shape::Batch => (StatusCode::OK, Json(Difficulties { model, results })).into_response(),
    }
}

/// Schema-level failures (missing title, wrong types, invalid JSON) become a
/// 422 with the rejection's own description as detail.
fn validation_rejection(rejection: JsonRejection) -> Response {
    let detail = rejection.body_text();
    tracing::debug!(%detail, "request body failed validation");
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorDetail { detail }),
    )
        .into_response()
}

/// Simple health endpoint for container readiness / liveness checks.
async fn healthz_handler(State(state): State<AppState>) -> Response {
    let json = serde_json::json!({
        "status": "ok",
        "model": state.model_name,
    });
    (StatusCode::OK, Json(json)).into_response()
}

/// Prometheus-style metrics exposition. Text format with simple counters.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    use std::fmt::Write as _;

    let requests = state.metric_requests_total.load(Ordering::Relaxed);
    let inference_errors = state.metric_inference_errors_total.load(Ordering::Relaxed);

    let mut buf = String::new();
    writeln!(
        &mut buf,
        "# HELP fossistant_requests_total Total difficulty requests received"
    )
    .ok();
    writeln!(&mut buf, "# TYPE fossistant_requests_total counter").ok();
    writeln!(&mut buf, "fossistant_requests_total {}", requests).ok();
    writeln!(
        &mut buf,
        "# HELP fossistant_inference_errors_total Failed model invocations"
    )
    .ok();
    writeln!(&mut buf, "# TYPE fossistant_inference_errors_total counter").ok();
    writeln!(
        &mut buf,
        "fossistant_inference_errors_total {}",
        inference_errors
    )
    .ok();
    writeln!(
        &mut buf,
        "# HELP fossistant_build_info Build information\n# TYPE fossistant_build_info gauge"
    )
    .ok();
    writeln!(
        &mut buf,
        "fossistant_build_info{{version=\"{}\",model=\"{}\"}} 1",
        env!("CARGO_PKG_VERSION"),
        state.model_name
    )
    .ok();

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        buf,
    )
        .into_response()
}
