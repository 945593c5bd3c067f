use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use dqa_ai::pipeline::{RetrievalPipeline, RunOutcome};
use dqa_core::error::AppError;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RetrievalPipeline>,
    question: Arc<str>,
    run_timeout: Duration,
}

impl AppState {
    pub fn new(pipeline: Arc<RetrievalPipeline>, question: impl Into<Arc<str>>, run_timeout: Duration) -> Self {
        Self {
            pipeline,
            question: question.into(),
            run_timeout,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/chat", get(chat))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `AppError` rendered as a JSON body with a status derived from its code.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(&self.0), Json(self.0)).into_response()
    }
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err.code.as_str() {
        "CONFIGURATION_ERROR" | "EXTERNAL_SERVICE_ERROR" => StatusCode::BAD_GATEWAY,
        "PIPELINE_TIMEOUT" | "INDEX_BUILD_TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
        "TOKENIZER_UNAVAILABLE" | "LOADER_DIR_MISSING" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn chat(State(state): State<AppState>) -> Result<Response, ApiError> {
    let pipeline = state.pipeline.clone();
    let question = state.question.clone();
    let task = tokio::task::spawn_blocking(move || pipeline.run(&question));

    let outcome = match tokio::time::timeout(state.run_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(AppError::new("PIPELINE_TASK_FAILED", "Pipeline task did not complete")
            .with_details(join.to_string())),
        // The blocking task cannot be cancelled; it finishes in the background.
        Err(_) => Err(AppError::new("PIPELINE_TIMEOUT", "Pipeline run exceeded its time limit")
            .with_details(format!("timeout_secs={}", state.run_timeout.as_secs()))
            .with_retryable(true)),
    };

    match outcome {
        Ok(RunOutcome::Answered(result)) => Ok((StatusCode::OK, Json(result)).into_response()),
        Ok(RunOutcome::BudgetExceeded {
            estimated_cost_usd,
            budget_usd,
            ..
        }) => {
            info!(estimated_cost_usd, budget_usd, "chat request skipped: over budget");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Err(e) => {
            error!(code = %e.code, error = %e, "chat request failed");
            Err(ApiError(e))
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    index_present: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "docqa",
        index_present: state.pipeline.index_present(),
    })
}
