//! HTTP entrypoint for the serverless runtime.
//!
//! `POST /runsync` takes a job (`{"id": ..., "input": {...}}`) and answers
//! with the result mapping once the job is done. Jobs are serialized
//! because every job writes the same input filenames.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::Mutex;

use ltxv_core::request::Job;
use ltxv_core::result::JobResult;

use crate::handler::JobHandler;

/// Shared state for the entrypoint routes.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<JobHandler>,
    /// Held for the duration of a job.
    pub job_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(handler: JobHandler) -> Self {
        Self {
            handler: Arc::new(handler),
            job_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn run_sync(
    State(state): State<AppState>,
    payload: Result<Json<Job>, JsonRejection>,
) -> (StatusCode, Json<JobResult>) {
    let job = match payload {
        Ok(Json(job)) => job,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Rejected job body");
            return (
                rejection.status(),
                Json(JobResult::error(rejection.body_text())),
            );
        }
    };

    let _guard = state.job_lock.lock().await;
    (StatusCode::OK, Json(state.handler.handle(job).await))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/runsync", post(run_sync))
        .with_state(state)
}
