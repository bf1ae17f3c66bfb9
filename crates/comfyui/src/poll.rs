//! Fixed-interval polling for server readiness and prompt completion.
//!
//! Both loops run against an absolute deadline supplied by the caller so
//! the time budget can be measured from the start of the job rather than
//! from the start of each wait.

use std::time::Duration;

use tokio::time::Instant;

use crate::api::ComfyUIApi;
use crate::history::ExecutionState;

/// How often a progress line is logged while waiting for completion.
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Terminal outcomes of a polling loop.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// `/system_stats` never answered successfully before the deadline.
    #[error("ComfyUI server did not become ready within {waited:?}")]
    ServerUnavailable { waited: Duration },

    /// The server reported that the workflow failed.
    #[error("Workflow error: {0}")]
    ExecutionFailed(String),

    /// The prompt did not complete before the deadline.
    #[error("Generation timed out after {waited:?}")]
    TimedOut { waited: Duration },
}

/// Wait until `GET /system_stats` succeeds, polling every `interval`.
pub async fn wait_for_server(
    api: &ComfyUIApi,
    interval: Duration,
    deadline: Instant,
) -> Result<(), PollError> {
    let started = Instant::now();
    tracing::info!(api_url = %api.api_url(), "Waiting for ComfyUI server");

    loop {
        match tokio::time::timeout_at(deadline, api.system_stats()).await {
            Ok(Ok(_)) => {
                tracing::info!(
                    waited_ms = started.elapsed().as_millis() as u64,
                    "ComfyUI server is ready",
                );
                return Ok(());
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "ComfyUI not ready yet");
            }
            Err(_) => {}
        }

        let now = Instant::now();
        if now >= deadline {
            let waited = started.elapsed();
            tracing::error!(waited_secs = waited.as_secs_f64(), "ComfyUI server did not start");
            return Err(PollError::ServerUnavailable { waited });
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Poll `GET /history/{prompt_id}` until the prompt completes, fails, or
/// the deadline passes. Returns the prompt's outputs on completion.
///
/// Transport and decode errors on individual polls are logged and the
/// loop continues; only the server's own error status ends it early.
pub async fn wait_for_completion(
    api: &ComfyUIApi,
    prompt_id: &str,
    interval: Duration,
    deadline: Instant,
) -> Result<serde_json::Map<String, serde_json::Value>, PollError> {
    let started = Instant::now();
    let mut next_progress_log = started + PROGRESS_LOG_INTERVAL;
    tracing::info!(prompt_id, "Waiting for completion");

    loop {
        match tokio::time::timeout_at(deadline, api.get_history(prompt_id)).await {
            Ok(Ok(mut history)) => {
                if let Some(entry) = history.remove(prompt_id) {
                    match entry.state() {
                        ExecutionState::Failed(message) => {
                            tracing::error!(prompt_id, error = %message, "Workflow execution error");
                            return Err(PollError::ExecutionFailed(message));
                        }
                        ExecutionState::Completed => {
                            tracing::info!(
                                prompt_id,
                                elapsed_secs = started.elapsed().as_secs_f64(),
                                output_nodes = entry.outputs.len(),
                                "Generation completed",
                            );
                            return Ok(entry.outputs);
                        }
                        ExecutionState::Pending => {}
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::debug!(prompt_id, error = %e, "Status check error");
            }
            Err(_) => {}
        }

        let now = Instant::now();
        if now >= deadline {
            let waited = started.elapsed();
            tracing::error!(prompt_id, waited_secs = waited.as_secs_f64(), "Generation timed out");
            return Err(PollError::TimedOut { waited });
        }
        if now >= next_progress_log {
            tracing::info!(
                prompt_id,
                elapsed_secs = started.elapsed().as_secs(),
                "Generation in progress",
            );
            next_progress_log = now + PROGRESS_LOG_INTERVAL;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}
