//! Audio duration probing via `ffprobe`.

use std::path::Path;
use std::time::Duration;

/// Duration assumed when a custom audio track cannot be probed.
pub const FALLBACK_AUDIO_DURATION_SECS: f64 = 4.0;

/// Upper bound on a single `ffprobe` invocation.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for ffprobe invocations.
#[derive(Debug, thiserror::Error)]
pub enum FfprobeError {
    #[error("ffprobe binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("ffprobe timed out after {0:?}")]
    TimedOut(Duration),

    #[error("failed to parse ffprobe output: {0:?}")]
    ParseError(String),
}

/// Parse the bare `format=duration` value ffprobe prints.
pub fn parse_duration_output(stdout: &str) -> Result<f64, FfprobeError> {
    let trimmed = stdout.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| FfprobeError::ParseError(trimmed.to_string()))
}

/// Run `ffprobe` and return the media duration in seconds.
pub async fn probe_duration(path: &Path) -> Result<f64, FfprobeError> {
    let command = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(PROBE_TIMEOUT, command)
        .await
        .map_err(|_| FfprobeError::TimedOut(PROBE_TIMEOUT))?
        .map_err(FfprobeError::NotFound)?;

    if !output.status.success() {
        return Err(FfprobeError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    parse_duration_output(&String::from_utf8_lossy(&output.stdout))
}

/// Probe a duration, falling back to [`FALLBACK_AUDIO_DURATION_SECS`].
pub async fn audio_duration_or_default(path: &Path) -> f64 {
    match probe_duration(path).await {
        Ok(duration) => {
            tracing::info!(duration_secs = duration, "Audio duration probed");
            duration
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                fallback_secs = FALLBACK_AUDIO_DURATION_SECS,
                "Could not determine audio duration",
            );
            FALLBACK_AUDIO_DURATION_SECS
        }
    }
}
