use std::error::Error as _;
use std::time::Duration;

use ltxv_comfyui::api::ComfyUIApiError;
use ltxv_comfyui::poll::PollError;
use ltxv_core::error::CoreError;

/// Everything that can end a job without a video.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// A required field is absent or the input mapping is malformed.
    #[error("{0}")]
    Validation(CoreError),

    #[error("ComfyUI server not available after {}s", .waited.as_secs())]
    ServerUnavailable { waited: Duration },

    #[error("Failed to queue prompt: {0}")]
    Submission(#[source] ComfyUIApiError),

    /// The server reported a workflow-level error.
    #[error("Workflow error: {0}")]
    Execution(String),

    #[error("Generation timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("No video output generated")]
    MissingOutput,

    /// Decoding inputs, loading the template, or other file IO.
    #[error(transparent)]
    Core(CoreError),

    #[error("Failed to scan output directory: {0}")]
    OutputScan(#[source] std::io::Error),
}

impl From<CoreError> for JobError {
    fn from(err: CoreError) -> Self {
        if err.is_validation() {
            JobError::Validation(err)
        } else {
            JobError::Core(err)
        }
    }
}

impl JobError {
    /// Map a polling failure. `timeout_secs` is the job's configured
    /// completion timeout, reported instead of the measured wait.
    pub fn from_poll(err: PollError, timeout_secs: u64) -> Self {
        match err {
            PollError::ServerUnavailable { waited } => JobError::ServerUnavailable { waited },
            PollError::ExecutionFailed(message) => JobError::Execution(message),
            PollError::TimedOut { .. } => JobError::Timeout { timeout_secs },
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, JobError::Validation(_))
    }

    /// Short machine-readable kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Validation(_) => "validation",
            JobError::ServerUnavailable { .. } => "server_unavailable",
            JobError::Submission(_) => "submission",
            JobError::Execution(_) => "execution",
            JobError::Timeout { .. } => "timeout",
            JobError::MissingOutput => "missing_output",
            JobError::Core(_) => "input",
            JobError::OutputScan(_) => "io",
        }
    }

    /// The error and its chain of sources, one per line.
    pub fn trace(&self) -> String {
        let mut trace = format!("JobError::{}: {self}", self.kind());
        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            if depth == 0 {
                trace.push_str("\n\nCaused by:");
            }
            trace.push_str(&format!("\n    {depth}: {err}"));
            depth += 1;
            source = err.source();
        }
        trace
    }
}
