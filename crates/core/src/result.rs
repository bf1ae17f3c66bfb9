//! Result payloads returned to the serverless runtime.

use serde::{Deserialize, Serialize};

use crate::params::{GenerationParams, Mode, Seed};

/// The outcome of one job: a video or an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobResult {
    Success(JobSuccess),
    Failure(JobFailure),
}

/// Successful generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSuccess {
    /// Base64-encoded video bytes.
    pub video: String,
    /// Seed actually used, generated or requested.
    pub seed: Seed,
    pub mode: Mode,
    pub parameters: EchoedParameters,
    /// Wall-clock seconds since the job started.
    pub elapsed_time: f64,
    /// Probed duration of the custom audio track, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_duration: Option<f64>,
}

/// Parameters echoed back with a successful result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoedParameters {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg: f64,
    pub fps: u32,
    pub frame_count: u32,
}

impl From<&GenerationParams> for EchoedParameters {
    fn from(params: &GenerationParams) -> Self {
        Self {
            prompt: params.prompt.clone(),
            width: params.width,
            height: params.height,
            steps: params.steps,
            cfg: params.cfg,
            fps: params.fps,
            frame_count: params.frame_count,
        }
    }
}

/// Failed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<f64>,
}

impl JobResult {
    /// An error result with only a message (validation failures).
    pub fn error(message: impl Into<String>) -> Self {
        JobResult::Failure(JobFailure {
            error: message.into(),
            traceback: None,
            elapsed_time: None,
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, JobResult::Failure(_))
    }

    pub fn as_success(&self) -> Option<&JobSuccess> {
        match self {
            JobResult::Success(s) => Some(s),
            JobResult::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&JobFailure> {
        match self {
            JobResult::Failure(f) => Some(f),
            JobResult::Success(_) => None,
        }
    }
}
