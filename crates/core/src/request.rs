//! Inbound job envelope and request validation.
//!
//! The serverless runtime hands the worker `{"id": ..., "input": {...}}`.
//! The `input` mapping is kept as raw JSON until [`JobInput::parse`] so a
//! malformed field becomes a validation error result instead of a
//! transport-level rejection.

use serde::Deserialize;

use crate::error::CoreError;
use crate::params::Seed;

/// Job id reported when the runtime did not supply one.
pub const UNKNOWN_JOB_ID: &str = "unknown";

/// A single job as delivered by the serverless runtime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub input: serde_json::Value,
}

impl Job {
    pub fn new(id: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: Some(id.into()),
            input,
        }
    }

    /// The job id, or [`UNKNOWN_JOB_ID`] if absent.
    pub fn id_or_unknown(&self) -> &str {
        self.id.as_deref().unwrap_or(UNKNOWN_JOB_ID)
    }
}

/// The `input` mapping with every field optional, exactly as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobInput {
    pub image: Option<String>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub audio: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_count: Option<u32>,
    pub steps: Option<u32>,
    pub cfg: Option<f64>,
    pub fps: Option<u32>,
    pub seed: Option<Seed>,
    pub timeout: Option<u64>,
    pub img_compression: Option<u32>,
    pub i2v_strength_first: Option<f64>,
    pub i2v_strength_second: Option<f64>,
}

/// A validated request: mandatory fields are present.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub image: String,
    pub prompt: String,
    pub input: JobInput,
}

impl JobInput {
    /// Deserialize the raw `input` mapping.
    ///
    /// A missing or `null` input is treated as an empty mapping so the
    /// caller reports the first missing required field.
    pub fn parse(raw: &serde_json::Value) -> Result<Self, CoreError> {
        if raw.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(raw.clone()).map_err(|e| CoreError::InvalidInput(e.to_string()))
    }

    /// Check mandatory fields. `image` is checked before `prompt`.
    pub fn validate(self) -> Result<JobRequest, CoreError> {
        let image = self.image.clone().ok_or(CoreError::MissingField("image"))?;
        let prompt = self.prompt.clone().ok_or(CoreError::MissingField("prompt"))?;
        Ok(JobRequest {
            image,
            prompt,
            input: self,
        })
    }
}

impl JobRequest {
    /// Parse and validate a raw `input` mapping in one step.
    pub fn from_raw(raw: &serde_json::Value) -> Result<Self, CoreError> {
        JobInput::parse(raw)?.validate()
    }

    /// Custom audio, if supplied. An empty string counts as absent.
    pub fn audio(&self) -> Option<&str> {
        self.input.audio.as_deref().filter(|a| !a.is_empty())
    }
}
