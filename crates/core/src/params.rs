//! Generation defaults, mode selection and parameter resolution.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::request::JobRequest;

// ---------------------------------------------------------------------------
// Defaults table
// ---------------------------------------------------------------------------

pub const DEFAULT_WIDTH: u32 = 720;
pub const DEFAULT_HEIGHT: u32 = 720;
pub const DEFAULT_FRAME_COUNT: u32 = 97;
pub const DEFAULT_STEPS: u32 = 20;
pub const DEFAULT_CFG: f64 = 4.0;
pub const DEFAULT_FPS: u32 = 25;
/// Completion timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_IMG_COMPRESSION: u32 = 33;
pub const DEFAULT_I2V_STRENGTH_FIRST: f64 = 1.0;
pub const DEFAULT_I2V_STRENGTH_SECOND: f64 = 0.7;

pub const DEFAULT_NEGATIVE_PROMPT: &str = "static, frozen, no movement, still frame, blurry, \
jittery, morphing, deformed, warping, extra limbs, bad anatomy, watermark, text, overlay, \
titles, subtitles, glitch, artifact, low quality, distorted face";

/// Seed value that asks for a random seed, same as omitting it.
pub const RANDOM_SEED: i64 = -1;

/// Upper bound (inclusive) for generated seeds.
pub const MAX_SEED: u64 = (1 << 31) - 1;

/// A noise seed as written into the workflow.
///
/// ComfyUI accepts any integer here, including values above `i64::MAX`,
/// so non-negative seeds are kept as `u64` and only negative ones as `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seed {
    Unsigned(u64),
    Signed(i64),
}

impl Seed {
    /// Whether this is the [`RANDOM_SEED`] sentinel.
    pub fn is_random(self) -> bool {
        self == Seed::Signed(RANDOM_SEED)
    }
}

impl std::fmt::Display for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Seed::Unsigned(v) => write!(f, "{v}"),
            Seed::Signed(v) => write!(f, "{v}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Which workflow variant a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// The model generates the soundtrack from the prompt.
    GeneratedAudio,
    /// A caller-supplied audio track drives the video length.
    CustomAudio,
}

impl Mode {
    /// Pick the mode from which optional fields the request carries.
    pub fn select(request: &JobRequest) -> Self {
        if request.audio().is_some() {
            Mode::CustomAudio
        } else {
            Mode::GeneratedAudio
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::GeneratedAudio => "generated_audio",
            Mode::CustomAudio => "custom_audio",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Resolved parameters
// ---------------------------------------------------------------------------

/// Every generation parameter with defaults applied and the seed fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
    pub steps: u32,
    pub cfg: f64,
    pub fps: u32,
    pub seed: Seed,
    /// Whether [`seed`](Self::seed) was generated rather than requested.
    pub seed_generated: bool,
    pub timeout_secs: u64,
    pub img_compression: u32,
    pub i2v_strength_first: f64,
    pub i2v_strength_second: f64,
}

impl GenerationParams {
    /// Apply the defaults table to a validated request.
    pub fn resolve(request: &JobRequest) -> Self {
        let input = &request.input;
        let (seed, seed_generated) = resolve_seed(input.seed);

        Self {
            prompt: request.prompt.clone(),
            negative_prompt: input
                .negative_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_NEGATIVE_PROMPT.to_string()),
            width: input.width.unwrap_or(DEFAULT_WIDTH),
            height: input.height.unwrap_or(DEFAULT_HEIGHT),
            frame_count: input.frame_count.unwrap_or(DEFAULT_FRAME_COUNT),
            steps: input.steps.unwrap_or(DEFAULT_STEPS),
            cfg: input.cfg.unwrap_or(DEFAULT_CFG),
            fps: input.fps.unwrap_or(DEFAULT_FPS),
            seed,
            seed_generated,
            timeout_secs: input.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
            img_compression: input.img_compression.unwrap_or(DEFAULT_IMG_COMPRESSION),
            i2v_strength_first: input.i2v_strength_first.unwrap_or(DEFAULT_I2V_STRENGTH_FIRST),
            i2v_strength_second: input
                .i2v_strength_second
                .unwrap_or(DEFAULT_I2V_STRENGTH_SECOND),
        }
    }

    /// Derive the frame count from a custom audio track's duration.
    pub fn fit_to_audio(&mut self, duration_secs: f64) {
        self.frame_count = frames_for_duration(duration_secs, self.fps);
    }

    /// Prompt shortened for log lines.
    pub fn prompt_preview(&self) -> String {
        const PREVIEW_CHARS: usize = 100;
        if self.prompt.chars().count() > PREVIEW_CHARS {
            let head: String = self.prompt.chars().take(PREVIEW_CHARS).collect();
            format!("{head}...")
        } else {
            self.prompt.clone()
        }
    }
}

/// Resolve a requested seed. Absent or [`RANDOM_SEED`] produces a random
/// value in `[0, MAX_SEED]`; anything else is used as-is.
///
/// Returns the seed and whether it was generated.
pub fn resolve_seed(requested: Option<Seed>) -> (Seed, bool) {
    match requested {
        Some(seed) if !seed.is_random() => (seed, false),
        _ => (Seed::Unsigned(rand::rng().random_range(0..=MAX_SEED)), true),
    }
}

/// Frames needed to cover `duration_secs` at `fps`, plus one.
pub fn frames_for_duration(duration_secs: f64, fps: u32) -> u32 {
    ((duration_secs * fps as f64).floor().max(0.0) as u32).saturating_add(1)
}
