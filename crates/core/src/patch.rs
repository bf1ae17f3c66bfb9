//! Typed patch tables for the LTX-2 workflow templates.
//!
//! Each table lists `(node id, input name, value)` entries. The value is a
//! [`PatchValue`] that is resolved against the job's
//! [`GenerationParams`] at patch time. Entries whose node is missing from
//! the loaded template are skipped and logged; the job carries on.

use serde_json::{json, Value};

use crate::params::{GenerationParams, Mode};
use crate::workflow::WorkflowGraph;

/// Filename the input image is saved under in the server's input directory.
pub const INPUT_IMAGE_FILENAME: &str = "input_image.png";

/// Filename the custom audio track is saved under.
pub const INPUT_AUDIO_FILENAME: &str = "input_audio.mp3";

/// Where a patched input value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchValue {
    InputImage,
    InputAudio,
    Prompt,
    NegativePrompt,
    Seed,
    FrameCount,
    Steps,
    Cfg,
    /// Integer frames per second.
    Fps,
    /// Frames per second as a float primitive.
    FpsFloat,
    I2vStrengthSecond,
}

impl PatchValue {
    pub fn resolve(self, params: &GenerationParams) -> Value {
        match self {
            PatchValue::InputImage => json!(INPUT_IMAGE_FILENAME),
            PatchValue::InputAudio => json!(INPUT_AUDIO_FILENAME),
            PatchValue::Prompt => json!(params.prompt),
            PatchValue::NegativePrompt => json!(params.negative_prompt),
            PatchValue::Seed => json!(params.seed),
            PatchValue::FrameCount => json!(params.frame_count),
            PatchValue::Steps => json!(params.steps),
            PatchValue::Cfg => json!(params.cfg),
            PatchValue::Fps => json!(params.fps),
            PatchValue::FpsFloat => json!(params.fps as f64),
            PatchValue::I2vStrengthSecond => json!(params.i2v_strength_second),
        }
    }
}

/// One `(node, input) <- value` substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchEntry {
    pub node_id: &'static str,
    pub input: &'static str,
    pub value: PatchValue,
}

const fn entry(node_id: &'static str, input: &'static str, value: PatchValue) -> PatchEntry {
    PatchEntry {
        node_id,
        input,
        value,
    }
}

/// An ordered list of substitutions for one workflow variant.
#[derive(Debug, Clone, Copy)]
pub struct PatchTable {
    entries: &'static [PatchEntry],
}

pub const GENERATED_AUDIO_PATCHES: PatchTable = PatchTable {
    entries: &[
        entry("98", "image", PatchValue::InputImage),
        entry("92:3", "text", PatchValue::Prompt),
        entry("92:4", "text", PatchValue::NegativePrompt),
        entry("92:11", "noise_seed", PatchValue::Seed),
        entry("92:67", "noise_seed", PatchValue::Seed),
        entry("92:62", "value", PatchValue::FrameCount),
        entry("92:9", "steps", PatchValue::Steps),
        entry("92:47", "cfg", PatchValue::Cfg),
        // Conditioning, empty-audio latent and CreateVideo all carry a rate.
        entry("92:22", "frame_rate", PatchValue::Fps),
        entry("92:51", "frame_rate", PatchValue::Fps),
        entry("92:97", "fps", PatchValue::Fps),
    ],
};

pub const CUSTOM_AUDIO_PATCHES: PatchTable = PatchTable {
    entries: &[
        entry("98", "image", PatchValue::InputImage),
        entry("92:3", "text", PatchValue::Prompt),
        entry("92:4", "text", PatchValue::NegativePrompt),
        entry("92:11", "noise_seed", PatchValue::Seed),
        entry("92:67", "noise_seed", PatchValue::Seed),
        entry("92:9", "steps", PatchValue::Steps),
        entry("92:47", "cfg", PatchValue::Cfg),
        entry("92:114", "audio", PatchValue::InputAudio),
        entry("92:115", "value", PatchValue::FpsFloat),
        entry("92:97", "fps", PatchValue::Fps),
        entry("92:108", "strength", PatchValue::I2vStrengthSecond),
    ],
};

/// Outcome of applying a table to a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub applied: Vec<PatchEntry>,
    /// Entries whose node does not exist in the template.
    pub skipped: Vec<PatchEntry>,
}

impl PatchTable {
    pub fn for_mode(mode: Mode) -> &'static PatchTable {
        match mode {
            Mode::GeneratedAudio => &GENERATED_AUDIO_PATCHES,
            Mode::CustomAudio => &CUSTOM_AUDIO_PATCHES,
        }
    }

    pub fn entries(&self) -> &'static [PatchEntry] {
        self.entries
    }

    /// Overwrite every listed input in `graph` with its resolved value.
    ///
    /// An existing node lacking the input gets it inserted. Missing nodes
    /// are never an error.
    pub fn apply(&self, graph: &mut WorkflowGraph, params: &GenerationParams) -> PatchReport {
        let mut report = PatchReport::default();

        for entry in self.entries {
            let Some(node) = graph.node_mut(entry.node_id) else {
                tracing::warn!(
                    node_id = entry.node_id,
                    input = entry.input,
                    "Node not in workflow template, skipping patch",
                );
                report.skipped.push(*entry);
                continue;
            };

            let value = entry.value.resolve(params);
            tracing::debug!(
                node_id = entry.node_id,
                class_type = %node.class_type,
                input = entry.input,
                value = %value,
                "Patched workflow input",
            );
            node.inputs.insert(entry.input.to_string(), value);
            report.applied.push(*entry);
        }

        report
    }
}
