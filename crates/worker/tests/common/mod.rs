//! Shared fixtures for worker integration tests: a temp directory laid out
//! like the serverless image and a mock ComfyUI server.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ltxv_worker::config::WorkerConfig;

pub const PROMPT_ID: &str = "prompt-1";

/// Base64 of the bytes `"fake png"`.
pub const IMAGE_B64: &str = "ZmFrZSBwbmc=";

/// Generated-audio template with every patched node plus one link node.
pub fn generated_audio_template() -> Value {
    json!({
        "98": {"class_type": "LoadImage", "inputs": {"image": "example.png"}},
        "92:1": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "ltx-2.safetensors"}},
        "92:3": {"class_type": "CLIPTextEncode", "inputs": {"text": "", "clip": ["92:1", 1]}},
        "92:4": {"class_type": "CLIPTextEncode", "inputs": {"text": "", "clip": ["92:1", 1]}},
        "92:9": {"class_type": "LTXVScheduler", "inputs": {"steps": 30}},
        "92:11": {"class_type": "RandomNoise", "inputs": {"noise_seed": 0}},
        "92:22": {"class_type": "LTXVConditioning", "inputs": {"frame_rate": 24}},
        "92:47": {"class_type": "CFGGuider", "inputs": {"cfg": 3.0}},
        "92:51": {"class_type": "LTXVEmptyLatentAudio", "inputs": {"frame_rate": 24}},
        "92:62": {"class_type": "PrimitiveInt", "inputs": {"value": 121}},
        "92:67": {"class_type": "RandomNoise", "inputs": {"noise_seed": 0}},
        "92:97": {"class_type": "CreateVideo", "inputs": {"fps": 24}}
    })
}

/// Custom-audio template.
pub fn custom_audio_template() -> Value {
    json!({
        "98": {"class_type": "LoadImage", "inputs": {"image": "example.png"}},
        "92:3": {"class_type": "CLIPTextEncode", "inputs": {"text": ""}},
        "92:4": {"class_type": "CLIPTextEncode", "inputs": {"text": ""}},
        "92:9": {"class_type": "LTXVScheduler", "inputs": {"steps": 30}},
        "92:11": {"class_type": "RandomNoise", "inputs": {"noise_seed": 0}},
        "92:47": {"class_type": "CFGGuider", "inputs": {"cfg": 3.0}},
        "92:67": {"class_type": "RandomNoise", "inputs": {"noise_seed": 0}},
        "92:97": {"class_type": "CreateVideo", "inputs": {"fps": 24}},
        "92:108": {"class_type": "LTXVImgToVideoInplace", "inputs": {"strength": 1.0}},
        "92:114": {"class_type": "LoadAudio", "inputs": {"audio": "example.mp3"}},
        "92:115": {"class_type": "PrimitiveFloat", "inputs": {"value": 24.0}}
    })
}

/// A temp directory with `input/`, `output/` and `workflows/` subdirs.
pub struct Layout {
    pub root: TempDir,
}

impl Layout {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("output")).unwrap();
        std::fs::create_dir(root.path().join("workflows")).unwrap();
        Self { root }
    }

    /// Layout with both mode-specific templates installed.
    pub fn with_templates() -> Self {
        let layout = Self::new();
        layout.write_template("workflow_generated_audio.json", &generated_audio_template());
        layout.write_template("workflow_custom_audio.json", &custom_audio_template());
        layout
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.path().join("input")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("output")
    }

    pub fn workflow_dir(&self) -> PathBuf {
        self.root.path().join("workflows")
    }

    pub fn write_template(&self, name: &str, template: &Value) {
        std::fs::write(
            self.workflow_dir().join(name),
            serde_json::to_vec(template).unwrap(),
        )
        .unwrap();
    }

    pub fn write_output(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.output_dir().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    pub fn config(&self, server: &MockServer) -> WorkerConfig {
        WorkerConfig {
            comfyui_url: server.uri(),
            input_dir: self.input_dir(),
            output_dir: self.output_dir(),
            workflow_dir: self.workflow_dir(),
            server_ready_timeout: Duration::from_secs(5),
            health_poll_interval: Duration::from_millis(50),
            history_poll_interval: Duration::from_millis(50),
            ..WorkerConfig::default()
        }
    }
}

pub async fn mount_healthy(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/system_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"system": {"os": "posix"}})))
        .mount(server)
        .await;
}

pub async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"prompt_id": PROMPT_ID, "number": 0, "node_errors": {}})),
        )
        .mount(server)
        .await;
}

pub fn history_body(entry: Value) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(PROMPT_ID.to_string(), entry);
    Value::Object(body)
}

pub async fn mount_history(server: &MockServer, entry: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/history/{PROMPT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body(entry)))
        .mount(server)
        .await;
}

/// History entry reporting a single video output.
pub fn completed_with(filename: &str) -> Value {
    json!({
        "outputs": {"92:98": {"videos": [{"filename": filename, "subfolder": "", "type": "output"}]}},
        "status": {"status_str": "success", "completed": true, "messages": []}
    })
}

/// The workflow graph the worker submitted, from the recorded requests.
pub async fn submitted_graph(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    let submit = requests
        .iter()
        .find(|r| r.method.as_str() == "POST" && r.url.path() == "/prompt")
        .expect("no POST /prompt recorded");
    let body: Value = serde_json::from_slice(&submit.body).unwrap();
    body["prompt"].clone()
}

pub fn decode(b64: &str) -> Vec<u8> {
    base64::engine::general_purpose::STANDARD.decode(b64).unwrap()
}

pub fn dir_is_empty_or_missing(dir: &Path) -> bool {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}
