use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration loaded from environment variables.
///
/// All fields have defaults matching the stock serverless image layout.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base URL of the local ComfyUI server.
    pub comfyui_url: String,
    /// Directory ComfyUI reads `LoadImage` / `LoadAudio` inputs from.
    pub input_dir: PathBuf,
    /// Directory ComfyUI writes outputs to.
    pub output_dir: PathBuf,
    /// Directory holding `workflow_<mode>.json` templates.
    pub workflow_dir: PathBuf,
    /// How long a job waits for ComfyUI to become reachable.
    pub server_ready_timeout: Duration,
    pub health_poll_interval: Duration,
    pub history_poll_interval: Duration,
    /// Delete the output video and decoded inputs after each job.
    pub cleanup_artifacts: bool,
    /// Bind address for the HTTP entrypoint.
    pub host: String,
    pub port: u16,
    /// When set, run the job in this file once and exit.
    pub test_input: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            comfyui_url: "http://127.0.0.1:8188".into(),
            input_dir: PathBuf::from("/comfyui/input"),
            output_dir: PathBuf::from("/comfyui/output"),
            workflow_dir: PathBuf::from("/"),
            server_ready_timeout: Duration::from_secs(120),
            health_poll_interval: Duration::from_secs(2),
            history_poll_interval: Duration::from_secs(1),
            cleanup_artifacts: false,
            host: "0.0.0.0".into(),
            port: 8000,
            test_input: None,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `COMFYUI_URL`               | `http://127.0.0.1:8188` |
    /// | `COMFYUI_INPUT_DIR`         | `/comfyui/input`        |
    /// | `COMFYUI_OUTPUT_DIR`        | `/comfyui/output`       |
    /// | `WORKFLOW_DIR`              | `/`                     |
    /// | `SERVER_READY_TIMEOUT_SECS` | `120`                   |
    /// | `HEALTH_POLL_INTERVAL_MS`   | `2000`                  |
    /// | `HISTORY_POLL_INTERVAL_MS`  | `1000`                  |
    /// | `CLEANUP_ARTIFACTS`         | `false`                 |
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `8000`                  |
    /// | `WORKER_TEST_INPUT`         | unset                   |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let comfyui_url = std::env::var("COMFYUI_URL").unwrap_or(defaults.comfyui_url);
        let input_dir = env_path("COMFYUI_INPUT_DIR").unwrap_or(defaults.input_dir);
        let output_dir = env_path("COMFYUI_OUTPUT_DIR").unwrap_or(defaults.output_dir);
        let workflow_dir = env_path("WORKFLOW_DIR").unwrap_or(defaults.workflow_dir);

        let server_ready_timeout = Duration::from_secs(
            std::env::var("SERVER_READY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".into())
                .parse()
                .expect("SERVER_READY_TIMEOUT_SECS must be a valid u64"),
        );

        let health_poll_interval = Duration::from_millis(
            std::env::var("HEALTH_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "2000".into())
                .parse()
                .expect("HEALTH_POLL_INTERVAL_MS must be a valid u64"),
        );

        let history_poll_interval = Duration::from_millis(
            std::env::var("HISTORY_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".into())
                .parse()
                .expect("HISTORY_POLL_INTERVAL_MS must be a valid u64"),
        );

        let cleanup_artifacts = std::env::var("CLEANUP_ARTIFACTS")
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.cleanup_artifacts);

        let host = std::env::var("HOST").unwrap_or(defaults.host);

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let test_input = env_path("WORKER_TEST_INPUT");

        Self {
            comfyui_url,
            input_dir,
            output_dir,
            workflow_dir,
            server_ready_timeout,
            health_poll_interval,
            history_poll_interval,
            cleanup_artifacts,
            host,
            port,
            test_input,
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// `1`, `true`, `yes`, `on` (any case) enable a flag.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
