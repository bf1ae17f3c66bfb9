//! End-to-end tests for `JobHandler::handle` against a mock ComfyUI server.

mod common;

use std::time::{Duration, Instant};

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use ltxv_core::params::{Mode, Seed, MAX_SEED};
use ltxv_core::request::Job;
use ltxv_worker::handler::JobHandler;

fn job(input: serde_json::Value) -> Job {
    Job::new("test-job", input)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_image_fails_without_side_effects() {
    let server = MockServer::start().await;
    let layout = Layout::with_templates();
    let handler = JobHandler::new(layout.config(&server));

    let result = handler.handle(job(json!({"prompt": "a cat"}))).await;

    let failure = result.as_failure().expect("expected an error result");
    assert_eq!(failure.error, "Missing required field: image");
    assert!(failure.elapsed_time.is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(dir_is_empty_or_missing(&layout.input_dir()));
}

#[tokio::test]
async fn missing_prompt_fails_without_side_effects() {
    let server = MockServer::start().await;
    let layout = Layout::with_templates();
    let handler = JobHandler::new(layout.config(&server));

    let result = handler.handle(job(json!({"image": IMAGE_B64}))).await;

    assert_eq!(
        result.as_failure().unwrap().error,
        "Missing required field: prompt"
    );
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(dir_is_empty_or_missing(&layout.input_dir()));
}

// ---------------------------------------------------------------------------
// Success paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generated_audio_job_returns_video_and_patched_graph() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    mount_history(&server, completed_with("ltx_00001_.mp4")).await;

    let layout = Layout::with_templates();
    layout.write_output("ltx_00001_.mp4", b"video bytes");
    let handler = JobHandler::new(layout.config(&server));

    let result = handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "waves crashing", "steps": 12})))
        .await;

    let success = result.as_success().expect("expected success");
    assert_eq!(decode(&success.video), b"video bytes");
    assert_eq!(success.mode, Mode::GeneratedAudio);
    assert!(matches!(success.seed, Seed::Unsigned(s) if s <= MAX_SEED));
    assert_eq!(success.parameters.steps, 12);
    assert_eq!(success.parameters.frame_count, 97);
    assert!(success.audio_duration.is_none());

    let saved = std::fs::read(layout.input_dir().join("input_image.png")).unwrap();
    assert_eq!(saved, b"fake png");

    let graph = submitted_graph(&server).await;
    assert_eq!(graph["98"]["inputs"]["image"], "input_image.png");
    assert_eq!(graph["92:3"]["inputs"]["text"], "waves crashing");
    assert_eq!(graph["92:9"]["inputs"]["steps"], 12);
    assert_eq!(graph["92:11"]["inputs"]["noise_seed"], json!(success.seed));
    assert_eq!(graph["92:67"]["inputs"]["noise_seed"], json!(success.seed));
    assert_eq!(graph["92:62"]["inputs"]["value"], 97);
    assert_eq!(graph["92:97"]["inputs"]["fps"], 25);
    // Links and untouched inputs survive.
    assert_eq!(graph["92:3"]["inputs"]["clip"], json!(["92:1", 1]));
    assert_eq!(graph["92:1"]["inputs"]["ckpt_name"], "ltx-2.safetensors");
}

#[tokio::test]
async fn explicit_seed_is_echoed_and_submitted() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    mount_history(&server, completed_with("out.mp4")).await;

    let layout = Layout::with_templates();
    layout.write_output("out.mp4", b"v");
    let handler = JobHandler::new(layout.config(&server));

    let result = handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "p", "seed": 424242})))
        .await;

    assert_eq!(result.as_success().unwrap().seed, Seed::Unsigned(424242));
    let graph = submitted_graph(&server).await;
    assert_eq!(graph["92:11"]["inputs"]["noise_seed"], 424242);
}

#[tokio::test]
async fn seed_above_i64_range_passes_through() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    mount_history(&server, completed_with("out.mp4")).await;

    let layout = Layout::with_templates();
    layout.write_output("out.mp4", b"v");
    let handler = JobHandler::new(layout.config(&server));

    let result = handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "p", "seed": u64::MAX})))
        .await;

    let success = result.as_success().expect("expected success");
    assert_eq!(success.seed, Seed::Unsigned(u64::MAX));
    let graph = submitted_graph(&server).await;
    assert_eq!(graph["92:11"]["inputs"]["noise_seed"], json!(u64::MAX));
    assert_eq!(graph["92:67"]["inputs"]["noise_seed"], json!(u64::MAX));
}

#[tokio::test]
async fn huge_timeout_does_not_overflow_the_deadline() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    mount_history(&server, completed_with("out.mp4")).await;

    let layout = Layout::with_templates();
    layout.write_output("out.mp4", b"v");
    let handler = JobHandler::new(layout.config(&server));

    // Run on its own task so a panic shows up as a join error.
    let outcome = tokio::spawn(async move {
        handler
            .handle(job(json!({"image": IMAGE_B64, "prompt": "p", "timeout": u64::MAX})))
            .await
    })
    .await;

    let result = outcome.expect("handler panicked");
    assert!(!result.is_error(), "{result:?}");
}

#[tokio::test]
async fn reported_outputs_are_checked_in_server_order() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    mount_history(
        &server,
        json!({
            "outputs": {
                "98": {"videos": [{"filename": "vid.mp4", "subfolder": "", "type": "output"}]},
                "100": {"images": [{"filename": "prev.png", "subfolder": "", "type": "output"}]}
            },
            "status": {"status_str": "success", "completed": true, "messages": []}
        }),
    )
    .await;

    let layout = Layout::with_templates();
    layout.write_output("vid.mp4", b"video");
    layout.write_output("prev.png", b"png");
    let handler = JobHandler::new(layout.config(&server));

    let result = handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "p"})))
        .await;

    assert_eq!(decode(&result.as_success().unwrap().video), b"video");
}

#[tokio::test]
async fn custom_audio_job_uses_audio_template_and_derived_frames() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    mount_history(&server, completed_with("talking.mp4")).await;

    let layout = Layout::with_templates();
    layout.write_output("talking.mp4", b"talking head");
    let handler = JobHandler::new(layout.config(&server));

    // Not a decodable audio file, so the duration falls back to 4 s.
    let result = handler
        .handle(job(json!({
            "image": IMAGE_B64,
            "prompt": "a person talking",
            "audio": "bm90IGF1ZGlv",
            "fps": 24,
        })))
        .await;

    let success = result.as_success().expect("expected success");
    assert_eq!(success.mode, Mode::CustomAudio);
    assert_eq!(success.audio_duration, Some(4.0));
    assert_eq!(success.parameters.frame_count, 97);
    assert!(layout.input_dir().join("input_audio.mp3").exists());

    let graph = submitted_graph(&server).await;
    assert_eq!(graph["92:114"]["inputs"]["audio"], "input_audio.mp3");
    assert_eq!(graph["92:115"]["inputs"]["value"], json!(24.0));
    assert_eq!(graph["92:108"]["inputs"]["strength"], json!(0.7));
    assert!(graph.get("92:62").is_none());
}

#[tokio::test]
async fn falls_back_to_generic_template_and_skips_missing_nodes() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    mount_history(&server, completed_with("out.mp4")).await;

    let layout = Layout::new();
    layout.write_template(
        "workflow.json",
        &json!({"98": {"class_type": "LoadImage", "inputs": {"image": "x.png"}}}),
    );
    layout.write_output("out.mp4", b"v");
    let handler = JobHandler::new(layout.config(&server));

    let result = handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "p"})))
        .await;

    assert!(!result.is_error(), "{result:?}");
    let graph = submitted_graph(&server).await;
    assert_eq!(graph, json!({"98": {"class_type": "LoadImage", "inputs": {"image": "input_image.png"}}}));
}

#[tokio::test]
async fn output_scan_picks_reverse_lexicographic_name() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    mount_history(
        &server,
        json!({"outputs": {"92:98": {"text": ["no file keys here"]}}}),
    )
    .await;

    let layout = Layout::with_templates();
    layout.write_output("a.mp4", b"from a");
    layout.write_output("b.mp4", b"from b");
    let handler = JobHandler::new(layout.config(&server));

    let result = handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "p"})))
        .await;

    assert_eq!(decode(&result.as_success().unwrap().video), b"from b");
}

#[tokio::test]
async fn cleanup_removes_output_and_inputs() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    mount_history(&server, completed_with("out.mp4")).await;

    let layout = Layout::with_templates();
    let output = layout.write_output("out.mp4", b"v");
    let mut config = layout.config(&server);
    config.cleanup_artifacts = true;
    let handler = JobHandler::new(config);

    let result = handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "p"})))
        .await;

    assert!(!result.is_error(), "{result:?}");
    assert!(!output.exists());
    assert!(!layout.input_dir().join("input_image.png").exists());
}

#[tokio::test]
async fn without_cleanup_files_stay() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    mount_history(&server, completed_with("out.mp4")).await;

    let layout = Layout::with_templates();
    let output = layout.write_output("out.mp4", b"v");
    let handler = JobHandler::new(layout.config(&server));

    handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "p"})))
        .await;

    assert!(output.exists());
    assert!(layout.input_dir().join("input_image.png").exists());
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_server_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/system_stats"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let layout = Layout::with_templates();
    let mut config = layout.config(&server);
    config.server_ready_timeout = Duration::from_millis(300);
    let handler = JobHandler::new(config);

    let result = handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "p"})))
        .await;

    let failure = result.as_failure().unwrap();
    assert!(failure.error.starts_with("ComfyUI server not available"), "{}", failure.error);
    assert!(failure.elapsed_time.is_some());
    assert!(failure.traceback.is_some());
}

#[tokio::test]
async fn rejected_submission_is_terminal() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(500).set_body_string("prompt outputs failed validation"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/history/{PROMPT_ID}")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let layout = Layout::with_templates();
    let handler = JobHandler::new(layout.config(&server));

    let result = handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "p"})))
        .await;

    let failure = result.as_failure().unwrap();
    assert!(failure.error.starts_with("Failed to queue prompt"), "{}", failure.error);
    assert!(failure.error.contains("prompt outputs failed validation"));
}

#[tokio::test]
async fn execution_error_on_first_poll_stops_the_job() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/history/{PROMPT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body(json!({
            "outputs": {},
            "status": {
                "status_str": "error",
                "completed": false,
                "messages": [["execution_error", {"exception_message": "Allocation on device failed"}]]
            }
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let layout = Layout::with_templates();
    let handler = JobHandler::new(layout.config(&server));

    let result = handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "p"})))
        .await;

    assert_eq!(
        result.as_failure().unwrap().error,
        "Workflow error: Allocation on device failed"
    );
}

#[tokio::test]
async fn never_completing_job_times_out_near_configured_timeout() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/history/{PROMPT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let layout = Layout::with_templates();
    let handler = JobHandler::new(layout.config(&server));

    let started = Instant::now();
    let result = handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "p", "timeout": 1})))
        .await;
    let elapsed = started.elapsed();

    let failure = result.as_failure().unwrap();
    assert_eq!(failure.error, "Generation timed out after 1 seconds");
    assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "{elapsed:?}");
    assert!(failure.elapsed_time.unwrap() >= 1.0);
}

#[tokio::test]
async fn completed_job_without_video_is_missing_output() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    mount_submit(&server).await;
    mount_history(&server, completed_with("never_written.mp4")).await;

    let layout = Layout::with_templates();
    let handler = JobHandler::new(layout.config(&server));

    let result = handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "p"})))
        .await;

    let failure = result.as_failure().unwrap();
    assert_eq!(failure.error, "No video output generated");
    assert!(failure.elapsed_time.is_some());
}

#[tokio::test]
async fn invalid_image_payload_is_reported() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;

    let layout = Layout::with_templates();
    let handler = JobHandler::new(layout.config(&server));

    let result = handler
        .handle(job(json!({"image": "***", "prompt": "p"})))
        .await;

    let failure = result.as_failure().unwrap();
    assert!(failure.error.contains("Failed to decode base64 image"), "{}", failure.error);
    assert!(failure.traceback.as_deref().unwrap().contains("Caused by:"));
}

#[tokio::test]
async fn missing_template_is_reported() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;

    let layout = Layout::new();
    let handler = JobHandler::new(layout.config(&server));

    let result = handler
        .handle(job(json!({"image": IMAGE_B64, "prompt": "p"})))
        .await;

    let failure = result.as_failure().unwrap();
    assert!(failure.error.contains("workflow.json"), "{}", failure.error);
}
