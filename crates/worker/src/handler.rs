//! The job handler: one request in, one result out.
//!
//! The sequence is strictly linear: validate, resolve parameters, wait for
//! ComfyUI, save inputs, patch the workflow, submit, poll, locate the
//! video, encode it. Any failure after validation is converted into an
//! error result with elapsed time and a trace at the top of
//! [`JobHandler::handle`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;

use ltxv_comfyui::api::ComfyUIApi;
use ltxv_comfyui::{output, poll};
use ltxv_core::params::{GenerationParams, Mode};
use ltxv_core::patch::{PatchTable, INPUT_AUDIO_FILENAME, INPUT_IMAGE_FILENAME};
use ltxv_core::request::{Job, JobRequest};
use ltxv_core::result::{EchoedParameters, JobFailure, JobResult, JobSuccess};
use ltxv_core::workflow::{self, WorkflowGraph};
use ltxv_core::{ffprobe, media};

use crate::config::WorkerConfig;
use crate::error::JobError;

/// Stand-in for "no deadline" when a timeout is too large to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Runs jobs against one ComfyUI server.
#[derive(Debug, Clone)]
pub struct JobHandler {
    config: Arc<WorkerConfig>,
    api: ComfyUIApi,
}

/// Files written or produced during a job, for optional cleanup.
#[derive(Debug, Default)]
struct Artifacts {
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
}

impl JobHandler {
    pub fn new(config: WorkerConfig) -> Self {
        let api = ComfyUIApi::new(config.comfyui_url.clone());
        Self {
            config: Arc::new(config),
            api,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Process a job. Never fails: errors come back as an error result.
    ///
    /// All log lines for the job are emitted inside a `job` span that
    /// carries the job id and, once known, the mode.
    pub async fn handle(&self, job: Job) -> JobResult {
        let span = tracing::info_span!(
            "job",
            job_id = %job.id_or_unknown(),
            mode = tracing::field::Empty,
        );
        self.run(job).instrument(span).await
    }

    async fn run(&self, job: Job) -> JobResult {
        let started = Instant::now();
        tracing::info!("LTX-2 video generation job received");

        let request = match JobRequest::from_raw(&job.input) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(error = %e, "Rejected job input");
                return JobResult::error(e.to_string());
            }
        };

        let mut artifacts = Artifacts::default();
        let outcome = self.execute(&request, started, &mut artifacts).await;

        if self.config.cleanup_artifacts {
            cleanup(&artifacts).await;
        }

        let elapsed = started.elapsed().as_secs_f64();
        match outcome {
            Ok(success) => {
                tracing::info!(elapsed_secs = elapsed, "Job completed successfully");
                JobResult::Success(success)
            }
            Err(e) => {
                let trace = e.trace();
                tracing::error!(
                    kind = e.kind(),
                    error = %e,
                    elapsed_secs = elapsed,
                    "Job failed",
                );
                tracing::debug!(%trace, "Job failure trace");
                JobResult::Failure(JobFailure {
                    error: e.to_string(),
                    traceback: Some(trace),
                    elapsed_time: Some(elapsed),
                })
            }
        }
    }

    async fn execute(
        &self,
        request: &JobRequest,
        started: Instant,
        artifacts: &mut Artifacts,
    ) -> Result<JobSuccess, JobError> {
        let mode = Mode::select(request);
        tracing::Span::current().record("mode", mode.as_str());

        let mut params = GenerationParams::resolve(request);
        log_params(&params, mode);

        poll::wait_for_server(
            &self.api,
            self.config.health_poll_interval,
            deadline_after(started, self.config.server_ready_timeout),
        )
        .await
        .map_err(|e| JobError::from_poll(e, params.timeout_secs))?;

        let image_path = media::save_input(
            &self.config.input_dir,
            INPUT_IMAGE_FILENAME,
            "image",
            &request.image,
        )
        .await?;
        artifacts.inputs.push(image_path);

        let mut audio_duration = None;
        if let Some(audio) = request.audio() {
            let audio_path =
                media::save_input(&self.config.input_dir, INPUT_AUDIO_FILENAME, "audio", audio)
                    .await?;
            let duration = ffprobe::audio_duration_or_default(&audio_path).await;
            artifacts.inputs.push(audio_path);

            params.fit_to_audio(duration);
            tracing::info!(
                duration_secs = duration,
                fps = params.fps,
                frame_count = params.frame_count,
                "Frame count derived from audio",
            );
            audio_duration = Some(duration);
        }

        let template = workflow::template_path(&self.config.workflow_dir, mode).await;
        let mut graph = WorkflowGraph::load(&template).await?;
        let report = PatchTable::for_mode(mode).apply(&mut graph, &params);
        tracing::info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "Workflow configured",
        );

        let client_id = uuid::Uuid::new_v4().to_string();
        let submitted = self
            .api
            .submit_workflow(&graph, &client_id)
            .await
            .map_err(JobError::Submission)?;
        tracing::info!(
            prompt_id = %submitted.prompt_id,
            queue_position = submitted.number,
            "Prompt queued",
        );

        let deadline = deadline_after(started, Duration::from_secs(params.timeout_secs));
        let outputs = poll::wait_for_completion(
            &self.api,
            &submitted.prompt_id,
            self.config.history_poll_interval,
            deadline,
        )
        .await
        .map_err(|e| JobError::from_poll(e, params.timeout_secs))?;

        let video_path = output::locate_output(&outputs, &self.config.output_dir)
            .await
            .map_err(JobError::OutputScan)?
            .ok_or(JobError::MissingOutput)?;
        artifacts.output = Some(video_path.clone());

        let (video, size) = media::read_base64(&video_path).await?;
        tracing::info!(path = %video_path.display(), bytes = size, "Output video encoded");

        Ok(JobSuccess {
            video,
            seed: params.seed,
            mode,
            parameters: EchoedParameters::from(&params),
            elapsed_time: started.elapsed().as_secs_f64(),
            audio_duration,
        })
    }
}

/// `start + budget`, or [`FAR_FUTURE`] from `start` if that overflows.
fn deadline_after(start: Instant, budget: Duration) -> Instant {
    start
        .checked_add(budget)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

fn log_params(params: &GenerationParams, mode: Mode) {
    tracing::info!(
        prompt = %params.prompt_preview(),
        size = %format!("{}x{}", params.width, params.height),
        steps = params.steps,
        cfg = params.cfg,
        fps = params.fps,
        seed = %params.seed,
        seed_generated = params.seed_generated,
        timeout_secs = params.timeout_secs,
        img_compression = params.img_compression,
        i2v_strength_first = params.i2v_strength_first,
        i2v_strength_second = params.i2v_strength_second,
        "Input parameters",
    );
    match mode {
        Mode::CustomAudio => tracing::info!("Audio: custom (provided)"),
        Mode::GeneratedAudio => {
            tracing::info!(frame_count = params.frame_count, "Audio: generated")
        }
    }
}

/// Remove files produced by the job. Failures are logged only.
async fn cleanup(artifacts: &Artifacts) {
    for path in artifacts.output.iter().chain(artifacts.inputs.iter()) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove artifact"),
        }
    }
}
