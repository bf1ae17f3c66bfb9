//! `ltxv-worker` -- LTX-2 image-to-video serverless worker.
//!
//! Drives a local ComfyUI server: each job's image (and optional audio)
//! is written to the ComfyUI input directory, the workflow template is
//! patched and queued, and the finished video is returned base64-encoded.
//!
//! Runs in one of two modes:
//!
//! * `WORKER_TEST_INPUT=<file>`: run the job in that file once, print the
//!   result JSON to stdout and exit.
//! * otherwise: serve `POST /runsync` and `GET /health` on `HOST:PORT`.
//!
//! See [`ltxv_worker::config::WorkerConfig::from_env`] for every variable.

use std::net::SocketAddr;
use std::path::Path;

use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ltxv_core::request::Job;
use ltxv_worker::config::WorkerConfig;
use ltxv_worker::handler::JobHandler;
use ltxv_worker::server::{self, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ltxv_worker=debug,ltxv_comfyui=debug,ltxv_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(
        comfyui_url = %config.comfyui_url,
        input_dir = %config.input_dir.display(),
        output_dir = %config.output_dir.display(),
        workflow_dir = %config.workflow_dir.display(),
        cleanup_artifacts = config.cleanup_artifacts,
        started_at = %chrono::Utc::now().to_rfc3339(),
        "LTX-2 video worker starting (modes: generated_audio, custom_audio)",
    );

    let test_input = config.test_input.clone();
    let host = config.host.clone();
    let port = config.port;
    let handler = JobHandler::new(config);

    match test_input {
        Some(path) => run_once(&handler, &path).await,
        None => serve(handler, &host, port).await,
    }
}

/// Run the job stored in `path` and print its result.
async fn run_once(handler: &JobHandler, path: &Path) {
    let text = tokio::fs::read_to_string(path).await.unwrap_or_else(|e| {
        tracing::error!(path = %path.display(), error = %e, "Failed to read test input");
        std::process::exit(1);
    });
    let job: Job = serde_json::from_str(&text).unwrap_or_else(|e| {
        tracing::error!(path = %path.display(), error = %e, "Test input is not a valid job");
        std::process::exit(1);
    });

    let result = handler.handle(job).await;
    let failed = result.is_error();
    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "Failed to serialize result"),
    }
    if failed {
        std::process::exit(1);
    }
}

async fn serve(handler: JobHandler, host: &str, port: u16) {
    let app = server::router(AppState::new(handler))
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let addr = SocketAddr::new(host.parse().expect("Invalid HOST address"), port);
    tracing::info!(%addr, "Starting job server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Job server stopped");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
