//! Locating the video a finished prompt wrote to disk.
//!
//! The history outputs are tried first. When none of the reported paths
//! exist, the output directory is scanned for video files and the one
//! with the greatest file name wins.

use std::path::{Path, PathBuf};

/// Output descriptor keys that may reference produced files, in the
/// order they are checked.
const OUTPUT_KEYS: &[&str] = &["gifs", "videos", "video", "images", "files"];

/// Extensions recognized when scanning the output directory.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "gif", "avi", "mov"];

/// Paths referenced by the history outputs, in check order.
///
/// Items may be `{"filename": ..., "subfolder": ...}` objects or bare
/// filename strings, either as a list or a single value.
pub fn reported_paths(
    outputs: &serde_json::Map<String, serde_json::Value>,
    output_dir: &Path,
) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    for (node_id, node_output) in outputs {
        for key in OUTPUT_KEYS {
            let Some(items) = node_output.get(*key) else {
                continue;
            };
            let items = match items {
                serde_json::Value::Array(list) => list.iter().collect::<Vec<_>>(),
                single => vec![single],
            };

            for item in items {
                let (filename, subfolder) = match item {
                    serde_json::Value::Object(obj) => (
                        obj.get("filename").and_then(|f| f.as_str()),
                        obj.get("subfolder").and_then(|s| s.as_str()).unwrap_or(""),
                    ),
                    serde_json::Value::String(name) => (Some(name.as_str()), ""),
                    _ => continue,
                };
                let Some(filename) = filename.filter(|f| !f.is_empty()) else {
                    continue;
                };

                let path = if subfolder.is_empty() {
                    output_dir.join(filename)
                } else {
                    output_dir.join(subfolder).join(filename)
                };
                tracing::debug!(node_id = %node_id, key, path = %path.display(), "Reported output");
                paths.push(path);
            }
        }
    }

    paths
}

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.iter().any(|v| e.eq_ignore_ascii_case(v)))
        .unwrap_or(false)
}

/// Recursively scan `dir` for video files and return the one whose file
/// name sorts last. Equal names in different subdirectories are ordered
/// by full path.
pub async fn scan_for_video(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    if !tokio::fs::try_exists(dir).await? {
        return Ok(None);
    }

    let mut best: Option<PathBuf> = None;
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(path);
                continue;
            }
            if !file_type.is_file() || !is_video_file(&path) {
                continue;
            }
            tracing::debug!(path = %path.display(), "Video candidate");
            if best.as_ref().map_or(true, |b| rank(&path) > rank(b)) {
                best = Some(path);
            }
        }
    }

    Ok(best)
}

fn rank(path: &Path) -> (Option<&std::ffi::OsStr>, &Path) {
    (path.file_name(), path)
}

/// Find the produced artifact: first existing reported path, otherwise
/// the directory scan.
pub async fn locate_output(
    outputs: &serde_json::Map<String, serde_json::Value>,
    output_dir: &Path,
) -> std::io::Result<Option<PathBuf>> {
    for path in reported_paths(outputs, output_dir) {
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "Found reported output");
            return Ok(Some(path));
        }
        tracing::debug!(path = %path.display(), "Reported output missing on disk");
    }

    tracing::info!(dir = %output_dir.display(), "Scanning output directory for video files");
    let found = scan_for_video(output_dir).await?;
    match &found {
        Some(path) => tracing::info!(path = %path.display(), "Found video file"),
        None => tracing::warn!("No output video found"),
    }
    Ok(found)
}
