//! Base64 media payloads and the files they are decoded into.

use std::path::{Path, PathBuf};

use base64::Engine;

use crate::error::CoreError;

/// Marker preceding the payload in a `data:` URI.
const DATA_URI_MARKER: &str = "base64,";

/// Strip a `data:<mime>;base64,` prefix if present.
pub fn strip_data_uri(data: &str) -> &str {
    match data.split_once(DATA_URI_MARKER) {
        Some((_, payload)) => payload,
        None => data,
    }
}

/// Decode a base64 payload (optionally a data URI). Embedded whitespace
/// such as line wrapping is ignored.
pub fn decode_base64(field: &'static str, data: &str) -> Result<Vec<u8>, CoreError> {
    let payload: String = strip_data_uri(data)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|source| CoreError::Decode { field, source })
}

pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode `data` and write it to `dir/filename`, creating `dir` if needed
/// and replacing any existing file.
pub async fn save_input(
    dir: &Path,
    filename: &str,
    field: &'static str,
    data: &str,
) -> Result<PathBuf, CoreError> {
    let bytes = decode_base64(field, data)?;
    let path = dir.join(filename);

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| CoreError::Io {
            path: dir.display().to_string(),
            source,
        })?;
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|source| CoreError::Io {
            path: path.display().to_string(),
            source,
        })?;

    tracing::info!(
        field,
        path = %path.display(),
        bytes = bytes.len(),
        "Saved input file",
    );
    Ok(path)
}

/// Read a file and return its contents base64-encoded, with the byte size.
pub async fn read_base64(path: &Path) -> Result<(String, usize), CoreError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| CoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok((encode_base64(&bytes), bytes.len()))
}
