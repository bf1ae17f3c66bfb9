/// Domain errors raised while turning a job request into a workflow
/// submission.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid job input: {0}")]
    InvalidInput(String),

    #[error("Failed to decode base64 {field}: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("Failed to read workflow template {path}: {source}")]
    WorkflowRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse workflow template {path}: {source}")]
    WorkflowParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    /// Whether this error was caused by the shape of the request itself
    /// rather than by anything that happened while processing it.
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::MissingField(_) | CoreError::InvalidInput(_))
    }
}
