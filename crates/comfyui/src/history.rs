//! Typed view of a `/history/{prompt_id}` entry.
//!
//! ComfyUI reports `{"outputs": {...}, "status": {"status_str": ...,
//! "completed": ..., "messages": [[kind, data], ...]}}` per prompt. Only
//! the fields the worker acts on are typed; everything else stays JSON.

use serde::Deserialize;

/// Message kind ComfyUI records when a node raises.
const EXECUTION_ERROR_KIND: &str = "execution_error";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    /// Node id -> output descriptor (`{"videos": [...]}` etc.).
    #[serde(default)]
    pub outputs: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub status: Option<HistoryStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub status_str: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
}

/// What a single history poll tells the caller to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionState {
    /// Not finished; poll again.
    Pending,
    /// The server reported an error; message passed through verbatim.
    Failed(String),
    /// Outputs are present.
    Completed,
}

impl HistoryEntry {
    /// Classify this entry. An error status wins over any outputs.
    pub fn state(&self) -> ExecutionState {
        if let Some(status) = &self.status {
            if status.status_str.as_deref() == Some("error") {
                return ExecutionState::Failed(status.error_message());
            }
        }
        if self.outputs.is_empty() {
            ExecutionState::Pending
        } else {
            ExecutionState::Completed
        }
    }
}

impl HistoryStatus {
    /// The server's error text.
    ///
    /// Prefers the `exception_message` of an `execution_error` message,
    /// then the first message as JSON, then `"Unknown error"`.
    pub fn error_message(&self) -> String {
        let from_execution_error = self.messages.iter().find_map(|msg| {
            let pair = msg.as_array()?;
            if pair.first()?.as_str()? != EXECUTION_ERROR_KIND {
                return None;
            }
            pair.get(1)?
                .get("exception_message")?
                .as_str()
                .map(str::to_string)
        });

        from_execution_error
            .or_else(|| self.messages.first().map(|m| m.to_string()))
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}
