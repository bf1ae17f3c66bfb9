//! ComfyUI API-format workflow graphs.
//!
//! A workflow is a JSON object mapping node ids (`"98"`, `"92:3"`, ...) to
//! node descriptors of the shape `{"class_type": ..., "inputs": {...}}`.
//! Keys other than `class_type` and `inputs` (for example `_meta`) are
//! carried through untouched so the graph submitted to the server is the
//! template plus the patched values and nothing else.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::params::Mode;

/// Template used when no mode-specific file exists.
pub const FALLBACK_WORKFLOW_FILE: &str = "workflow.json";

/// A single node in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// ComfyUI operation type (e.g. "LoadImage", "CLIPTextEncode").
    #[serde(default)]
    pub class_type: String,
    /// Input values for this node, literal or links to other nodes.
    #[serde(default)]
    pub inputs: serde_json::Map<String, serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A workflow graph keyed by node id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowGraph {
    nodes: BTreeMap<String, WorkflowNode>,
}

impl WorkflowGraph {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read and parse a template file.
    pub async fn load(path: &Path) -> Result<Self, CoreError> {
        let shown = path.display().to_string();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CoreError::WorkflowRead {
                path: shown.clone(),
                source,
            })?;
        let graph = Self::from_json_str(&text).map_err(|source| CoreError::WorkflowParse {
            path: shown.clone(),
            source,
        })?;

        tracing::info!(path = %shown, nodes = graph.len(), "Workflow loaded");
        Ok(graph)
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut WorkflowNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Read a single input value, if both node and input exist.
    pub fn input(&self, node_id: &str, input: &str) -> Option<&serde_json::Value> {
        self.node(node_id).and_then(|n| n.inputs.get(input))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Choose the template for a mode: `workflow_<mode>.json` in `dir`,
/// falling back to [`FALLBACK_WORKFLOW_FILE`] when that file is missing.
pub async fn template_path(dir: &Path, mode: Mode) -> PathBuf {
    let specific = dir.join(format!("workflow_{}.json", mode.as_str()));
    if tokio::fs::try_exists(&specific).await.unwrap_or(false) {
        specific
    } else {
        tracing::debug!(
            missing = %specific.display(),
            "Mode-specific workflow not found, using fallback",
        );
        dir.join(FALLBACK_WORKFLOW_FILE)
    }
}
