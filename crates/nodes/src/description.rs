//! Static metadata describing a node type.

use serde::{Deserialize, Serialize};

/// Descriptive metadata for a node type, independent of any workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeDescription {
    /// Fully qualified type name, e.g. `n8n-nodes-base.manualTrigger`.
    pub name: String,
    /// Human-readable label.
    pub display_name: String,
    /// Grouping tags (`trigger`, `transform`, ...). A `trigger` tag marks a
    /// type that can start a run.
    #[serde(default)]
    pub group: Vec<String>,
    /// Whether the type originates runs by polling an external source.
    #[serde(default)]
    pub polling: bool,
}

impl NodeTypeDescription {
    /// A description with no group tags.
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            group: Vec::new(),
            polling: false,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group.push(group.into());
        self
    }

    pub fn is_in_group(&self, group: &str) -> bool {
        self.group.iter().any(|g| g == group)
    }

    pub fn polling(mut self) -> Self {
        self.polling = true;
        self
    }
}
