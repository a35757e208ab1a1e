//! Core data model of a workflow graph.
//!
//! These are the name-keyed shapes callers build workflows from (and read
//! them back as). They deserialise from the conventional JSON layout:
//!
//! ```json
//! { "Start": { "main": [[{ "node": "Mid", "type": "main", "index": 0 }]] } }
//! ```
//!
//! Internally the [`Workflow`](crate::Workflow) keys everything by
//! [`NodeId`](crate::arena::NodeId) instead.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single step in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Optional persistent identifier; the graph itself keys nodes by `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Unique within a workflow.
    pub name: String,
    /// Registered node type, resolved through [`nodes::NodeTypes`].
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default = "default_type_version")]
    pub type_version: f64,
    #[serde(default)]
    pub disabled: bool,
    /// Free-form configuration; never interpreted by the graph except for
    /// expression references rewritten on rename.
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

fn default_type_version() -> f64 {
    1.0
}

impl Node {
    /// An enabled, version-1 node with no parameters.
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            node_type: node_type.into(),
            type_version: default_type_version(),
            disabled: false,
            parameters: Map::new(),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn with_type_version(mut self, version: f64) -> Self {
        self.type_version = version;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// ConnectionType
// ---------------------------------------------------------------------------

/// The channel a connection belongs to.
///
/// `Main` carries execution flow; the `Ai*` channels attach auxiliary
/// sub-nodes (models, memory, tools, ...) to the node that consumes them.
/// Declaration order is the iteration order when several channels are walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConnectionType {
    #[serde(rename = "main")]
    Main,
    #[serde(rename = "ai_agent")]
    AiAgent,
    #[serde(rename = "ai_chain")]
    AiChain,
    #[serde(rename = "ai_document")]
    AiDocument,
    #[serde(rename = "ai_embedding")]
    AiEmbedding,
    #[serde(rename = "ai_languageModel")]
    AiLanguageModel,
    #[serde(rename = "ai_memory")]
    AiMemory,
    #[serde(rename = "ai_outputParser")]
    AiOutputParser,
    #[serde(rename = "ai_retriever")]
    AiRetriever,
    #[serde(rename = "ai_reranker")]
    AiReranker,
    #[serde(rename = "ai_textSplitter")]
    AiTextSplitter,
    #[serde(rename = "ai_tool")]
    AiTool,
    #[serde(rename = "ai_vectorStore")]
    AiVectorStore,
}

impl ConnectionType {
    pub const ALL: [ConnectionType; 13] = [
        Self::Main,
        Self::AiAgent,
        Self::AiChain,
        Self::AiDocument,
        Self::AiEmbedding,
        Self::AiLanguageModel,
        Self::AiMemory,
        Self::AiOutputParser,
        Self::AiRetriever,
        Self::AiReranker,
        Self::AiTextSplitter,
        Self::AiTool,
        Self::AiVectorStore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::AiAgent => "ai_agent",
            Self::AiChain => "ai_chain",
            Self::AiDocument => "ai_document",
            Self::AiEmbedding => "ai_embedding",
            Self::AiLanguageModel => "ai_languageModel",
            Self::AiMemory => "ai_memory",
            Self::AiOutputParser => "ai_outputParser",
            Self::AiRetriever => "ai_retriever",
            Self::AiReranker => "ai_reranker",
            Self::AiTextSplitter => "ai_textSplitter",
            Self::AiTool => "ai_tool",
            Self::AiVectorStore => "ai_vectorStore",
        }
    }

    pub fn is_main(self) -> bool {
        self == Self::Main
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown connection type: {s}"))
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// One end of a directed edge: the node on the other side, the channel, and
/// the port index on that node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub node: String,
    #[serde(rename = "type")]
    pub kind: ConnectionType,
    pub index: usize,
}

impl Connection {
    pub fn new(node: impl Into<String>, kind: ConnectionType, index: usize) -> Self {
        Self {
            node: node.into(),
            kind,
            index,
        }
    }

    /// A `main` connection into port 0.
    pub fn main(node: impl Into<String>) -> Self {
        Self::new(node, ConnectionType::Main, 0)
    }
}

/// Per-port connection lists for one channel. A slot may be `null`/absent.
pub type PortConnections = Vec<Option<Vec<Connection>>>;

/// All channels of one node.
pub type NodeConnections = BTreeMap<ConnectionType, PortConnections>;

/// A full connection table keyed by node name.
///
/// Keyed by source node this is the canonical table; keyed by destination
/// it is the derived mirror produced by
/// [`map_connections_by_destination`](crate::index::map_connections_by_destination).
pub type Connections = BTreeMap<String, NodeConnections>;

/// Cached per-node output items, keyed by node name. Opaque to the graph.
pub type PinData = BTreeMap<String, Vec<Value>>;

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sparse_connection_table_deserialises() {
        let table: Connections = serde_json::from_value(json!({
            "Agent": {
                "main": [null, [{ "node": "Out", "type": "main", "index": 1 }]],
            },
            "Model": {
                "ai_languageModel": [[{ "node": "Agent", "type": "ai_languageModel", "index": 0 }]],
            },
        }))
        .expect("valid table");

        let agent_main = &table["Agent"][&ConnectionType::Main];
        assert_eq!(agent_main.len(), 2);
        assert!(agent_main[0].is_none());
        assert_eq!(
            agent_main[1].as_deref(),
            Some(&[Connection::new("Out", ConnectionType::Main, 1)][..])
        );
        assert!(table["Model"].contains_key(&ConnectionType::AiLanguageModel));
    }

    #[test]
    fn node_defaults_fill_in() {
        let node: Node = serde_json::from_value(json!({
            "name": "Start",
            "type": "n8n-nodes-base.manualTrigger",
        }))
        .unwrap();
        assert_eq!(node.type_version, 1.0);
        assert!(!node.disabled);
        assert!(node.parameters.is_empty());
    }

    #[test]
    fn connection_type_string_round_trip() {
        for kind in ConnectionType::ALL {
            assert_eq!(kind.as_str().parse::<ConnectionType>(), Ok(kind));
        }
        assert!("bogus".parse::<ConnectionType>().is_err());
    }
}
