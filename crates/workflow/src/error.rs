//! Workflow-level error types.

use thiserror::Error;

/// Errors produced by workflow graph operations.
///
/// Lookups that simply find nothing return `Option`/empty results instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    // ------ User errors ------

    /// The requested name is reserved and cannot be used for a node.
    #[error("node name '{name}' is a reserved identifier")]
    ReservedNodeName { name: String },

    /// Another node already uses (or connections already reference) this name.
    #[error("node name '{name}' is already in use")]
    NodeNameTaken { name: String },

    /// Node names must not be empty.
    #[error("node name must not be empty")]
    EmptyNodeName,

    /// No node with this name exists in the workflow.
    #[error("node '{0}' not found")]
    NodeNotFound(String),

    // ------ Programming errors ------

    /// Node-scoped static data was requested without naming the node.
    #[error("static data scope 'node' requires a node name")]
    MissingStaticDataNode,

    /// Static data was requested for a scope that does not exist.
    #[error("unknown static data scope: '{0}'")]
    UnknownStaticDataScope(String),
}
