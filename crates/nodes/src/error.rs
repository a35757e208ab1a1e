//! Node-type registry error type.

use thiserror::Error;

/// Errors returned when a node type cannot be resolved or registered.
///
/// Graph queries treat a failed lookup as "does not match" rather than
/// propagating it, so these mostly surface to whoever populates the registry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeTypeError {
    /// No node type is registered under this name.
    #[error("unknown node type: '{node_type}'")]
    UnknownNodeType { node_type: String },

    /// The node type exists but the requested version was never registered.
    #[error("node type '{node_type}' has no version {version}")]
    UnknownVersion { node_type: String, version: f64 },

    /// A node type with this name is already registered.
    #[error("node type '{0}' is already registered")]
    DuplicateNodeType(String),
}
