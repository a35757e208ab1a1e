//! In-memory node-type registry.
//!
//! A registered type is either a single implementation that answers to
//! every version, or a versioned family where each `typeVersion` maps to its
//! own implementation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::{NodeType, NodeTypeError, NodeTypes};

// ---------------------------------------------------------------------------
// VersionedNodeType
// ---------------------------------------------------------------------------

/// A node type whose behaviour differs per `typeVersion`.
#[derive(Clone)]
pub struct VersionedNodeType {
    name: String,
    current_version: f64,
    versions: Vec<(f64, Arc<dyn NodeType>)>,
}

impl VersionedNodeType {
    pub fn new(name: impl Into<String>, current_version: f64) -> Self {
        Self {
            name: name.into(),
            current_version,
            versions: Vec::new(),
        }
    }

    /// Add (or replace) the implementation for `version`.
    pub fn with_version(mut self, version: f64, node_type: Arc<dyn NodeType>) -> Self {
        match self.versions.iter_mut().find(|(v, _)| *v == version) {
            Some(slot) => slot.1 = node_type,
            None => self.versions.push((version, node_type)),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_version(&self) -> f64 {
        self.current_version
    }

    /// Resolve `version`, or the current version when none is requested.
    pub fn get(&self, version: Option<f64>) -> Option<Arc<dyn NodeType>> {
        let wanted = version.unwrap_or(self.current_version);
        self.versions
            .iter()
            .find(|(v, _)| *v == wanted)
            .map(|(_, node_type)| Arc::clone(node_type))
    }
}

impl std::fmt::Debug for VersionedNodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedNodeType")
            .field("name", &self.name)
            .field("current_version", &self.current_version)
            .field(
                "versions",
                &self.versions.iter().map(|(v, _)| *v).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ---------------------------------------------------------------------------
// NodeTypeEntry
// ---------------------------------------------------------------------------

/// What the registry stores under a type name.
#[derive(Clone)]
pub enum NodeTypeEntry {
    /// One implementation for every version.
    Single(Arc<dyn NodeType>),
    /// One implementation per version.
    Versioned(VersionedNodeType),
}

impl NodeTypeEntry {
    fn resolve(&self, name: &str, version: Option<f64>) -> Result<Arc<dyn NodeType>, NodeTypeError> {
        match self {
            Self::Single(node_type) => Ok(Arc::clone(node_type)),
            Self::Versioned(versioned) => {
                versioned
                    .get(version)
                    .ok_or_else(|| NodeTypeError::UnknownVersion {
                        node_type: name.to_owned(),
                        version: version.unwrap_or(versioned.current_version),
                    })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// NodeTypeRegistry
// ---------------------------------------------------------------------------

/// Maps type names to their implementations.
#[derive(Clone, Default)]
pub struct NodeTypeRegistry {
    entries: HashMap<String, NodeTypeEntry>,
}

impl NodeTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single-implementation type under its description name.
    ///
    /// # Errors
    /// [`NodeTypeError::DuplicateNodeType`] if the name is already taken.
    pub fn register(&mut self, node_type: Arc<dyn NodeType>) -> Result<(), NodeTypeError> {
        let name = node_type.description().name.clone();
        self.insert(name, NodeTypeEntry::Single(node_type))
    }

    /// Register a versioned family under its own name.
    ///
    /// # Errors
    /// [`NodeTypeError::DuplicateNodeType`] if the name is already taken.
    pub fn register_versioned(&mut self, node_type: VersionedNodeType) -> Result<(), NodeTypeError> {
        let name = node_type.name.clone();
        self.insert(name, NodeTypeEntry::Versioned(node_type))
    }

    fn insert(&mut self, name: String, entry: NodeTypeEntry) -> Result<(), NodeTypeError> {
        if self.entries.contains_key(&name) {
            return Err(NodeTypeError::DuplicateNodeType(name));
        }
        debug!(node_type = %name, "registered node type");
        self.entries.insert(name, entry);
        Ok(())
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl NodeTypes for NodeTypeRegistry {
    fn get_by_name_and_version(
        &self,
        node_type: &str,
        version: Option<f64>,
    ) -> Result<Arc<dyn NodeType>, NodeTypeError> {
        self.entries
            .get(node_type)
            .ok_or_else(|| NodeTypeError::UnknownNodeType {
                node_type: node_type.to_owned(),
            })?
            .resolve(node_type, version)
    }
}
