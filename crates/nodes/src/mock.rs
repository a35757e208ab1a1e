//! `MockNodeType`: a test double for `NodeType`.
//!
//! Useful in unit and integration tests where the real node implementations
//! are unavailable or irrelevant and only their capability flags matter.

use crate::{NodeType, NodeTypeDescription};

/// Capability profile injected into `MockNodeType` at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCapability {
    /// Starts runs from an external event.
    Trigger,
    /// Starts runs by polling.
    Poll,
    /// Plain processing node.
    Regular,
}

/// A node type that reports a programmer-specified capability.
#[derive(Debug, Clone)]
pub struct MockNodeType {
    pub description: NodeTypeDescription,
    pub capability: MockCapability,
}

impl MockNodeType {
    pub fn new(name: impl Into<String>, capability: MockCapability) -> Self {
        let name = name.into();
        let mut description = NodeTypeDescription::new(name.clone(), name);
        if capability == MockCapability::Trigger {
            description = description.with_group("trigger");
        }
        if capability == MockCapability::Poll {
            description = description.polling();
        }
        Self { description, capability }
    }

    pub fn trigger(name: impl Into<String>) -> Self {
        Self::new(name, MockCapability::Trigger)
    }

    pub fn poll(name: impl Into<String>) -> Self {
        Self::new(name, MockCapability::Poll)
    }

    pub fn regular(name: impl Into<String>) -> Self {
        Self::new(name, MockCapability::Regular)
    }
}

impl NodeType for MockNodeType {
    fn description(&self) -> &NodeTypeDescription {
        &self.description
    }
}
