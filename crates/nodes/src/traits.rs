//! The capability traits consumed by the workflow graph.

use std::sync::Arc;

use crate::{NodeTypeDescription, NodeTypeError};

/// Capabilities of a single node type implementation.
///
/// The graph never executes a node; it only asks what the type is able to
/// do when deciding where a run may start.
pub trait NodeType: Send + Sync {
    fn description(&self) -> &NodeTypeDescription;

    /// Whether the type can originate a run from an external event.
    fn is_trigger(&self) -> bool {
        self.description().is_in_group("trigger")
    }

    /// Whether the type can originate a run by polling.
    fn is_poll(&self) -> bool {
        self.description().polling
    }
}

/// Resolves a node's `type` + `typeVersion` to its implementation.
pub trait NodeTypes: Send + Sync {
    /// Look up a node type.
    ///
    /// # Errors
    /// - [`NodeTypeError::UnknownNodeType`] if nothing is registered under
    ///   `node_type`.
    /// - [`NodeTypeError::UnknownVersion`] if a versioned type lacks `version`.
    fn get_by_name_and_version(
        &self,
        node_type: &str,
        version: Option<f64>,
    ) -> Result<Arc<dyn NodeType>, NodeTypeError>;
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Described(NodeTypeDescription);

    impl NodeType for Described {
        fn description(&self) -> &NodeTypeDescription {
            &self.0
        }
    }

    #[test]
    fn trigger_capability_comes_from_group_tag() {
        let description: NodeTypeDescription = serde_json::from_value(json!({
            "name": "acme.onEvent",
            "displayName": "On Event",
            "group": ["trigger"],
        }))
        .unwrap();
        let node_type = Described(description);
        assert!(node_type.is_trigger());
        assert!(!node_type.is_poll());

        let plain = Described(NodeTypeDescription::new("acme.set", "Set").with_group("transform"));
        assert!(!plain.is_trigger());
    }

    #[test]
    fn poll_capability_comes_from_polling_flag() {
        let node_type = Described(NodeTypeDescription::new("acme.feed", "Feed").polling());
        assert!(node_type.is_poll());
        assert!(!node_type.is_trigger());
    }
}
