//! The `nodes` crate: the node-type registry consumed by the workflow graph.
//!
//! A workflow stores only each node's `type` and `typeVersion`; whether that
//! type can start a run (trigger, poll) is answered here through
//! [`NodeTypes`]. Every implementation, built-in or test double, implements
//! [`NodeType`].

pub mod description;
pub mod error;
pub mod mock;
pub mod registry;
pub mod traits;

pub use description::NodeTypeDescription;
pub use error::NodeTypeError;
pub use registry::{NodeTypeEntry, NodeTypeRegistry, VersionedNodeType};
pub use traits::{NodeType, NodeTypes};
