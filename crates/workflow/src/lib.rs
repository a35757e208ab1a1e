//! The `workflow` crate: the workflow graph model and its traversal engine.
//!
//! A [`Workflow`] holds named nodes and a source-keyed connection table,
//! derives the destination-keyed mirror, and answers structural questions
//! about the graph: parents and children, start nodes, port indices between
//! nodes. It also owns per-workflow settings, pin data and static data, and
//! supports renaming a node with every reference following along.

pub mod arena;
pub mod constants;
pub mod error;
pub mod expressions;
pub mod index;
pub mod models;
pub mod settings;
pub mod static_data;
pub mod traversal;
pub mod workflow;

pub use error::WorkflowError;
pub use index::map_connections_by_destination;
pub use models::{
    Connection, ConnectionType, Connections, Node, NodeConnections, PinData, PortConnections,
};
pub use settings::{ExecutionOrder, WorkflowSettings};
pub use static_data::{StaticBucket, StaticDataScope};
pub use traversal::{ConnectionIndexes, ConnectionSelector, Depth};
pub use workflow::{ConnectedNode, Direction, Workflow, WorkflowParameters};
