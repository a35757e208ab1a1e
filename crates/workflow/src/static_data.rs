//! Persistent key-value buckets scoped globally or per node.
//!
//! Buckets are created lazily on first access. Per-node buckets are keyed
//! by [`NodeId`], so they follow a node through renames.
//!
//! The store is not synchronised. Two concurrent executions sharing one
//! workflow share these buckets and must serialise access themselves.

use std::collections::HashMap;
use std::str::FromStr;

use serde_json::{Map, Value};
use tracing::warn;

use crate::arena::{NodeArena, NodeId};
use crate::error::WorkflowError;

/// One bucket of static data.
pub type StaticBucket = Map<String, Value>;

const GLOBAL_KEY: &str = "global";
const NODE_KEY_PREFIX: &str = "node:";

/// Which partition of the store a bucket lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticDataScope {
    /// A single bucket shared by the whole workflow.
    Global,
    /// One bucket per node.
    Node,
}

impl FromStr for StaticDataScope {
    type Err = WorkflowError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Self::Global),
            "node" => Ok(Self::Node),
            other => Err(WorkflowError::UnknownStaticDataScope(other.to_owned())),
        }
    }
}

/// Resolved address of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticDataKey {
    Global,
    Node(NodeId),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticDataStore {
    global: Option<StaticBucket>,
    nodes: HashMap<NodeId, StaticBucket>,
}

impl StaticDataStore {
    /// Load the persisted form (`{"global": {...}, "node:<name>": {...}}`).
    ///
    /// Keys of any other shape, and non-object buckets, are skipped.
    pub fn from_value(value: Map<String, Value>, arena: &mut NodeArena) -> Self {
        let mut store = Self::default();
        for (key, bucket) in value {
            let Value::Object(bucket) = bucket else {
                warn!(key = %key, "ignoring non-object static data bucket");
                continue;
            };
            if key == GLOBAL_KEY {
                store.global = Some(bucket);
            } else if let Some(name) = key.strip_prefix(NODE_KEY_PREFIX) {
                store.nodes.insert(arena.intern(name), bucket);
            } else {
                warn!(key = %key, "ignoring static data bucket with unknown scope");
            }
        }
        store
    }

    /// Persisted form, node buckets keyed by their current names.
    pub fn to_value(&self, arena: &NodeArena) -> Map<String, Value> {
        let mut out = Map::new();
        if let Some(global) = &self.global {
            out.insert(GLOBAL_KEY.to_owned(), Value::Object(global.clone()));
        }
        for (id, bucket) in &self.nodes {
            out.insert(
                format!("{NODE_KEY_PREFIX}{}", arena.name(*id)),
                Value::Object(bucket.clone()),
            );
        }
        out
    }

    /// The bucket at `key`, if it was ever created.
    pub fn get(&self, key: StaticDataKey) -> Option<&StaticBucket> {
        match key {
            StaticDataKey::Global => self.global.as_ref(),
            StaticDataKey::Node(id) => self.nodes.get(&id),
        }
    }

    pub fn get_mut(&mut self, key: StaticDataKey) -> Option<&mut StaticBucket> {
        match key {
            StaticDataKey::Global => self.global.as_mut(),
            StaticDataKey::Node(id) => self.nodes.get_mut(&id),
        }
    }

    /// The bucket at `key`, created empty on first access.
    pub fn bucket_mut(&mut self, key: StaticDataKey) -> &mut StaticBucket {
        match key {
            StaticDataKey::Global => self.global.get_or_insert_with(Map::new),
            StaticDataKey::Node(id) => self.nodes.entry(id).or_default(),
        }
    }

    /// Ids that own a node bucket.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Drop empty node buckets whose id fails `keep`. Returns how many went.
    pub fn prune_empty(&mut self, keep: impl Fn(NodeId) -> bool) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|&id, bucket| !bucket.is_empty() || keep(id));
        before - self.nodes.len()
    }

    pub fn remove_node(&mut self, id: NodeId) -> Option<StaticBucket> {
        self.nodes.remove(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_none() && self.nodes.is_empty()
    }
}
