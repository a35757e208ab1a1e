//! The workflow aggregate.
//!
//! [`Workflow`] owns the node arena, both connection indices, settings,
//! pin data and static data. Callers address nodes by name; everything
//! underneath is keyed by [`NodeId`], which is what keeps the source and
//! destination indices in agreement across renames.
//!
//! A `Workflow` is not internally synchronised. Mutating it while another
//! thread traverses it must be serialised by the caller, typically by giving
//! each concurrent execution its own instance.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use nodes::{NodeType, NodeTypes};
use serde_json::{Map, Value};
use tracing::{debug, instrument, trace};

use crate::arena::{NodeArena, NodeId};
use crate::constants::{MANUAL_CHAT_TRIGGER_NODE_TYPE, RESERVED_NODE_NAMES, STARTING_NODE_TYPES};
use crate::error::WorkflowError;
use crate::expressions::rename_node_references;
use crate::index::{ConnectionIndex, Edge};
use crate::models::{Connection, ConnectionType, Connections, Node, PinData};
use crate::settings::WorkflowSettings;
use crate::static_data::{StaticBucket, StaticDataKey, StaticDataScope, StaticDataStore};
use crate::traversal::{self, ConnectionIndexes, ConnectionSelector, Depth};

// ---------------------------------------------------------------------------
// Construction input
// ---------------------------------------------------------------------------

/// Everything needed to build a [`Workflow`].
pub struct WorkflowParameters {
    pub id: String,
    pub name: Option<String>,
    pub nodes: Vec<Node>,
    /// Source-keyed connection table.
    pub connections: Connections,
    pub active: bool,
    pub node_types: Arc<dyn NodeTypes>,
    /// Persisted static data (`{"global": {...}, "node:<name>": {...}}`).
    pub static_data: Option<Map<String, Value>>,
    pub settings: Option<WorkflowSettings>,
    pub pin_data: Option<PinData>,
}

impl WorkflowParameters {
    /// Inactive workflow with no static data, default settings and no pin data.
    pub fn new(
        id: impl Into<String>,
        nodes: Vec<Node>,
        connections: Connections,
        node_types: Arc<dyn NodeTypes>,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            nodes,
            connections,
            active: false,
            node_types,
            static_data: None,
            settings: None,
            pin_data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// Which way a walk follows the edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards children, over the source index.
    Downstream,
    /// Towards parents, over the destination index.
    Upstream,
}

/// A parent found by [`Workflow::get_parent_nodes_by_depth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedNode {
    pub name: String,
    /// Hops from the starting node at first discovery.
    pub depth: usize,
    /// Output port indices on this node of every edge that led towards the
    /// starting node.
    pub indices: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

pub struct Workflow {
    pub id: String,
    pub name: Option<String>,
    pub active: bool,
    node_types: Arc<dyn NodeTypes>,
    arena: NodeArena,
    by_source: ConnectionIndex,
    by_destination: ConnectionIndex,
    settings: WorkflowSettings,
    static_data: StaticDataStore,
    test_static_data: Option<StaticDataStore>,
    pin_data: Option<PinData>,
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("active", &self.active)
            .field("nodes", &self.arena.len())
            .field("edges", &self.by_source.edge_count())
            .finish_non_exhaustive()
    }
}

impl Workflow {
    pub fn new(parameters: WorkflowParameters) -> Self {
        let WorkflowParameters {
            id,
            name,
            nodes,
            connections,
            active,
            node_types,
            static_data,
            settings,
            pin_data,
        } = parameters;

        let mut workflow = Self {
            id,
            name,
            active,
            node_types,
            arena: NodeArena::default(),
            by_source: ConnectionIndex::default(),
            by_destination: ConnectionIndex::default(),
            settings: settings.unwrap_or_default(),
            static_data: StaticDataStore::default(),
            test_static_data: None,
            pin_data,
        };
        workflow.set_nodes(nodes);
        workflow.set_connections(&connections);
        if let Some(persisted) = static_data {
            workflow.static_data = StaticDataStore::from_value(persisted, &mut workflow.arena);
        }

        debug!(
            workflow_id = %workflow.id,
            nodes = workflow.arena.len(),
            edges = workflow.by_source.edge_count(),
            "workflow graph loaded"
        );
        workflow
    }

    // -----------------------------------------------------------------------
    // Mutators
    // -----------------------------------------------------------------------

    /// Replace all nodes. Later duplicates by name overwrite earlier ones.
    pub fn set_nodes(&mut self, nodes: Vec<Node>) {
        self.arena.replace_nodes(nodes);
        self.release_unused_ids();
    }

    /// Replace the connection table and rebuild the destination index.
    pub fn set_connections(&mut self, connections: &Connections) {
        self.by_source = ConnectionIndex::from_connections(connections, &mut self.arena);
        self.by_destination = self.by_source.invert();
        self.release_unused_ids();
        trace!(
            workflow_id = %self.id,
            edges = self.by_source.edge_count(),
            "connection indices rebuilt"
        );
    }

    pub fn set_settings(&mut self, settings: WorkflowSettings) {
        self.settings = settings;
    }

    pub fn set_pin_data(&mut self, pin_data: Option<PinData>) {
        self.pin_data = pin_data;
    }

    /// Install (or clear) the override store consulted before real static data.
    pub fn set_test_static_data(&mut self, test_static_data: Option<Map<String, Value>>) {
        self.test_static_data =
            test_static_data.map(|value| StaticDataStore::from_value(value, &mut self.arena));
        self.release_unused_ids();
    }

    /// Rename a node.
    ///
    /// The node's own `name`, every connection that points at it (in both
    /// indices), its static data and pin data, and expression references to
    /// it in other nodes' parameters all follow.
    ///
    /// # Errors
    /// - [`WorkflowError::EmptyNodeName`] if `new_name` is empty.
    /// - [`WorkflowError::ReservedNodeName`] if `new_name` matches a reserved
    ///   identifier, ignoring case.
    /// - [`WorkflowError::NodeNotFound`] if no node is called `old_name`.
    /// - [`WorkflowError::NodeNameTaken`] if another node, or any connection,
    ///   already uses `new_name`. This includes a connection whose target is
    ///   not a defined node: renaming never adopts dangling edges.
    #[instrument(skip(self), fields(workflow_id = %self.id))]
    pub fn rename_node(&mut self, old_name: &str, new_name: &str) -> Result<(), WorkflowError> {
        if new_name.is_empty() {
            return Err(WorkflowError::EmptyNodeName);
        }
        if RESERVED_NODE_NAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(new_name))
        {
            return Err(WorkflowError::ReservedNodeName {
                name: new_name.to_owned(),
            });
        }

        let id = self
            .arena
            .id(old_name)
            .filter(|&id| self.arena.contains_node(id))
            .ok_or_else(|| WorkflowError::NodeNotFound(old_name.to_owned()))?;
        if old_name == new_name {
            return Ok(());
        }

        if let Some(existing) = self.arena.id(new_name) {
            if self.arena.contains_node(existing)
                || self.by_source.references(existing)
                || self.by_destination.references(existing)
            {
                return Err(WorkflowError::NodeNameTaken {
                    name: new_name.to_owned(),
                });
            }
            // Only static data can still hang off a stale name.
            let stale_test_data = self
                .test_static_data
                .as_mut()
                .and_then(|overrides| overrides.remove_node(existing));
            if self.static_data.remove_node(existing).is_some() || stale_test_data.is_some() {
                debug!(name = new_name, "dropped static data of a previously removed node");
            }
        }

        self.arena.rename(id, new_name);

        let mut rewritten = 0usize;
        for node in self.arena.nodes_mut() {
            if rename_node_references(&mut node.parameters, old_name, new_name) {
                rewritten += 1;
            }
        }

        if let Some(pin_data) = self.pin_data.as_mut() {
            let items = pin_data.remove(old_name);
            if pin_data.remove(new_name).is_some() {
                debug!(name = new_name, "dropped pin data left under the new name");
            }
            if let Some(items) = items {
                pin_data.insert(new_name.to_owned(), items);
            }
        }
        self.release_unused_ids();

        debug!(
            from = old_name,
            to = new_name,
            rewritten_nodes = rewritten,
            "node renamed"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.arena.node(name)
    }

    /// The nodes among `names` that exist, in the order asked for.
    pub fn get_nodes(&self, names: &[&str]) -> Vec<&Node> {
        names.iter().filter_map(|name| self.get_node(name)).collect()
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.arena.nodes()
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Effective timezone: the configured zone, or UTC when unset or `"DEFAULT"`.
    pub fn timezone(&self) -> &str {
        self.settings.effective_timezone()
    }

    pub fn pin_data(&self) -> Option<&PinData> {
        self.pin_data.as_ref()
    }

    pub fn get_pin_data_of_node(&self, name: &str) -> Option<&[Value]> {
        self.pin_data.as_ref()?.get(name).map(Vec::as_slice)
    }

    /// The canonical source-keyed table, materialised by name.
    pub fn connections_by_source_node(&self) -> Connections {
        self.by_source.to_connections(&self.arena)
    }

    /// The derived destination-keyed table, materialised by name.
    pub fn connections_by_destination_node(&self) -> Connections {
        self.by_destination.to_connections(&self.arena)
    }

    // -----------------------------------------------------------------------
    // Node-type queries
    // -----------------------------------------------------------------------

    /// Enabled nodes whose resolved type satisfies `check`.
    ///
    /// Nodes whose type cannot be resolved never match.
    pub fn query_nodes<F>(&self, check: F) -> Vec<&Node>
    where
        F: Fn(&dyn NodeType) -> bool,
    {
        self.arena
            .nodes()
            .filter(|node| !node.disabled)
            .filter(|node| {
                self.resolve_node_type(node)
                    .is_some_and(|node_type| check(node_type.as_ref()))
            })
            .collect()
    }

    pub fn get_trigger_nodes(&self) -> Vec<&Node> {
        self.query_nodes(|node_type| node_type.is_trigger())
    }

    pub fn get_poll_nodes(&self) -> Vec<&Node> {
        self.query_nodes(|node_type| node_type.is_poll())
    }

    fn resolve_node_type(&self, node: &Node) -> Option<Arc<dyn NodeType>> {
        match self
            .node_types
            .get_by_name_and_version(&node.node_type, Some(node.type_version))
        {
            Ok(node_type) => Some(node_type),
            Err(err) => {
                debug!(node = %node.name, error = %err, "node type unresolved, treating as non-matching");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Start-node resolution
    // -----------------------------------------------------------------------

    /// The node a run should start from.
    ///
    /// Without a destination every node is a candidate. With one, the
    /// candidates are its root-most enabled `main` ancestors, or the
    /// destination itself if it has none. From the candidates, in order: a
    /// lone enabled candidate; the first enabled trigger or poll node (never
    /// the manual chat trigger); the enabled candidate of highest priority
    /// among the known starting types.
    #[instrument(skip(self), fields(workflow_id = %self.id))]
    pub fn get_start_node(&self, destination: Option<&str>) -> Option<&Node> {
        let candidates = match destination {
            None => self.arena.ids().collect(),
            Some(name) => {
                let id = self.arena.id(name)?;
                let mut roots = self.highest_nodes(id, None, &mut HashSet::new());
                if roots.is_empty() {
                    roots.push(id);
                }
                roots
            }
        };

        let start = self.pick_start_node(&candidates);
        debug!(
            candidates = candidates.len(),
            start = start.map(|node| node.name.as_str()),
            "start node resolved"
        );
        start
    }

    fn pick_start_node(&self, candidates: &[NodeId]) -> Option<&Node> {
        if let [only] = candidates {
            if let Some(node) = self.arena.get(*only).filter(|node| !node.disabled) {
                return Some(node);
            }
        }

        for &id in candidates {
            let Some(node) = self.arena.get(id) else {
                continue;
            };
            let Some(node_type) = self.resolve_node_type(node) else {
                continue;
            };
            if node_type.description().name == MANUAL_CHAT_TRIGGER_NODE_TYPE {
                continue;
            }
            if (node_type.is_trigger() || node_type.is_poll()) && !node.disabled {
                return Some(node);
            }
        }

        let mut starting: Vec<(usize, &Node)> = candidates
            .iter()
            .filter_map(|&id| self.arena.get(id))
            .filter_map(|node| {
                STARTING_NODE_TYPES
                    .iter()
                    .position(|&t| t == node.node_type)
                    .map(|priority| (priority, node))
            })
            .collect();
        starting.sort_by_key(|&(priority, _)| priority);
        starting
            .into_iter()
            .map(|(_, node)| node)
            .find(|node| !node.disabled)
    }

    /// Root-most enabled `main` ancestors of `name`.
    ///
    /// An enabled node with no `main` parents is its own root. With
    /// `input_index`, only parents on that input port of `name` are followed.
    /// Unknown names yield nothing.
    pub fn get_highest_node(&self, name: &str, input_index: Option<usize>) -> Vec<String> {
        let Some(id) = self.arena.id(name) else {
            return Vec::new();
        };
        self.names(self.highest_nodes(id, input_index, &mut HashSet::new()))
    }

    fn highest_nodes(
        &self,
        id: NodeId,
        input_index: Option<usize>,
        checked: &mut HashSet<NodeId>,
    ) -> Vec<NodeId> {
        let mut current = Vec::new();
        if self.arena.is_enabled(id) {
            current.push(id);
        }

        let Some(slots) = self.by_destination.ports(id, ConnectionType::Main) else {
            return current;
        };
        if !checked.insert(id) {
            return current;
        }

        let mut roots: Vec<NodeId> = Vec::new();
        for (port, slot) in slots.iter().enumerate() {
            if input_index.is_some_and(|wanted| wanted != port) {
                continue;
            }
            for edge in slot.iter().flatten() {
                if checked.contains(&edge.node) {
                    continue;
                }
                let mut found = self.highest_nodes(edge.node, None, checked);
                if found.is_empty() && self.arena.is_enabled(edge.node) {
                    found.push(edge.node);
                }
                for root in found {
                    if !roots.contains(&root) {
                        roots.push(root);
                    }
                }
            }
        }
        roots
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// Nodes reachable from `name` in `direction`, excluding `name`.
    pub fn get_connected_nodes(
        &self,
        direction: Direction,
        name: &str,
        selector: impl Into<ConnectionSelector>,
        depth: Depth,
    ) -> Vec<String> {
        let Some(id) = self.arena.id(name) else {
            return Vec::new();
        };
        let index = match direction {
            Direction::Downstream => &self.by_source,
            Direction::Upstream => &self.by_destination,
        };
        self.names(traversal::connected_nodes(index, id, selector.into(), depth))
    }

    /// Downstream nodes of `name`; use `ConnectionType::Main` for the usual case.
    pub fn get_child_nodes(
        &self,
        name: &str,
        selector: impl Into<ConnectionSelector>,
        depth: Depth,
    ) -> Vec<String> {
        self.get_connected_nodes(Direction::Downstream, name, selector, depth)
    }

    /// Upstream nodes of `name`; use `ConnectionType::Main` for the usual case.
    pub fn get_parent_nodes(
        &self,
        name: &str,
        selector: impl Into<ConnectionSelector>,
        depth: Depth,
    ) -> Vec<String> {
        self.get_connected_nodes(Direction::Upstream, name, selector, depth)
    }

    /// Ports of the first edge from `source` found searching upstream from
    /// `destination` on channel `kind`.
    pub fn get_node_connection_indexes(
        &self,
        destination: &str,
        source: &str,
        kind: ConnectionType,
    ) -> Option<ConnectionIndexes> {
        let source = self.arena.id(source).filter(|&id| self.arena.contains_node(id))?;
        let destination = self.arena.id(destination)?;
        traversal::node_connection_indexes(&self.by_destination, destination, source, kind)
    }

    /// Direct edges from any of `sources` into any of `targets`, as
    /// `(outgoing end, incoming end)` pairs.
    pub fn get_connections_between_nodes(
        &self,
        sources: &[&str],
        targets: &[&str],
    ) -> Vec<(Connection, Connection)> {
        let sources: Vec<NodeId> = sources.iter().filter_map(|n| self.arena.id(n)).collect();
        let targets: Vec<NodeId> = targets.iter().filter_map(|n| self.arena.id(n)).collect();
        traversal::connections_between(&self.by_source, &sources, &targets)
            .into_iter()
            .map(|(outgoing, incoming)| (self.connection(outgoing), self.connection(incoming)))
            .collect()
    }

    /// Upstream `main` parents with their minimum depth.
    pub fn get_parent_nodes_by_depth(&self, name: &str, max_depth: Depth) -> Vec<ConnectedNode> {
        let Some(id) = self.arena.id(name) else {
            return Vec::new();
        };
        traversal::search_nodes_bfs(&self.by_destination, id, max_depth)
            .into_iter()
            .map(|found| ConnectedNode {
                name: self.arena.name(found.node).to_owned(),
                depth: found.depth,
                indices: found.indices,
            })
            .collect()
    }

    /// The `main`-flow node a sub-node ultimately feeds.
    ///
    /// Follows the first outgoing non-`main` connection hop by hop until it
    /// reaches a node without one. Returns `None` if `name` or a node along
    /// the way does not exist.
    pub fn get_parent_main_input_node(&self, name: &str) -> Option<&Node> {
        let mut id = self.arena.id(name).filter(|&id| self.arena.contains_node(id))?;
        let mut visited = HashSet::from([id]);

        loop {
            let next = self.by_source.get(id).and_then(|table| {
                table
                    .keys()
                    .filter(|kind| !kind.is_main())
                    .find_map(|&kind| {
                        traversal::connected_nodes(&self.by_source, id, kind.into(), Depth::Hops(1))
                            .into_iter()
                            .next()
                    })
            });
            let Some(parent) = next else { break };
            if !visited.insert(parent) {
                break;
            }
            id = parent;
        }
        self.arena.get(id)
    }

    // -----------------------------------------------------------------------
    // Static data
    // -----------------------------------------------------------------------

    /// The static data bucket for `scope` (and `node`, for node scope).
    ///
    /// The bucket is created on first access. If the test override store has
    /// a bucket at the same address, that one is returned and the real store
    /// is left untouched.
    ///
    /// # Errors
    /// [`WorkflowError::MissingStaticDataNode`] for node scope without `node`.
    pub fn get_static_data(
        &mut self,
        scope: StaticDataScope,
        node: Option<&str>,
    ) -> Result<&mut StaticBucket, WorkflowError> {
        let key = match scope {
            StaticDataScope::Global => StaticDataKey::Global,
            StaticDataScope::Node => {
                let name = node.ok_or(WorkflowError::MissingStaticDataNode)?;
                StaticDataKey::Node(self.arena.intern(name))
            }
        };

        if let Some(bucket) = self
            .test_static_data
            .as_mut()
            .and_then(|overrides| overrides.get_mut(key))
        {
            return Ok(bucket);
        }
        Ok(self.static_data.bucket_mut(key))
    }

    /// The real store in its persisted form.
    pub fn static_data(&self) -> Map<String, Value> {
        self.static_data.to_value(&self.arena)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Release ids nothing refers to any more, after dropping empty static
    /// data buckets of names that are not nodes.
    fn release_unused_ids(&mut self) {
        let arena = &self.arena;
        let pruned = self.static_data.prune_empty(|id| arena.contains_node(id));

        let mut live: HashSet<NodeId> = self.by_source.referenced_ids().collect();
        live.extend(self.static_data.node_ids());
        if let Some(overrides) = &self.test_static_data {
            live.extend(overrides.node_ids());
        }
        let released = self.arena.release_unused(|id| live.contains(&id));

        if pruned + released > 0 {
            trace!(
                workflow_id = %self.id,
                pruned_buckets = pruned,
                released_ids = released,
                "unused node names released"
            );
        }
    }

    fn names(&self, ids: Vec<NodeId>) -> Vec<String> {
        ids.into_iter()
            .map(|id| self.arena.name(id).to_owned())
            .collect()
    }

    fn connection(&self, edge: Edge) -> Connection {
        Connection::new(self.arena.name(edge.node), edge.kind, edge.index)
    }
}
