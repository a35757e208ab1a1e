//! Reachability queries over a [`ConnectionIndex`].
//!
//! Walking the source index moves downstream (children); walking the
//! destination index moves upstream (parents). Every walk keeps one visited
//! set for the whole call, so cycles terminate and a node reachable along
//! several paths is reported and expanded once.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::arena::NodeId;
use crate::index::{ConnectionIndex, Edge};
use crate::models::ConnectionType;

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// Which channels a walk follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionSelector {
    Only(ConnectionType),
    All,
    AllNonMain,
}

impl ConnectionSelector {
    pub fn matches(self, kind: ConnectionType) -> bool {
        match self {
            Self::Only(wanted) => wanted == kind,
            Self::All => true,
            Self::AllNonMain => !kind.is_main(),
        }
    }
}

impl Default for ConnectionSelector {
    fn default() -> Self {
        Self::Only(ConnectionType::Main)
    }
}

impl From<ConnectionType> for ConnectionSelector {
    fn from(kind: ConnectionType) -> Self {
        Self::Only(kind)
    }
}

/// How many hops a walk may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Depth {
    #[default]
    Unlimited,
    /// At most this many hops; `Hops(0)` yields nothing.
    Hops(usize),
}

impl Depth {
    pub fn is_exhausted(self) -> bool {
        self == Self::Hops(0)
    }

    /// The budget left after one hop.
    pub fn step(self) -> Self {
        match self {
            Self::Unlimited => Self::Unlimited,
            Self::Hops(n) => Self::Hops(n.saturating_sub(1)),
        }
    }

    fn allows(self, depth: usize) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Hops(max) => depth <= max,
        }
    }
}

impl From<usize> for Depth {
    fn from(hops: usize) -> Self {
        Self::Hops(hops)
    }
}

// ---------------------------------------------------------------------------
// Depth-first reachability
// ---------------------------------------------------------------------------

/// Nodes reachable from `start`, in depth-first discovery order, excluding
/// `start` itself.
pub fn connected_nodes(
    index: &ConnectionIndex,
    start: NodeId,
    selector: ConnectionSelector,
    depth: Depth,
) -> Vec<NodeId> {
    let mut visited = HashSet::new();
    connected_nodes_excluding(index, start, selector, depth, &mut visited)
}

/// Like [`connected_nodes`], threading a caller-owned visited set.
///
/// Nodes already in `visited` are neither reported nor expanded; everything
/// reached is added to it.
pub fn connected_nodes_excluding(
    index: &ConnectionIndex,
    start: NodeId,
    selector: ConnectionSelector,
    depth: Depth,
    visited: &mut HashSet<NodeId>,
) -> Vec<NodeId> {
    let mut found = Vec::new();
    if depth.is_exhausted() || !visited.insert(start) {
        return found;
    }

    // Explicit stack of (pending neighbours, budget at that level) so long
    // chains cannot exhaust the call stack. Order matches recursive preorder.
    let mut stack = vec![(neighbours(index, start, selector), depth)];
    while let Some((pending, budget)) = stack.last_mut() {
        let Some(next) = pending.next() else {
            stack.pop();
            continue;
        };
        let below = budget.step();
        if !visited.insert(next) {
            continue;
        }
        found.push(next);
        if !below.is_exhausted() {
            stack.push((neighbours(index, next, selector), below));
        }
    }
    found
}

fn neighbours(
    index: &ConnectionIndex,
    node: NodeId,
    selector: ConnectionSelector,
) -> std::vec::IntoIter<NodeId> {
    let Some(table) = index.get(node) else {
        return Vec::new().into_iter();
    };
    table
        .iter()
        .filter(|(kind, _)| selector.matches(**kind))
        .flat_map(|(_, slots)| slots.iter().flatten().flatten())
        .map(|edge| edge.node)
        .collect::<Vec<_>>()
        .into_iter()
}

// ---------------------------------------------------------------------------
// Port lookup
// ---------------------------------------------------------------------------

/// Port pair of the first edge found from a given source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionIndexes {
    /// Output port on the source node.
    pub source_index: usize,
    /// Input port on the node the edge enters.
    pub destination_index: usize,
}

/// Breadth-first search upstream from `start` over the destination index
/// for an edge on channel `kind` whose source is `target`.
///
/// Returns the first match in BFS order, which is not necessarily on the
/// shortest path when several edges tie.
pub fn node_connection_indexes(
    by_destination: &ConnectionIndex,
    start: NodeId,
    target: NodeId,
    kind: ConnectionType,
) -> Option<ConnectionIndexes> {
    let mut queue = VecDeque::from([start]);
    let mut visited = HashSet::from([start]);

    while let Some(current) = queue.pop_front() {
        let Some(slots) = by_destination.ports(current, kind) else {
            continue;
        };
        for (input_index, slot) in slots.iter().enumerate() {
            for edge in slot.iter().flatten() {
                if edge.node == target {
                    return Some(ConnectionIndexes {
                        source_index: edge.index,
                        destination_index: input_index,
                    });
                }
                if visited.insert(edge.node) {
                    queue.push_back(edge.node);
                }
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Direct edges
// ---------------------------------------------------------------------------

/// Direct edges from any of `sources` into any of `targets`, one hop only.
///
/// Each pair describes the same edge from both ends: `(source, channel,
/// output port)` and `(target, channel, input port)`.
pub fn connections_between(
    by_source: &ConnectionIndex,
    sources: &[NodeId],
    targets: &[NodeId],
) -> Vec<(Edge, Edge)> {
    let targets: HashSet<NodeId> = targets.iter().copied().collect();
    let mut pairs = Vec::new();

    for &source in sources {
        let Some(table) = by_source.get(source) else {
            continue;
        };
        for (kind, slots) in table {
            for (output_index, slot) in slots.iter().enumerate() {
                for edge in slot.iter().flatten() {
                    if targets.contains(&edge.node) {
                        let outgoing = Edge {
                            node: source,
                            kind: *kind,
                            index: output_index,
                        };
                        pairs.push((outgoing, *edge));
                    }
                }
            }
        }
    }
    pairs
}

// ---------------------------------------------------------------------------
// Breadth-first with depth
// ---------------------------------------------------------------------------

/// A node found by [`search_nodes_bfs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub node: NodeId,
    /// Hops from the start at first discovery.
    pub depth: usize,
    /// Every port index recorded on the edges that reached the node.
    pub indices: Vec<usize>,
}

/// Level-by-level walk over the `main` channel of `index`.
///
/// Each node is reported once, at its minimum depth; reaching it again via
/// another path merges that path's port index into the existing record.
/// `start` is never reported.
pub fn search_nodes_bfs(index: &ConnectionIndex, start: NodeId, max_depth: Depth) -> Vec<Discovered> {
    let mut found: Vec<Discovered> = Vec::new();
    // Position in `found` for every visited node; `None` for the start.
    let mut seen: HashMap<NodeId, Option<usize>> = HashMap::new();
    let mut level = vec![Discovered {
        node: start,
        depth: 0,
        indices: Vec::new(),
    }];
    let mut depth = 0;

    while !level.is_empty() && max_depth.allows(depth) {
        depth += 1;
        let mut next_level = Vec::new();

        for current in level {
            if let Some(position) = seen.get(&current.node) {
                if let Some(record) = position.map(|p| &mut found[p]) {
                    for i in current.indices {
                        if !record.indices.contains(&i) {
                            record.indices.push(i);
                        }
                    }
                }
                continue;
            }

            let node = current.node;
            if node == start {
                seen.insert(node, None);
            } else {
                seen.insert(node, Some(found.len()));
                found.push(current);
            }

            let Some(slots) = index.ports(node, ConnectionType::Main) else {
                continue;
            };
            for edge in slots.iter().flatten().flatten() {
                next_level.push(Discovered {
                    node: edge.node,
                    depth,
                    indices: vec![edge.index],
                });
            }
        }
        level = next_level;
    }
    found
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::NodeArena;
    use crate::models::Connections;
    use serde_json::json;

    fn index(value: serde_json::Value) -> (ConnectionIndex, NodeArena) {
        let connections: Connections = serde_json::from_value(value).expect("valid table");
        let mut arena = NodeArena::default();
        let by_source = ConnectionIndex::from_connections(&connections, &mut arena);
        (by_source, arena)
    }

    fn names(arena: &NodeArena, ids: Vec<NodeId>) -> Vec<&str> {
        ids.into_iter().map(|id| arena.name(id)).collect()
    }

    fn main_edge(to: &str) -> serde_json::Value {
        json!([[{ "node": to, "type": "main", "index": 0 }]])
    }

    fn chain() -> (ConnectionIndex, NodeArena) {
        // A → B → C → D
        index(json!({
            "A": { "main": main_edge("B") },
            "B": { "main": main_edge("C") },
            "C": { "main": main_edge("D") },
        }))
    }

    #[test]
    fn cycle_terminates_without_duplicates() {
        // A → B → C → A
        let (by_source, arena) = index(json!({
            "A": { "main": main_edge("B") },
            "B": { "main": main_edge("C") },
            "C": { "main": main_edge("A") },
        }));
        let a = arena.id("A").unwrap();

        let reached = connected_nodes(&by_source, a, ConnectionSelector::default(), Depth::Unlimited);
        assert_eq!(names(&arena, reached), vec!["B", "C"]);
    }

    #[test]
    fn depth_bounds_the_walk() {
        let (by_source, arena) = chain();
        let a = arena.id("A").unwrap();
        let walk = |depth| names(&arena, connected_nodes(&by_source, a, ConnectionType::Main.into(), depth));

        assert_eq!(walk(Depth::Hops(0)), Vec::<&str>::new());
        assert_eq!(walk(Depth::Hops(1)), vec!["B"]);
        assert_eq!(walk(Depth::Hops(2)), vec!["B", "C"]);
        assert_eq!(walk(Depth::Unlimited), vec!["B", "C", "D"]);
    }

    #[test]
    fn parents_walk_the_destination_index() {
        let (by_source, arena) = chain();
        let by_destination = by_source.invert();
        let d = arena.id("D").unwrap();

        let parents = connected_nodes(&by_destination, d, ConnectionSelector::default(), Depth::Unlimited);
        assert_eq!(names(&arena, parents), vec!["C", "B", "A"]);
    }

    #[test]
    fn shared_subtree_is_reported_once() {
        //   A
        //  / \
        // B   C
        //  \ /
        //   D → E
        let (by_source, arena) = index(json!({
            "A": { "main": [[
                { "node": "B", "type": "main", "index": 0 },
                { "node": "C", "type": "main", "index": 0 },
            ]] },
            "B": { "main": main_edge("D") },
            "C": { "main": main_edge("D") },
            "D": { "main": main_edge("E") },
        }));
        let a = arena.id("A").unwrap();

        let reached = connected_nodes(&by_source, a, ConnectionSelector::All, Depth::Unlimited);
        assert_eq!(names(&arena, reached), vec!["B", "D", "E", "C"]);
    }

    #[test]
    fn selector_filters_channels() {
        let (by_source, arena) = index(json!({
            "Model": { "ai_languageModel": [[{ "node": "Agent", "type": "ai_languageModel", "index": 0 }]] },
            "Memory": { "ai_memory": [[{ "node": "Agent", "type": "ai_memory", "index": 0 }]] },
            "Trigger": { "main": main_edge("Agent") },
        }));
        let by_destination = by_source.invert();
        let agent = arena.id("Agent").unwrap();
        let parents = |selector| names(&arena, connected_nodes(&by_destination, agent, selector, Depth::Unlimited));

        assert_eq!(parents(ConnectionSelector::default()), vec!["Trigger"]);
        assert_eq!(parents(ConnectionSelector::AllNonMain), vec!["Model", "Memory"]);
        assert_eq!(parents(ConnectionSelector::All), vec!["Trigger", "Model", "Memory"]);
        assert_eq!(parents(ConnectionType::AiMemory.into()), vec!["Memory"]);
    }

    #[test]
    fn caller_visited_set_is_respected() {
        let (by_source, arena) = chain();
        let a = arena.id("A").unwrap();
        let c = arena.id("C").unwrap();

        let mut visited = HashSet::from([c]);
        let reached = connected_nodes_excluding(&by_source, a, ConnectionSelector::default(), Depth::Unlimited, &mut visited);
        assert_eq!(names(&arena, reached), vec!["B"]);
        assert!(visited.contains(&a));
    }

    #[test]
    fn bfs_finds_upstream_edge_ports() {
        // A ─(out 1)→ B ─(out 0)→ C(in 2)
        let (by_source, arena) = index(json!({
            "A": { "main": [[], [{ "node": "B", "type": "main", "index": 0 }]] },
            "B": { "main": [[{ "node": "C", "type": "main", "index": 2 }]] },
        }));
        let by_destination = by_source.invert();
        let id = |name| arena.id(name).unwrap();

        assert_eq!(
            node_connection_indexes(&by_destination, id("C"), id("B"), ConnectionType::Main),
            Some(ConnectionIndexes { source_index: 0, destination_index: 2 })
        );
        // Not direct: found on B's input while searching upstream from C.
        assert_eq!(
            node_connection_indexes(&by_destination, id("C"), id("A"), ConnectionType::Main),
            Some(ConnectionIndexes { source_index: 1, destination_index: 0 })
        );
        assert_eq!(node_connection_indexes(&by_destination, id("A"), id("C"), ConnectionType::Main), None);
        assert_eq!(node_connection_indexes(&by_destination, id("C"), id("B"), ConnectionType::AiTool), None);
    }

    #[test]
    fn connections_between_is_one_hop() {
        let (by_source, arena) = chain();
        let id = |name| arena.id(name).unwrap();

        assert!(connections_between(&by_source, &[id("A")], &[id("C")]).is_empty());

        let pairs = connections_between(&by_source, &[id("A"), id("B")], &[id("C")]);
        assert_eq!(pairs.len(), 1);
        let (outgoing, incoming) = pairs[0];
        assert_eq!(outgoing, Edge { node: id("B"), kind: ConnectionType::Main, index: 0 });
        assert_eq!(incoming, Edge { node: id("C"), kind: ConnectionType::Main, index: 0 });
    }

    #[test]
    fn bfs_records_min_depth_and_merges_indices() {
        // A(out 0) → C, B(out 1) → C, A(out 1) → D → C
        let (by_source, arena) = index(json!({
            "A": { "main": [
                [{ "node": "C", "type": "main", "index": 0 }],
                [{ "node": "D", "type": "main", "index": 0 }],
            ] },
            "B": { "main": [[], [{ "node": "C", "type": "main", "index": 0 }]] },
            "D": { "main": [[{ "node": "C", "type": "main", "index": 1 }]] },
        }));
        let by_destination = by_source.invert();
        let c = arena.id("C").unwrap();

        let found = search_nodes_bfs(&by_destination, c, Depth::Unlimited);
        let summary: Vec<(&str, usize, Vec<usize>)> = found
            .iter()
            .map(|d| (arena.name(d.node), d.depth, d.indices.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![("A", 1, vec![0, 1]), ("B", 1, vec![1]), ("D", 1, vec![0])]
        );
    }

    #[test]
    fn bfs_respects_max_depth() {
        let (by_source, arena) = chain();
        let by_destination = by_source.invert();
        let d = arena.id("D").unwrap();
        let depth_of = |max| {
            search_nodes_bfs(&by_destination, d, max)
                .into_iter()
                .map(|found| (arena.name(found.node), found.depth))
                .collect::<Vec<_>>()
        };

        assert!(depth_of(Depth::Hops(0)).is_empty());
        assert_eq!(depth_of(Depth::Hops(1)), vec![("C", 1)]);
        assert_eq!(depth_of(Depth::Unlimited), vec![("C", 1), ("B", 2), ("A", 3)]);
    }
}
