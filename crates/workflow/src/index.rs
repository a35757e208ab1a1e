//! Connection indices and the destination-index builder.
//!
//! A [`ConnectionIndex`] has the same shape whichever end it is keyed by:
//! `node -> channel -> port slots -> edges`. The source index is the
//! canonical one; the destination index is always produced from it by
//! [`ConnectionIndex::invert`] and by nothing else.

use std::collections::BTreeMap;

use tracing::warn;

use crate::arena::{NodeArena, NodeId};
use crate::models::{Connection, ConnectionType, Connections, NodeConnections};

/// One end of an edge, as stored in an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    /// The node at the far end.
    pub node: NodeId,
    pub kind: ConnectionType,
    /// Port index on the far-end node.
    pub index: usize,
}

/// Port slots for one channel; `None` is an absent slot.
pub type PortSlots = Vec<Option<Vec<Edge>>>;

/// All channels of one node.
pub type PortTable = BTreeMap<ConnectionType, PortSlots>;

/// Highest port index accepted on a connection. Edges addressing a port
/// beyond it are dropped when the table is loaded.
pub const MAX_PORT_INDEX: usize = 1024;

/// Connection table keyed by [`NodeId`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionIndex {
    entries: Vec<Option<PortTable>>,
}

impl ConnectionIndex {
    /// Intern every name in `connections` and key the table by id.
    ///
    /// Slots are copied verbatim, including absent ones. Edges whose port
    /// index exceeds [`MAX_PORT_INDEX`] are skipped with a warning.
    pub fn from_connections(connections: &Connections, arena: &mut NodeArena) -> Self {
        let mut index = Self::default();
        for (source, channels) in connections {
            let source_id = arena.intern(source);
            let mut table = PortTable::new();
            for (kind, slots) in channels {
                let mut converted: PortSlots = Vec::with_capacity(slots.len());
                for slot in slots {
                    let Some(connections) = slot else {
                        converted.push(None);
                        continue;
                    };
                    let mut edges = Vec::with_capacity(connections.len());
                    for c in connections {
                        if c.index > MAX_PORT_INDEX {
                            warn!(
                                source = %source,
                                target = %c.node,
                                index = c.index,
                                "skipping connection with out-of-range port index"
                            );
                            continue;
                        }
                        edges.push(Edge {
                            node: arena.intern(&c.node),
                            kind: c.kind,
                            index: c.index,
                        });
                    }
                    converted.push(Some(edges));
                }
                table.insert(*kind, converted);
            }
            *index.entry_mut(source_id) = table;
        }
        index
    }

    /// Materialise the name-keyed table.
    pub fn to_connections(&self, arena: &NodeArena) -> Connections {
        self.iter()
            .map(|(id, table)| {
                let channels: NodeConnections = table
                    .iter()
                    .map(|(kind, slots)| {
                        let slots = slots
                            .iter()
                            .map(|slot| {
                                slot.as_ref().map(|edges| {
                                    edges
                                        .iter()
                                        .map(|e| Connection::new(arena.name(e.node), e.kind, e.index))
                                        .collect()
                                })
                            })
                            .collect();
                        (*kind, slots)
                    })
                    .collect();
                (arena.name(id).to_owned(), channels)
            })
            .collect()
    }

    /// Build the destination-keyed mirror of this (source-keyed) index.
    ///
    /// For every edge `(source, channel, output port) -> (target, input
    /// port)`, the result holds `target -> edge.kind -> input port ->
    /// {source, channel, output port}`. Port arrays grow as needed and gaps
    /// become empty slots. Absent source slots produce nothing. Port indices
    /// were bounded by [`MAX_PORT_INDEX`] on load.
    pub fn invert(&self) -> ConnectionIndex {
        let mut inverted = ConnectionIndex::default();
        for (source, table) in self.iter() {
            for (kind, slots) in table {
                for (output_index, slot) in slots.iter().enumerate() {
                    let Some(edges) = slot else { continue };
                    for edge in edges {
                        let ports = inverted.entry_mut(edge.node).entry(edge.kind).or_default();
                        if ports.len() <= edge.index {
                            ports.resize_with(edge.index + 1, || Some(Vec::new()));
                        }
                        ports[edge.index].get_or_insert_with(Vec::new).push(Edge {
                            node: source,
                            kind: *kind,
                            index: output_index,
                        });
                    }
                }
            }
        }
        inverted
    }

    pub fn get(&self, id: NodeId) -> Option<&PortTable> {
        self.entries.get(id.index()).and_then(Option::as_ref)
    }

    /// Port slots of one channel of one node.
    pub fn ports(&self, id: NodeId, kind: ConnectionType) -> Option<&PortSlots> {
        self.get(id).and_then(|table| table.get(&kind))
    }

    /// Whether `id` has an entry (possibly empty).
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &PortTable)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| entry.as_ref().map(|table| (NodeId(i), table)))
    }

    /// Whether `id` appears as a key or as the far end of any edge.
    pub fn references(&self, id: NodeId) -> bool {
        self.contains(id)
            || self
                .iter()
                .flat_map(|(_, table)| table.values())
                .flatten()
                .flatten()
                .flatten()
                .any(|edge| edge.node == id)
    }

    /// Every id used as a key or as the far end of an edge.
    pub fn referenced_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.iter().flat_map(|(id, table)| {
            std::iter::once(id).chain(
                table
                    .values()
                    .flatten()
                    .flatten()
                    .flatten()
                    .map(|edge| edge.node),
            )
        })
    }

    pub fn edge_count(&self) -> usize {
        self.iter()
            .flat_map(|(_, table)| table.values())
            .flatten()
            .flatten()
            .map(Vec::len)
            .sum()
    }

    fn entry_mut(&mut self, id: NodeId) -> &mut PortTable {
        if self.entries.len() <= id.index() {
            self.entries.resize_with(id.index() + 1, || None);
        }
        self.entries[id.index()].get_or_insert_with(BTreeMap::new)
    }
}

/// Derive the destination-keyed table from a source-keyed one.
///
/// Pure: runs the same inversion the [`Workflow`](crate::Workflow) uses,
/// over a private arena.
pub fn map_connections_by_destination(connections: &Connections) -> Connections {
    let mut arena = NodeArena::default();
    let by_source = ConnectionIndex::from_connections(connections, &mut arena);
    by_source.invert().to_connections(&arena)
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(value: serde_json::Value) -> Connections {
        serde_json::from_value(value).expect("valid connection table")
    }

    #[test]
    fn every_edge_is_mirrored() {
        let by_source = table(json!({
            "A": { "main": [[
                { "node": "B", "type": "main", "index": 0 },
                { "node": "C", "type": "main", "index": 1 },
            ]] },
            "B": { "main": [[], [{ "node": "C", "type": "main", "index": 0 }]] },
        }));

        let by_destination = map_connections_by_destination(&by_source);

        for (source, channels) in &by_source {
            for (kind, slots) in channels {
                for (output, slot) in slots.iter().enumerate() {
                    for c in slot.iter().flatten() {
                        let mirrored = by_destination[&c.node][&c.kind][c.index]
                            .as_ref()
                            .expect("mirror slot exists");
                        assert!(mirrored.contains(&Connection::new(source.as_str(), *kind, output)));
                    }
                }
            }
        }
    }

    #[test]
    fn gaps_become_empty_slots() {
        let by_source = table(json!({
            "A": { "main": [[{ "node": "B", "type": "main", "index": 2 }]] },
        }));

        let by_destination = map_connections_by_destination(&by_source);
        let ports = &by_destination["B"][&ConnectionType::Main];
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[0], Some(vec![]));
        assert_eq!(ports[1], Some(vec![]));
        assert_eq!(ports[2], Some(vec![Connection::main("A")]));
    }

    #[test]
    fn absent_source_slots_are_skipped() {
        let by_source = table(json!({
            "A": { "main": [null, [], [{ "node": "B", "type": "main", "index": 0 }]] },
            "Lonely": { "main": [null] },
        }));

        let by_destination = map_connections_by_destination(&by_source);
        assert_eq!(by_destination.len(), 1);
        assert_eq!(
            by_destination["B"][&ConnectionType::Main],
            vec![Some(vec![Connection::new("A", ConnectionType::Main, 2)])]
        );
    }

    #[test]
    fn auxiliary_channels_keep_their_kind() {
        let by_source = table(json!({
            "Model": { "ai_languageModel": [[
                { "node": "Agent", "type": "ai_languageModel", "index": 0 },
            ]] },
        }));

        let by_destination = map_connections_by_destination(&by_source);
        let agent = &by_destination["Agent"];
        assert!(!agent.contains_key(&ConnectionType::Main));
        assert_eq!(
            agent[&ConnectionType::AiLanguageModel],
            vec![Some(vec![Connection::new("Model", ConnectionType::AiLanguageModel, 0)])]
        );
    }

    #[test]
    fn source_table_round_trips_verbatim() {
        let by_source = table(json!({
            "A": { "main": [null, [{ "node": "B", "type": "main", "index": 0 }]] },
        }));
        let mut arena = NodeArena::default();
        let index = ConnectionIndex::from_connections(&by_source, &mut arena);

        assert_eq!(index.to_connections(&arena), by_source);
        assert_eq!(index.edge_count(), 1);
    }

    #[test]
    fn inversion_is_idempotent() {
        let by_source = table(json!({
            "A": { "main": [[{ "node": "B", "type": "main", "index": 0 }]] },
            "C": { "main": [[{ "node": "B", "type": "main", "index": 0 }]] },
        }));
        let mut arena = NodeArena::default();
        let index = ConnectionIndex::from_connections(&by_source, &mut arena);
        assert_eq!(index.invert(), index.invert());
    }

    #[test]
    fn out_of_range_port_indices_are_skipped() {
        let by_source = table(json!({
            "A": { "main": [[
                { "node": "B", "type": "main", "index": 0 },
                { "node": "Huge", "type": "main", "index": usize::MAX },
                { "node": "Far", "type": "main", "index": 1_000_000_000usize },
                { "node": "C", "type": "main", "index": MAX_PORT_INDEX },
            ]] },
        }));
        let mut arena = NodeArena::default();
        let index = ConnectionIndex::from_connections(&by_source, &mut arena);

        assert_eq!(index.edge_count(), 2);
        assert!(arena.id("Huge").is_none());
        assert!(arena.id("Far").is_none());

        let by_destination = index.invert().to_connections(&arena);
        assert_eq!(by_destination["B"][&ConnectionType::Main][0], Some(vec![Connection::main("A")]));
        assert_eq!(by_destination["C"][&ConnectionType::Main].len(), MAX_PORT_INDEX + 1);
    }
}
