//! Node arena: stable integer identities for node names.
//!
//! Every name the workflow sees (as a node, as an endpoint in a connection
//! table, or as the owner of static data) is interned and keeps its
//! [`NodeId`] for as long as something refers to it. Connection indices and
//! static data refer to nodes only by id, so renaming a node touches the
//! name table and nothing else. Ids nothing refers to any more are released
//! with [`NodeArena::release_unused`] and reused for new names.

use std::collections::{HashMap, HashSet};

use crate::models::Node;

/// Stable handle for a node name inside one workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    /// Current name for each id.
    names: Vec<String>,
    /// Reverse lookup; only current names are present.
    lookup: HashMap<String, NodeId>,
    /// The node definition for each id, if one exists.
    slots: Vec<Option<Node>>,
    /// Ids of defined nodes in insertion order.
    order: Vec<NodeId>,
    /// Released ids, handed out again by [`NodeArena::intern`].
    free: Vec<NodeId>,
}

impl NodeArena {
    /// Return the id for `name`, allocating one on first sight.
    pub fn intern(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.lookup.get(name) {
            return id;
        }
        let id = match self.free.pop() {
            Some(id) => {
                self.names[id.0] = name.to_owned();
                id
            }
            None => {
                self.names.push(name.to_owned());
                self.slots.push(None);
                NodeId(self.names.len() - 1)
            }
        };
        self.lookup.insert(name.to_owned(), id);
        id
    }

    /// Release every interned id that is not a defined node and for which
    /// `in_use` is false. Released ids may be reissued for other names.
    ///
    /// Returns how many ids were released.
    pub fn release_unused(&mut self, in_use: impl Fn(NodeId) -> bool) -> usize {
        let free: HashSet<NodeId> = self.free.iter().copied().collect();
        let released: Vec<NodeId> = (0..self.names.len())
            .map(NodeId)
            .filter(|&id| self.slots[id.0].is_none() && !free.contains(&id) && !in_use(id))
            .collect();
        for &id in &released {
            let name = std::mem::take(&mut self.names[id.0]);
            if self.lookup.get(&name) == Some(&id) {
                self.lookup.remove(&name);
            }
        }
        self.free.extend_from_slice(&released);
        released.len()
    }

    /// Number of ids currently handed out, defined nodes or not.
    pub fn interned_len(&self) -> usize {
        self.names.len() - self.free.len()
    }

    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.lookup.get(name).copied()
    }

    /// Current name of `id`.
    ///
    /// Ids are only minted by [`NodeArena::intern`], so every id handed out
    /// by this arena indexes a live entry.
    pub fn name(&self, id: NodeId) -> &str {
        &self.names[id.0]
    }

    /// Replace every node definition. Later duplicates overwrite earlier ones
    /// but keep the position of the first occurrence.
    pub fn replace_nodes(&mut self, nodes: Vec<Node>) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.order.clear();

        for node in nodes {
            let id = self.intern(&node.name);
            let slot = &mut self.slots[id.0];
            if slot.is_none() {
                self.order.push(id);
            }
            *slot = Some(node);
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.id(name).and_then(|id| self.get(id))
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Defined and not disabled.
    pub fn is_enabled(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|node| !node.disabled)
    }

    /// Ids of defined nodes in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order.iter().copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.order.iter().filter_map(|&id| self.get(id))
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> + '_ {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Point `id` at `new_name`, updating the node's own `name` field.
    ///
    /// If `new_name` was previously interned for another id, that id is left
    /// nameless in the lookup; callers must ensure nothing still refers to it.
    pub fn rename(&mut self, id: NodeId, new_name: &str) {
        let old_name = std::mem::replace(&mut self.names[id.0], new_name.to_owned());
        if self.lookup.get(&old_name) == Some(&id) {
            self.lookup.remove(&old_name);
        }
        self.lookup.insert(new_name.to_owned(), id);
        if let Some(node) = self.slots[id.0].as_mut() {
            node.name = new_name.to_owned();
        }
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut arena = NodeArena::default();
        let a = arena.intern("a");
        let b = arena.intern("b");
        assert_ne!(a, b);
        assert_eq!(arena.intern("a"), a);
        assert_eq!(arena.name(b), "b");
    }

    #[test]
    fn duplicate_names_last_write_wins_first_position_kept() {
        let mut arena = NodeArena::default();
        arena.replace_nodes(vec![
            Node::new("x", "first"),
            Node::new("y", "other"),
            Node::new("x", "second"),
        ]);

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.node("x").unwrap().node_type, "second");
        let names: Vec<&str> = arena.nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn replacing_nodes_keeps_ids() {
        let mut arena = NodeArena::default();
        arena.replace_nodes(vec![Node::new("a", "t")]);
        let a = arena.id("a").unwrap();

        arena.replace_nodes(vec![Node::new("b", "t")]);
        assert!(arena.node("a").is_none());
        assert!(!arena.contains_node(a));

        arena.replace_nodes(vec![Node::new("a", "t")]);
        assert_eq!(arena.id("a"), Some(a));
    }

    #[test]
    fn rename_moves_lookup_and_node_name() {
        let mut arena = NodeArena::default();
        arena.replace_nodes(vec![Node::new("old", "t")]);
        let id = arena.id("old").unwrap();

        arena.rename(id, "new");
        assert_eq!(arena.id("old"), None);
        assert_eq!(arena.id("new"), Some(id));
        assert_eq!(arena.get(id).unwrap().name, "new");
    }

    #[test]
    fn released_ids_are_reused() {
        let mut arena = NodeArena::default();
        arena.replace_nodes(vec![Node::new("node", "t")]);
        let node = arena.id("node").unwrap();
        let kept = arena.intern("kept");
        let gone = arena.intern("gone");

        // Defined nodes are never released, whatever the predicate says.
        assert_eq!(arena.release_unused(|id| id == kept), 1);
        assert_eq!(arena.id("gone"), None);
        assert_eq!(arena.id("node"), Some(node));
        assert_eq!(arena.interned_len(), 2);

        assert_eq!(arena.intern("fresh"), gone);
        assert_eq!(arena.name(gone), "fresh");
        assert_eq!(arena.interned_len(), 3);
    }
}
