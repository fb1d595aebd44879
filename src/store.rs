//! The Graph Store: nodes, edges, and the indices over them.
//!
//! Four indices (entity class, hierarchy-prefix trie, relation type,
//! adjacency) are maintained incrementally on every `add_node`/`add_edge`,
//! never rebuilt from scratch.
//!
//! The store itself carries no write policy: every mutating method here is
//! creation-only. Field updates are mediated exclusively by the
//! [`crate::updater::GraphUpdater`]. Callers own a `GraphStore` and pass
//! `&self` through explicitly — there is no ambient global instance here.

use crate::error::StoreError;
use crate::ids::{EdgeId, NodeId};
use crate::model::{Edge, EntityClass, Node, RelationType};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct Indices {
    by_class: HashMap<EntityClass, HashSet<NodeId>>,
    /// hier_path prefix -> node ids whose hier_path starts with that prefix
    /// segment sequence (a simple prefix trie keyed by the joined prefix
    /// string).
    by_hier_prefix: HashMap<String, HashSet<NodeId>>,
    by_relation: HashMap<RelationType, HashSet<EdgeId>>,
    out_edges: HashMap<NodeId, Vec<EdgeId>>,
    in_edges: HashMap<NodeId, Vec<EdgeId>>,
}

/// Nodes, edges, and the indices over them. No mutation policy — creation
/// only; field writes go through [`crate::updater::GraphUpdater`].
pub struct GraphStore {
    nodes: RwLock<HashMap<NodeId, Node>>,
    edges: RwLock<HashMap<EdgeId, Edge>>,
    indices: RwLock<Indices>,
    /// Incremented on every successful `add_node`/`add_edge`, never on a
    /// field update. Lets a SuperGraph snapshot record the store generation
    /// it was built from, for cheap staleness checks.
    generation: RwLock<u64>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            edges: RwLock::new(HashMap::new()),
            indices: RwLock::new(Indices::default()),
            generation: RwLock::new(0),
        }
    }

    pub fn generation(&self) -> u64 {
        *self.generation.read()
    }

    /// Insert a node. Fails with `DuplicateId` if the id is already present,
    /// or `DanglingHierarchyParent` if `hier_path` has a prefix that is not
    /// itself a known node id (except for the root).
    pub fn add_node(&self, node: Node) -> Result<(), StoreError> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&node.id) {
            return Err(StoreError::DuplicateId(node.id.0.clone()));
        }

        for prefix in node.hier_prefixes() {
            if !nodes.values().any(|n| n.hier_path == prefix) {
                return Err(StoreError::DanglingHierarchyParent {
                    child: node.id.0.clone(),
                    missing_parent: prefix,
                });
            }
        }

        let mut indices = self.indices.write();
        indices.by_class.entry(node.entity_class).or_default().insert(node.id.clone());
        for prefix in node.hier_prefixes() {
            indices.by_hier_prefix.entry(prefix).or_default().insert(node.id.clone());
        }
        indices.by_hier_prefix.entry(node.hier_path.clone()).or_default().insert(node.id.clone());

        nodes.insert(node.id.clone(), node);
        drop(indices);
        drop(nodes);
        *self.generation.write() += 1;
        Ok(())
    }

    /// Insert an edge. Fails with `DuplicateId` on a colliding id, or
    /// `DanglingEndpoint` if either endpoint is absent.
    pub fn add_edge(&self, edge: Edge) -> Result<(), StoreError> {
        let nodes = self.nodes.read();
        if !nodes.contains_key(&edge.source) {
            return Err(StoreError::DanglingEndpoint(edge.source.0.clone()));
        }
        if !nodes.contains_key(&edge.target) {
            return Err(StoreError::DanglingEndpoint(edge.target.0.clone()));
        }
        drop(nodes);

        let mut edges = self.edges.write();
        if edges.contains_key(&edge.id) {
            return Err(StoreError::DuplicateId(edge.id.0.clone()));
        }

        let mut indices = self.indices.write();
        indices.by_relation.entry(edge.relation_type).or_default().insert(edge.id.clone());
        indices.out_edges.entry(edge.source.clone()).or_default().push(edge.id.clone());
        indices.in_edges.entry(edge.target.clone()).or_default().push(edge.id.clone());

        edges.insert(edge.id.clone(), edge);
        drop(indices);
        drop(edges);
        *self.generation.write() += 1;
        Ok(())
    }

    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        self.nodes.read().get(id).cloned()
    }

    pub fn get_edge(&self, id: &EdgeId) -> Option<Edge> {
        self.edges.read().get(id).cloned()
    }

    pub fn has_node(&self, id: &NodeId) -> bool {
        self.nodes.read().contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.read().len()
    }

    pub fn all_nodes(&self) -> Vec<Node> {
        self.nodes.read().values().cloned().collect()
    }

    pub fn all_edges(&self) -> Vec<Edge> {
        self.edges.read().values().cloned().collect()
    }

    pub fn nodes_by_class(&self, class: EntityClass) -> Vec<Node> {
        let nodes = self.nodes.read();
        self.indices
            .read()
            .by_class
            .get(&class)
            .map(|ids| ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn nodes_by_hier_prefix(&self, prefix: &str) -> Vec<Node> {
        let nodes = self.nodes.read();
        self.indices
            .read()
            .by_hier_prefix
            .get(prefix)
            .map(|ids| ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn edges_by_relation(&self, relation: RelationType) -> Vec<Edge> {
        let edges = self.edges.read();
        self.indices
            .read()
            .by_relation
            .get(&relation)
            .map(|ids| ids.iter().filter_map(|id| edges.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn out_edges(&self, id: &NodeId) -> Vec<Edge> {
        let edges = self.edges.read();
        self.indices
            .read()
            .out_edges
            .get(id)
            .map(|ids| ids.iter().filter_map(|e| edges.get(e).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn in_edges(&self, id: &NodeId) -> Vec<Edge> {
        let edges = self.edges.read();
        self.indices
            .read()
            .in_edges
            .get(id)
            .map(|ids| ids.iter().filter_map(|e| edges.get(e).cloned()).collect())
            .unwrap_or_default()
    }

    /// Replace a node's fields wholesale. Used only by
    /// [`crate::updater::GraphUpdater`] — the store does not itself decide
    /// whether a write should be accepted.
    pub(crate) fn replace_node(&self, node: Node) {
        let mut nodes = self.nodes.write();
        nodes.insert(node.id.clone(), node);
    }

    pub(crate) fn replace_edge(&self, edge: Edge) {
        let mut edges = self.edges.write();
        edges.insert(edge.id.clone(), edge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FlowType;

    fn mk_node(id: &str, hier_path: &str, class: EntityClass) -> Node {
        Node::new(NodeId::new(id), hier_path, id, class)
    }

    #[test]
    fn add_node_rejects_duplicate_id() {
        let store = GraphStore::new();
        store.add_node(mk_node("top", "top", EntityClass::ModuleInstance)).unwrap();
        let err = store.add_node(mk_node("top", "top", EntityClass::ModuleInstance)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(_)));
    }

    #[test]
    fn add_node_rejects_dangling_hierarchy_parent() {
        let store = GraphStore::new();
        let err = store
            .add_node(mk_node("top/cpu", "top/cpu", EntityClass::ModuleInstance))
            .unwrap_err();
        assert!(matches!(err, StoreError::DanglingHierarchyParent { .. }));
    }

    #[test]
    fn add_edge_rejects_dangling_endpoint() {
        let store = GraphStore::new();
        store.add_node(mk_node("ff1", "top/ff1", EntityClass::FlipFlop)).unwrap();
        let edge = Edge::new(
            EdgeId::new("e1"),
            NodeId::new("ff1"),
            NodeId::new("missing"),
            RelationType::Data,
            FlowType::Combinational,
            "d",
            "top/d",
        );
        let err = store.add_edge(edge).unwrap_err();
        assert!(matches!(err, StoreError::DanglingEndpoint(_)));
    }

    #[test]
    fn indices_stay_coherent_across_inserts() {
        let store = GraphStore::new();
        store.add_node(mk_node("top", "top", EntityClass::ModuleInstance)).unwrap();
        store.add_node(mk_node("top/ff1", "top/ff1", EntityClass::FlipFlop)).unwrap();
        store.add_node(mk_node("top/ff2", "top/ff2", EntityClass::FlipFlop)).unwrap();

        let edge = Edge::new(
            EdgeId::new("e1"),
            NodeId::new("top/ff1"),
            NodeId::new("top/ff2"),
            RelationType::Data,
            FlowType::Combinational,
            "d",
            "top/d",
        );
        store.add_edge(edge).unwrap();

        assert_eq!(store.nodes_by_class(EntityClass::FlipFlop).len(), 2);
        assert_eq!(store.nodes_by_hier_prefix("top").len(), 2);
        assert_eq!(store.out_edges(&NodeId::new("top/ff1")).len(), 1);
        assert_eq!(store.in_edges(&NodeId::new("top/ff2")).len(), 1);
        assert_eq!(store.edges_by_relation(RelationType::Data).len(), 1);
        assert_eq!(store.generation(), 4);
    }
}
