//! The View Builder: three node-policy cycles — classify, merge, eliminate
//! — followed by an edge rewrite pass that produces a [`SuperGraph`].
//!
//! A virtual, still-mutable intermediate result is built up against the
//! base structure, then committed into an immutable value with
//! content-derived ids: the three policy cycles are the "apply" half, and
//! the edge-rewrite pass is the "commit" half that freezes the result into
//! a [`SuperGraph`] whose ids are [`crate::ids::super_node_id`]/
//! [`crate::ids::super_edge_id`] hashes rather than an incrementing
//! counter, so two builds over the same graph and policy always agree
//! byte-for-byte.
//!
//! The merge cycle's partitioning strategy is itself a function of
//! `(context, view)` — [`crate::policy::merge_target`] — since the three
//! exemplar policy maps in spec §4.7 each group `Merge`-policy nodes by a
//! different key: nearest promoted hierarchy ancestor, wiring
//! connectivity, or a declared constraint-group attribute.

use crate::cancel::CancelToken;
use crate::error::ViewError;
use crate::ids::{super_edge_id, super_node_id, NodeId};
use crate::model::{Node, RelationType};
use crate::policy::{merge_target, resolve_policy, Context, NodePolicy, View};
use crate::store::GraphStore;
use crate::supergraph::{SuperClass, SuperEdge, SuperGraph, SuperNode};
use std::collections::{HashMap, HashSet};

/// Bounded depth for the eliminated-endpoint passthrough walk (spec §4.7
/// edge rewrite step 4): "default 8".
const PASSTHROUGH_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Walking an eliminated *source* endpoint: follow its predecessors
    /// (the edges that fed into it) looking for a surviving launch point.
    Backward,
    /// Walking an eliminated *target* endpoint: follow its successors
    /// looking for a surviving capture point.
    Forward,
}

/// Resolve `start` to the SuperNode-cluster root it belongs to. If `start`
/// was eliminated, follow same-relation-type predecessors/successors
/// (per `direction`) through the chain of eliminated nodes, up to
/// `max_depth` hops, looking for the nearest node that did survive into a
/// cluster. Multiple candidates at a hop are tried in sorted id order, so
/// the result is deterministic regardless of store iteration order.
fn resolve_through_eliminated(
    store: &GraphStore,
    node_root: &HashMap<NodeId, NodeId>,
    start: &NodeId,
    relation_type: RelationType,
    direction: Direction,
    max_depth: usize,
) -> Option<NodeId> {
    if let Some(root) = node_root.get(start) {
        return Some(root.clone());
    }
    if max_depth == 0 {
        return None;
    }

    let mut candidates: Vec<NodeId> = match direction {
        Direction::Backward => store
            .in_edges(start)
            .into_iter()
            .filter(|e| e.relation_type == relation_type)
            .map(|e| e.source)
            .collect(),
        Direction::Forward => store
            .out_edges(start)
            .into_iter()
            .filter(|e| e.relation_type == relation_type)
            .map(|e| e.target)
            .collect(),
    };
    candidates.sort();
    candidates.dedup();

    for candidate in candidates {
        if let Some(root) = resolve_through_eliminated(store, node_root, &candidate, relation_type, direction, max_depth - 1) {
            return Some(root);
        }
    }
    None
}

pub struct ViewBuilder;

impl Default for ViewBuilder {
    fn default() -> Self {
        Self
    }
}

impl ViewBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Run the three cycles and the edge rewrite, producing a `SuperGraph`
    /// named `view_name` tagged with the store generation it was built
    /// against.
    pub fn build(
        &self,
        store: &GraphStore,
        context: Context,
        view: View,
        view_name: &str,
        cancel: &CancelToken,
    ) -> Result<SuperGraph, ViewError> {
        let nodes = store.all_nodes();
        let by_hier_path: HashMap<&str, NodeId> =
            nodes.iter().map(|n| (n.hier_path.as_str(), n.id.clone())).collect();

        // Cycle 1: classify.
        let policies: HashMap<NodeId, NodePolicy> =
            nodes.iter().map(|n| (n.id.clone(), resolve_policy(context, view, n))).collect();

        if cancel.is_cancelled() {
            return Err(ViewError::Interrupted);
        }

        // Cycle 2: merge. Promoted nodes root themselves; Eliminated nodes
        // are dropped outright. Merge nodes are grouped by whichever
        // partitioning strategy this (context, view) uses — there is
        // exactly one per policy map, so the dispatch happens once up
        // front rather than per node.
        let mut node_root: HashMap<NodeId, NodeId> = HashMap::new();
        let mut merge_nodes: Vec<&Node> = Vec::new();
        for node in &nodes {
            match policies[&node.id] {
                NodePolicy::Eliminate => continue,
                NodePolicy::Promote => {
                    node_root.insert(node.id.clone(), node.id.clone());
                }
                NodePolicy::Merge => merge_nodes.push(node),
            }
        }

        match merge_target(context, view) {
            SuperClass::ModuleCluster => {
                self.group_by_hierarchy_ancestor(&merge_nodes, &by_hier_path, &policies, &mut node_root);
            }
            SuperClass::CombinationalCloud => {
                self.group_by_combinational_wiring(store, &merge_nodes, &mut node_root);
            }
            SuperClass::ConstraintGroup => {
                self.group_by_constraint_attribute(store, &merge_nodes, &mut node_root);
            }
            SuperClass::Atomic | SuperClass::Eliminated => unreachable!("not a merge target"),
        }

        if cancel.is_cancelled() {
            return Err(ViewError::Interrupted);
        }

        // Cycle 3: eliminate (nodes without an entry in `node_root` were
        // already dropped above). Group survivors by cluster root.
        let mut clusters: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in &nodes {
            if let Some(root) = node_root.get(&node.id) {
                clusters.entry(root.clone()).or_default().push(node.id.clone());
            }
        }

        let merge_class = merge_target(context, view);
        let mut graph = SuperGraph::new(view_name, store.generation());
        let mut super_id_by_root: HashMap<NodeId, [u8; 32]> = HashMap::new();

        for (root, mut members) in clusters {
            members.sort();
            let id = super_node_id(&members);
            let root_node = nodes.iter().find(|n| n.id == root).expect("cluster root must exist");
            let entity_classes: Vec<_> = {
                let mut set: Vec<_> = members
                    .iter()
                    .filter_map(|id| nodes.iter().find(|n| &n.id == id))
                    .map(|n| n.entity_class)
                    .collect();
                set.sort();
                set.dedup();
                set
            };

            let class = if members.len() == 1 { SuperClass::Atomic } else { merge_class };

            super_id_by_root.insert(root.clone(), id);
            graph.insert_node(SuperNode {
                id,
                class,
                members,
                label: root_node.hier_path.clone(),
                entity_classes,
            });
        }

        if cancel.is_cancelled() {
            return Err(ViewError::Interrupted);
        }

        // Edge rewrite: drop edges touching an eliminated node, drop edges
        // that became intra-cluster, merge the rest by `(source, target)`
        // super-id pair.
        struct Bucket {
            members: Vec<crate::ids::EdgeId>,
            relation_types: HashSet<crate::model::RelationType>,
            flow_types: HashSet<crate::model::FlowType>,
        }
        let mut buckets: HashMap<([u8; 32], [u8; 32]), Bucket> = HashMap::new();

        for edge in store.all_edges() {
            let source_root = match resolve_through_eliminated(
                store, &node_root, &edge.source, edge.relation_type, Direction::Backward, PASSTHROUGH_DEPTH,
            ) {
                Some(r) => r,
                None => continue,
            };
            let target_root = match resolve_through_eliminated(
                store, &node_root, &edge.target, edge.relation_type, Direction::Forward, PASSTHROUGH_DEPTH,
            ) {
                Some(r) => r,
                None => continue,
            };
            if source_root == target_root {
                continue;
            }
            let source_id = super_id_by_root[&source_root];
            let target_id = super_id_by_root[&target_root];

            let bucket = buckets.entry((source_id, target_id)).or_insert_with(|| Bucket {
                members: Vec::new(),
                relation_types: HashSet::new(),
                flow_types: HashSet::new(),
            });
            bucket.members.push(edge.id.clone());
            bucket.relation_types.insert(edge.relation_type);
            bucket.flow_types.insert(edge.flow_type);
        }

        for ((source_id, target_id), mut bucket) in buckets {
            bucket.members.sort();
            let id = super_edge_id(&source_id, &target_id, &bucket.members);
            let mut relation_types: Vec<_> = bucket.relation_types.into_iter().collect();
            relation_types.sort_by_key(|r| r.canonical_rank());
            let mut flow_types: Vec<_> = bucket.flow_types.into_iter().collect();
            flow_types.sort();

            graph.insert_edge(SuperEdge {
                id,
                source: source_id,
                target: target_id,
                members: bucket.members,
                relation_types,
                flow_types,
            });
        }

        Ok(graph)
    }

    /// ModuleCluster strategy: each Merge node walks its hierarchy
    /// ancestors outward until it finds a Promoted one (its cluster root)
    /// or an Eliminated one (elimination propagates down, taking the node
    /// with it — dropping a testbench wrapper must also drop everything it
    /// instantiates). A Merge node with no Promoted ancestor at all is its
    /// own root.
    fn group_by_hierarchy_ancestor(
        &self,
        merge_nodes: &[&Node],
        by_hier_path: &HashMap<&str, NodeId>,
        policies: &HashMap<NodeId, NodePolicy>,
        node_root: &mut HashMap<NodeId, NodeId>,
    ) {
        for node in merge_nodes {
            let mut root = node.id.clone();
            let mut eliminated = false;
            for prefix in node.hier_prefixes().into_iter().rev() {
                if let Some(ancestor_id) = by_hier_path.get(prefix.as_str()) {
                    match policies.get(ancestor_id) {
                        Some(NodePolicy::Promote) => {
                            root = ancestor_id.clone();
                            break;
                        }
                        Some(NodePolicy::Eliminate) => {
                            eliminated = true;
                            break;
                        }
                        _ => continue,
                    }
                }
            }
            if !eliminated {
                node_root.insert(node.id.clone(), root);
            }
        }
    }

    /// CombinationalCloud strategy: re-root every Merge node onto the
    /// minimum node id in its connected component, where "connected" means
    /// joined by a chain of Combinational-flow edges to another Merge
    /// node. Hierarchy plays no part — an unconnected node keeps itself as
    /// root (a one-node cloud), and an Eliminated-policy ancestor has no
    /// bearing on a Merge node's membership here.
    fn group_by_combinational_wiring(
        &self,
        store: &GraphStore,
        merge_nodes: &[&Node],
        node_root: &mut HashMap<NodeId, NodeId>,
    ) {
        let eligible: HashSet<NodeId> = merge_nodes.iter().map(|n| n.id.clone()).collect();
        if eligible.is_empty() {
            return;
        }

        let mut parent: HashMap<NodeId, NodeId> = eligible.iter().map(|id| (id.clone(), id.clone())).collect();

        fn find(parent: &mut HashMap<NodeId, NodeId>, id: &NodeId) -> NodeId {
            let mut root = id.clone();
            while parent[&root] != root {
                root = parent[&root].clone();
            }
            let mut cur = id.clone();
            while parent[&cur] != cur {
                let next = parent[&cur].clone();
                parent.insert(cur, root.clone());
                cur = next;
            }
            root
        }

        fn union(parent: &mut HashMap<NodeId, NodeId>, a: &NodeId, b: &NodeId) {
            let ra = find(parent, a);
            let rb = find(parent, b);
            if ra != rb {
                // smaller NodeId wins as root, keeping component roots
                // deterministic regardless of edge iteration order.
                if ra < rb {
                    parent.insert(rb, ra);
                } else {
                    parent.insert(ra, rb);
                }
            }
        }

        for edge in store.all_edges() {
            if edge.flow_type != crate::model::FlowType::Combinational {
                continue;
            }
            if eligible.contains(&edge.source) && eligible.contains(&edge.target) {
                union(&mut parent, &edge.source, &edge.target);
            }
        }

        for id in &eligible {
            let root = find(&mut parent, id);
            node_root.insert(id.clone(), root);
        }
    }

    /// ConstraintGroup strategy: group by a declared `attr:constraint_group`
    /// value, falling back to the `Pblock` node a `PhysicalMapping` edge
    /// places this node into, falling back to standing alone. Placement
    /// constraints attach a node to its Pblock by edge rather than by
    /// string attribute, so the shared-Pblock fallback walks the node's
    /// outgoing `PhysicalMapping` edges (sorted for determinism when more
    /// than one exists) rather than reading an attribute a placement
    /// ingestor never writes.
    fn group_by_constraint_attribute(&self, store: &GraphStore, merge_nodes: &[&Node], node_root: &mut HashMap<NodeId, NodeId>) {
        let mut by_key: HashMap<String, NodeId> = HashMap::new();
        for node in merge_nodes {
            let key = node
                .attributes
                .get("constraint_group")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .or_else(|| self.shared_pblock_key(store, &node.id));

            match key {
                Some(key) => {
                    let root = by_key.entry(key).or_insert_with(|| node.id.clone());
                    node_root.insert(node.id.clone(), root.clone());
                }
                None => {
                    node_root.insert(node.id.clone(), node.id.clone());
                }
            }
        }
    }

    fn shared_pblock_key(&self, store: &GraphStore, node_id: &NodeId) -> Option<String> {
        let mut targets: Vec<NodeId> = store
            .out_edges(node_id)
            .into_iter()
            .filter(|e| e.relation_type == RelationType::PhysicalMapping)
            .map(|e| e.target)
            .collect();
        targets.sort();
        targets.into_iter().next().map(|id| id.0)
    }
}
