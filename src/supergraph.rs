//! SuperGraph data types, the View Builder's output shape: an immutable,
//! content-hashed result value produced by applying a policy to a base
//! structure, carried around by value rather than mutated in place.

use crate::ids::{EdgeId, NodeId, SuperEdgeId, SuperNodeId};
use crate::model::{EntityClass, FlowType, RelationType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a SuperNode represents, decided by the View Builder's node policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuperClass {
    /// One underlying node, unchanged.
    Atomic,
    /// Several module-instance-rooted nodes folded into one cluster.
    ModuleCluster,
    /// A maximal combinational fan-in/fan-out cone collapsed to one node.
    CombinationalCloud,
    /// Nodes that exist only to carry a constraint, grouped together.
    ConstraintGroup,
    /// Removed entirely from the view (e.g. testbench-only structure).
    Eliminated,
}

/// One node in a SuperGraph: a deterministic id plus the member node ids it
/// was built from — every SuperNode traces back to the nodes that
/// produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperNode {
    pub id: SuperNodeId,
    pub class: SuperClass,
    pub members: Vec<NodeId>,
    pub label: String,
    pub entity_classes: Vec<EntityClass>,
}

/// One edge in a SuperGraph, rewritten to connect SuperNode ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperEdge {
    pub id: SuperEdgeId,
    pub source: SuperNodeId,
    pub target: SuperNodeId,
    pub members: Vec<EdgeId>,
    pub relation_types: Vec<RelationType>,
    pub flow_types: Vec<FlowType>,
}

/// The immutable result of one View Builder run: a complete node/edge set
/// plus the store generation it was built from (so callers can detect when
/// a SuperGraph has gone stale relative to the live graph).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperGraph {
    pub view_name: String,
    pub generation: u64,
    pub nodes: BTreeMap<String, SuperNode>,
    pub edges: BTreeMap<String, SuperEdge>,
}

use crate::ids::hex_id as hex;

impl SuperGraph {
    pub fn new(view_name: impl Into<String>, generation: u64) -> Self {
        Self {
            view_name: view_name.into(),
            generation,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }

    pub fn insert_node(&mut self, node: SuperNode) {
        self.nodes.insert(hex(&node.id), node);
    }

    pub fn insert_edge(&mut self, edge: SuperEdge) {
        self.edges.insert(hex(&edge.id), edge);
    }

    pub fn get_node(&self, id: &SuperNodeId) -> Option<&SuperNode> {
        self.nodes.get(&hex(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
