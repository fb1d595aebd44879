//! Stable, content-addressable identifiers.
//!
//! Node and edge ids are opaque strings supplied by ingest adapters (they
//! come from netlist/constraint tool identifiers upstream of this crate).
//! SuperNode/SuperEdge ids, by contrast, are *derived*: a Blake3 hash of the
//! sorted member-id set, so the same input graph and policy always produce
//! byte-identical SuperGraph ids.

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node identifier, supplied by the ingest adapter that created the node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

/// An edge identifier, supplied by the ingest adapter that created the edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub String);

/// A deterministic hash of a SuperNode's member-node id set.
pub type SuperNodeId = [u8; 32];

/// A deterministic hash of a SuperEdge's endpoints and member-edge id set.
pub type SuperEdgeId = [u8; 32];

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lowercase-hex rendering of a SuperNode/SuperEdge id, the string form
/// used as the map key in `SuperGraph` and in `AnalysisBundle` lookups.
pub fn hex_id(id: &[u8; 32]) -> String {
    id.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Compute a SuperNode id as Blake3(sorted member node ids, '\0'-joined).
///
/// Sorting first makes the id independent of promotion/merge discovery
/// order, which is what makes the View Builder's output byte-identical
/// across runs.
pub fn super_node_id(member_nodes: &[NodeId]) -> SuperNodeId {
    let mut sorted: Vec<&str> = member_nodes.iter().map(|n| n.as_str()).collect();
    sorted.sort_unstable();

    let mut hasher = Hasher::new();
    for id in sorted {
        hasher.update(id.as_bytes());
        hasher.update(b"\0");
    }
    *hasher.finalize().as_bytes()
}

/// Compute a SuperEdge id from its resolved endpoints and member edge ids.
///
/// Endpoints are included (not just member edges) so that two distinct
/// SuperEdges with disjoint member-edge sets crossing the same boundary
/// never collide, and so a SuperEdge that folds in additional member edges
/// after further rewriting keeps a stable identity keyed on the boundary it
/// represents.
pub fn super_edge_id(
    source: &SuperNodeId,
    target: &SuperNodeId,
    member_edges: &[EdgeId],
) -> SuperEdgeId {
    let mut sorted: Vec<&str> = member_edges.iter().map(|e| e.as_str()).collect();
    sorted.sort_unstable();

    let mut hasher = Hasher::new();
    hasher.update(source);
    hasher.update(target);
    for id in sorted {
        hasher.update(id.as_bytes());
        hasher.update(b"\0");
    }
    *hasher.finalize().as_bytes()
}
