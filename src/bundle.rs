//! The Analysis Bundle: keyed attachment of derived analysis results onto
//! individual SuperNodes/SuperEdges (spec component I).
//!
//! Structure (the SuperGraph) and analysis (timing, and any future derived
//! metric) are kept independent: a bundle slot is addressed by
//! `(super-entity hex id, AnalysisKind)` rather than embedded on the
//! `SuperNode`/`SuperEdge` struct itself, so attaching or replacing an
//! analysis result never mutates the SuperGraph that produced it. `attach`
//! always replaces, never merges, so a caller reading `get` never sees a
//! half-updated value.

use crate::timing::{TimingEdgeMetrics, TimingNodeMetrics};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Which kind of analysis a bundle slot holds. Timing is the only kind
/// this crate derives today; additional kinds (congestion, power) would
/// add a variant here rather than a new bundle type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    Timing,
}

/// An attached analysis result, tagged by which `AnalysisKind` produced
/// it and whether it describes a SuperNode or a SuperEdge.
#[derive(Debug, Clone)]
pub enum AnalysisValue {
    TimingNode(TimingNodeMetrics),
    TimingEdge(TimingEdgeMetrics),
}

impl AnalysisValue {
    pub fn as_timing_node(&self) -> Option<&TimingNodeMetrics> {
        match self {
            AnalysisValue::TimingNode(m) => Some(m),
            AnalysisValue::TimingEdge(_) => None,
        }
    }

    pub fn as_timing_edge(&self) -> Option<&TimingEdgeMetrics> {
        match self {
            AnalysisValue::TimingEdge(m) => Some(m),
            AnalysisValue::TimingNode(_) => None,
        }
    }
}

/// Holds the most recently attached analysis value per `(super-entity hex
/// id, AnalysisKind)`. Node and edge tables are kept separate since the
/// two id spaces never collide in meaning even though both are hex
/// strings.
#[derive(Default)]
pub struct AnalysisBundle {
    nodes: RwLock<HashMap<(String, AnalysisKind), AnalysisValue>>,
    edges: RwLock<HashMap<(String, AnalysisKind), AnalysisValue>>,
}

impl AnalysisBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_node(&self, super_node_hex: &str, kind: AnalysisKind, value: AnalysisValue) {
        self.nodes.write().insert((super_node_hex.to_string(), kind), value);
    }

    pub fn get_node(&self, super_node_hex: &str, kind: AnalysisKind) -> Option<AnalysisValue> {
        self.nodes.read().get(&(super_node_hex.to_string(), kind)).cloned()
    }

    pub fn attach_edge(&self, super_edge_hex: &str, kind: AnalysisKind, value: AnalysisValue) {
        self.edges.write().insert((super_edge_hex.to_string(), kind), value);
    }

    pub fn get_edge(&self, super_edge_hex: &str, kind: AnalysisKind) -> Option<AnalysisValue> {
        self.edges.read().get(&(super_edge_hex.to_string(), kind)).cloned()
    }

    /// Whether any analysis of any kind has been attached to this SuperNode.
    /// Used by the Query Engine's `find_supernodes(has_timing)` filter.
    pub fn has_node_analysis(&self, super_node_hex: &str, kind: AnalysisKind) -> bool {
        self.nodes.read().contains_key(&(super_node_hex.to_string(), kind))
    }

    pub fn node_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.nodes.read().keys().map(|(hex, _)| hex.clone()).collect();
        keys.sort();
        keys.dedup();
        keys
    }
}
