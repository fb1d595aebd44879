//! Export wire formats: curated JSON projections for query and
//! visualization consumers (spec §6), not a re-serialization of the
//! library's internal id/index types. Node and edge exports carry only
//! the fields a downstream tool actually cares about; SuperNode/SuperEdge
//! exports fold in member counts and, when a bundle is supplied, the
//! current timing analysis's scalar fields.

use crate::bundle::{AnalysisBundle, AnalysisKind};
use crate::ids::{EdgeId, NodeId};
use crate::model::{Edge, EntityClass, FlowType, Node, RelationType};
use crate::store::GraphStore;
use crate::supergraph::{SuperClass, SuperGraph};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExport {
    pub id: NodeId,
    pub label: String,
    pub entity_class: EntityClass,
    pub hier_path: String,
    pub slack: Option<f64>,
    pub arrival: Option<f64>,
    pub required: Option<f64>,
    pub clock_domain: Option<String>,
}

impl From<&Node> for NodeExport {
    fn from(n: &Node) -> Self {
        Self {
            id: n.id.clone(),
            label: n.local_name.clone(),
            entity_class: n.entity_class,
            hier_path: n.hier_path.clone(),
            slack: n.slack,
            arrival: n.arrival_time,
            required: n.required_time,
            clock_domain: n.clock_domain.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeExport {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub relation_type: RelationType,
    pub flow_type: FlowType,
    pub signal_name: String,
    pub canonical_name: String,
    pub bit_range: Option<(u32, u32)>,
    pub net_id: Option<String>,
    pub slack: Option<f64>,
    pub delay: Option<f64>,
    pub timing_exception: Option<String>,
    pub clock_domain: Option<String>,
}

impl From<&Edge> for EdgeExport {
    fn from(e: &Edge) -> Self {
        Self {
            id: e.id.clone(),
            source: e.source.clone(),
            target: e.target.clone(),
            relation_type: e.relation_type,
            flow_type: e.flow_type,
            signal_name: e.signal_name.clone(),
            canonical_name: e.canonical_name.clone(),
            bit_range: e.bit_range,
            net_id: e.net_id.clone(),
            slack: e.slack,
            delay: e.delay,
            timing_exception: e.timing_exception.clone(),
            clock_domain: e.clock_domain.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub generation: u64,
    pub nodes: Vec<NodeExport>,
    pub edges: Vec<EdgeExport>,
}

pub fn export_graph(store: &GraphStore) -> GraphExport {
    GraphExport {
        generation: store.generation(),
        nodes: store.all_nodes().iter().map(NodeExport::from).collect(),
        edges: store.all_edges().iter().map(EdgeExport::from).collect(),
    }
}

/// SuperNode projection: identity plus whichever timing scalars the
/// bundle currently holds for it. All timing fields are `None` when no
/// bundle is supplied or the slot was never attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperNodeExport {
    pub id: String,
    pub label: String,
    pub super_class: SuperClass,
    pub entity_classes: Vec<EntityClass>,
    pub member_node_count: usize,
    pub min_slack: Option<f64>,
    pub p5_slack: Option<f64>,
    pub max_arrival_time: Option<f64>,
    pub min_required_time: Option<f64>,
    pub critical_node_ratio: Option<f64>,
    pub near_critical_ratio: Option<f64>,
    pub timing_risk_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperEdgeExport {
    pub id: String,
    pub source: String,
    pub target: String,
    pub relation_types: Vec<RelationType>,
    pub flow_types: Vec<FlowType>,
    pub member_edge_count: usize,
    pub max_delay: Option<f64>,
    pub p95_delay: Option<f64>,
    pub fanout_max: Option<usize>,
    pub fanout_p95: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperGraphExport {
    pub view_name: String,
    pub generation: u64,
    pub super_nodes: Vec<SuperNodeExport>,
    pub super_edges: Vec<SuperEdgeExport>,
}

/// Build a curated export of `graph`. `bundle` is optional: a freshly
/// built SuperGraph that hasn't been through the Timing Aggregator yet
/// has nothing to attach, and every timing scalar exports as `None`
/// rather than forcing callers to construct an empty bundle.
pub fn export_supergraph(graph: &SuperGraph, bundle: Option<&AnalysisBundle>) -> SuperGraphExport {
    let super_nodes = graph
        .nodes
        .iter()
        .map(|(hex, sn)| {
            let metrics = bundle.and_then(|b| b.get_node(hex, AnalysisKind::Timing)).and_then(|v| v.as_timing_node().cloned());
            SuperNodeExport {
                id: hex.clone(),
                label: sn.label.clone(),
                super_class: sn.class,
                entity_classes: sn.entity_classes.clone(),
                member_node_count: sn.members.len(),
                min_slack: metrics.as_ref().map(|m| m.min_slack),
                p5_slack: metrics.as_ref().and_then(|m| m.p5_slack),
                max_arrival_time: metrics.as_ref().and_then(|m| m.max_arrival_time),
                min_required_time: metrics.as_ref().and_then(|m| m.min_required_time),
                critical_node_ratio: metrics.as_ref().map(|m| m.critical_node_ratio),
                near_critical_ratio: metrics.as_ref().map(|m| m.near_critical_ratio),
                timing_risk_score: metrics.as_ref().and_then(|m| m.timing_risk_score),
            }
        })
        .collect();

    let super_edges = graph
        .edges
        .iter()
        .map(|(hex, se)| {
            let metrics = bundle.and_then(|b| b.get_edge(hex, AnalysisKind::Timing)).and_then(|v| v.as_timing_edge().cloned());
            SuperEdgeExport {
                id: hex.clone(),
                source: crate::ids::hex_id(&se.source),
                target: crate::ids::hex_id(&se.target),
                relation_types: se.relation_types.clone(),
                flow_types: se.flow_types.clone(),
                member_edge_count: se.members.len(),
                max_delay: metrics.as_ref().and_then(|m| m.max_delay),
                p95_delay: metrics.as_ref().and_then(|m| m.p95_delay),
                fanout_max: metrics.as_ref().and_then(|m| m.fanout_max),
                fanout_p95: metrics.as_ref().and_then(|m| m.fanout_p95),
            }
        })
        .collect();

    SuperGraphExport { view_name: graph.view_name.clone(), generation: graph.generation, super_nodes, super_edges }
}
