//! Wire types ingest adapters build and hand to the Graph Updater / Graph
//! Store. Plain serde-derived structs carrying one batch record each.

use crate::ids::{EdgeId, NodeId};
use crate::model::{EntityClass, FieldValue, FlowType, RelationType, Source, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A precedence-gated field write an ingestor wants applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub entity_id: String,
    pub is_edge: bool,
    pub field: String,
    pub value: FieldValue,
    pub source: Source,
    pub stage: Stage,
    pub origin_file: Option<String>,
    pub origin_line: Option<u32>,
}

/// A new node an ingestor wants created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub hier_path: String,
    pub local_name: String,
    pub entity_class: EntityClass,
    #[serde(default)]
    pub attributes: BTreeMap<String, FieldValue>,
}

impl From<NodeSpec> for crate::model::Node {
    fn from(spec: NodeSpec) -> Self {
        let mut node = crate::model::Node::new(spec.id, spec.hier_path, spec.local_name, spec.entity_class);
        node.attributes = spec.attributes;
        node
    }
}

/// A new edge an ingestor wants created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub relation_type: RelationType,
    pub flow_type: FlowType,
    pub signal_name: String,
    pub canonical_name: String,
    #[serde(default)]
    pub bit_range: Option<(u32, u32)>,
    #[serde(default)]
    pub net_id: Option<String>,
}

impl From<EdgeSpec> for crate::model::Edge {
    fn from(spec: EdgeSpec) -> Self {
        let mut edge = crate::model::Edge::new(
            spec.id,
            spec.source,
            spec.target,
            spec.relation_type,
            spec.flow_type,
            spec.signal_name,
            spec.canonical_name,
        );
        edge.bit_range = spec.bit_range;
        edge.net_id = spec.net_id;
        edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_spec_converts_into_a_store_node() {
        let spec = NodeSpec {
            id: NodeId::new("top/ff1"),
            hier_path: "top/ff1".into(),
            local_name: "ff1".into(),
            entity_class: EntityClass::FlipFlop,
            attributes: BTreeMap::new(),
        };
        let node: crate::model::Node = spec.into();
        assert_eq!(node.id, NodeId::new("top/ff1"));
        assert_eq!(node.entity_class, EntityClass::FlipFlop);
    }
}
