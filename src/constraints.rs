//! The Constraint Projector.
//!
//! Resolves pattern-addressed constraint declarations (the way an SDC file
//! addresses `get_pins`/`get_cells` by glob) onto concrete nodes and edges,
//! then writes them through [`crate::updater::GraphUpdater`] at
//! `(Source::Declared, Stage::Constraints)`. Resolution always happens
//! before mutation, and an unresolved pattern is a collected warning
//! rather than an abort.

use crate::error::DkgError;
use crate::ids::{EdgeId, NodeId};
use crate::model::{FieldValue, FlowType, Source, Stage};
use crate::pattern::glob_match;
use crate::provenance::ProvenanceLedger;
use crate::store::GraphStore;
use crate::updater::{EntityRef, GraphUpdater};
use std::collections::HashSet;

/// `MulticyclePath`'s exception kind, per spec §6's `"setup"|"hold"` wire
/// vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McKind {
    Setup,
    Hold,
}

impl McKind {
    fn label(self) -> &'static str {
        match self {
            McKind::Setup => "setup",
            McKind::Hold => "hold",
        }
    }
}

/// `DelayBound`'s `kind`, per spec §6's `"max"|"min"` wire vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayKind {
    Max,
    Min,
}

impl DelayKind {
    fn attr_name(self) -> &'static str {
        match self {
            DelayKind::Max => "max_delay",
            DelayKind::Min => "min_delay",
        }
    }
}

/// `IoTiming`'s `kind`, per spec §6's `"input"|"output"` wire vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    Input,
    Output,
}

impl IoKind {
    fn delay_attr(self) -> &'static str {
        match self {
            IoKind::Input => "input_delay",
            IoKind::Output => "output_delay",
        }
    }
}

/// A parsed constraint record, one variant per spec §6 wire shape.
/// Pattern fields (`targets`, `from`, `to`, `ports`) are lists: a node
/// qualifies if it matches *any* pattern in the list.
#[derive(Debug, Clone)]
pub enum ConstraintRecord {
    Clock { name: String, period_ns: f64, targets: Vec<String> },
    FalsePath { from: Vec<String>, to: Vec<String> },
    MulticyclePath { cycles: u32, kind: McKind, from: Vec<String>, to: Vec<String> },
    DelayBound { kind: DelayKind, value: f64, from: Option<Vec<String>>, to: Option<Vec<String>> },
    IoTiming { kind: IoKind, value: f64, clock: String, ports: Vec<String> },
}

/// Result of projecting one constraint: which entities were actually
/// touched, and which declared patterns resolved to nothing (non-fatal).
#[derive(Debug, Default)]
pub struct ProjectionReport {
    pub touched_nodes: Vec<NodeId>,
    pub touched_edges: Vec<EdgeId>,
    pub warnings: Vec<String>,
}

/// Resolves constraint patterns and projects them onto the graph.
pub struct ConstraintProjector {
    /// Default hop count walked from a pattern-matched source node when
    /// following the launch-side closure described in spec §4.5 ("reachable
    /// within a configurable depth K via only Combinational/SequentialLaunch
    /// edges"). `0` means "edges directly incident to the matched source",
    /// the spec's stated default and the more strictly testable choice
    /// (open question, spec §9).
    pub default_depth: usize,
}

impl Default for ConstraintProjector {
    fn default() -> Self {
        Self { default_depth: 0 }
    }
}

impl ConstraintProjector {
    pub fn new(default_depth: usize) -> Self {
        Self { default_depth }
    }

    /// Resolve a list of patterns to the union of matching nodes, matching
    /// against `hier_path` then `local_name` (any match suffices per spec
    /// §4.5's pattern language). A pattern matching nothing contributes an
    /// `UnresolvedPattern` warning but does not stop resolution of the
    /// remaining patterns.
    fn resolve_nodes(&self, store: &GraphStore, patterns: &[String]) -> (Vec<NodeId>, Vec<String>) {
        let mut matched: HashSet<NodeId> = HashSet::new();
        let mut warnings = Vec::new();
        let all_nodes = store.all_nodes();

        for pattern in patterns {
            let before = matched.len();
            for node in &all_nodes {
                if glob_match(pattern, &node.hier_path) || glob_match(pattern, &node.local_name) {
                    matched.insert(node.id.clone());
                }
            }
            if matched.len() == before {
                warnings.push(format!("pattern {:?} resolved to no nodes", pattern));
            }
        }

        (matched.into_iter().collect(), warnings)
    }

    /// Nodes reachable from `sources` (inclusive) within `depth` hops,
    /// following only `Combinational`/`SequentialLaunch` edges — the
    /// "launch-side closure" spec §4.5 describes for edge selection by
    /// endpoints.
    fn reachable_within(&self, store: &GraphStore, sources: &[NodeId], depth: usize) -> HashSet<NodeId> {
        let mut visited: HashSet<NodeId> = sources.iter().cloned().collect();
        let mut frontier = sources.to_vec();

        for _ in 0..depth {
            let mut next = Vec::new();
            for node in &frontier {
                for edge in store.out_edges(node) {
                    if !matches!(edge.flow_type, FlowType::Combinational | FlowType::SequentialLaunch) {
                        continue;
                    }
                    if visited.insert(edge.target.clone()) {
                        next.push(edge.target.clone());
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        visited
    }

    /// Edges whose source lies in the `from`-closure (within `depth`) and
    /// whose destination is in `to` — the selection rule shared by
    /// `FalsePath`/`MulticyclePath`/two-ended `DelayBound`.
    fn edges_between(&self, store: &GraphStore, from: &[NodeId], to: &[NodeId], depth: usize) -> Vec<EdgeId> {
        let reachable = self.reachable_within(store, from, depth);
        let to_set: HashSet<NodeId> = to.iter().cloned().collect();
        store
            .all_edges()
            .into_iter()
            .filter(|e| reachable.contains(&e.source) && to_set.contains(&e.target))
            .map(|e| e.id)
            .collect()
    }

    /// Project one constraint onto the graph: resolve targets, then write
    /// through the updater at `(Declared, Constraints)`. Unresolved
    /// patterns never abort the remainder of the constraint file — they
    /// are collected as warnings on the returned report.
    pub fn project(
        &self,
        store: &GraphStore,
        ledger: &ProvenanceLedger,
        updater: &GraphUpdater,
        constraint: &ConstraintRecord,
    ) -> Result<ProjectionReport, DkgError> {
        match constraint {
            ConstraintRecord::Clock { name, period_ns, targets } => {
                let (nodes, warnings) = self.resolve_nodes(store, targets);
                let mut touched = Vec::new();
                for id in &nodes {
                    updater.update_field(
                        store, ledger, EntityRef::Node(id.clone()), "clock_domain",
                        FieldValue::Str(name.clone()), Source::Declared, Stage::Constraints, None,
                    )?;
                    updater.update_field(
                        store, ledger, EntityRef::Node(id.clone()), "attr:clock_period",
                        FieldValue::F64(*period_ns), Source::Declared, Stage::Constraints, None,
                    )?;
                    touched.push(id.clone());
                }
                Ok(ProjectionReport { touched_nodes: touched, warnings, ..Default::default() })
            }

            ConstraintRecord::FalsePath { from, to } => {
                let (from_nodes, mut warnings) = self.resolve_nodes(store, from);
                let (to_nodes, to_warnings) = self.resolve_nodes(store, to);
                warnings.extend(to_warnings);
                if from_nodes.is_empty() || to_nodes.is_empty() {
                    return Ok(ProjectionReport { warnings, ..Default::default() });
                }

                let edges = self.edges_between(store, &from_nodes, &to_nodes, self.default_depth);
                let mut touched = Vec::new();
                for id in &edges {
                    updater.update_field(
                        store, ledger, EntityRef::Edge(id.clone()), "timing_exception",
                        FieldValue::Str("false_path".to_string()), Source::Declared, Stage::Constraints, None,
                    )?;
                    touched.push(id.clone());
                }
                Ok(ProjectionReport { touched_edges: touched, warnings, ..Default::default() })
            }

            ConstraintRecord::MulticyclePath { cycles, kind, from, to } => {
                let (from_nodes, mut warnings) = self.resolve_nodes(store, from);
                let (to_nodes, to_warnings) = self.resolve_nodes(store, to);
                warnings.extend(to_warnings);
                if from_nodes.is_empty() || to_nodes.is_empty() {
                    return Ok(ProjectionReport { warnings, ..Default::default() });
                }

                let edges = self.edges_between(store, &from_nodes, &to_nodes, self.default_depth);
                let label = format!("multicycle_{}_{}", cycles, kind.label());
                let mut touched = Vec::new();
                for id in &edges {
                    updater.update_field(
                        store, ledger, EntityRef::Edge(id.clone()), "timing_exception",
                        FieldValue::Str(label.clone()), Source::Declared, Stage::Constraints, None,
                    )?;
                    touched.push(id.clone());
                }
                Ok(ProjectionReport { touched_edges: touched, warnings, ..Default::default() })
            }

            ConstraintRecord::DelayBound { kind, value, from, to } => {
                let mut warnings = Vec::new();
                let edges: Vec<EdgeId> = match (from, to) {
                    (None, None) => store.all_edges().into_iter().map(|e| e.id).collect(),
                    (Some(from), Some(to)) => {
                        let (from_nodes, w1) = self.resolve_nodes(store, from);
                        let (to_nodes, w2) = self.resolve_nodes(store, to);
                        warnings.extend(w1);
                        warnings.extend(w2);
                        if from_nodes.is_empty() || to_nodes.is_empty() {
                            return Ok(ProjectionReport { warnings, ..Default::default() });
                        }
                        self.edges_between(store, &from_nodes, &to_nodes, self.default_depth)
                    }
                    (Some(from), None) => {
                        let (from_nodes, w) = self.resolve_nodes(store, from);
                        warnings.extend(w);
                        if from_nodes.is_empty() {
                            return Ok(ProjectionReport { warnings, ..Default::default() });
                        }
                        let reachable = self.reachable_within(store, &from_nodes, self.default_depth);
                        store
                            .all_edges()
                            .into_iter()
                            .filter(|e| reachable.contains(&e.source))
                            .map(|e| e.id)
                            .collect()
                    }
                    (None, Some(to)) => {
                        let (to_nodes, w) = self.resolve_nodes(store, to);
                        warnings.extend(w);
                        if to_nodes.is_empty() {
                            return Ok(ProjectionReport { warnings, ..Default::default() });
                        }
                        let to_set: HashSet<NodeId> = to_nodes.into_iter().collect();
                        store
                            .all_edges()
                            .into_iter()
                            .filter(|e| to_set.contains(&e.target))
                            .map(|e| e.id)
                            .collect()
                    }
                };

                let attr = format!("attr:{}", kind.attr_name());
                let mut touched = Vec::new();
                for id in &edges {
                    updater.update_field(
                        store, ledger, EntityRef::Edge(id.clone()), &attr,
                        FieldValue::F64(*value), Source::Declared, Stage::Constraints, None,
                    )?;
                    touched.push(id.clone());
                }
                Ok(ProjectionReport { touched_edges: touched, warnings, ..Default::default() })
            }

            ConstraintRecord::IoTiming { kind, value, clock, ports } => {
                let (nodes, warnings) = self.resolve_nodes(store, ports);
                let delay_attr = format!("attr:{}", kind.delay_attr());
                let mut touched = Vec::new();
                for id in &nodes {
                    updater.update_field(
                        store, ledger, EntityRef::Node(id.clone()), &delay_attr,
                        FieldValue::F64(*value), Source::Declared, Stage::Constraints, None,
                    )?;
                    updater.update_field(
                        store, ledger, EntityRef::Node(id.clone()), "attr:io_clock",
                        FieldValue::Str(clock.clone()), Source::Declared, Stage::Constraints, None,
                    )?;
                    touched.push(id.clone());
                }
                Ok(ProjectionReport { touched_nodes: touched, warnings, ..Default::default() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EntityClass, FlowType, Node, RelationType};

    fn setup() -> (GraphStore, ProvenanceLedger, GraphUpdater) {
        let store = GraphStore::new();
        store.add_node(Node::new(NodeId::new("top"), "top", "top", EntityClass::ModuleInstance)).unwrap();
        store.add_node(Node::new(NodeId::new("top/ff1"), "top/ff1", "ff1", EntityClass::FlipFlop)).unwrap();
        store.add_node(Node::new(NodeId::new("top/ff2"), "top/ff2", "ff2", EntityClass::FlipFlop)).unwrap();
        store
            .add_edge(Edge::new(
                EdgeId::new("e1"),
                NodeId::new("top/ff1"),
                NodeId::new("top/ff2"),
                RelationType::Data,
                FlowType::Combinational,
                "d",
                "top/d",
            ))
            .unwrap();
        (store, ProvenanceLedger::new(16), GraphUpdater::new())
    }

    #[test]
    fn false_path_projects_onto_matching_edge() {
        let (store, ledger, updater) = setup();
        let projector = ConstraintProjector::default();
        let constraint = ConstraintRecord::FalsePath {
            from: vec!["top/ff1".into()],
            to: vec!["top/ff2".into()],
        };
        let report = projector.project(&store, &ledger, &updater, &constraint).unwrap();
        assert_eq!(report.touched_edges, vec![EdgeId::new("e1")]);
        assert!(report.warnings.is_empty());
        assert_eq!(store.get_edge(&EdgeId::new("e1")).unwrap().timing_exception.as_deref(), Some("false_path"));
    }

    #[test]
    fn unresolved_from_pattern_is_a_warning_not_an_error() {
        let (store, ledger, updater) = setup();
        let projector = ConstraintProjector::default();
        let constraint = ConstraintRecord::FalsePath {
            from: vec!["top/ghost*".into()],
            to: vec!["top/ff2".into()],
        };
        let report = projector.project(&store, &ledger, &updater, &constraint).unwrap();
        assert!(report.touched_edges.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn multicycle_path_label_carries_cycles_and_kind() {
        let (store, ledger, updater) = setup();
        let projector = ConstraintProjector::default();
        let constraint = ConstraintRecord::MulticyclePath {
            cycles: 3,
            kind: McKind::Hold,
            from: vec!["top/ff1".into()],
            to: vec!["top/ff2".into()],
        };
        let report = projector.project(&store, &ledger, &updater, &constraint).unwrap();
        assert_eq!(report.touched_edges.len(), 1);
        assert_eq!(
            store.get_edge(&EdgeId::new("e1")).unwrap().timing_exception.as_deref(),
            Some("multicycle_3_hold")
        );
    }

    #[test]
    fn delay_bound_sets_keyed_attribute_not_the_shared_delay_field() {
        let (store, ledger, updater) = setup();
        let projector = ConstraintProjector::default();
        let constraint = ConstraintRecord::DelayBound {
            kind: DelayKind::Max,
            value: 1.2,
            from: Some(vec!["top/ff1".into()]),
            to: Some(vec!["top/ff2".into()]),
        };
        let report = projector.project(&store, &ledger, &updater, &constraint).unwrap();
        assert_eq!(report.touched_edges.len(), 1);
        let edge = store.get_edge(&EdgeId::new("e1")).unwrap();
        assert_eq!(edge.attributes.get("max_delay").and_then(|v| v.as_f64()), Some(1.2));
        assert_eq!(edge.delay, None);
    }

    #[test]
    fn clock_sets_node_domain_and_period_not_an_edge_field() {
        let (store, ledger, updater) = setup();
        let projector = ConstraintProjector::default();
        let constraint = ConstraintRecord::Clock {
            name: "sys_clk".into(),
            period_ns: 4.0,
            targets: vec!["top/ff1".into()],
        };
        let report = projector.project(&store, &ledger, &updater, &constraint).unwrap();
        assert_eq!(report.touched_nodes, vec![NodeId::new("top/ff1")]);
        let node = store.get_node(&NodeId::new("top/ff1")).unwrap();
        assert_eq!(node.clock_domain.as_deref(), Some("sys_clk"));
        assert_eq!(node.attributes.get("clock_period").and_then(|v| v.as_f64()), Some(4.0));
    }

    #[test]
    fn io_timing_sets_port_delay_and_clock_attributes() {
        let (store, ledger, updater) = setup();
        let projector = ConstraintProjector::default();
        let constraint = ConstraintRecord::IoTiming {
            kind: IoKind::Input,
            value: 0.8,
            clock: "sys_clk".into(),
            ports: vec!["top/ff1".into()],
        };
        let report = projector.project(&store, &ledger, &updater, &constraint).unwrap();
        assert_eq!(report.touched_nodes, vec![NodeId::new("top/ff1")]);
        let node = store.get_node(&NodeId::new("top/ff1")).unwrap();
        assert_eq!(node.attributes.get("input_delay").and_then(|v| v.as_f64()), Some(0.8));
        assert_eq!(node.attributes.get("io_clock").and_then(|v| v.as_str()), Some("sys_clk"));
    }
}
