//! The data model shared by every component: entity classes, relation and
//! flow types, stages, sources, and the Node/Edge structs themselves
//! for hardware design entities.

use crate::ids::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A design entity's class. Every `match` on this must be exhaustive — new
/// variants must not silently fall through a default arm anywhere in the
/// crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityClass {
    ModuleInstance,
    RtlBlock,
    FlipFlop,
    Lut,
    Mux,
    Dsp,
    Bram,
    IoPort,
    PackagePin,
    Pblock,
    BoardConnector,
    ClockDomain,
    Fsm,
}

/// The supertype derivable from an entity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntitySupertype {
    Logical,
    Structural,
    Physical,
    AbstractControl,
}

impl EntityClass {
    /// Derive the supertype for this class. Exhaustive match — adding a
    /// class requires picking its supertype here.
    pub fn supertype(self) -> EntitySupertype {
        match self {
            EntityClass::RtlBlock
            | EntityClass::FlipFlop
            | EntityClass::Lut
            | EntityClass::Mux
            | EntityClass::Fsm => EntitySupertype::Logical,
            EntityClass::ModuleInstance => EntitySupertype::Structural,
            EntityClass::Dsp
            | EntityClass::Bram
            | EntityClass::IoPort
            | EntityClass::PackagePin
            | EntityClass::Pblock
            | EntityClass::BoardConnector => EntitySupertype::Physical,
            EntityClass::ClockDomain => EntitySupertype::AbstractControl,
        }
    }
}

/// Directed relation type on an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationType {
    Data,
    Clock,
    Reset,
    Parameter,
    Constraint,
    PhysicalMapping,
}

impl RelationType {
    /// Canonical precedence order used to break majority ties when
    /// aggregating relation types onto a SuperEdge.
    pub fn canonical_rank(self) -> u8 {
        match self {
            RelationType::Data => 0,
            RelationType::Clock => 1,
            RelationType::Reset => 2,
            RelationType::Parameter => 3,
            RelationType::Constraint => 4,
            RelationType::PhysicalMapping => 5,
        }
    }
}

/// Flow type on an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlowType {
    Combinational,
    SequentialLaunch,
    SequentialCapture,
    ClockTree,
    AsyncReset,
}

/// Ingestion stage. Ranked ascending for the precedence tiebreak:
/// `Board > Timing > Floorplan > Constraints > Synthesis > Rtl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Rtl,
    Synthesis,
    Constraints,
    Floorplan,
    Timing,
    Board,
}

impl Stage {
    pub fn rank(self) -> u8 {
        match self {
            Stage::Rtl => 0,
            Stage::Synthesis => 1,
            Stage::Constraints => 2,
            Stage::Floorplan => 3,
            Stage::Timing => 4,
            Stage::Board => 5,
        }
    }
}

/// Write source / provenance kind. Ranked ascending for the
/// precedence lattice: `UserOverride > Declared > Analyzed >
/// Inferred`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Inferred,
    Analyzed,
    Declared,
    UserOverride,
}

impl Source {
    pub fn rank(self) -> u8 {
        match self {
            Source::Inferred => 0,
            Source::Analyzed => 1,
            Source::Declared => 2,
            Source::UserOverride => 3,
        }
    }
}

/// A typed field value. Update sites must match the declared type of the
/// target field; a mismatch is a hard `TypeMismatch` error, not
/// a silent reject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Str(String),
    F64(f64),
    I64(i64),
    Bool(bool),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Str(_) => "str",
            FieldValue::F64(_) => "f64",
            FieldValue::I64(_) => "i64",
            FieldValue::Bool(_) => "bool",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::F64(v) => Some(*v),
            _ => None,
        }
    }
}

/// A design entity. `hier_path` is ownership-only and never
/// signal-carrying; every prefix of it must itself be a node id (enforced by
/// the Graph Store on insert, not here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub hier_path: String,
    pub local_name: String,
    pub entity_class: EntityClass,
    pub attributes: BTreeMap<String, FieldValue>,
    pub clock_signal: Option<String>,
    pub reset_signal: Option<String>,
    pub slack: Option<f64>,
    pub arrival_time: Option<f64>,
    pub required_time: Option<f64>,
    pub clock_domain: Option<String>,
    /// A timing exception name (e.g. "false_path"), settable only by the
    /// Updater, same as `clock_domain`.
    pub timing_exception: Option<String>,
}

impl Node {
    pub fn new(id: NodeId, hier_path: impl Into<String>, local_name: impl Into<String>, entity_class: EntityClass) -> Self {
        Self {
            id,
            hier_path: hier_path.into(),
            local_name: local_name.into(),
            entity_class,
            attributes: BTreeMap::new(),
            clock_signal: None,
            reset_signal: None,
            slack: None,
            arrival_time: None,
            required_time: None,
            clock_domain: None,
            timing_exception: None,
        }
    }

    /// Hierarchy prefixes of `hier_path`, `/`-split, shallow-to-deep,
    /// excluding the node's own full path.
    pub fn hier_prefixes(&self) -> Vec<String> {
        let segments: Vec<&str> = self.hier_path.split('/').filter(|s| !s.is_empty()).collect();
        let mut prefixes = Vec::with_capacity(segments.len().saturating_sub(1));
        for i in 1..segments.len() {
            prefixes.push(segments[..i].join("/"));
        }
        prefixes
    }
}

/// A directed relation between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub relation_type: RelationType,
    pub flow_type: FlowType,
    pub signal_name: String,
    pub canonical_name: String,
    pub bit_range: Option<(u32, u32)>,
    pub net_id: Option<String>,
    pub delay: Option<f64>,
    pub slack: Option<f64>,
    pub timing_exception: Option<String>,
    pub clock_domain: Option<String>,
    pub attributes: BTreeMap<String, FieldValue>,
}

impl Edge {
    pub fn new(
        id: EdgeId,
        source: NodeId,
        target: NodeId,
        relation_type: RelationType,
        flow_type: FlowType,
        signal_name: impl Into<String>,
        canonical_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            source,
            target,
            relation_type,
            flow_type,
            signal_name: signal_name.into(),
            canonical_name: canonical_name.into(),
            bit_range: None,
            net_id: None,
            delay: None,
            slack: None,
            timing_exception: None,
            clock_domain: None,
            attributes: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hier_prefixes_exclude_self() {
        let node = Node::new(NodeId::new("top/cpu/alu"), "top/cpu/alu", "alu", EntityClass::ModuleInstance);
        assert_eq!(node.hier_prefixes(), vec!["top", "top/cpu"]);
    }

    #[test]
    fn entity_class_supertype_is_exhaustive_by_construction() {
        assert_eq!(EntityClass::FlipFlop.supertype(), EntitySupertype::Logical);
        assert_eq!(EntityClass::Pblock.supertype(), EntitySupertype::Physical);
        assert_eq!(EntityClass::ClockDomain.supertype(), EntitySupertype::AbstractControl);
        assert_eq!(EntityClass::ModuleInstance.supertype(), EntitySupertype::Structural);
    }

    #[test]
    fn stage_and_source_ranks_are_strictly_ordered() {
        assert!(Stage::Rtl.rank() < Stage::Synthesis.rank());
        assert!(Stage::Synthesis.rank() < Stage::Constraints.rank());
        assert!(Stage::Constraints.rank() < Stage::Floorplan.rank());
        assert!(Stage::Floorplan.rank() < Stage::Timing.rank());
        assert!(Stage::Timing.rank() < Stage::Board.rank());

        assert!(Source::Inferred.rank() < Source::Analyzed.rank());
        assert!(Source::Analyzed.rank() < Source::Declared.rank());
        assert!(Source::Declared.rank() < Source::UserOverride.rank());
    }
}
