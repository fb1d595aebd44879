//! Node policy selection for the View Builder.
//!
//! Every `(Context, View, EntityClass)` triple maps to a `NodePolicy`
//! action. A `Merge` action additionally carries a target `SuperClass`
//! (`merge_target`) that tells the View Builder's merge cycle *which*
//! partitioning strategy to run — hierarchy-parent clustering, wiring
//! connectivity, or declared-group attributes — since the three merge
//! targets in spec §4.7 each group nodes by a different key. The base
//! table is a pure function — no state, no I/O — consulted once per
//! triple rather than computed from scratch. Name-based overrides
//! (testbench elimination, clock/reset generator promotion) are layered on
//! top of the base table rather than folded into it, so the
//! exhaustive-match discipline on `EntityClass` stays visible at the
//! table's call site.

use crate::model::{EntityClass, Node};
use crate::supergraph::SuperClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Design,
    Simulation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Connectivity,
    Structural,
    Physical,
}

/// The instruction the three-cycle algorithm applies to a node:
/// `Promote` keeps it as its own SuperNode, `Merge` folds it into a
/// cluster (see `merge_target` for which one), `Eliminate` drops it and
/// its incident edges from the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePolicy {
    Promote,
    Merge,
    Eliminate,
}

/// Base policy before name-based overrides, exhaustive over every
/// `EntityClass` in every `(Context, View)` combination. Mirrors spec
/// §4.7's four enumerated policy maps.
pub fn base_policy(context: Context, view: View, class: EntityClass) -> NodePolicy {
    match (context, view) {
        // Design.Connectivity (the spec's exemplar): flip-flops/DSP/BRAM/IO
        // are promoted directly; combinational primitives merge into
        // CombinationalCloud by wiring, not hierarchy; physical entities and
        // the module-instance scaffolding around them are eliminated.
        (Context::Design, View::Connectivity) => match class {
            EntityClass::FlipFlop | EntityClass::Dsp | EntityClass::Bram | EntityClass::IoPort => {
                NodePolicy::Promote
            }
            EntityClass::Fsm => NodePolicy::Promote,
            EntityClass::Lut | EntityClass::Mux | EntityClass::RtlBlock => NodePolicy::Merge,
            EntityClass::ModuleInstance => NodePolicy::Eliminate,
            EntityClass::Pblock | EntityClass::PackagePin | EntityClass::BoardConnector => NodePolicy::Eliminate,
            EntityClass::ClockDomain => NodePolicy::Eliminate,
        },

        // Design.Structural: module instances and IO ports are the
        // skeleton; every primitive underneath merges into its enclosing
        // module's cluster; physical entities are eliminated.
        (Context::Design, View::Structural) => match class {
            EntityClass::ModuleInstance | EntityClass::IoPort => NodePolicy::Promote,
            EntityClass::RtlBlock
            | EntityClass::FlipFlop
            | EntityClass::Lut
            | EntityClass::Mux
            | EntityClass::Dsp
            | EntityClass::Bram
            | EntityClass::Fsm => NodePolicy::Merge,
            EntityClass::Pblock | EntityClass::PackagePin | EntityClass::BoardConnector => NodePolicy::Eliminate,
            EntityClass::ClockDomain => NodePolicy::Eliminate,
        },

        // Design.Physical: placement/package/board entities are promoted;
        // DSP/BRAM (the primitives placement actually cares about) merge
        // into declared ConstraintGroups; all logical/structural entities
        // have no physical meaning here and are eliminated.
        (Context::Design, View::Physical) => match class {
            EntityClass::IoPort | EntityClass::Pblock | EntityClass::PackagePin | EntityClass::BoardConnector => {
                NodePolicy::Promote
            }
            EntityClass::Dsp | EntityClass::Bram => NodePolicy::Merge,
            EntityClass::ClockDomain => NodePolicy::Merge,
            EntityClass::ModuleInstance
            | EntityClass::RtlBlock
            | EntityClass::FlipFlop
            | EntityClass::Lut
            | EntityClass::Mux
            | EntityClass::Fsm => NodePolicy::Eliminate,
        },

        // Simulation.*: state-holding entities stay visible (flip-flops
        // promoted alongside module instances/IO, for stimulus/response
        // observability); combinational primitives merge into their
        // module's cluster; physical entities carry no simulation meaning.
        (Context::Simulation, _) => match class {
            EntityClass::ModuleInstance | EntityClass::IoPort => NodePolicy::Promote,
            EntityClass::FlipFlop | EntityClass::Dsp | EntityClass::Bram | EntityClass::Fsm => NodePolicy::Promote,
            EntityClass::Lut | EntityClass::Mux | EntityClass::RtlBlock => NodePolicy::Merge,
            EntityClass::Pblock | EntityClass::PackagePin | EntityClass::BoardConnector => NodePolicy::Eliminate,
            EntityClass::ClockDomain => NodePolicy::Eliminate,
        },
    }
}

/// Which partitioning strategy a `Merge`-policy node under this
/// `(context, view)` groups by. Each of spec §4.7's four policy maps uses
/// exactly one merge target, so this is a function of `(context, view)`
/// alone rather than also depending on the node's class.
///
/// - `ModuleCluster`: key is the node's nearest Promoted hierarchy
///   ancestor (its enclosing module).
/// - `CombinationalCloud`: key is the maximal connected component joined
///   by `Combinational`-flow edges between Merge-policy nodes.
/// - `ConstraintGroup`: key is a declared `attr:constraint_group` value,
///   else a shared `attr:pblock` value, else the node stands alone.
pub fn merge_target(context: Context, view: View) -> SuperClass {
    match (context, view) {
        (Context::Design, View::Connectivity) => SuperClass::CombinationalCloud,
        (Context::Design, View::Structural) => SuperClass::ModuleCluster,
        (Context::Design, View::Physical) => SuperClass::ConstraintGroup,
        (Context::Simulation, _) => SuperClass::ModuleCluster,
    }
}

/// Name-based overrides applied after the base table (spec §4.7 "Dynamic
/// overrides"). Under `Simulation`, testbench-named structure is dropped
/// entirely; under either context, clock/reset generator instances whose
/// base action was `Merge` are upgraded to `Promote` for stimulus
/// visibility. A node whose base action is already `Promote`/`Eliminate`
/// is left alone by the generator override — only a `Merge` base action is
/// eligible to be upgraded.
pub fn resolve_policy(context: Context, view: View, node: &Node) -> NodePolicy {
    let base = base_policy(context, view, node.entity_class);
    let name = node.local_name.to_ascii_lowercase();

    // Spec §4.7 scopes this override to the Design context only —
    // Simulation context is precisely where testbench structure is the
    // point, so it is left to the base table there.
    if context == Context::Design
        && (name.starts_with("tb_") || node.hier_path.split('/').any(|seg| seg.eq_ignore_ascii_case("testbench") || seg.eq_ignore_ascii_case("sim")))
    {
        return NodePolicy::Eliminate;
    }

    if context == Context::Simulation
        && base == NodePolicy::Merge
        && (name.starts_with("clk_gen") || name.starts_with("reset_gen"))
    {
        return NodePolicy::Promote;
    }

    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;

    fn node(local_name: &str, class: EntityClass) -> Node {
        Node::new(NodeId::new(local_name), local_name, local_name, class)
    }

    fn node_at(hier_path: &str, local_name: &str, class: EntityClass) -> Node {
        Node::new(NodeId::new(hier_path), hier_path, local_name, class)
    }

    #[test]
    fn connectivity_promotes_state_and_merges_combinational_primitives() {
        assert_eq!(base_policy(Context::Design, View::Connectivity, EntityClass::FlipFlop), NodePolicy::Promote);
        assert_eq!(base_policy(Context::Design, View::Connectivity, EntityClass::Lut), NodePolicy::Merge);
        assert_eq!(base_policy(Context::Design, View::Connectivity, EntityClass::Mux), NodePolicy::Merge);
        assert_eq!(base_policy(Context::Design, View::Connectivity, EntityClass::ModuleInstance), NodePolicy::Eliminate);
        assert_eq!(merge_target(Context::Design, View::Connectivity), SuperClass::CombinationalCloud);
    }

    #[test]
    fn structural_promotes_modules_and_merges_primitives_by_hierarchy() {
        assert_eq!(base_policy(Context::Design, View::Structural, EntityClass::ModuleInstance), NodePolicy::Promote);
        assert_eq!(base_policy(Context::Design, View::Structural, EntityClass::FlipFlop), NodePolicy::Merge);
        assert_eq!(merge_target(Context::Design, View::Structural), SuperClass::ModuleCluster);
    }

    #[test]
    fn physical_merges_dsp_and_bram_into_constraint_groups_and_eliminates_logical() {
        assert_eq!(base_policy(Context::Design, View::Physical, EntityClass::Dsp), NodePolicy::Merge);
        assert_eq!(base_policy(Context::Design, View::Physical, EntityClass::Bram), NodePolicy::Merge);
        assert_eq!(base_policy(Context::Design, View::Physical, EntityClass::FlipFlop), NodePolicy::Eliminate);
        assert_eq!(base_policy(Context::Design, View::Physical, EntityClass::IoPort), NodePolicy::Promote);
        assert_eq!(merge_target(Context::Design, View::Physical), SuperClass::ConstraintGroup);
    }

    #[test]
    fn testbench_is_eliminated_only_under_design_context() {
        let tb = node("tb_top", EntityClass::ModuleInstance);
        assert_eq!(resolve_policy(Context::Design, View::Connectivity, &tb), NodePolicy::Eliminate);
        // Simulation context has no testbench-elimination override — the
        // base table governs, same as any other ModuleInstance.
        assert_eq!(
            resolve_policy(Context::Simulation, View::Connectivity, &tb),
            base_policy(Context::Simulation, View::Connectivity, EntityClass::ModuleInstance)
        );
    }

    #[test]
    fn testbench_hierarchy_segment_is_eliminated_even_with_a_plain_name() {
        let under_tb = node_at("top/testbench/driver", "driver", EntityClass::ModuleInstance);
        assert_eq!(resolve_policy(Context::Design, View::Structural, &under_tb), NodePolicy::Eliminate);
    }

    #[test]
    fn clock_generator_is_promoted_only_under_simulation_and_only_when_merge_was_the_base() {
        let gen = node("clk_gen_main", EntityClass::RtlBlock);
        assert_eq!(base_policy(Context::Simulation, View::Connectivity, EntityClass::RtlBlock), NodePolicy::Merge);
        assert_eq!(resolve_policy(Context::Simulation, View::Connectivity, &gen), NodePolicy::Promote);
        // Design context has no such override.
        assert_eq!(resolve_policy(Context::Design, View::Connectivity, &gen), NodePolicy::Merge);
    }

    #[test]
    fn base_table_is_exhaustive_by_construction() {
        for class in [
            EntityClass::ModuleInstance,
            EntityClass::RtlBlock,
            EntityClass::FlipFlop,
            EntityClass::Lut,
            EntityClass::Mux,
            EntityClass::Dsp,
            EntityClass::Bram,
            EntityClass::IoPort,
            EntityClass::PackagePin,
            EntityClass::Pblock,
            EntityClass::BoardConnector,
            EntityClass::ClockDomain,
            EntityClass::Fsm,
        ] {
            let _ = base_policy(Context::Design, View::Connectivity, class);
            let _ = base_policy(Context::Design, View::Structural, class);
            let _ = base_policy(Context::Design, View::Physical, class);
            let _ = base_policy(Context::Simulation, View::Connectivity, class);
        }
    }
}
