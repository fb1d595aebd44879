//! Property-based tests for the quantified invariants of spec §8: precedence
//! monotonicity (#1), stage-order independence (#2), the SuperGraph
//! partition invariant (#3), edge conservation (#4), and view determinism
//! (#7). Scenario-style tests (S1-S6) and the remaining invariants (#5, #6)
//! live alongside the modules they exercise (`view.rs`, `constraints.rs`,
//! `tests/view_tests.rs`).

use dkg_core::ids::{EdgeId, NodeId};
use dkg_core::model::{Edge, EntityClass, FieldValue, FlowType, Node, RelationType, Source, Stage};
use dkg_core::policy::{Context, View};
use dkg_core::provenance::ProvenanceLedger;
use dkg_core::store::GraphStore;
use dkg_core::updater::{EntityRef, GraphUpdater, UpdateOutcome};
use dkg_core::cancel::CancelToken;
use dkg_core::view::ViewBuilder;
use proptest::prelude::*;
use std::collections::HashSet;

fn arb_source() -> impl Strategy<Value = Source> {
    prop_oneof![
        Just(Source::Inferred),
        Just(Source::Analyzed),
        Just(Source::Declared),
        Just(Source::UserOverride),
    ]
}

fn arb_stage() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::Rtl),
        Just(Stage::Synthesis),
        Just(Stage::Constraints),
        Just(Stage::Floorplan),
        Just(Stage::Timing),
        Just(Stage::Board),
    ]
}

fn node_store(id: &str) -> (GraphStore, NodeId) {
    let store = GraphStore::new();
    let node_id = NodeId::new(id);
    store.add_node(Node::new(node_id.clone(), id, id, EntityClass::FlipFlop)).unwrap();
    (store, node_id)
}

proptest! {
    /// Invariant #1: after any sequence of writes, the current record's
    /// `(source, stage)` rank is the maximum rank among accepted writes,
    /// equal-rank ties going to the latest (highest-sequence) write.
    #[test]
    fn precedence_monotonicity(writes in prop::collection::vec((arb_source(), arb_stage()), 1..12)) {
        let (store, id) = node_store("n1");
        let ledger = ProvenanceLedger::new(64);
        let updater = GraphUpdater::new();

        // Simulate the expected winner: the write with the highest
        // `(source.rank(), stage.rank())`, latest index breaking ties —
        // every write whose rank is `>=` the running best gets applied,
        // since the sequence counter strictly increases with index.
        let mut best_idx = 0usize;
        let mut best_rank = (writes[0].0.rank(), writes[0].1.rank());
        for (i, (s, st)) in writes.iter().enumerate() {
            let rank = (s.rank(), st.rank());
            if rank >= best_rank {
                best_rank = rank;
                best_idx = i;
            }
        }

        for (i, (source, stage)) in writes.iter().enumerate() {
            updater
                .update_field(
                    &store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
                    FieldValue::Str(format!("v{i}")), *source, *stage, None,
                )
                .unwrap();
        }

        let current = ledger.current("node:n1", "clock_domain").unwrap();
        prop_assert_eq!(current.value, FieldValue::Str(format!("v{best_idx}")));
        prop_assert_eq!(current.source.rank(), best_rank.0);
        prop_assert_eq!(current.stage.rank(), best_rank.1);
    }

    /// Invariant #2: for a deterministic set of writes whose `(source,
    /// stage)` ranks are pairwise distinct (so no same-rank tie can make the
    /// outcome depend on arrival order), any permutation of application
    /// order converges to the same final value and the same provenance
    /// head (source, stage, value — sequence numbers are an internal
    /// tiebreaker and are not part of the equality contract).
    #[test]
    fn stage_order_independence(
        mut pairs in prop::collection::vec((arb_source(), arb_stage()), 1..8),
        seed in any::<u64>(),
    ) {
        // Dedup by (source, stage) rank so every pair is distinguishable by
        // rank alone.
        let mut seen = HashSet::new();
        pairs.retain(|(s, st)| seen.insert((s.rank(), st.rank())));
        prop_assume!(!pairs.is_empty());

        let labeled: Vec<(Source, Stage, String)> = pairs
            .into_iter()
            .enumerate()
            .map(|(i, (s, st))| (s, st, format!("v{i}")))
            .collect();

        let run = |order: &[usize]| {
            let (store, id) = node_store("n1");
            let ledger = ProvenanceLedger::new(64);
            let updater = GraphUpdater::new();
            for &i in order {
                let (source, stage, value) = &labeled[i];
                updater
                    .update_field(
                        &store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
                        FieldValue::Str(value.clone()), *source, *stage, None,
                    )
                    .unwrap();
            }
            ledger.current("node:n1", "clock_domain").unwrap()
        };

        let order_a: Vec<usize> = (0..labeled.len()).collect();
        // A cheap deterministic "shuffle" from the proptest seed: reverse,
        // then rotate — distinct from the identity order whenever there is
        // more than one element.
        let mut order_b = order_a.clone();
        order_b.reverse();
        let rotate_by = (seed as usize) % order_b.len().max(1);
        order_b.rotate_left(rotate_by);

        let a = run(&order_a);
        let b = run(&order_b);

        prop_assert_eq!(a.value, b.value);
        prop_assert_eq!(a.source.rank(), b.source.rank());
        prop_assert_eq!(a.stage.rank(), b.stage.rank());
    }

    /// Invariants #3 and #4 over randomly generated small graphs: every
    /// SuperNode's members are pairwise disjoint and partition the
    /// non-eliminated node set, and every surviving edge belongs to exactly
    /// one SuperEdge.
    #[test]
    fn partition_and_edge_conservation(
        node_count in 2usize..8,
        class_picks in prop::collection::vec(0usize..3, 2..8),
        edge_picks in prop::collection::vec((0usize..8, 0usize..8), 0..10),
    ) {
        let classes = [EntityClass::FlipFlop, EntityClass::Lut, EntityClass::Mux];
        let store = GraphStore::new();
        store.add_node(Node::new(NodeId::new("top"), "top", "top", EntityClass::ModuleInstance)).unwrap();

        let n = node_count.min(class_picks.len());
        let mut ids = Vec::new();
        for i in 0..n {
            let id = NodeId::new(format!("top/n{i}"));
            let class = classes[class_picks[i] % classes.len()];
            store.add_node(Node::new(id.clone(), format!("top/n{i}"), format!("n{i}"), class)).unwrap();
            ids.push(id);
        }

        let mut edge_seq = 0usize;
        for (a, b) in edge_picks {
            if n < 2 {
                break;
            }
            let (a, b) = (a % n, b % n);
            if a == b {
                continue;
            }
            let edge = Edge::new(
                EdgeId::new(format!("e{edge_seq}")),
                ids[a].clone(),
                ids[b].clone(),
                RelationType::Data,
                FlowType::Combinational,
                "sig",
                "top/sig",
            );
            store.add_edge(edge).unwrap();
            edge_seq += 1;
        }

        let builder = ViewBuilder::new();
        let cancel = CancelToken::new();
        let graph = builder.build(&store, Context::Design, View::Connectivity, "design.connectivity", &cancel).unwrap();

        // Partition invariant.
        for node in store.all_nodes() {
            let owners: Vec<_> = graph.nodes.values().filter(|sn| sn.members.contains(&node.id)).collect();
            prop_assert!(owners.len() <= 1, "node {} owned by {} SuperNodes", node.id, owners.len());
        }
        let all_members: HashSet<NodeId> = graph.nodes.values().flat_map(|sn| sn.members.clone()).collect();
        let source_ids: HashSet<NodeId> = store.all_nodes().into_iter().map(|n| n.id).collect();
        // Every SuperNode member traces back to an actual source-graph node.
        for id in &all_members {
            prop_assert!(source_ids.contains(id));
        }

        // Edge conservation: every member-edge set across SuperEdges is
        // pairwise disjoint (each surviving edge belongs to exactly one
        // SuperEdge).
        let mut seen_edges = HashSet::new();
        for se in graph.edges.values() {
            for e in &se.members {
                prop_assert!(seen_edges.insert(e.clone()), "edge {e} claimed by more than one SuperEdge");
            }
        }
    }

    /// Invariant #7: building the same view twice from an unchanged store
    /// produces byte-identical SuperGraphs under the canonical id scheme.
    #[test]
    fn view_determinism(
        node_count in 2usize..8,
        class_picks in prop::collection::vec(0usize..3, 2..8),
        edge_picks in prop::collection::vec((0usize..8, 0usize..8), 0..10),
    ) {
        let classes = [EntityClass::FlipFlop, EntityClass::Lut, EntityClass::Mux];
        let store = GraphStore::new();
        store.add_node(Node::new(NodeId::new("top"), "top", "top", EntityClass::ModuleInstance)).unwrap();

        let n = node_count.min(class_picks.len());
        let mut ids = Vec::new();
        for i in 0..n {
            let id = NodeId::new(format!("top/n{i}"));
            let class = classes[class_picks[i] % classes.len()];
            store.add_node(Node::new(id.clone(), format!("top/n{i}"), format!("n{i}"), class)).unwrap();
            ids.push(id);
        }
        let mut edge_seq = 0usize;
        for (a, b) in edge_picks {
            if n < 2 {
                break;
            }
            let (a, b) = (a % n, b % n);
            if a == b {
                continue;
            }
            let edge = Edge::new(
                EdgeId::new(format!("e{edge_seq}")),
                ids[a].clone(),
                ids[b].clone(),
                RelationType::Data,
                FlowType::Combinational,
                "sig",
                "top/sig",
            );
            store.add_edge(edge).unwrap();
            edge_seq += 1;
        }

        let builder = ViewBuilder::new();
        let cancel = CancelToken::new();
        let first = builder.build(&store, Context::Design, View::Connectivity, "design.connectivity", &cancel).unwrap();
        let second = builder.build(&store, Context::Design, View::Connectivity, "design.connectivity", &cancel).unwrap();

        let first_json = serde_json::to_string(&first).unwrap();
        let second_json = serde_json::to_string(&second).unwrap();
        prop_assert_eq!(first_json, second_json);
    }
}

/// A same-rank write is applied (sequence breaks the tie), never rejected
/// outright — `UpdateOutcome::Rejected` is reserved for strictly
/// lower-ranked attempts. Not itself a `proptest!` property, but a
/// documented precondition the monotonicity property above depends on.
#[test]
fn equal_rank_is_applied_not_rejected() {
    let (store, id) = node_store("n1");
    let ledger = ProvenanceLedger::new(16);
    let updater = GraphUpdater::new();

    updater
        .update_field(&store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
            FieldValue::Str("a".into()), Source::Declared, Stage::Constraints, None)
        .unwrap();
    let outcome = updater
        .update_field(&store, &ledger, EntityRef::Node(id), "clock_domain",
            FieldValue::Str("b".into()), Source::Declared, Stage::Constraints, None)
        .unwrap();
    assert!(matches!(outcome, UpdateOutcome::Applied));
}
