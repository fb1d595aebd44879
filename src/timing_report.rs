//! Timing report wire type and the helper that folds it into field updates.
//! A timing report is a batch of per-path measurements; turning it into
//! graph writes is the Updater's job, not this module's — `load_timing_report`
//! only shapes the batch into `update_field` calls.

use crate::error::UpdaterError;
use crate::ids::{EdgeId, NodeId};
use crate::model::{FieldValue, Source, Stage};
use crate::provenance::ProvenanceLedger;
use crate::store::GraphStore;
use crate::updater::{EntityRef, GraphUpdater, UpdateOutcome};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One path row of a timing analysis tool's report: a single launch-to-
/// capture path through the graph, carrying path-level scalars plus a
/// per-edge delay breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingPathRecord {
    pub startpoint: NodeId,
    pub endpoint: NodeId,
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    pub slack: Option<f64>,
    pub arrival: Option<f64>,
    pub required: Option<f64>,
    pub delay_per_edge: HashMap<EdgeId, f64>,
}

/// Outcome of folding one `TimingPathRecord` into the store: one
/// node-field outcome per node on the reported path, one edge-delay
/// outcome per entry in `delay_per_edge`.
#[derive(Debug, Clone)]
pub struct TimingReportOutcome {
    pub node_outcomes: Vec<(NodeId, Vec<Result<UpdateOutcome, UpdaterError>>)>,
    pub edge_outcomes: Vec<(EdgeId, Result<UpdateOutcome, UpdaterError>)>,
}

/// Fold a batch of `TimingPathRecord`s into the store via the Updater.
///
/// The report's path-level `slack`/`arrival`/`required` scalars describe
/// the whole path, but the graph only has per-entity fields to hold them —
/// the spec doesn't disambiguate whether they apply to the endpoint alone
/// or to every node the path passes through. This applies them to every
/// node in `record.nodes` (endpoint included), on the reading that a
/// node's worst reported slack along any path is what a timing-closure
/// tool cares about; `update_field`'s precedence gate means a node visited
/// by multiple paths simply keeps whichever write ranks highest, so this
/// choice cannot regress a more authoritative value. `delay_per_edge`
/// writes the `delay` field on each named edge directly.
pub fn load_timing_report(
    store: &GraphStore,
    ledger: &ProvenanceLedger,
    updater: &GraphUpdater,
    records: &[TimingPathRecord],
) -> Vec<TimingReportOutcome> {
    records
        .iter()
        .map(|record| {
            let node_batch: Vec<(NodeId, Option<f64>, Option<f64>, Option<f64>, Option<f64>)> = record
                .nodes
                .iter()
                .map(|id| (id.clone(), None, record.slack, record.arrival, record.required))
                .collect();
            let node_outcomes = updater.batch_update_timing(store, ledger, &node_batch);

            let edge_outcomes = record
                .delay_per_edge
                .iter()
                .map(|(edge_id, delay)| {
                    let outcome = updater.update_field(
                        store,
                        ledger,
                        EntityRef::Edge(edge_id.clone()),
                        "delay",
                        FieldValue::F64(*delay),
                        Source::Analyzed,
                        Stage::Timing,
                        None,
                    );
                    (edge_id.clone(), outcome)
                })
                .collect();

            TimingReportOutcome { node_outcomes, edge_outcomes }
        })
        .collect()
}
