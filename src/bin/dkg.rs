// Exploratory CLI: run the stage pipeline over whatever ingestors are
// registered, build a view, and print the graph plus aggregated timing as
// JSON. Not the library's primary interface — the library is meant to be
// embedded; this binary exists for poking at it by hand.

use dkg_core::cancel::CancelToken;
use dkg_core::config::DkgConfig;
use dkg_core::export::{export_graph, export_supergraph};
use dkg_core::pipeline::StagePipeline;
use dkg_core::policy::{Context, View};
use dkg_core::timing::TimingAggregator;
use dkg_core::view::ViewBuilder;
use dkg_core::{GraphStore, GraphUpdater, ProvenanceLedger};
use std::env;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match env::args().nth(1) {
        Some(path) => DkgConfig::load(&path).unwrap_or_else(|e| {
            eprintln!("warning: failed to load config at {path}: {e}. Using defaults.");
            DkgConfig::default()
        }),
        None => DkgConfig::default(),
    };

    info!(?config, "starting dkg exploratory run");

    let store = GraphStore::new();
    let ledger = ProvenanceLedger::new(config.provenance_history_depth);
    let updater = GraphUpdater::new();
    let cancel = CancelToken::new();

    // No ingestors are registered by default; callers embedding this
    // library register their own before calling `run_all`.
    let pipeline = StagePipeline::new();
    pipeline.run_all(&store, &ledger, &updater, &cancel)?;

    let builder = ViewBuilder::new();
    let graph = builder.build(&store, Context::Design, View::Connectivity, "design.connectivity", &cancel)?;

    let aggregator = TimingAggregator::new(config.timing_critical_slack_ns, config.timing_near_critical_alpha);
    let bundle = dkg_core::bundle::AnalysisBundle::new();
    let summary = aggregator.aggregate_into_bundle(&store, &graph, &bundle);

    println!("{}", serde_json::to_string_pretty(&export_graph(&store))?);
    println!("{}", serde_json::to_string_pretty(&export_supergraph(&graph, Some(&bundle)))?);
    println!("alerts: {}", summary.alerts.len());

    Ok(())
}
