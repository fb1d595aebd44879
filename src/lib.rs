//! Incremental graph fusion engine for hardware design artifacts.
//!
//! A [`store::GraphStore`] holds nodes and edges; every field write runs
//! through the [`updater::GraphUpdater`]'s precedence lattice and is
//! recorded in a [`provenance::ProvenanceLedger`]. Ingestion is organized
//! into stages via [`pipeline::StagePipeline`], constraints are projected
//! onto the graph by pattern via [`constraints::ConstraintProjector`], and
//! [`view::ViewBuilder`] collapses the live graph into a [`supergraph::SuperGraph`]
//! for a given context/view. [`timing::TimingAggregator`] derives timing
//! metrics over a SuperGraph without writing back to the store, and
//! [`bundle::AnalysisBundle`] holds the result. [`query::QueryEngine`]
//! answers structural and reachability questions over the live graph.

pub mod bundle;
pub mod cancel;
pub mod config;
pub mod constraints;
pub mod error;
pub mod export;
pub mod ids;
pub mod ingest;
pub mod model;
pub mod pattern;
pub mod pipeline;
pub mod policy;
pub mod provenance;
pub mod query;
pub mod snapshot;
pub mod store;
pub mod supergraph;
pub mod timing;
pub mod timing_report;
pub mod updater;
pub mod view;

pub use config::DkgConfig;
pub use error::DkgError;
pub use ids::{EdgeId, NodeId, SuperEdgeId, SuperNodeId};
pub use model::{Edge, EntityClass, FieldValue, FlowType, Node, RelationType, Source, Stage};
pub use provenance::ProvenanceLedger;
pub use store::GraphStore;
pub use supergraph::SuperGraph;
pub use updater::GraphUpdater;
