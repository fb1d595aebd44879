//! The Stage Pipeline.
//!
//! Ingestors register themselves against a [`Stage`], and the pipeline
//! runs all ingestors for a stage in registration order, then stages in
//! their canonical rank order (`Rtl < Synthesis < Constraints < Floorplan
//! < Timing < Board`).

use crate::cancel::CancelToken;
use crate::error::DkgError;
use crate::model::Stage;
use crate::provenance::ProvenanceLedger;
use crate::store::GraphStore;
use crate::updater::GraphUpdater;

/// Summary of one ingestor's run, enough to verify idempotency under
/// re-running a deterministic ingestor.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub applied: usize,
    pub rejected: usize,
    /// One entry per ingestor that returned an error this stage, named by
    /// ingestor, not swallowed — an ingestor failure marks the stage
    /// partially failed rather than aborting the remaining ingestors.
    pub errors: Vec<(String, String)>,
}

impl IngestReport {
    fn merge(&mut self, other: IngestReport) {
        self.applied += other.applied;
        self.rejected += other.rejected;
        self.errors.extend(other.errors);
    }

    /// True if every ingestor that ran for this stage returned cleanly.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// One named unit of work bound to a stage. Implementations are expected to
/// be deterministic: given the same store contents, running twice produces
/// the same final field values (though not necessarily the same ledger
/// sequence numbers — see `ProvenanceRecord::sequence`).
pub trait Ingestor: Send + Sync {
    fn name(&self) -> &str;
    fn stage(&self) -> Stage;

    fn run(
        &self,
        store: &GraphStore,
        ledger: &ProvenanceLedger,
        updater: &GraphUpdater,
    ) -> Result<IngestReport, DkgError>;
}

/// Stage -> registered ingestors, in registration order.
#[derive(Default)]
pub struct StagePipeline {
    registry: Vec<(Stage, Box<dyn Ingestor>)>,
}

impl StagePipeline {
    pub fn new() -> Self {
        Self { registry: Vec::new() }
    }

    pub fn register_ingestor(&mut self, ingestor: Box<dyn Ingestor>) {
        let stage = ingestor.stage();
        self.registry.push((stage, ingestor));
    }

    /// Run every ingestor registered for `stage`, in registration order. An
    /// ingestor error does not abort the stage — the remaining ingestors
    /// for this stage still run, and the failure is recorded on
    /// `IngestReport::errors` so the stage is reported as partially failed
    /// rather than silently incomplete.
    pub fn run_stage(
        &self,
        stage: Stage,
        store: &GraphStore,
        ledger: &ProvenanceLedger,
        updater: &GraphUpdater,
    ) -> Result<IngestReport, DkgError> {
        let mut report = IngestReport::default();
        for (s, ingestor) in &self.registry {
            if *s != stage {
                continue;
            }
            tracing::info!(stage = ?stage, ingestor = ingestor.name(), "running ingestor");
            match ingestor.run(store, ledger, updater) {
                Ok(partial) => report.merge(partial),
                Err(e) => {
                    tracing::warn!(stage = ?stage, ingestor = ingestor.name(), error = %e, "ingestor failed, continuing with remaining ingestors");
                    report.errors.push((ingestor.name().to_string(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Run every registered stage in canonical rank order, checking the
    /// cancellation token between stages (between logical phases, not
    /// inside a stage's own work).
    pub fn run_all(
        &self,
        store: &GraphStore,
        ledger: &ProvenanceLedger,
        updater: &GraphUpdater,
        cancel: &CancelToken,
    ) -> Result<Vec<(Stage, IngestReport)>, DkgError> {
        let ordered = [
            Stage::Rtl,
            Stage::Synthesis,
            Stage::Constraints,
            Stage::Floorplan,
            Stage::Timing,
            Stage::Board,
        ];

        let mut results = Vec::new();
        for stage in ordered {
            if cancel.is_cancelled() {
                break;
            }
            let report = self.run_stage(stage, store, ledger, updater)?;
            results.push((stage, report));
        }
        Ok(results)
    }
}
