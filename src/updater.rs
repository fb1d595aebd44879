//! The Graph Updater — the *only* writer of node/edge fields.
//!
//! An ordered sequence of preconditions gates a single state-changing
//! operation, and the precondition failures are distinct, named error
//! variants rather than a single boolean. Here the "precondition" is a
//! numeric rank comparison against the field's current provenance record
//! instead of a fixed checklist, because the precedence lattice is itself
//! a total order rather than a yes/no gate.

use crate::error::UpdaterError;
use crate::ids::{EdgeId, NodeId};
use crate::model::{FieldValue, Source, Stage};
use crate::provenance::{ProvenanceLedger, ProvenanceRecord};
use crate::store::GraphStore;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which entity a field write targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Node(NodeId),
    Edge(EdgeId),
}

impl EntityRef {
    fn key(&self) -> String {
        match self {
            EntityRef::Node(id) => format!("node:{}", id.0),
            EntityRef::Edge(id) => format!("edge:{}", id.0),
        }
    }
}

/// Where a write's value originated, for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Origin {
    pub file: Option<String>,
    pub line: Option<u32>,
}

/// Outcome of a single `update_field` call.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Applied,
    Rejected(ProvenanceRecord),
}

/// A non-fatal diagnostic surfaced alongside an `Applied` outcome — the
/// open question in spec §9 on same-rank `Declared` conflicts: neither
/// record is dropped (the ledger keeps both), but the disagreement is
/// worth a warning rather than being silently resolved by "latest wins".
#[derive(Debug, Clone)]
pub struct ConflictingDeclaration {
    pub entity: String,
    pub field: String,
    pub previous: FieldValue,
    pub applied: FieldValue,
}

/// Declared type of each known writable field, used to produce
/// `TypeMismatch` rather than silently accepting the wrong shape.
fn expected_type(field: &str) -> Option<&'static str> {
    match field {
        "clock_domain" | "timing_exception" | "clock_signal" | "reset_signal" => Some("str"),
        "slack" | "arrival_time" | "required_time" | "delay" => Some("f64"),
        _ if field.starts_with("attr:") => None, // free-form, no prior declared type
        _ => None,
    }
}

/// The precedence-gated writer. Holds no state of its own beyond a
/// monotonic sequence counter used to break same-rank ties by "later
/// write" — a stable per-process sequence, not wall time, so the tiebreak
/// stays deterministic under re-ordering of stage execution.
pub struct GraphUpdater {
    sequence: AtomicU64,
    /// Same-rank `Declared`-vs-`Declared` (or any other equal-rank) value
    /// disagreements, accumulated across this updater's lifetime. Never
    /// consulted by `update_field` itself — purely a diagnostics sink for
    /// callers (the Stage Pipeline, the `dkg` binary) to surface.
    diagnostics: RwLock<Vec<ConflictingDeclaration>>,
}

impl Default for GraphUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphUpdater {
    pub fn new() -> Self {
        Self { sequence: AtomicU64::new(0), diagnostics: RwLock::new(Vec::new()) }
    }

    /// Diagnostics accumulated so far, oldest first.
    pub fn diagnostics(&self) -> Vec<ConflictingDeclaration> {
        self.diagnostics.read().clone()
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Precedence-gated field write.
    ///
    /// Succeeds iff `(source, stage)`'s rank is `>=` the field's current
    /// record rank; equal rank is broken by sequence (later write wins).
    /// On success: store updated, ledger appended. On rejection: no side
    /// effects, the current record is returned unchanged.
    pub fn update_field(
        &self,
        store: &GraphStore,
        ledger: &ProvenanceLedger,
        entity: EntityRef,
        field: &str,
        new_value: FieldValue,
        source: Source,
        stage: Stage,
        origin: Option<Origin>,
    ) -> Result<UpdateOutcome, UpdaterError> {
        let entity_key = entity.key();

        if let Some(expected) = expected_type(field) {
            if new_value.type_name() != expected {
                return Err(UpdaterError::TypeMismatch {
                    entity: entity_key,
                    field: field.to_string(),
                    expected,
                    got: new_value.type_name(),
                });
            }
        }

        match &entity {
            EntityRef::Node(id) => {
                if !store.has_node(id) {
                    return Err(UpdaterError::NoSuchEntity(id.0.clone()));
                }
            }
            EntityRef::Edge(id) => {
                if store.get_edge(id).is_none() {
                    return Err(UpdaterError::NoSuchEntity(id.0.clone()));
                }
            }
        }

        let sequence = self.next_sequence();
        let incoming_rank = (source.rank(), stage.rank(), sequence);

        let mut conflict = None;
        if let Some(current) = ledger.current(&entity_key, field) {
            if incoming_rank <= current.rank_key() {
                return Ok(UpdateOutcome::Rejected(current));
            }
            let same_rank = current.source.rank() == source.rank() && current.stage.rank() == stage.rank();
            if same_rank && current.value != new_value {
                conflict = Some(ConflictingDeclaration {
                    entity: entity_key.clone(),
                    field: field.to_string(),
                    previous: current.value.clone(),
                    applied: new_value.clone(),
                });
            }
        }

        let record = ProvenanceRecord {
            value: new_value.clone(),
            stage,
            source,
            origin_file: origin.as_ref().and_then(|o| o.file.clone()),
            origin_line: origin.as_ref().and_then(|o| o.line),
            sequence,
        };

        self.apply(store, &entity, field, &new_value);
        ledger.append(&entity_key, field, record);

        tracing::debug!(entity = %entity_key, field, ?source, ?stage, "field update applied");

        if let Some(conflict) = conflict {
            tracing::warn!(entity = %conflict.entity, field = %conflict.field, "conflicting declaration at equal rank");
            self.diagnostics.write().push(conflict);
        }

        Ok(UpdateOutcome::Applied)
    }

    /// Mutate the store field directly; only ever called after the
    /// precedence check above has already passed.
    fn apply(&self, store: &GraphStore, entity: &EntityRef, field: &str, value: &FieldValue) {
        match entity {
            EntityRef::Node(id) => {
                if let Some(mut node) = store.get_node(id) {
                    match field {
                        "clock_domain" => node.clock_domain = value.as_str().map(|s| s.to_string()),
                        "timing_exception" => node.timing_exception = value.as_str().map(|s| s.to_string()),
                        "clock_signal" => node.clock_signal = value.as_str().map(|s| s.to_string()),
                        "reset_signal" => node.reset_signal = value.as_str().map(|s| s.to_string()),
                        "slack" => node.slack = value.as_f64(),
                        "arrival_time" => node.arrival_time = value.as_f64(),
                        "required_time" => node.required_time = value.as_f64(),
                        attr if attr.starts_with("attr:") => {
                            node.attributes.insert(attr["attr:".len()..].to_string(), value.clone());
                        }
                        _ => {}
                    }
                    store.replace_node(node);
                }
            }
            EntityRef::Edge(id) => {
                if let Some(mut edge) = store.get_edge(id) {
                    match field {
                        "delay" => edge.delay = value.as_f64(),
                        "slack" => edge.slack = value.as_f64(),
                        "timing_exception" => edge.timing_exception = value.as_str().map(|s| s.to_string()),
                        "clock_domain" => edge.clock_domain = value.as_str().map(|s| s.to_string()),
                        attr if attr.starts_with("attr:") => {
                            edge.attributes.insert(attr["attr:".len()..].to_string(), value.clone());
                        }
                        _ => {}
                    }
                    store.replace_edge(edge);
                }
            }
        }
    }

    /// Bulk clock-domain write helper, semantics identical to calling
    /// `update_field` once per entry.
    pub fn batch_update_clock_domains(
        &self,
        store: &GraphStore,
        ledger: &ProvenanceLedger,
        updates: &[(NodeId, String)],
        source: Source,
        stage: Stage,
    ) -> Vec<(NodeId, Result<UpdateOutcome, UpdaterError>)> {
        updates
            .iter()
            .map(|(id, domain)| {
                let outcome = self.update_field(
                    store,
                    ledger,
                    EntityRef::Node(id.clone()),
                    "clock_domain",
                    FieldValue::Str(domain.clone()),
                    source,
                    stage,
                    None,
                );
                (id.clone(), outcome)
            })
            .collect()
    }

    /// Bulk timing write helper, defaulting to `(source=Analyzed,
    /// stage=Timing)` per element.
    pub fn batch_update_timing(
        &self,
        store: &GraphStore,
        ledger: &ProvenanceLedger,
        updates: &[(NodeId, Option<f64>, Option<f64>, Option<f64>, Option<f64>)],
    ) -> Vec<(NodeId, Vec<Result<UpdateOutcome, UpdaterError>>)> {
        updates
            .iter()
            .map(|(id, delay, slack, arrival, required)| {
                let mut outcomes = Vec::new();
                // `delay` is an edge-only field; on a node update it is
                // simply skipped — callers batch-updating node timing pass
                // `None` for it.
                let _ = delay;
                if let Some(v) = slack {
                    outcomes.push(self.update_field(
                        store, ledger, EntityRef::Node(id.clone()), "slack",
                        FieldValue::F64(*v), Source::Analyzed, Stage::Timing, None,
                    ));
                }
                if let Some(v) = arrival {
                    outcomes.push(self.update_field(
                        store, ledger, EntityRef::Node(id.clone()), "arrival_time",
                        FieldValue::F64(*v), Source::Analyzed, Stage::Timing, None,
                    ));
                }
                if let Some(v) = required {
                    outcomes.push(self.update_field(
                        store, ledger, EntityRef::Node(id.clone()), "required_time",
                        FieldValue::F64(*v), Source::Analyzed, Stage::Timing, None,
                    ));
                }
                (id.clone(), outcomes)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityClass, Node};

    fn setup() -> (GraphStore, ProvenanceLedger, GraphUpdater, NodeId) {
        let store = GraphStore::new();
        let id = NodeId::new("n1");
        store.add_node(Node::new(id.clone(), "n1", "n1", EntityClass::FlipFlop)).unwrap();
        (store, ProvenanceLedger::new(16), GraphUpdater::new(), id)
    }

    /// A later-arriving Inferred write never displaces an already-applied
    /// Declared write, regardless of arrival order.
    #[test]
    fn higher_ranked_write_survives_a_later_lower_ranked_attempt() {
        let (store, ledger, updater, id) = setup();

        updater
            .update_field(&store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
                FieldValue::Str("clk".into()), Source::Inferred, Stage::Rtl, None)
            .unwrap();

        updater
            .update_field(&store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
                FieldValue::Str("sys_clk".into()), Source::Declared, Stage::Constraints, None)
            .unwrap();

        let outcome = updater
            .update_field(&store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
                FieldValue::Str("clk".into()), Source::Inferred, Stage::Rtl, None)
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::Rejected(_)));

        let node = store.get_node(&id).unwrap();
        assert_eq!(node.clock_domain.as_deref(), Some("sys_clk"));
        assert!(ledger.depth("node:n1", "clock_domain") >= 3);
    }

    /// Once a UserOverride write lands, no lower-ranked source can
    /// displace it.
    #[test]
    fn user_override_is_final() {
        let (store, ledger, updater, id) = setup();

        updater
            .update_field(&store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
                FieldValue::Str("clk".into()), Source::Inferred, Stage::Rtl, None)
            .unwrap();
        updater
            .update_field(&store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
                FieldValue::Str("sys_clk".into()), Source::Declared, Stage::Constraints, None)
            .unwrap();
        updater
            .update_field(&store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
                FieldValue::Str("my_clk".into()), Source::UserOverride, Stage::Constraints, None)
            .unwrap();

        let outcome = updater
            .update_field(&store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
                FieldValue::Str("sys_clk".into()), Source::Declared, Stage::Constraints, None)
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::Rejected(_)));

        let node = store.get_node(&id).unwrap();
        assert_eq!(node.clock_domain.as_deref(), Some("my_clk"));
    }

    #[test]
    fn type_mismatch_is_a_hard_error_not_a_reject() {
        let (store, ledger, updater, id) = setup();
        let err = updater
            .update_field(&store, &ledger, EntityRef::Node(id), "slack",
                FieldValue::Str("not a number".into()), Source::Analyzed, Stage::Timing, None)
            .unwrap_err();
        assert!(matches!(err, UpdaterError::TypeMismatch { .. }));
    }

    #[test]
    fn missing_entity_is_no_such_entity() {
        let store = GraphStore::new();
        let ledger = ProvenanceLedger::new(16);
        let updater = GraphUpdater::new();
        let err = updater
            .update_field(&store, &ledger, EntityRef::Node(NodeId::new("ghost")), "slack",
                FieldValue::F64(1.0), Source::Analyzed, Stage::Timing, None)
            .unwrap_err();
        assert!(matches!(err, UpdaterError::NoSuchEntity(_)));
    }

    /// Two `Declared` writes at equal rank that actually disagree leave a
    /// diagnostic behind rather than silently resolving; writes that agree
    /// leave no diagnostic.
    #[test]
    fn same_rank_value_disagreement_is_recorded_as_a_diagnostic() {
        let (store, ledger, updater, id) = setup();
        updater
            .update_field(&store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
                FieldValue::Str("sdc_a".into()), Source::Declared, Stage::Constraints, None)
            .unwrap();
        updater
            .update_field(&store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
                FieldValue::Str("sdc_b".into()), Source::Declared, Stage::Constraints, None)
            .unwrap();

        let diagnostics = updater.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].previous, FieldValue::Str("sdc_a".into()));
        assert_eq!(diagnostics[0].applied, FieldValue::Str("sdc_b".into()));
        // the ledger still holds both records; nothing was silently dropped
        assert_eq!(ledger.depth("node:n1", "clock_domain"), 2);
    }

    #[test]
    fn equal_rank_tie_is_broken_by_later_write() {
        let (store, ledger, updater, id) = setup();
        updater
            .update_field(&store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
                FieldValue::Str("a".into()), Source::Declared, Stage::Constraints, None)
            .unwrap();
        let outcome = updater
            .update_field(&store, &ledger, EntityRef::Node(id.clone()), "clock_domain",
                FieldValue::Str("b".into()), Source::Declared, Stage::Constraints, None)
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::Applied));
        assert_eq!(store.get_node(&id).unwrap().clock_domain.as_deref(), Some("b"));
    }
}
