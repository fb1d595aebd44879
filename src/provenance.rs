//! Per-field provenance ledger: an append-only history behind a `RwLock`,
//! queried but never mutated in place, keyed per `(entity_id, field)`.

use crate::model::{FieldValue, Source, Stage};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One written value plus the lineage that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub value: FieldValue,
    pub stage: Stage,
    pub source: Source,
    pub origin_file: Option<String>,
    pub origin_line: Option<u32>,
    /// Monotonic per-ingestor sequence number, not wall time — this is
    /// what the precedence tiebreak's "latest write" actually means.
    pub sequence: u64,
}

impl ProvenanceRecord {
    /// Lexicographic `(source rank, stage rank, sequence)` used by the
    /// precedence lattice.
    pub fn rank_key(&self) -> (u8, u8, u64) {
        (self.source.rank(), self.stage.rank(), self.sequence)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FieldKey {
    entity_id: String,
    field: String,
}

struct FieldHistory {
    /// Index into `history` of the current head. `history[head]` is always
    /// the most-recently-accepted record.
    head: usize,
    history: Vec<ProvenanceRecord>,
}

/// Per-`(entity, field)` append-only history, bounded to a configurable
/// depth so long-lived ledgers don't grow unboundedly.
pub struct ProvenanceLedger {
    fields: RwLock<HashMap<FieldKey, FieldHistory>>,
    max_history_depth: usize,
}

impl ProvenanceLedger {
    pub fn new(max_history_depth: usize) -> Self {
        Self {
            fields: RwLock::new(HashMap::new()),
            max_history_depth: max_history_depth.max(1),
        }
    }

    /// Current record for `(entity_id, field)`, if any write has landed.
    pub fn current(&self, entity_id: &str, field: &str) -> Option<ProvenanceRecord> {
        let key = FieldKey { entity_id: entity_id.to_string(), field: field.to_string() };
        self.fields.read().get(&key).map(|h| h.history[h.head].clone())
    }

    /// Full chronological history (oldest first), may be truncated at
    /// `max_history_depth`.
    pub fn history(&self, entity_id: &str, field: &str) -> Vec<ProvenanceRecord> {
        let key = FieldKey { entity_id: entity_id.to_string(), field: field.to_string() };
        self.fields
            .read()
            .get(&key)
            .map(|h| h.history.clone())
            .unwrap_or_default()
    }

    /// Append a new record as the head, evicting the oldest entry once the
    /// bound is exceeded. Never called for rejected writes.
    pub fn append(&self, entity_id: &str, field: &str, record: ProvenanceRecord) {
        let key = FieldKey { entity_id: entity_id.to_string(), field: field.to_string() };
        let mut fields = self.fields.write();
        let entry = fields.entry(key).or_insert_with(|| FieldHistory { head: 0, history: Vec::new() });

        entry.history.push(record);
        if entry.history.len() > self.max_history_depth {
            entry.history.remove(0);
        }
        entry.head = entry.history.len() - 1;
    }

    pub fn depth(&self, entity_id: &str, field: &str) -> usize {
        self.history(entity_id, field).len()
    }

    /// Seed this ledger's current records from a persisted snapshot's
    /// `current_fields` map, keyed `"{entity_key}::{field}"` (the same
    /// `entity_key` `EntityRef::key()` produces, e.g. `"node:top/ff1"`).
    /// Each entry becomes the sole history record for that field — a
    /// restored ledger starts at history depth 1, not the depth it had
    /// when snapshotted, since only the current head is persisted.
    pub fn seed_current(&self, records: &HashMap<String, ProvenanceRecord>) {
        let mut fields = self.fields.write();
        for (composite_key, record) in records {
            let Some((entity_id, field)) = composite_key.split_once("::") else { continue };
            let key = FieldKey { entity_id: entity_id.to_string(), field: field.to_string() };
            fields.insert(key, FieldHistory { head: 0, history: vec![record.clone()] });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValue;

    fn rec(value: &str, stage: Stage, source: Source, seq: u64) -> ProvenanceRecord {
        ProvenanceRecord {
            value: FieldValue::Str(value.to_string()),
            stage,
            source,
            origin_file: None,
            origin_line: None,
            sequence: seq,
        }
    }

    #[test]
    fn append_then_current_returns_head() {
        let ledger = ProvenanceLedger::new(16);
        ledger.append("n1", "clock_domain", rec("clk", Stage::Rtl, Source::Inferred, 0));
        ledger.append("n1", "clock_domain", rec("sys_clk", Stage::Constraints, Source::Declared, 1));

        let current = ledger.current("n1", "clock_domain").unwrap();
        assert_eq!(current.value, FieldValue::Str("sys_clk".to_string()));
        assert_eq!(ledger.depth("n1", "clock_domain"), 2);
    }

    #[test]
    fn history_bounded_to_configured_depth() {
        let ledger = ProvenanceLedger::new(3);
        for i in 0..10 {
            ledger.append("n1", "slack", rec(&i.to_string(), Stage::Timing, Source::Analyzed, i));
        }
        assert_eq!(ledger.depth("n1", "slack"), 3);
        let current = ledger.current("n1", "slack").unwrap();
        assert_eq!(current.value, FieldValue::Str("9".to_string()));
    }

    #[test]
    fn unwritten_field_has_no_current_record() {
        let ledger = ProvenanceLedger::new(16);
        assert!(ledger.current("n1", "slack").is_none());
    }

    #[test]
    fn seed_current_restores_a_readable_head() {
        let ledger = ProvenanceLedger::new(16);
        let mut records = HashMap::new();
        records.insert("node:n1::clock_domain".to_string(), rec("sys_clk", Stage::Constraints, Source::Declared, 5));
        ledger.seed_current(&records);

        let current = ledger.current("node:n1", "clock_domain").unwrap();
        assert_eq!(current.value, FieldValue::Str("sys_clk".to_string()));
        assert_eq!(ledger.depth("node:n1", "clock_domain"), 1);
    }
}
