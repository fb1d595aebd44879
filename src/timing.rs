//! The Timing Aggregator: a pure, read-only pass over a SuperGraph that
//! derives per-SuperNode and per-SuperEdge timing statistics, plus a
//! whole-graph summary and alerts. It never writes a field itself —
//! derived numbers are attached via the Analysis Bundle API, not pushed
//! back through the Updater. Per-SuperNode/SuperEdge aggregation is
//! embarrassingly parallel, so it runs over `rayon`'s `par_iter` instead
//! of a sequential fold.

use crate::bundle::{AnalysisBundle, AnalysisKind, AnalysisValue};
use crate::model::{Edge, FlowType, Node};
use crate::store::GraphStore;
use crate::supergraph::SuperGraph;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Linear-interpolation percentile over an already-sorted slice, `p` in
/// `[0.0, 100.0]`. Empty input yields `None`.
fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        Some(sorted[lo])
    } else {
        let frac = rank - lo as f64;
        Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
    }
}

fn sorted_values(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.collect();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap());
    v
}

/// Per-SuperNode timing aggregate, derived from member nodes that carry
/// `slack`/`arrival_time`/`required_time`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingNodeMetrics {
    pub super_node_hex: String,
    /// `NaN` if no member carries a slack value.
    pub min_slack: f64,
    pub p5_slack: Option<f64>,
    pub max_arrival_time: Option<f64>,
    pub min_required_time: Option<f64>,
    pub critical_node_ratio: f64,
    pub near_critical_ratio: f64,
    /// `None` when every timing input is missing across the cluster.
    pub timing_risk_score: Option<f64>,
    pub member_count: usize,
}

/// Per-SuperEdge timing aggregate, derived from member edges that carry
/// `delay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingEdgeMetrics {
    pub super_edge_hex: String,
    pub max_delay: Option<f64>,
    pub p95_delay: Option<f64>,
    pub flow_type_histogram: BTreeMap<FlowType, usize>,
    pub fanout_max: Option<usize>,
    pub fanout_p95: Option<usize>,
    pub member_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warn,
    Error,
}

/// A derived observation, never a write — callers decide whether an alert
/// warrants a subsequent `Declared`/`UserOverride` field update of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingAlert {
    pub severity: AlertSeverity,
    pub entity_ref: String,
    pub reason: String,
}

/// Whole-graph timing rollup, independent of any single SuperNode/SuperEdge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSummary {
    pub worst_slack: Option<f64>,
    pub violation_count: usize,
    pub near_critical_count: usize,
    pub clock_period: Option<f64>,
    pub analysis_mode: String,
    pub node_metrics: Vec<TimingNodeMetrics>,
    pub edge_metrics: Vec<TimingEdgeMetrics>,
    pub alerts: Vec<TimingAlert>,
}

impl Default for TimingSummary {
    fn default() -> Self {
        Self {
            worst_slack: None,
            violation_count: 0,
            near_critical_count: 0,
            clock_period: None,
            analysis_mode: "empty".to_string(),
            node_metrics: Vec::new(),
            edge_metrics: Vec::new(),
            alerts: Vec::new(),
        }
    }
}

/// Default critical ratio threshold (ns) and near-critical coefficient:
/// `threshold = 0`, `alpha = 0.1`.
pub const DEFAULT_CRITICAL_SLACK_NS: f64 = 0.0;
pub const DEFAULT_NEAR_CRITICAL_ALPHA: f64 = 0.1;

pub struct TimingAggregator {
    pub critical_slack_ns: f64,
    pub near_critical_alpha: f64,
}

impl Default for TimingAggregator {
    fn default() -> Self {
        Self {
            critical_slack_ns: DEFAULT_CRITICAL_SLACK_NS,
            near_critical_alpha: DEFAULT_NEAR_CRITICAL_ALPHA,
        }
    }
}

impl TimingAggregator {
    pub fn new(critical_slack_ns: f64, near_critical_alpha: f64) -> Self {
        Self { critical_slack_ns, near_critical_alpha }
    }

    /// The clock period (ns) associated with a member set, found by looking
    /// up each member's `clock_domain` against the `clock_period` attribute
    /// the Constraint Projector writes onto the clock-source node. Returns
    /// the first period found; `None` if no member's domain resolves to one.
    fn cluster_clock_period(&self, store: &GraphStore, members: &[Node]) -> Option<f64> {
        for member in members {
            let domain = member.clock_domain.as_deref()?;
            if let Some(period) = store
                .all_nodes()
                .into_iter()
                .find(|n| n.clock_domain.as_deref() == Some(domain))
                .and_then(|n| n.attributes.get("clock_period").and_then(|v| v.as_f64()))
            {
                return Some(period);
            }
        }
        None
    }

    fn node_metrics(&self, store: &GraphStore, hex: &str, members: &[Node]) -> TimingNodeMetrics {
        let slacks = sorted_values(members.iter().filter_map(|n| n.slack));
        let min_slack = slacks.first().copied().unwrap_or(f64::NAN);
        let p5_slack = percentile(&slacks, 5.0);
        let max_arrival_time =
            members.iter().filter_map(|n| n.arrival_time).fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))));
        let min_required_time =
            members.iter().filter_map(|n| n.required_time).fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))));

        let member_count = members.len();
        let critical_node_ratio = if member_count == 0 {
            0.0
        } else {
            members.iter().filter(|n| n.slack.is_some_and(|s| s <= self.critical_slack_ns)).count() as f64
                / member_count as f64
        };

        let clock_period = self.cluster_clock_period(store, members);
        let near_critical_ratio = match clock_period {
            Some(period) if member_count > 0 => {
                members
                    .iter()
                    .filter(|n| n.slack.is_some_and(|s| s < self.near_critical_alpha * period))
                    .count() as f64
                    / member_count as f64
            }
            _ => 0.0,
        };

        let has_any_timing_input = members.iter().any(|n| n.slack.is_some() || n.arrival_time.is_some() || n.required_time.is_some());
        let timing_risk_score = if has_any_timing_input {
            let worst = if min_slack.is_nan() { 0.0 } else { (-min_slack).max(0.0) };
            Some(10.0 * critical_node_ratio + 5.0 * near_critical_ratio + worst)
        } else {
            None
        };

        TimingNodeMetrics {
            super_node_hex: hex.to_string(),
            min_slack,
            p5_slack,
            max_arrival_time,
            min_required_time,
            critical_node_ratio,
            near_critical_ratio,
            timing_risk_score,
            member_count,
        }
    }

    fn edge_metrics(&self, store: &GraphStore, hex: &str, members: &[Edge]) -> TimingEdgeMetrics {
        let delays = sorted_values(members.iter().filter_map(|e| e.delay));
        let max_delay = delays.last().copied();
        let p95_delay = percentile(&delays, 95.0);

        let mut histogram: BTreeMap<FlowType, usize> = BTreeMap::new();
        for edge in members {
            *histogram.entry(edge.flow_type).or_insert(0) += 1;
        }

        let fanouts = sorted_values(
            members.iter().map(|e| store.out_edges(&e.source).len() as f64),
        );
        let fanout_max = fanouts.last().map(|v| *v as usize);
        let fanout_p95 = percentile(&fanouts, 95.0).map(|v| v.round() as usize);

        TimingEdgeMetrics {
            super_edge_hex: hex.to_string(),
            max_delay,
            p95_delay,
            flow_type_histogram: histogram,
            fanout_max,
            fanout_p95,
            member_count: members.len(),
        }
    }

    /// Aggregate per-SuperNode and per-SuperEdge timing metrics over every
    /// member in `graph`, reading (never writing) `store`.
    pub fn aggregate(&self, store: &GraphStore, graph: &SuperGraph) -> TimingSummary {
        let node_metrics: Vec<TimingNodeMetrics> = graph
            .nodes
            .par_iter()
            .map(|(hex, super_node)| {
                let members: Vec<Node> = super_node.members.iter().filter_map(|id| store.get_node(id)).collect();
                self.node_metrics(store, hex, &members)
            })
            .collect();

        let edge_metrics: Vec<TimingEdgeMetrics> = graph
            .edges
            .par_iter()
            .map(|(hex, super_edge)| {
                let members: Vec<Edge> = super_edge.members.iter().filter_map(|id| store.get_edge(id)).collect();
                self.edge_metrics(store, hex, &members)
            })
            .collect();

        let alerts = self.generate_alerts(&node_metrics, &edge_metrics);

        let worst_slack = node_metrics
            .iter()
            .map(|m| m.min_slack)
            .filter(|s| !s.is_nan())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))));
        let violation_count = node_metrics.iter().filter(|m| !m.min_slack.is_nan() && m.min_slack <= self.critical_slack_ns).count();
        let near_critical_count = node_metrics.iter().filter(|m| m.near_critical_ratio > 0.0).count();
        let clock_period = node_metrics.iter().find_map(|m| {
            let members: Vec<Node> = graph
                .nodes
                .get(&m.super_node_hex)
                .map(|sn| sn.members.iter().filter_map(|id| store.get_node(id)).collect())
                .unwrap_or_default();
            self.cluster_clock_period(store, &members)
        });
        let analysis_mode = if node_metrics.iter().all(|m| m.min_slack.is_nan()) {
            "structural-only".to_string()
        } else if node_metrics.iter().any(|m| m.min_slack.is_nan()) {
            "partial".to_string()
        } else {
            "full".to_string()
        };

        tracing::info!(
            nodes = node_metrics.len(),
            edges = edge_metrics.len(),
            alerts = alerts.len(),
            "timing aggregated"
        );

        TimingSummary { worst_slack, violation_count, near_critical_count, clock_period, analysis_mode, node_metrics, edge_metrics, alerts }
    }

    /// Aggregate, then attach every per-SuperNode/SuperEdge metric onto
    /// `bundle` under `AnalysisKind::Timing`, keeping the keyed Analysis
    /// Bundle API (component I) in sync with an aggregation run. The
    /// whole-graph `TimingSummary` is still returned for callers (alerts,
    /// worst-case rollups) that need it directly rather than through the
    /// bundle.
    pub fn aggregate_into_bundle(&self, store: &GraphStore, graph: &SuperGraph, bundle: &AnalysisBundle) -> TimingSummary {
        let summary = self.aggregate(store, graph);
        for metrics in &summary.node_metrics {
            bundle.attach_node(&metrics.super_node_hex, AnalysisKind::Timing, AnalysisValue::TimingNode(metrics.clone()));
        }
        for metrics in &summary.edge_metrics {
            bundle.attach_edge(&metrics.super_edge_hex, AnalysisKind::Timing, AnalysisValue::TimingEdge(metrics.clone()));
        }
        summary
    }

    /// Derive alerts from already-computed metrics. Alerts never flow
    /// through the error channel, only this dedicated channel.
    fn generate_alerts(&self, node_metrics: &[TimingNodeMetrics], edge_metrics: &[TimingEdgeMetrics]) -> Vec<TimingAlert> {
        let mut alerts = Vec::new();
        for metrics in node_metrics {
            if metrics.min_slack.is_nan() {
                continue;
            }
            if metrics.min_slack < self.critical_slack_ns {
                alerts.push(TimingAlert {
                    severity: AlertSeverity::Error,
                    entity_ref: metrics.super_node_hex.clone(),
                    reason: format!("negative slack {:.3}ns", metrics.min_slack),
                });
            } else if metrics.near_critical_ratio > 0.0 {
                alerts.push(TimingAlert {
                    severity: AlertSeverity::Warn,
                    entity_ref: metrics.super_node_hex.clone(),
                    reason: format!("{:.0}% of members within the near-critical margin", metrics.near_critical_ratio * 100.0),
                });
            }
        }
        for metrics in edge_metrics {
            if let Some(p95) = metrics.p95_delay {
                if metrics.max_delay.is_some_and(|m| m > p95 * 2.0) {
                    alerts.push(TimingAlert {
                        severity: AlertSeverity::Info,
                        entity_ref: metrics.super_edge_hex.clone(),
                        reason: format!("max delay {:.3}ns is an outlier against p95 {:.3}ns", metrics.max_delay.unwrap(), p95),
                    });
                }
            }
        }
        alerts
    }
}
