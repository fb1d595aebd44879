//! The Query Engine: read-only traversal, filter, fanout, and path-find
//! over a live [`GraphStore`], plus SuperGraph-aware lookups over a frozen
//! View Builder result.
//!
//! Node and edge search are small, composable index lookups the caller
//! chains together — every filter axis is optional and composition is by
//! intersection (AND), rather than one do-everything query method.
//! Traversal operations (`find_paths`, `shortest_path`, fanout/fanin) are
//! BFS over the same `out_edges`/`in_edges` indices the Graph Store already
//! maintains, checked against the cancellation token once per layer — a
//! BFS layer is the natural phase boundary for a traversal.

use crate::bundle::{AnalysisBundle, AnalysisKind};
use crate::cancel::CancelToken;
use crate::error::QueryError;
use crate::ids::{EdgeId, NodeId};
use crate::model::{Edge, EntityClass, Node, RelationType};
use crate::pattern::glob_match;
use crate::store::GraphStore;
use crate::supergraph::{SuperClass, SuperGraph, SuperNode};
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

/// Which metric `shortest_path` minimizes: edge count, or cumulative
/// `delay` (edges missing a `delay` value are treated as zero-cost hops).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathWeight {
    Hops,
    Delay,
}

/// Composable node search predicate; every `Some` axis must match, `None`
/// axes are ignored. `predicate`, if set, is applied last.
#[derive(Default)]
pub struct NodeFilter<'p> {
    pub class: Option<EntityClass>,
    pub name_pattern: Option<&'p str>,
    pub hier_prefix: Option<&'p str>,
    pub slack_range: Option<(f64, f64)>,
    pub clock_domain: Option<&'p str>,
    pub predicate: Option<&'p dyn Fn(&Node) -> bool>,
}

/// Composable edge search predicate, symmetric to `NodeFilter`.
#[derive(Default)]
pub struct EdgeFilter<'p> {
    pub relation_type: Option<RelationType>,
    pub flow_type: Option<crate::model::FlowType>,
    pub clock_domain: Option<&'p str>,
    pub predicate: Option<&'p dyn Fn(&Edge) -> bool>,
}

pub struct QueryEngine<'a> {
    store: &'a GraphStore,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    /// Nodes matching every set filter axis, composed as an AND.
    pub fn find_nodes(&self, filter: &NodeFilter) -> Vec<Node> {
        let mut nodes = match (filter.class, filter.hier_prefix) {
            (Some(c), Some(p)) => {
                let by_class: HashSet<_> = self.store.nodes_by_class(c).into_iter().map(|n| n.id).collect();
                self.store.nodes_by_hier_prefix(p).into_iter().filter(|n| by_class.contains(&n.id)).collect()
            }
            (Some(c), None) => self.store.nodes_by_class(c),
            (None, Some(p)) => self.store.nodes_by_hier_prefix(p),
            (None, None) => self.store.all_nodes(),
        };

        if let Some(pattern) = filter.name_pattern {
            nodes.retain(|n| glob_match(pattern, &n.local_name) || glob_match(pattern, &n.hier_path));
        }
        if let Some((lo, hi)) = filter.slack_range {
            nodes.retain(|n| n.slack.is_some_and(|s| s >= lo && s <= hi));
        }
        if let Some(domain) = filter.clock_domain {
            nodes.retain(|n| n.clock_domain.as_deref() == Some(domain));
        }
        if let Some(pred) = filter.predicate {
            nodes.retain(|n| pred(n));
        }
        nodes
    }

    /// Edges matching every set filter axis, composed as an AND. Symmetric
    /// to `find_nodes`; there is no index on relation/flow type so this
    /// scans `all_edges` and filters.
    pub fn find_edges(&self, filter: &EdgeFilter) -> Vec<Edge> {
        let mut edges = self.store.all_edges();
        if let Some(rel) = filter.relation_type {
            edges.retain(|e| e.relation_type == rel);
        }
        if let Some(flow) = filter.flow_type {
            edges.retain(|e| e.flow_type == flow);
        }
        if let Some(domain) = filter.clock_domain {
            edges.retain(|e| e.clock_domain.as_deref() == Some(domain));
        }
        if let Some(pred) = filter.predicate {
            edges.retain(|e| pred(e));
        }
        edges
    }

    /// Nodes reachable from `id` within `depth` hops (`depth == 1` is the
    /// direct-neighbor case), via edges of `relation` (or any relation if
    /// `None`). The source itself is never included.
    pub fn fanout(&self, id: &NodeId, depth: usize, relation: Option<RelationType>) -> Vec<NodeId> {
        self.bounded_reachable(id, depth, relation, true)
    }

    /// Nodes that reach `id` within `depth` hops, symmetric to `fanout`.
    pub fn fanin(&self, id: &NodeId, depth: usize, relation: Option<RelationType>) -> Vec<NodeId> {
        self.bounded_reachable(id, depth, relation, false)
    }

    fn bounded_reachable(&self, id: &NodeId, depth: usize, relation: Option<RelationType>, forward: bool) -> Vec<NodeId> {
        let mut visited: HashSet<NodeId> = HashSet::new();
        visited.insert(id.clone());
        let mut frontier = vec![id.clone()];
        let mut result = Vec::new();

        for _ in 0..depth {
            let mut next = Vec::new();
            for current in &frontier {
                let edges = if forward { self.store.out_edges(current) } else { self.store.in_edges(current) };
                for edge in edges {
                    if let Some(r) = relation {
                        if edge.relation_type != r {
                            continue;
                        }
                    }
                    let neighbor = if forward { edge.target } else { edge.source };
                    if visited.insert(neighbor.clone()) {
                        result.push(neighbor.clone());
                        next.push(neighbor);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        result
    }

    /// Breadth-first shortest path from `from` to `to` by hop count, or
    /// Dijkstra by cumulative edge `delay` (missing delays cost zero).
    /// `None` if unreachable. Cancellation is checked once per BFS layer
    /// (hops) or once per settled node (delay).
    pub fn shortest_path(
        &self,
        from: &NodeId,
        to: &NodeId,
        weight: PathWeight,
        cancel: &CancelToken,
    ) -> Result<Option<Vec<NodeId>>, QueryError> {
        if !self.store.has_node(from) {
            return Err(QueryError::NoSuchNode(from.0.clone()));
        }
        if !self.store.has_node(to) {
            return Err(QueryError::NoSuchNode(to.0.clone()));
        }
        if from == to {
            return Ok(Some(vec![from.clone()]));
        }

        match weight {
            PathWeight::Hops => self.shortest_path_hops(from, to, cancel),
            PathWeight::Delay => self.shortest_path_delay(from, to, cancel),
        }
    }

    fn shortest_path_hops(&self, from: &NodeId, to: &NodeId, cancel: &CancelToken) -> Result<Option<Vec<NodeId>>, QueryError> {
        let mut visited: HashSet<NodeId> = HashSet::new();
        visited.insert(from.clone());
        let mut parents: HashMap<NodeId, NodeId> = HashMap::new();
        let mut frontier = VecDeque::new();
        frontier.push_back(from.clone());

        while !frontier.is_empty() {
            if cancel.is_cancelled() {
                return Err(QueryError::Interrupted);
            }
            let layer: Vec<NodeId> = frontier.drain(..).collect();
            for current in layer {
                for edge in self.store.out_edges(&current) {
                    if visited.contains(&edge.target) {
                        continue;
                    }
                    visited.insert(edge.target.clone());
                    parents.insert(edge.target.clone(), current.clone());
                    if edge.target == *to {
                        return Ok(Some(reconstruct(&parents, from, to)));
                    }
                    frontier.push_back(edge.target.clone());
                }
            }
        }

        Ok(None)
    }

    fn shortest_path_delay(&self, from: &NodeId, to: &NodeId, cancel: &CancelToken) -> Result<Option<Vec<NodeId>>, QueryError> {
        #[derive(PartialEq)]
        struct HeapEntry(f64, NodeId);
        impl Eq for HeapEntry {}
        impl PartialOrd for HeapEntry {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }
        impl Ord for HeapEntry {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                // min-heap: reverse the natural f64 order (and fall back to
                // Equal on NaN, which never occurs for a non-negative cost).
                other.0.partial_cmp(&self.0).unwrap_or(std::cmp::Ordering::Equal)
            }
        }

        let mut best: HashMap<NodeId, f64> = HashMap::new();
        best.insert(from.clone(), 0.0);
        let mut parents: HashMap<NodeId, NodeId> = HashMap::new();
        let mut heap = BinaryHeap::new();
        heap.push(HeapEntry(0.0, from.clone()));

        while let Some(HeapEntry(cost, current)) = heap.pop() {
            if cancel.is_cancelled() {
                return Err(QueryError::Interrupted);
            }
            if current == *to {
                return Ok(Some(reconstruct(&parents, from, to)));
            }
            if cost > *best.get(&current).unwrap_or(&f64::INFINITY) {
                continue;
            }
            for edge in self.store.out_edges(&current) {
                let edge_cost = edge.delay.unwrap_or(0.0).max(0.0);
                let candidate = cost + edge_cost;
                if candidate < *best.get(&edge.target).unwrap_or(&f64::INFINITY) {
                    best.insert(edge.target.clone(), candidate);
                    parents.insert(edge.target.clone(), current.clone());
                    heap.push(HeapEntry(candidate, edge.target.clone()));
                }
            }
        }

        Ok(None)
    }

    /// All simple paths from `from` to `to` up to `max_depth` hops,
    /// optionally restricted to edges `follow` accepts. Bounded since
    /// unbounded enumeration over a cyclic graph never terminates.
    pub fn find_paths(
        &self,
        from: &NodeId,
        to: &NodeId,
        max_depth: usize,
        follow: Option<&dyn Fn(&Edge) -> bool>,
        cancel: &CancelToken,
    ) -> Result<Vec<Vec<NodeId>>, QueryError> {
        if !self.store.has_node(from) || !self.store.has_node(to) {
            return Err(QueryError::NoSuchNode(
                if !self.store.has_node(from) { from.0.clone() } else { to.0.clone() },
            ));
        }

        let mut results = Vec::new();
        let mut path = vec![from.clone()];
        let mut on_path: HashSet<NodeId> = HashSet::new();
        on_path.insert(from.clone());

        self.dfs_paths(from, to, max_depth, follow, &mut path, &mut on_path, &mut results, cancel)?;
        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    fn dfs_paths(
        &self,
        current: &NodeId,
        to: &NodeId,
        remaining_depth: usize,
        follow: Option<&dyn Fn(&Edge) -> bool>,
        path: &mut Vec<NodeId>,
        on_path: &mut HashSet<NodeId>,
        results: &mut Vec<Vec<NodeId>>,
        cancel: &CancelToken,
    ) -> Result<(), QueryError> {
        if cancel.is_cancelled() {
            return Err(QueryError::Interrupted);
        }
        if current == to {
            results.push(path.clone());
            return Ok(());
        }
        if remaining_depth == 0 {
            return Ok(());
        }

        for edge in self.store.out_edges(current) {
            if let Some(f) = follow {
                if !f(&edge) {
                    continue;
                }
            }
            if on_path.contains(&edge.target) {
                continue;
            }
            on_path.insert(edge.target.clone());
            path.push(edge.target.clone());
            self.dfs_paths(&edge.target, to, remaining_depth - 1, follow, path, on_path, results, cancel)?;
            path.pop();
            on_path.remove(&edge.target);
        }
        Ok(())
    }

    /// Nodes whose recorded slack is at or below `threshold`, worst first,
    /// truncated to `top_n` if given.
    pub fn critical_nodes(&self, threshold: f64, top_n: Option<usize>) -> Vec<Node> {
        let mut nodes: Vec<Node> =
            self.store.all_nodes().into_iter().filter(|n| n.slack.is_some_and(|s| s <= threshold)).collect();
        nodes.sort_by(|a, b| a.slack.partial_cmp(&b.slack).unwrap());
        if let Some(n) = top_n {
            nodes.truncate(n);
        }
        nodes
    }

    pub fn edge_path(&self, nodes: &[NodeId]) -> Vec<EdgeId> {
        let mut edges = Vec::new();
        for pair in nodes.windows(2) {
            if let Some(edge) = self.store.out_edges(&pair[0]).into_iter().find(|e| e.target == pair[1]) {
                edges.push(edge.id);
            }
        }
        edges
    }

    /// SuperNodes in `graph` matching an optional class filter and/or
    /// whether `bundle` carries a `Timing` analysis for them.
    pub fn find_supernodes(
        &self,
        graph: &SuperGraph,
        super_class: Option<SuperClass>,
        has_timing: Option<bool>,
        bundle: Option<&AnalysisBundle>,
    ) -> Vec<SuperNode> {
        graph
            .nodes
            .iter()
            .filter(|(hex, sn)| {
                let class_ok = super_class.map(|c| c == sn.class).unwrap_or(true);
                let timing_ok = match (has_timing, bundle) {
                    (Some(want), Some(bundle)) => bundle.has_node_analysis(hex, AnalysisKind::Timing) == want,
                    (Some(_), None) => false,
                    (None, _) => true,
                };
                class_ok && timing_ok
            })
            .map(|(_, sn)| sn.clone())
            .collect()
    }

    /// The SuperNode containing `node_id` as a member, if the view
    /// survived it (a node eliminated by the View Builder has none).
    pub fn supernode_of(&self, graph: &SuperGraph, node_id: &NodeId) -> Option<SuperNode> {
        graph.nodes.values().find(|sn| sn.members.contains(node_id)).cloned()
    }
}

fn reconstruct(parents: &HashMap<NodeId, NodeId>, from: &NodeId, to: &NodeId) -> Vec<NodeId> {
    let mut path = vec![to.clone()];
    let mut cursor = to.clone();
    while cursor != *from {
        let p = parents.get(&cursor).expect("every visited node but the source has a parent");
        path.push(p.clone());
        cursor = p.clone();
    }
    path.reverse();
    path
}
