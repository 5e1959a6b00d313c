//! Single-source Dijkstra that keeps every shortest path, not just one.
//!
//! Distances come from a plain Dijkstra search. The shortest-path DAG is then
//! built from the tight edges (`dist[u] + w == dist[v]`), visiting nodes by
//! distance and, among equally distant nodes, topologically over zero-weight
//! edges. Path counts therefore never depend on edge insertion order.

mod state;

use std::{cmp::Reverse, collections::BinaryHeap};

use fixedbitset::FixedBitSet;
use ordered_float::OrderedFloat;
use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};

use state::State;

/// Shortest-path DAG rooted at a single source
#[derive(Debug, Clone)]
pub struct ShortestPathDag {
    /// Reached nodes, every node after all of its predecessors
    pub order: Vec<NodeIndex>,
    /// Immediate predecessors of each node on its shortest paths
    pub predecessors: Vec<Vec<NodeIndex>>,
    /// Number of distinct shortest paths from the source to each node
    pub sigma: Vec<f64>,
    /// Shortest distance from the source, `None` if unreachable
    pub distances: Vec<Option<f64>>,
}

/// Dijkstra's algorithm recording all equally short paths.
///
/// Edge weights are assumed finite and non-negative; callers validate them.
/// Distances are compared exactly, so two paths only tie if their summed
/// weights are bit-for-bit equal.
///
/// Zero-weight cycles are cut: when every remaining node at some distance
/// waits on another one, the node with the smallest index goes first and
/// its in-edges from nodes still pending are not counted.
pub fn shortest_path_dag<N>(graph: &DiGraph<N, f64>, source: NodeIndex) -> ShortestPathDag {
    let (distances, mut settled) = settle(graph, source);
    settled.sort_by_key(|&node| (distances[node.index()].map(OrderedFloat), node));

    let n = graph.node_count();
    let mut pending = vec![0_usize; n];
    for edge in graph.edge_references() {
        if is_tight(&distances, edge.source(), edge.target(), *edge.weight()) {
            pending[edge.target().index()] += 1;
        }
    }

    let mut dag = ShortestPathDag {
        order: Vec::with_capacity(settled.len()),
        predecessors: vec![Vec::new(); n],
        sigma: vec![0.0; n],
        distances,
    };
    let mut done = FixedBitSet::with_capacity(n);
    let mut ready = BinaryHeap::new();
    let mut cursor = 0;

    // Start node has distance 0
    dag.sigma[source.index()] = 1.0;
    ready.push(Reverse((OrderedFloat(0.0), source)));

    while dag.order.len() < settled.len() {
        while done.contains(settled[cursor].index()) {
            cursor += 1;
        }
        let first = settled[cursor];
        let first_dist = OrderedFloat(dag.distances[first.index()].unwrap_or(f64::INFINITY));

        let node = match ready.peek() {
            Some(&Reverse((dist, node))) if dist <= first_dist => {
                ready.pop();
                node
            }
            // Nothing at this distance is ready: a zero-weight cycle
            _ => first,
        };
        let vi = node.index();
        if done.contains(vi) {
            continue;
        }
        done.insert(vi);
        dag.order.push(node);

        for edge in graph.edges_directed(node, Direction::Incoming) {
            let pred = edge.source();
            if done.contains(pred.index()) && is_tight(&dag.distances, pred, node, *edge.weight()) {
                dag.sigma[vi] += dag.sigma[pred.index()];
                dag.predecessors[vi].push(pred);
            }
        }
        dag.predecessors[vi].sort_unstable();

        for edge in graph.edges(node) {
            let next = edge.target();
            let ni = next.index();
            if done.contains(ni) || !is_tight(&dag.distances, node, next, *edge.weight()) {
                continue;
            }
            pending[ni] -= 1;
            if pending[ni] == 0 {
                let dist = dag.distances[ni].unwrap_or(f64::INFINITY);
                ready.push(Reverse((OrderedFloat(dist), next)));
            }
        }
    }

    dag
}

/// Plain Dijkstra: distances from `source` and the nodes it reached
fn settle<N>(graph: &DiGraph<N, f64>, source: NodeIndex) -> (Vec<Option<f64>>, Vec<NodeIndex>) {
    let n = graph.node_count();
    let mut distances = vec![None; n];
    let mut reached = Vec::with_capacity(n);
    let mut seen: Vec<Option<f64>> = vec![None; n];
    let mut settled = FixedBitSet::with_capacity(n);
    let mut heap = BinaryHeap::with_capacity(n / 4 + 1);
    let mut seq = 0;

    seen[source.index()] = Some(0.0);
    heap.push(State {
        cost: OrderedFloat(0.0),
        seq,
        node: source,
    });

    while let Some(State { cost, node, .. }) = heap.pop() {
        let vi = node.index();
        if settled.contains(vi) {
            continue;
        }
        settled.insert(vi);
        reached.push(node);

        let dist = cost.into_inner();
        distances[vi] = Some(dist);

        for edge in graph.edges(node) {
            let ni = edge.target().index();
            if settled.contains(ni) {
                continue;
            }
            let next_cost = dist + *edge.weight();
            if seen[ni].is_none_or(|best| next_cost < best) {
                seen[ni] = Some(next_cost);
                seq += 1;
                heap.push(State {
                    cost: OrderedFloat(next_cost),
                    seq,
                    node: edge.target(),
                });
            }
        }
    }

    (distances, reached)
}

/// Whether `u -> v` lies on a shortest path; self-loops never do
fn is_tight(distances: &[Option<f64>], u: NodeIndex, v: NodeIndex, weight: f64) -> bool {
    match (distances[u.index()], distances[v.index()]) {
        (Some(du), Some(dv)) => u != v && du + weight == dv,
        _ => false,
    }
}
