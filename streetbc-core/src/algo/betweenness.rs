//! Weighted betweenness centrality via Brandes' algorithm.
//!
//! For every source `s` a Dijkstra search builds the shortest-path DAG with
//! path counts `sigma`. Dependencies are then accumulated in reverse settling
//! order, so a node on `k` of `n` equally short `s -> t` paths receives
//! `k / n` for that pair. Endpoints are not counted.
//!
//! Normalized scores are divided by `(n - 1)(n - 2)`, the number of ordered
//! pairs not involving the node. Graphs with two or fewer nodes are left
//! unscaled; every score is zero there anyway.

use hashbrown::HashMap;
use log::{debug, info};
use petgraph::{
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};

use super::reduce::{EdgeWeight, ReducedGraph, to_digraph};
use crate::{Error, OsmNodeId, StreetGraph, routing::shortest_path_dag};

/// Rejects negative, infinite and NaN weights, naming nodes by `id`
fn validate_weights<N>(
    graph: &DiGraph<N, f64>,
    id: impl Fn(NodeIndex) -> i64,
) -> Result<(), Error> {
    for edge in graph.edge_references() {
        let weight = *edge.weight();
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidWeight {
                u: id(edge.source()),
                v: id(edge.target()),
                weight,
            });
        }
    }
    Ok(())
}

fn index_id(idx: NodeIndex) -> i64 {
    i64::try_from(idx.index()).unwrap_or(i64::MAX)
}

/// Unnormalized betweenness, indexed by node index.
///
/// # Errors
///
/// Returns [`Error::InvalidWeight`] before any path is computed if a weight
/// is negative or not finite.
pub fn betweenness_centrality_raw<N>(graph: &DiGraph<N, f64>) -> Result<Vec<f64>, Error> {
    validate_weights(graph, index_id)?;

    let n = graph.node_count();
    let mut centrality = vec![0.0; n];

    for source in graph.node_indices() {
        let dag = shortest_path_dag(graph, source);
        let mut delta = vec![0.0; n];

        // Accumulate dependencies, farthest nodes first
        for &w in dag.order.iter().rev() {
            let wi = w.index();
            let coeff = (1.0 + delta[wi]) / dag.sigma[wi];
            for &v in &dag.predecessors[wi] {
                delta[v.index()] += dag.sigma[v.index()] * coeff;
            }
            if w != source {
                centrality[wi] += delta[wi];
            }
        }
    }

    Ok(centrality)
}

/// Betweenness centrality of every node, including those scoring zero.
///
/// # Errors
///
/// Returns [`Error::InvalidWeight`] if a weight is negative or not finite.
#[allow(clippy::cast_precision_loss)]
pub fn betweenness_centrality<N>(
    graph: &DiGraph<N, f64>,
    normalized: bool,
) -> Result<HashMap<NodeIndex, f64>, Error> {
    let mut centrality = betweenness_centrality_raw(graph)?;

    let n = graph.node_count();
    if normalized && n > 2 {
        let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        for value in &mut centrality {
            *value *= scale;
        }
    }

    Ok(graph
        .node_indices()
        .zip(centrality)
        .collect::<HashMap<NodeIndex, f64>>())
}

/// Copies scores onto the street graph nodes the reduced graph was built from
///
/// # Errors
///
/// Returns [`Error::InvalidData`] if the two graphs don't share a node set.
pub fn set_node_centrality(
    streets: &mut StreetGraph,
    reduced: &ReducedGraph,
    scores: &HashMap<NodeIndex, f64>,
) -> Result<(), Error> {
    if reduced.node_count() != streets.node_count() {
        return Err(Error::InvalidData(format!(
            "reduced graph has {} nodes, street graph has {}",
            reduced.node_count(),
            streets.node_count()
        )));
    }

    for (&idx, &score) in scores {
        let node = streets
            .graph
            .node_weight_mut(idx)
            .filter(|node| node.osmid == reduced.graph[idx])
            .ok_or_else(|| {
                Error::InvalidData(format!("node {} not found in street graph", idx.index()))
            })?;
        node.bc = Some(score);
    }
    Ok(())
}

/// Reduces the street graph by `weight`, scores it with normalized
/// betweenness and stores the scores on the street graph nodes.
///
/// Returns the scores keyed by OSM node id.
///
/// # Errors
///
/// Fails if an edge lacks the weight attribute or carries an invalid weight.
/// Both errors name the edge by the OSM ids of its endpoints.
pub fn street_betweenness(
    streets: &mut StreetGraph,
    weight: EdgeWeight,
) -> Result<HashMap<OsmNodeId, f64>, Error> {
    let reduced = to_digraph(streets, weight)?;
    validate_weights(&reduced.graph, |idx| reduced.graph[idx])?;
    info!(
        "Computing betweenness centrality over {} nodes and {} edges weighted by {weight}",
        reduced.node_count(),
        reduced.edge_count()
    );

    let scores = betweenness_centrality(&reduced.graph, true)?;
    set_node_centrality(streets, &reduced, &scores)?;

    let max = scores.values().copied().fold(0.0, f64::max);
    debug!("Maximum betweenness centrality: {max:.6}");

    Ok(scores
        .into_iter()
        .map(|(idx, score)| (reduced.graph[idx], score))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn digraph(n: usize, edges: &[(usize, usize, f64)]) -> DiGraph<(), f64> {
        let mut graph = DiGraph::new();
        let nodes: Vec<_> = (0..n).map(|_| graph.add_node(())).collect();
        for &(u, v, w) in edges {
            graph.add_edge(nodes[u], nodes[v], w);
        }
        graph
    }

    fn score(scores: &HashMap<NodeIndex, f64>, i: usize) -> f64 {
        scores[&NodeIndex::new(i)]
    }

    #[test]
    fn chain_middle_node_is_on_every_path() {
        // 0 -> 1 -> 2
        let graph = digraph(3, &[(0, 1, 1.0), (1, 2, 1.0)]);
        let scores = betweenness_centrality(&graph, false).unwrap();
        assert!((score(&scores, 1) - 1.0).abs() < EPS);
        assert!(score(&scores, 0).abs() < EPS);
        assert!(score(&scores, 2).abs() < EPS);

        let normalized = betweenness_centrality(&graph, true).unwrap();
        assert!((score(&normalized, 1) - 0.5).abs() < EPS);
    }

    #[test]
    fn tied_paths_split_credit() {
        // A -> B (1), B -> C (1), A -> C (2): two equally short A -> C paths
        let graph = digraph(3, &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 2.0)]);
        let scores = betweenness_centrality(&graph, false).unwrap();
        assert!((score(&scores, 1) - 0.5).abs() < EPS);
    }

    #[test]
    fn weights_decide_which_path_counts() {
        // Direct A -> C is cheaper than the detour through B
        let graph = digraph(3, &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0)]);
        let scores = betweenness_centrality(&graph, false).unwrap();
        assert!(score(&scores, 1).abs() < EPS);
    }

    #[test]
    fn isolated_node_scores_zero() {
        let graph = digraph(1, &[]);
        let scores = betweenness_centrality(&graph, true).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(score(&scores, 0), 0.0);
    }

    #[test]
    fn empty_graph_has_no_scores() {
        let graph = digraph(0, &[]);
        assert!(betweenness_centrality(&graph, true).unwrap().is_empty());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let graph = digraph(2, &[(0, 1, -1.0)]);
        let result = betweenness_centrality(&graph, true);
        assert!(matches!(
            result,
            Err(Error::InvalidWeight { u: 0, v: 1, weight }) if weight == -1.0
        ));
    }

    #[test]
    fn non_finite_weight_is_rejected() {
        let graph = digraph(3, &[(0, 1, 1.0), (1, 2, f64::NAN)]);
        assert!(matches!(
            betweenness_centrality(&graph, true),
            Err(Error::InvalidWeight { u: 1, v: 2, .. })
        ));

        let graph = digraph(2, &[(0, 1, f64::INFINITY)]);
        assert!(matches!(
            betweenness_centrality(&graph, true),
            Err(Error::InvalidWeight { .. })
        ));
    }

    #[test]
    fn unreachable_pairs_contribute_nothing() {
        // 0 -> 1 -> 2 and a separate 3 -> 4
        let graph = digraph(5, &[(0, 1, 1.0), (1, 2, 1.0), (3, 4, 1.0)]);
        let scores = betweenness_centrality(&graph, false).unwrap();
        assert!((score(&scores, 1) - 1.0).abs() < EPS);
        for i in [0, 2, 3, 4] {
            assert!(score(&scores, i).abs() < EPS);
        }
    }

    #[test]
    fn two_way_grid_center() {
        // 3x3 bidirectional grid with unit weights; the center lies on
        // many tied paths between opposite sides
        let mut edges = Vec::new();
        for r in 0..3 {
            for c in 0..3 {
                let i = r * 3 + c;
                if c < 2 {
                    edges.push((i, i + 1, 1.0));
                    edges.push((i + 1, i, 1.0));
                }
                if r < 2 {
                    edges.push((i, i + 3, 1.0));
                    edges.push((i + 3, i, 1.0));
                }
            }
        }
        let graph = digraph(9, &edges);
        let scores = betweenness_centrality(&graph, false).unwrap();

        assert!((score(&scores, 4) - 64.0 / 3.0).abs() < 1e-9);
        for i in [1, 3, 5, 7] {
            assert!((score(&scores, i) - 10.0).abs() < 1e-9);
        }
        for i in [0, 2, 6, 8] {
            assert!((score(&scores, i) - 8.0 / 3.0).abs() < 1e-9);
        }
        assert!(score(&scores, 4) > score(&scores, 1));
    }

    #[test]
    fn zero_weight_edge_shares_credit_regardless_of_edge_order() {
        // s -> a (1), s -> b (1), a -> b (0), b -> t (1): a lies on one of
        // the two shortest s -> b and s -> t paths
        let a_first = digraph(4, &[(0, 1, 1.0), (0, 2, 1.0), (1, 2, 0.0), (2, 3, 1.0)]);
        let b_first = digraph(4, &[(0, 2, 1.0), (0, 1, 1.0), (1, 2, 0.0), (2, 3, 1.0)]);

        for graph in [a_first, b_first] {
            let raw = betweenness_centrality_raw(&graph).unwrap();
            let expected = [0.0, 1.0, 2.0, 0.0];
            for (got, want) in raw.iter().zip(expected) {
                assert!((got - want).abs() < EPS, "{raw:?}");
            }
        }
    }
}
