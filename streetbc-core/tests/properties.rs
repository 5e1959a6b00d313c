use geo::Point;
use hashbrown::HashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use proptest::prelude::*;
use streetbc_core::algo::{betweenness_centrality, betweenness_centrality_raw};
use streetbc_core::prelude::*;

/// Node count and `(u, v, travel time)` edges, parallel edges and self-loops
/// included. Integer weights keep path lengths exact. Zero weights only run
/// from lower to higher node ids, so they never close a cycle.
fn arb_multigraph() -> impl Strategy<Value = (usize, Vec<(usize, usize, u8)>)> {
    (1usize..8).prop_flat_map(|n| {
        let edge = (0..n, 0..n, 0u8..=4).prop_map(|(u, v, w)| {
            let w = if w == 0 && u >= v { 1 } else { w };
            (u, v, w)
        });
        (Just(n), prop::collection::vec(edge, 0..24))
    })
}

fn street_graph(n: usize, edges: &[(usize, usize, u8)]) -> StreetGraph {
    let mut graph = StreetGraph::new();
    let nodes: Vec<NodeIndex> = (0..n)
        .map(|i| graph.add_node(StreetNode::new(i as i64, Point::new(i as f64, 0.0))))
        .collect();
    for (i, &(u, v, w)) in edges.iter().enumerate() {
        let mut edge = StreetEdge::new(i as i64, f64::from(w));
        edge.travel_time = Some(f64::from(w));
        graph.add_edge(nodes[u], nodes[v], edge);
    }
    graph
}

/// Betweenness from all-pairs distances and path counts
fn brute_force_betweenness(graph: &DiGraph<OsmNodeId, f64>) -> Vec<f64> {
    let n = graph.node_count();
    let mut dist = vec![vec![f64::INFINITY; n]; n];
    for s in 0..n {
        dist[s][s] = 0.0;
    }
    for edge in graph.edge_references() {
        let (u, v) = (edge.source().index(), edge.target().index());
        if u != v {
            dist[u][v] = dist[u][v].min(*edge.weight());
        }
    }
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                let through = dist[i][k] + dist[k][j];
                if through < dist[i][j] {
                    dist[i][j] = through;
                }
            }
        }
    }

    // sigma[s][t]: number of shortest s -> t paths
    let mut sigma = vec![vec![0.0; n]; n];
    for s in 0..n {
        let mut order: Vec<usize> = (0..n).filter(|&t| dist[s][t].is_finite()).collect();
        // Zero-weight edges point to higher ids, so ties break by id
        order.sort_by(|&a, &b| dist[s][a].total_cmp(&dist[s][b]).then(a.cmp(&b)));
        sigma[s][s] = 1.0;
        for &t in order.iter().filter(|&&t| t != s) {
            sigma[s][t] = graph
                .edge_references()
                .filter(|edge| edge.target().index() == t && edge.source().index() != t)
                .filter(|edge| dist[s][edge.source().index()] + edge.weight() == dist[s][t])
                .map(|edge| sigma[s][edge.source().index()])
                .sum();
        }
    }

    let mut scores = vec![0.0; n];
    for s in 0..n {
        for t in 0..n {
            if s == t || !dist[s][t].is_finite() {
                continue;
            }
            for v in 0..n {
                if v != s && v != t && dist[s][v] + dist[v][t] == dist[s][t] {
                    scores[v] += sigma[s][v] * sigma[v][t] / sigma[s][t];
                }
            }
        }
    }
    scores
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn reduction_keeps_cheapest_edge_per_pair((n, edges) in arb_multigraph()) {
        let graph = street_graph(n, &edges);
        let reduced = to_digraph(&graph, EdgeWeight::TravelTime).unwrap();

        let mut expected: HashMap<(usize, usize), f64> = HashMap::new();
        for &(u, v, w) in &edges {
            let w = f64::from(w);
            expected
                .entry((u, v))
                .and_modify(|best| *best = best.min(w))
                .or_insert(w);
        }

        prop_assert_eq!(reduced.node_count(), n);
        prop_assert_eq!(reduced.edge_count(), expected.len());
        for edge in reduced.graph.edge_references() {
            let pair = (edge.source().index(), edge.target().index());
            prop_assert_eq!(Some(edge.weight()), expected.get(&pair));

            let origin = reduced.origin_of(edge.id()).unwrap();
            prop_assert_eq!(graph.graph[origin].travel_time, Some(*edge.weight()));
        }
    }

    #[test]
    fn raw_scores_match_path_counting((n, edges) in arb_multigraph()) {
        let graph = street_graph(n, &edges);
        let reduced = to_digraph(&graph, EdgeWeight::TravelTime).unwrap();

        let fast = betweenness_centrality_raw(&reduced.graph).unwrap();
        let slow = brute_force_betweenness(&reduced.graph);
        for (a, b) in fast.iter().zip(&slow) {
            prop_assert!((a - b).abs() < 1e-9, "{fast:?} != {slow:?}");
        }
    }

    #[test]
    fn normalized_scores_cover_every_node((n, edges) in arb_multigraph()) {
        let mut graph = street_graph(n, &edges);
        let scores = street_betweenness(&mut graph, EdgeWeight::TravelTime).unwrap();

        prop_assert_eq!(scores.len(), n);
        for node in graph.graph.node_weights() {
            let bc = node.bc.unwrap();
            prop_assert!((0.0..=1.0 + 1e-12).contains(&bc));
        }
    }

    #[test]
    fn simple_graph_reduction_changes_nothing((n, edges) in arb_multigraph()) {
        // Keep only the first edge per ordered pair
        let mut seen = HashMap::new();
        let simple: Vec<(usize, usize, u8)> = edges
            .into_iter()
            .filter(|&(u, v, _)| seen.insert((u, v), ()).is_none())
            .collect();

        let mut direct = DiGraph::<(), f64>::new();
        let nodes: Vec<NodeIndex> = (0..n).map(|_| direct.add_node(())).collect();
        for &(u, v, w) in &simple {
            direct.add_edge(nodes[u], nodes[v], f64::from(w));
        }

        let reduced = to_digraph(&street_graph(n, &simple), EdgeWeight::TravelTime).unwrap();
        let via_reduction = betweenness_centrality(&reduced.graph, true).unwrap();
        let plain = betweenness_centrality(&direct, true).unwrap();

        for idx in direct.node_indices() {
            prop_assert!((via_reduction[&idx] - plain[&idx]).abs() < 1e-12);
        }
    }
}
