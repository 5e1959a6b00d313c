//! Topological simplification of the street graph.
//!
//! OSM ways are digitised with many nodes that only shape the geometry of a
//! street. These interstitial nodes are removed and the chains of edges
//! through them are merged into single edges carrying the full geometry, so
//! that the remaining nodes are real intersections and dead ends.

use fixedbitset::FixedBitSet;
use geo::{Coord, LineString};
use hashbrown::HashSet;
use itertools::Itertools;
use log::{info, warn};
use petgraph::{Direction, graph::NodeIndex, visit::EdgeRef};

use crate::{Error, StreetEdge, StreetGraph, TagValue};

fn successors(graph: &StreetGraph, node: NodeIndex) -> Vec<NodeIndex> {
    let mut successors: Vec<NodeIndex> = graph
        .graph
        .edges_directed(node, Direction::Outgoing)
        .map(|edge| edge.target())
        .unique()
        .collect();
    successors.sort_unstable();
    successors
}

/// A node is an endpoint if it is not merely a point along a single street:
/// it has a self-loop, it is a source or a sink, or it does not have exactly
/// two distinct neighbours joined by one or two edges each.
fn is_endpoint(graph: &StreetGraph, node: NodeIndex) -> bool {
    let neighbors: HashSet<NodeIndex> = graph
        .graph
        .neighbors_directed(node, Direction::Outgoing)
        .chain(graph.graph.neighbors_directed(node, Direction::Incoming))
        .collect();

    if neighbors.contains(&node) {
        return true;
    }

    let (in_degree, out_degree) = (graph.in_degree(node), graph.out_degree(node));
    if in_degree == 0 || out_degree == 0 {
        return true;
    }

    let degree = in_degree + out_degree;
    !(neighbors.len() == 2 && (degree == 2 || degree == 4))
}

/// Follows successors from `endpoint` through interstitial nodes until the
/// next endpoint
fn build_path(
    graph: &StreetGraph,
    endpoint: NodeIndex,
    first: NodeIndex,
    endpoints: &FixedBitSet,
) -> Result<Vec<NodeIndex>, Error> {
    let mut path = vec![endpoint, first];

    for next in successors(graph, first) {
        if path.contains(&next) {
            continue;
        }
        path.push(next);
        let mut current = next;

        while !endpoints.contains(current.index()) {
            let onward: Vec<NodeIndex> = successors(graph, current)
                .into_iter()
                .filter(|n| !path.contains(n))
                .collect();

            match onward.as_slice() {
                [single] => {
                    current = *single;
                    path.push(current);
                }
                [] => {
                    // Self-contained loop back to where we started
                    if successors(graph, current).contains(&endpoint) {
                        path.push(endpoint);
                    }
                    return Ok(path);
                }
                _ => {
                    return Err(Error::InvalidData(format!(
                        "impossible simplification pattern near node {}",
                        graph.graph[current].osmid
                    )));
                }
            }
        }
        return Ok(path);
    }

    Ok(path)
}

/// Merges the edges along `path` into a single edge
fn merge_path(graph: &StreetGraph, path: &[NodeIndex]) -> StreetEdge {
    let mut segments: Vec<&StreetEdge> = Vec::with_capacity(path.len() - 1);
    for (&u, &v) in path.iter().tuple_windows() {
        let parallel: Vec<&StreetEdge> = graph
            .graph
            .edges_connecting(u, v)
            .map(|edge| edge.weight())
            .collect();
        if parallel.len() != 1 {
            warn!(
                "Found {} edges between {} and {} when simplifying",
                parallel.len(),
                graph.graph[u].osmid,
                graph.graph[v].osmid
            );
        }
        if let Some(first) = parallel.into_iter().min_by_key(|edge| edge.key) {
            segments.push(first);
        }
    }

    let mut merged = StreetEdge::new(0, 0.0);
    merged.osmid = segments
        .iter()
        .flat_map(|edge| edge.osmid.iter().copied())
        .unique()
        .collect();
    merged.length = segments.iter().map(|edge| edge.length).sum();
    merged.oneway = segments.iter().all(|edge| edge.oneway);
    merged.reversed = segments.iter().all(|edge| edge.reversed);

    let tag_names: Vec<&String> = segments
        .iter()
        .flat_map(|edge| edge.tags.keys())
        .unique()
        .collect();
    for name in tag_names {
        let values = segments.iter().filter_map(|edge| edge.tags.get(name));
        if let Some(value) = TagValue::merge(values) {
            merged.tags.insert(name.clone(), value);
        }
    }

    if let Some(times) = segments
        .iter()
        .map(|edge| edge.travel_time)
        .collect::<Option<Vec<f64>>>()
    {
        let total: f64 = times.iter().sum();
        merged.travel_time = Some(total);
        merged.speed_kph = (total > 0.0).then(|| merged.length / total * 3.6);
    }

    let coords: Vec<Coord<f64>> = path
        .iter()
        .map(|&node| graph.graph[node].geometry.into())
        .collect();
    merged.geometry = Some(LineString::new(coords));
    merged
}

/// Removes interstitial nodes, merging the edges through them.
///
/// # Errors
///
/// Returns [`Error::InvalidData`] if the graph was already simplified or has
/// a branching pattern that can't be simplified.
pub fn simplify_graph(graph: &StreetGraph) -> Result<StreetGraph, Error> {
    if graph.meta.simplified {
        return Err(Error::InvalidData(
            "graph has already been simplified".to_string(),
        ));
    }

    let node_count = graph.node_count();
    let edge_count = graph.edge_count();

    let mut endpoints = FixedBitSet::with_capacity(node_count);
    for node in graph.graph.node_indices() {
        if is_endpoint(graph, node) {
            endpoints.insert(node.index());
        }
    }
    info!(
        "Identified {} edge endpoints among {node_count} nodes",
        endpoints.count_ones(..)
    );

    let mut paths = Vec::new();
    for endpoint in endpoints.ones().map(NodeIndex::new) {
        for next in successors(graph, endpoint) {
            if !endpoints.contains(next.index()) {
                paths.push(build_path(graph, endpoint, next, &endpoints)?);
            }
        }
    }

    let mut removed = FixedBitSet::with_capacity(node_count);
    let merged: Vec<(NodeIndex, NodeIndex, StreetEdge)> = paths
        .iter()
        .map(|path| {
            for node in &path[1..path.len() - 1] {
                removed.insert(node.index());
            }
            (path[0], path[path.len() - 1], merge_path(graph, path))
        })
        .collect();

    let mut simplified = graph.filter_nodes(|idx, _| !removed.contains(idx.index()));
    for (u, v, edge) in merged {
        let u = simplified.node_index(graph.graph[u].osmid);
        let v = simplified.node_index(graph.graph[v].osmid);
        if let (Some(u), Some(v)) = (u, v) {
            simplified.add_edge(u, v, edge);
        }
    }
    simplified.meta.simplified = true;

    info!(
        "Simplified graph: {node_count} to {} nodes, {edge_count} to {} edges",
        simplified.node_count(),
        simplified.edge_count()
    );
    Ok(simplified)
}
