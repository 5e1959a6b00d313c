//! Reduction of the street multigraph to a simple directed graph.
//!
//! For every ordered node pair with at least one edge, exactly one edge
//! survives: the one with the smallest weight. Ties between equally cheap
//! parallel edges are broken by the smallest multigraph key, then by the
//! smallest edge index, so the result is deterministic.

use std::fmt;

use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;
use ordered_float::OrderedFloat;
use petgraph::{
    graph::{DiGraph, EdgeIndex, NodeIndex},
    visit::EdgeRef,
};

use crate::{Error, OsmNodeId, StreetEdge, StreetGraph};

/// Edge attribute used as weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeWeight {
    /// `travel_time`, seconds
    #[default]
    TravelTime,
    /// `length`, metres
    Length,
}

impl EdgeWeight {
    pub fn name(self) -> &'static str {
        match self {
            EdgeWeight::TravelTime => "travel_time",
            EdgeWeight::Length => "length",
        }
    }

    pub fn of(self, edge: &StreetEdge) -> Option<f64> {
        match self {
            EdgeWeight::TravelTime => edge.travel_time,
            EdgeWeight::Length => Some(edge.length),
        }
    }
}

impl fmt::Display for EdgeWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Simple directed view of a [`StreetGraph`].
///
/// Node `i` of `graph` is node `i` of the street graph it was derived from;
/// node weights are OSM ids. This is a derived view and is never updated in
/// place; rebuild it with [`to_digraph`] when the street graph changes.
#[derive(Debug, Clone)]
pub struct ReducedGraph {
    pub graph: DiGraph<OsmNodeId, f64>,
    /// Street graph edge each reduced edge was taken from, by reduced edge index
    pub origin: Vec<EdgeIndex>,
    pub weight: EdgeWeight,
}

impl ReducedGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Street graph edge the reduced edge was taken from
    pub fn origin_of(&self, edge: EdgeIndex) -> Option<EdgeIndex> {
        self.origin.get(edge.index()).copied()
    }
}

/// Collapses parallel edges, keeping the cheapest one per ordered pair.
/// Self-loops are kept under the same rule.
///
/// # Errors
///
/// Returns [`Error::MissingAttribute`] if an edge lacks the weight attribute.
pub fn to_digraph(streets: &StreetGraph, weight: EdgeWeight) -> Result<ReducedGraph, Error> {
    // (weight, key, edge index) of the best edge seen per pair
    let mut best: HashMap<(NodeIndex, NodeIndex), (OrderedFloat<f64>, u32, EdgeIndex)> =
        HashMap::with_capacity(streets.edge_count());

    for edge in streets.graph.edge_references() {
        let value = weight.of(edge.weight()).ok_or_else(|| Error::MissingAttribute {
            attribute: weight.name(),
            u: streets.graph[edge.source()].osmid,
            v: streets.graph[edge.target()].osmid,
        })?;
        let candidate = (OrderedFloat(value), edge.weight().key, edge.id());

        best.entry((edge.source(), edge.target()))
            .and_modify(|current| {
                if candidate < *current {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }

    let mut graph = DiGraph::with_capacity(streets.node_count(), best.len());
    for node in streets.graph.node_weights() {
        graph.add_node(node.osmid);
    }

    let mut origin = Vec::with_capacity(best.len());
    for ((u, v), (value, _, edge)) in best.into_iter().sorted_unstable_by_key(|(pair, _)| *pair) {
        graph.add_edge(u, v, value.into_inner());
        origin.push(edge);
    }

    debug!(
        "Reduced {} edges to {} by minimum {weight}",
        streets.edge_count(),
        graph.edge_count()
    );

    Ok(ReducedGraph {
        graph,
        origin,
        weight,
    })
}
