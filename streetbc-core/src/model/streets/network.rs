//! Directed street multigraph

use chrono::{DateTime, Utc};
use geo::{Coord, LineString};
use hashbrown::HashMap;
use petgraph::{
    Direction,
    graph::{DiGraph, EdgeIndex, NodeIndex},
    visit::EdgeRef,
};

use super::components::{StreetEdge, StreetNode};
use crate::{Error, OsmNodeId};

/// Graph-level attributes carried into exports
#[derive(Debug, Clone, PartialEq)]
pub struct GraphMeta {
    pub created_date: DateTime<Utc>,
    pub created_with: String,
    pub crs: String,
    pub simplified: bool,
}

impl Default for GraphMeta {
    fn default() -> Self {
        Self {
            created_date: Utc::now(),
            created_with: format!("streetbc {}", env!("CARGO_PKG_VERSION")),
            crs: "epsg:4326".to_string(),
            simplified: false,
        }
    }
}

/// Street network as a directed multigraph.
///
/// Parallel edges between the same ordered pair of nodes are allowed and
/// told apart by [`StreetEdge::key`].
#[derive(Debug, Clone, Default)]
pub struct StreetGraph {
    pub graph: DiGraph<StreetNode, StreetEdge>,
    pub meta: GraphMeta,
    node_lookup: HashMap<OsmNodeId, NodeIndex>,
}

impl StreetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_meta(meta: GraphMeta) -> Self {
        Self {
            meta,
            ..Self::default()
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Adds a node, or returns the existing index if its OSM id is known
    pub fn add_node(&mut self, node: StreetNode) -> NodeIndex {
        if let Some(&idx) = self.node_lookup.get(&node.osmid) {
            return idx;
        }
        let osmid = node.osmid;
        let idx = self.graph.add_node(node);
        self.node_lookup.insert(osmid, idx);
        idx
    }

    /// Adds an edge and assigns it the next free key for `(u, v)`
    pub fn add_edge(&mut self, u: NodeIndex, v: NodeIndex, mut edge: StreetEdge) -> EdgeIndex {
        edge.key = self
            .graph
            .edges_connecting(u, v)
            .map(|e| e.weight().key + 1)
            .max()
            .unwrap_or(0);
        self.graph.add_edge(u, v, edge)
    }

    pub fn node_index(&self, osmid: OsmNodeId) -> Option<NodeIndex> {
        self.node_lookup.get(&osmid).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&StreetNode> {
        self.graph.node_weight(idx)
    }

    /// OSM ids of the endpoints of an edge
    pub fn edge_osm_endpoints(&self, edge: EdgeIndex) -> Option<(OsmNodeId, OsmNodeId)> {
        let (u, v) = self.graph.edge_endpoints(edge)?;
        Some((self.graph[u].osmid, self.graph[v].osmid))
    }

    /// Edge geometry, or a straight line between its endpoints
    pub fn edge_line(&self, edge: EdgeIndex) -> Option<LineString<f64>> {
        let weight = self.graph.edge_weight(edge)?;
        if let Some(geometry) = &weight.geometry {
            return Some(geometry.clone());
        }
        let (u, v) = self.graph.edge_endpoints(edge)?;
        let start: Coord<f64> = self.graph[u].geometry.into();
        let end: Coord<f64> = self.graph[v].geometry.into();
        Some(LineString::new(vec![start, end]))
    }

    pub fn out_degree(&self, node: NodeIndex) -> usize {
        self.graph.edges_directed(node, Direction::Outgoing).count()
    }

    pub fn in_degree(&self, node: NodeIndex) -> usize {
        self.graph.edges_directed(node, Direction::Incoming).count()
    }

    /// Builds a new graph containing only the nodes for which `keep` is true
    /// and the edges between them. Node order is preserved.
    pub fn filter_nodes<F>(&self, mut keep: F) -> StreetGraph
    where
        F: FnMut(NodeIndex, &StreetNode) -> bool,
    {
        let mut filtered = StreetGraph::with_meta(self.meta.clone());
        let mut mapping: HashMap<NodeIndex, NodeIndex> = HashMap::new();

        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            if keep(idx, node) {
                mapping.insert(idx, filtered.add_node(node.clone()));
            }
        }

        for edge in self.graph.edge_references() {
            if let (Some(&u), Some(&v)) = (mapping.get(&edge.source()), mapping.get(&edge.target()))
            {
                filtered.graph.add_edge(u, v, edge.weight().clone());
            }
        }

        filtered
    }

    /// Checks the invariants the rest of the pipeline relies on
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`] describing the first violation found
    pub fn validate(&self) -> Result<(), Error> {
        if self.node_lookup.len() != self.graph.node_count() {
            return Err(Error::InvalidData(format!(
                "node index holds {} ids for {} nodes",
                self.node_lookup.len(),
                self.graph.node_count()
            )));
        }
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            if self.node_lookup.get(&node.osmid) != Some(&idx) {
                return Err(Error::InvalidData(format!(
                    "node {} is not indexed",
                    node.osmid
                )));
            }
            if !node.geometry.x().is_finite() || !node.geometry.y().is_finite() {
                return Err(Error::InvalidData(format!(
                    "node {} has non-finite coordinates",
                    node.osmid
                )));
            }
        }

        let mut keys: HashMap<(NodeIndex, NodeIndex, u32), EdgeIndex> = HashMap::new();
        for edge in self.graph.edge_references() {
            let (u, v) = (self.graph[edge.source()].osmid, self.graph[edge.target()].osmid);
            let weight = edge.weight();

            if !weight.length.is_finite() || weight.length < 0.0 {
                return Err(Error::InvalidData(format!(
                    "edge {u} -> {v} has invalid length {}",
                    weight.length
                )));
            }
            if let Some(speed) = weight.speed_kph {
                if !speed.is_finite() || speed <= 0.0 {
                    return Err(Error::InvalidData(format!(
                        "edge {u} -> {v} has invalid speed {speed}"
                    )));
                }
            }
            if let Some(time) = weight.travel_time {
                if !time.is_finite() || time < 0.0 {
                    return Err(Error::InvalidData(format!(
                        "edge {u} -> {v} has invalid travel time {time}"
                    )));
                }
            }
            if keys
                .insert((edge.source(), edge.target(), weight.key), edge.id())
                .is_some()
            {
                return Err(Error::InvalidData(format!(
                    "edge {u} -> {v} has duplicate key {}",
                    weight.key
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use geo::Point;

    use super::*;

    fn two_node_graph() -> (StreetGraph, NodeIndex, NodeIndex) {
        let mut graph = StreetGraph::new();
        let a = graph.add_node(StreetNode::new(1, Point::new(-1.20, 52.77)));
        let b = graph.add_node(StreetNode::new(2, Point::new(-1.21, 52.77)));
        (graph, a, b)
    }

    #[test]
    fn parallel_edges_get_increasing_keys() {
        let (mut graph, a, b) = two_node_graph();
        let e0 = graph.add_edge(a, b, StreetEdge::new(10, 5.0));
        let e1 = graph.add_edge(a, b, StreetEdge::new(11, 6.0));
        let back = graph.add_edge(b, a, StreetEdge::new(10, 5.0));

        assert_eq!(graph.graph[e0].key, 0);
        assert_eq!(graph.graph[e1].key, 1);
        assert_eq!(graph.graph[back].key, 0);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn duplicate_osm_id_reuses_node() {
        let (mut graph, a, _) = two_node_graph();
        let again = graph.add_node(StreetNode::new(1, Point::new(0.0, 0.0)));
        assert_eq!(a, again);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn straight_line_for_edges_without_geometry() {
        let (mut graph, a, b) = two_node_graph();
        let e = graph.add_edge(a, b, StreetEdge::new(10, 5.0));
        let line = graph.edge_line(e).unwrap();
        assert_eq!(line.0.len(), 2);
        assert_eq!(line.0[0], Coord { x: -1.20, y: 52.77 });
    }

    #[test]
    fn filter_drops_dangling_edges() {
        let (mut graph, a, b) = two_node_graph();
        graph.add_edge(a, b, StreetEdge::new(10, 5.0));
        let filtered = graph.filter_nodes(|idx, _| idx == a);
        assert_eq!(filtered.node_count(), 1);
        assert_eq!(filtered.edge_count(), 0);
        assert!(filtered.validate().is_ok());
    }

    #[test]
    fn validate_rejects_negative_travel_time() {
        let (mut graph, a, b) = two_node_graph();
        let mut edge = StreetEdge::new(10, 5.0);
        edge.travel_time = Some(-1.0);
        graph.add_edge(a, b, edge);
        assert!(matches!(graph.validate(), Err(Error::InvalidData(_))));
    }
}
