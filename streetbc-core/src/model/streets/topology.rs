//! Whole-graph topology operations: truncation, components, street counts

use geo::{Intersects, Rect};
use hashbrown::{HashMap, HashSet};
use log::debug;
use petgraph::{graph::NodeIndex, unionfind::UnionFind, visit::EdgeRef};

use super::network::StreetGraph;

impl StreetGraph {
    /// Keeps only nodes inside `rect` (boundary inclusive)
    pub fn truncate_to_rect(&self, rect: &Rect<f64>) -> StreetGraph {
        let truncated = self.filter_nodes(|_, node| node.geometry.intersects(rect));
        debug!(
            "Truncated graph to bounding box: {} of {} nodes kept",
            truncated.node_count(),
            self.node_count()
        );
        truncated
    }

    /// Keeps only the largest weakly connected component.
    /// Ties are resolved in favour of the component found first.
    pub fn largest_component(&self) -> StreetGraph {
        let node_count = self.node_count();
        if node_count == 0 {
            return self.clone();
        }

        let mut components = UnionFind::<usize>::new(node_count);
        for edge in self.graph.edge_references() {
            components.union(edge.source().index(), edge.target().index());
        }
        let labels = components.into_labeling();

        let mut sizes: HashMap<usize, usize> = HashMap::new();
        let mut order: Vec<usize> = Vec::new();
        for &label in &labels {
            let size = sizes.entry(label).or_insert(0);
            if *size == 0 {
                order.push(label);
            }
            *size += 1;
        }

        let mut largest = order[0];
        for &label in &order {
            if sizes[&label] > sizes[&largest] {
                largest = label;
            }
        }

        debug!(
            "Found {} weakly connected components, keeping one with {} nodes",
            order.len(),
            sizes[&largest]
        );
        self.filter_nodes(|idx, _| labels[idx.index()] == largest)
    }

    /// Sets [`StreetNode::street_count`](super::StreetNode::street_count):
    /// the number of distinct physical streets touching each node, ignoring
    /// direction and parallel edges. Self-loops count twice.
    pub fn count_streets_per_node(&mut self) {
        let mut streets: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
        for edge in self.graph.edge_references() {
            let (a, b) = (edge.source(), edge.target());
            streets.insert(if a <= b { (a, b) } else { (b, a) });
        }

        let mut counts = vec![0u32; self.node_count()];
        for (a, b) in streets {
            counts[a.index()] += 1;
            counts[b.index()] += 1;
        }

        for idx in self.graph.node_indices().collect::<Vec<_>>() {
            self.graph[idx].street_count = Some(counts[idx.index()]);
        }
    }
}
