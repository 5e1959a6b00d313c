//! Overpass response processing into an unsimplified street graph

use geo::{Distance, Haversine, Point};
use hashbrown::HashMap;
use itertools::Itertools;
use log::{debug, info, warn};

use super::types::{Element, OsmNode, OsmWay, OverpassResponse};
use crate::{Error, NetworkType, OsmNodeId, StreetEdge, StreetGraph, StreetNode, TagValue};

/// Way tags carried onto edges
const WAY_TAGS: [&str; 14] = [
    "access", "area", "bridge", "est_width", "highway", "junction", "landuse", "lanes", "maxspeed",
    "name", "ref", "service", "tunnel", "width",
];

/// `oneway` values that make a way one-way
const ONEWAY_VALUES: [&str; 7] = ["yes", "true", "1", "-1", "reverse", "T", "F"];
/// `oneway` values meaning traffic runs against the node order
const REVERSED_VALUES: [&str; 3] = ["-1", "reverse", "T"];

fn is_oneway(way: &OsmWay, network_type: NetworkType) -> bool {
    if network_type.is_bidirectional() {
        return false;
    }
    way.tags
        .get("oneway")
        .is_some_and(|value| ONEWAY_VALUES.contains(&value.as_str()))
        || way.tags.get("junction").is_some_and(|value| value == "roundabout")
}

fn is_reversed(way: &OsmWay) -> bool {
    way.tags
        .get("oneway")
        .is_some_and(|value| REVERSED_VALUES.contains(&value.as_str()))
}

/// Builds the street multigraph of every node and way in the response.
///
/// Each way contributes one edge per consecutive node pair, in both
/// directions unless it is one-way. Segments referencing nodes missing from
/// the response are skipped.
///
/// # Errors
///
/// Returns [`Error::EmptyGraph`] if the response contains no ways.
pub fn street_graph_from_overpass(
    response: &OverpassResponse,
    network_type: NetworkType,
) -> Result<StreetGraph, Error> {
    let mut nodes: HashMap<OsmNodeId, &OsmNode> = HashMap::new();
    let mut ways: Vec<&OsmWay> = Vec::new();
    for element in &response.elements {
        match element {
            Element::Node(node) => {
                nodes.insert(node.id, node);
            }
            Element::Way(way) => ways.push(way),
            Element::Other => {}
        }
    }

    if ways.is_empty() {
        return Err(Error::EmptyGraph(
            "the Overpass response contains no ways".to_string(),
        ));
    }
    info!("Parsed {} nodes and {} ways", nodes.len(), ways.len());

    let mut graph = StreetGraph::new();
    for element in &response.elements {
        if let Element::Node(node) = element {
            let mut street_node = StreetNode::new(node.id, Point::new(node.lon, node.lat));
            street_node.highway = node.tags.get("highway").cloned();
            graph.add_node(street_node);
        }
    }

    let mut skipped = 0usize;
    for way in ways {
        skipped += add_way(&mut graph, way, network_type);
    }
    if skipped > 0 {
        warn!("Skipped {skipped} segments referencing nodes missing from the response");
    }

    debug!(
        "Built unsimplified graph with {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

/// Adds the edges of a single way; returns the number of skipped segments
fn add_way(graph: &mut StreetGraph, way: &OsmWay, network_type: NetworkType) -> usize {
    let oneway = is_oneway(way, network_type);
    let mut path: Vec<OsmNodeId> = way.nodes.iter().copied().dedup().collect();
    if oneway && is_reversed(way) {
        path.reverse();
    }

    let mut template = StreetEdge::new(way.id, 0.0);
    template.oneway = oneway;
    for (key, value) in &way.tags {
        if WAY_TAGS.contains(&key.as_str()) {
            template
                .tags
                .insert(key.clone(), TagValue::Single(value.clone()));
        }
    }

    let mut skipped = 0;
    for (from, to) in path.iter().tuple_windows() {
        let (Some(u), Some(v)) = (graph.node_index(*from), graph.node_index(*to)) else {
            skipped += 1;
            continue;
        };
        let length = Haversine.distance(graph.graph[u].geometry, graph.graph[v].geometry);

        let mut forward = template.clone();
        forward.length = length;
        if !oneway {
            let mut backward = forward.clone();
            backward.reversed = true;
            graph.add_edge(v, u, backward);
        }
        graph.add_edge(u, v, forward);
    }
    skipped
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn node(id: i64, lat: f64, lon: f64) -> Element {
        Element::Node(OsmNode {
            id,
            lat,
            lon,
            tags: BTreeMap::new(),
        })
    }

    fn way(id: i64, nodes: Vec<i64>, tags: &[(&str, &str)]) -> Element {
        Element::Way(OsmWay {
            id,
            nodes,
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        })
    }

    fn response(elements: Vec<Element>) -> OverpassResponse {
        OverpassResponse {
            elements,
            remark: None,
        }
    }

    fn base_nodes() -> Vec<Element> {
        vec![
            node(1, 52.0, -1.0),
            node(2, 52.001, -1.0),
            node(3, 52.002, -1.0),
        ]
    }

    #[test]
    fn two_way_street_gets_both_directions() {
        let mut elements = base_nodes();
        elements.push(way(10, vec![1, 2, 3], &[("highway", "residential"), ("name", "High St")]));
        let graph = street_graph_from_overpass(&response(elements), NetworkType::Drive).unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 4);
        let reversed = graph.graph.edge_weights().filter(|e| e.reversed).count();
        assert_eq!(reversed, 2);

        let edge = graph.graph.edge_weights().next().unwrap();
        assert!(!edge.oneway);
        assert_eq!(edge.tag("name"), Some(&TagValue::from("High St")));
        // ~111 m per 0.001 degree latitude
        assert!((edge.length - 111.2).abs() < 0.5);
    }

    #[test]
    fn reversed_oneway_follows_traffic_direction() {
        let mut elements = base_nodes();
        elements.push(way(10, vec![1, 2, 3], &[("highway", "primary"), ("oneway", "-1")]));
        let graph = street_graph_from_overpass(&response(elements), NetworkType::Drive).unwrap();

        assert_eq!(graph.edge_count(), 2);
        let n3 = graph.node_index(3).unwrap();
        let n2 = graph.node_index(2).unwrap();
        assert!(graph.graph.find_edge(n3, n2).is_some());
        assert!(graph.graph.find_edge(n2, n3).is_none());
        assert!(graph.graph.edge_weights().all(|e| e.oneway && !e.reversed));
    }

    #[test]
    fn roundabouts_are_oneway_but_not_for_walking() {
        let mut elements = base_nodes();
        elements.push(way(10, vec![1, 2, 3], &[("highway", "primary"), ("junction", "roundabout")]));
        let response = response(elements);

        let drive = street_graph_from_overpass(&response, NetworkType::Drive).unwrap();
        assert_eq!(drive.edge_count(), 2);
        let walk = street_graph_from_overpass(&response, NetworkType::Walk).unwrap();
        assert_eq!(walk.edge_count(), 4);
    }

    #[test]
    fn missing_nodes_skip_segments() {
        let mut elements = base_nodes();
        elements.push(way(10, vec![1, 2, 99], &[("highway", "primary"), ("oneway", "yes")]));
        let graph = street_graph_from_overpass(&response(elements), NetworkType::Drive).unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn response_without_ways_is_empty() {
        let result = street_graph_from_overpass(&response(base_nodes()), NetworkType::Drive);
        assert!(matches!(result, Err(Error::EmptyGraph(_))));
    }
}
