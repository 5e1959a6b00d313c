use log::info;

use super::config::NetworkConfig;
use super::osm::{OverpassResponse, street_graph_from_overpass};
use super::overpass::{PERIPHERY_BUFFER_M, bbox_from_point, download_osm};
use super::simplify::simplify_graph;
use crate::{Error, StreetGraph};

/// Downloads and builds the street network described by `config`
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the download fails or
/// no street network remains inside the bounding box
pub fn create_street_graph(config: &NetworkConfig) -> Result<StreetGraph, Error> {
    config.validate()?;

    info!(
        "Creating {} network within {} m of ({}, {})",
        config.network_type,
        config.dist,
        config.center.y(),
        config.center.x()
    );
    let response = download_osm(config)?;
    build_street_graph(&response, config)
}

/// Builds the street network from an already downloaded Overpass response.
///
/// The raw graph is first cut to the bounding box widened by
/// [`PERIPHERY_BUFFER_M`], reduced to its largest weakly connected component
/// unless `retain_all` is set, simplified unless disabled, and annotated with
/// street counts. Only then is it truncated to the requested box, so streets
/// crossing the boundary keep their merged edges and boundary nodes keep the
/// street counts of the surrounding network.
///
/// # Errors
///
/// Returns [`Error::EmptyGraph`] if nothing remains after truncation
pub fn build_street_graph(
    response: &OverpassResponse,
    config: &NetworkConfig,
) -> Result<StreetGraph, Error> {
    let raw = street_graph_from_overpass(response, config.network_type)?;
    info!(
        "Created unsimplified graph with {} nodes and {} edges",
        raw.node_count(),
        raw.edge_count()
    );

    let buffered_bbox = bbox_from_point(config.center, config.dist + PERIPHERY_BUFFER_M);
    let mut buffered = raw.truncate_to_rect(&buffered_bbox);
    if !config.retain_all {
        buffered = buffered.largest_component();
    }
    if config.simplify {
        buffered = simplify_graph(&buffered)?;
    }
    buffered.count_streets_per_node();

    let bbox = bbox_from_point(config.center, config.dist);
    let mut graph = buffered.truncate_to_rect(&bbox);
    if graph.edge_count() == 0 {
        return Err(Error::EmptyGraph(format!(
            "no {} streets within {} m of ({}, {})",
            config.network_type,
            config.dist,
            config.center.y(),
            config.center.x()
        )));
    }
    if !config.retain_all {
        graph = graph.largest_component();
    }
    graph.validate()?;

    info!(
        "Created graph with {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::NetworkType;
    use crate::loading::osm::{Element, OsmNode, OsmWay};

    fn node(id: i64, lat: f64, lon: f64) -> Element {
        Element::Node(OsmNode {
            id,
            lat,
            lon,
            tags: BTreeMap::new(),
        })
    }

    fn way(id: i64, nodes: Vec<i64>) -> Element {
        Element::Way(OsmWay {
            id,
            nodes,
            tags: [("highway".to_string(), "residential".to_string())].into(),
        })
    }

    fn config() -> NetworkConfig {
        NetworkConfig::new(52.0, -1.0, 1000.0, NetworkType::Drive)
    }

    #[test]
    fn keeps_largest_component_inside_bbox() {
        // Main street 1-2-3 with a junction at 2 (spur 2-4), a separate
        // pair 5-6, and node 7 far outside the box
        let response = OverpassResponse {
            elements: vec![
                node(1, 52.0, -1.002),
                node(2, 52.0, -1.0),
                node(3, 52.0, -0.998),
                node(4, 52.002, -1.0),
                node(5, 52.004, -1.004),
                node(6, 52.004, -1.003),
                node(7, 53.0, -1.0),
                way(10, vec![1, 2, 3]),
                way(11, vec![2, 4]),
                way(12, vec![5, 6]),
                way(13, vec![3, 7]),
            ],
            remark: None,
        };

        let graph = build_street_graph(&response, &config()).unwrap();
        assert_eq!(graph.node_count(), 4);
        assert!(graph.node_index(5).is_none());
        assert!(graph.node_index(7).is_none());
        assert!(graph.meta.simplified);

        let junction = graph.node_index(2).unwrap();
        assert_eq!(graph.graph[junction].street_count, Some(3));
    }

    #[test]
    fn retain_all_keeps_disconnected_parts() {
        let response = OverpassResponse {
            elements: vec![
                node(1, 52.0, -1.002),
                node(2, 52.0, -1.0),
                node(5, 52.004, -1.004),
                node(6, 52.004, -1.003),
                way(10, vec![1, 2]),
                way(12, vec![5, 6]),
            ],
            remark: None,
        };
        let mut config = config();
        config.retain_all = true;
        config.simplify = false;

        let graph = build_street_graph(&response, &config).unwrap();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert!(!graph.meta.simplified);
    }

    #[test]
    fn nothing_inside_bbox_is_an_error() {
        let response = OverpassResponse {
            elements: vec![node(1, 60.0, 10.0), node(2, 60.001, 10.0), way(10, vec![1, 2])],
            remark: None,
        };
        assert!(matches!(
            build_street_graph(&response, &config()),
            Err(Error::EmptyGraph(_))
        ));
    }

    #[test]
    fn street_leaving_the_box_stays_connected() {
        // Node 2 lies about 670 m north, outside the 500 m box but inside
        // the buffered area; 1 and 3 are inside
        let response = OverpassResponse {
            elements: vec![
                node(1, 52.0, -1.001),
                node(2, 52.006, -1.0),
                node(3, 52.0, -0.999),
                way(10, vec![1, 2, 3]),
            ],
            remark: None,
        };
        let config = NetworkConfig::new(52.0, -1.0, 500.0, NetworkType::Drive);

        let graph = build_street_graph(&response, &config).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.node_index(2).is_none());

        let (a, b) = (graph.node_index(1).unwrap(), graph.node_index(3).unwrap());
        let edge = &graph.graph[graph.graph.find_edge(a, b).unwrap()];
        assert_eq!(edge.geometry.as_ref().map(|line| line.0.len()), Some(3));
    }

    #[test]
    fn boundary_nodes_count_streets_outside_the_box() {
        // Junction 2 has streets to 1 and 4 inside the box and to 3 outside it
        let response = OverpassResponse {
            elements: vec![
                node(1, 52.0, -1.002),
                node(2, 52.003, -1.0),
                node(3, 52.006, -1.0),
                node(4, 52.0, -0.998),
                way(10, vec![1, 2]),
                way(11, vec![2, 3]),
                way(12, vec![2, 4]),
            ],
            remark: None,
        };
        let config = NetworkConfig::new(52.0, -1.0, 500.0, NetworkType::Drive);

        let graph = build_street_graph(&response, &config).unwrap();
        assert!(graph.node_index(3).is_none());
        let junction = graph.node_index(2).unwrap();
        assert_eq!(graph.graph[junction].street_count, Some(3));
    }
}
