use std::fs;
use std::path::Path;

use hashbrown::HashMap;
use streetbc_core::loading::build_street_graph;
use streetbc_core::loading::osm::OverpassResponse;
use streetbc_core::prelude::*;

fn fixture() -> OverpassResponse {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/overpass_grid.json");
    let body = fs::read_to_string(path).unwrap();
    serde_json::from_str(&body).unwrap()
}

fn config() -> NetworkConfig {
    NetworkConfig::new(52.0, -1.0, 500.0, NetworkType::Drive)
}

fn annotated_graph() -> StreetGraph {
    let mut graph = build_street_graph(&fixture(), &config()).unwrap();
    add_edge_speeds(&mut graph, &HashMap::new(), None).unwrap();
    add_edge_travel_times(&mut graph).unwrap();
    graph
}

#[test]
fn builds_simplified_grid() {
    let graph = build_street_graph(&fixture(), &config()).unwrap();

    // Corners 7 and 9 only join two two-way streets and are merged away;
    // node 99 lies outside the bounding box
    assert_eq!(graph.node_count(), 7);
    assert_eq!(graph.edge_count(), 18);
    for removed in [7, 9, 99] {
        assert!(graph.node_index(removed).is_none());
    }

    let center = graph.node_index(5).unwrap();
    assert_eq!(graph.graph[center].highway.as_deref(), Some("traffic_signals"));
    assert_eq!(graph.graph[center].street_count, Some(4));

    let n4 = graph.node_index(4).unwrap();
    let n8 = graph.node_index(8).unwrap();
    let merged = &graph.graph[graph.graph.find_edge(n4, n8).unwrap()];
    assert_eq!(merged.osmid, vec![200, 102]);
    assert_eq!(merged.geometry.as_ref().map(|line| line.0.len()), Some(3));
    graph.validate().unwrap();
}

#[test]
fn one_way_street_has_single_direction() {
    let graph = build_street_graph(&fixture(), &config()).unwrap();
    let n1 = graph.node_index(1).unwrap();
    let n2 = graph.node_index(2).unwrap();
    assert!(graph.graph.find_edge(n1, n2).is_some());
    assert!(graph.graph.find_edge(n2, n1).is_none());
}

#[test]
fn speeds_follow_posted_and_imputed_values() {
    let graph = annotated_graph();
    let n4 = graph.node_index(4).unwrap();
    let n5 = graph.node_index(5).unwrap();
    let middle = &graph.graph[graph.graph.find_edge(n4, n5).unwrap()];
    assert!((middle.speed_kph.unwrap() - 48.28032).abs() < 1e-9);

    for edge in graph.graph.edge_weights() {
        let speed = edge.speed_kph.unwrap();
        let time = edge.travel_time.unwrap();
        assert!(time > 0.0);
        assert!((time - edge.length / (speed * 1000.0 / 3600.0)).abs() < 1e-9);
    }
}

#[test]
fn scores_every_node() {
    let mut graph = annotated_graph();
    let scores = street_betweenness(&mut graph, EdgeWeight::TravelTime).unwrap();

    assert_eq!(scores.len(), graph.node_count());
    for node in graph.graph.node_weights() {
        let bc = node.bc.unwrap();
        assert!((0.0..=1.0).contains(&bc), "node {} has score {bc}", node.osmid);
        assert_eq!(scores[&node.osmid], bc);
    }
    assert!(scores[&5] > 0.0);
}

#[test]
fn outputs_round_trip() {
    let mut graph = annotated_graph();
    street_betweenness(&mut graph, EdgeWeight::TravelTime).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("drive");

    let colors = node_colors_by_centrality(&graph, PlotSettings::default().background().unwrap());
    let settings = PlotSettings {
        image_size: 300,
        ..PlotSettings::default()
    };
    render_graph(&graph, &colors, &settings, &base.join("graph.png")).unwrap();
    save_graph_geopackage(&graph, &base.join("graph.gpkg")).unwrap();
    save_graphml(&graph, &base.join("graph.graphml")).unwrap();

    assert!(base.join("graph.png").metadata().unwrap().len() > 0);

    let conn = rusqlite::Connection::open(base.join("graph.gpkg")).unwrap();
    let edges: i64 = conn
        .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))
        .unwrap();
    assert_eq!(edges, 18);

    let loaded = load_graphml(&base.join("graph.graphml")).unwrap();
    assert_eq!(loaded.node_count(), graph.node_count());
    assert_eq!(loaded.edge_count(), graph.edge_count());
    for node in graph.graph.node_weights() {
        let idx = loaded.node_index(node.osmid).unwrap();
        assert_eq!(loaded.graph[idx].bc, node.bc);
    }
    assert!(loaded.meta.simplified);
}
