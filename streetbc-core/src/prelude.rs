// Re-export key components
pub use crate::algo::betweenness::{betweenness_centrality, set_node_centrality, street_betweenness};
pub use crate::algo::reduce::{EdgeWeight, ReducedGraph, to_digraph};
pub use crate::export::{load_graphml, save_graph_geopackage, save_graphml};
pub use crate::loading::{
    CacheSettings, NetworkConfig, NetworkType, OverpassSettings, create_street_graph,
};
pub use crate::model::{GraphMeta, StreetEdge, StreetGraph, StreetNode, TagValue};
pub use crate::render::{PlotSettings, node_colors_by_centrality, render_graph};
pub use crate::routing::speeds::{add_edge_speeds, add_edge_travel_times};

// Core types for the street network
pub use crate::Error;
pub use crate::OsmNodeId;
pub use crate::OsmWayId;
pub use crate::TravelTime; // seconds
