//! OSM data from Overpass JSON responses

mod processor;
mod types;

pub use processor::street_graph_from_overpass;
pub use types::{Element, OsmNode, OsmWay, OverpassResponse};
