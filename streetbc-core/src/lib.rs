//! Street network analysis: download an OpenStreetMap road graph around a
//! point, annotate edges with speeds and travel times, and score
//! intersections by travel-time weighted betweenness centrality.
//!
//! The resulting multigraph can be rendered to PNG and exported as
//! GeoPackage or GraphML.

pub mod algo;
pub mod error;
pub mod export;
pub mod loading;
pub mod model;
pub mod prelude;
pub mod render;
pub mod routing;

pub use error::Error;
pub use geo;
pub use petgraph;
pub use loading::{CacheSettings, NetworkConfig, NetworkType, OverpassSettings, create_street_graph};
pub use model::{GraphMeta, StreetEdge, StreetGraph, StreetNode, TagValue};

/// OpenStreetMap node id
pub type OsmNodeId = i64;
/// OpenStreetMap way id
pub type OsmWayId = i64;
/// Travel time in seconds
pub type TravelTime = f64;

/// Mean earth radius in metres used for bounding boxes
pub const EARTH_RADIUS_M: f64 = 6_371_009.0;
