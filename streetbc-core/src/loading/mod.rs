//! This module is responsible for downloading OpenStreetMap data from the
//! Overpass API and building a street multigraph from it.

mod builder;
mod config;
pub mod osm;
pub mod overpass;
pub mod simplify;

pub use builder::{build_street_graph, create_street_graph};
pub use config::{CacheSettings, NetworkConfig, NetworkType, OverpassSettings};
