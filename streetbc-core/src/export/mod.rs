//! Persistence of street graphs to GeoPackage and GraphML files

mod geopackage;
mod graphml;

pub use geopackage::save_graph_geopackage;
pub use graphml::{load_graphml, save_graphml};
