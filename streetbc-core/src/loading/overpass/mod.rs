//! Overpass API access: query construction, HTTP download and response cache

mod cache;
mod client;
pub mod query;

pub use cache::ResponseCache;
pub use client::{download_osm, fetch_query};
pub use query::{PERIPHERY_BUFFER_M, bbox_from_point, build_query, network_filter};
