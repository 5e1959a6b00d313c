//! Street network model

pub mod components;
pub mod network;
mod topology;

pub use components::{StreetEdge, StreetNode, TagValue};
pub use network::{GraphMeta, StreetGraph};
