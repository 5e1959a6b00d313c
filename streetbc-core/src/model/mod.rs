//! Data model for street network analysis
//!
//! Contains the directed street multigraph and its node and edge types.

pub mod streets;

pub use streets::{GraphMeta, StreetEdge, StreetGraph, StreetNode, TagValue};
