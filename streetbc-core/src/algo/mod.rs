//! Graph algorithms on the street network

pub mod betweenness;
pub mod reduce;

pub use betweenness::{
    betweenness_centrality, betweenness_centrality_raw, set_node_centrality, street_betweenness,
};
pub use reduce::{EdgeWeight, ReducedGraph, to_digraph};
