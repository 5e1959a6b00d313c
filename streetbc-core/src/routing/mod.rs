//! Edge costs and shortest paths on the street network

pub mod dijkstra;
pub mod speeds;

pub use dijkstra::{ShortestPathDag, shortest_path_dag};
pub use speeds::{add_edge_speeds, add_edge_travel_times, clean_maxspeed};
