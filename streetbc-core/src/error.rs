use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid edge weight {weight} on edge {u} -> {v}: weights must be finite and non-negative")]
    /// `u` and `v` are OSM ids on street graphs, node indices otherwise
    InvalidWeight { u: i64, v: i64, weight: f64 },
    #[error("Edge {u} -> {v} has no `{attribute}` attribute")]
    MissingAttribute {
        attribute: &'static str,
        u: i64,
        v: i64,
    },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Graph is empty: {0}")]
    EmptyGraph(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("GeoPackage error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("GraphML error: {0}")]
    Xml(String),
    #[error("Render error: {0}")]
    Render(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::NetworkError(err.to_string())
    }
}
