use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{OsmNodeId, OsmWayId};

/// Body of an Overpass `[out:json]` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<Element>,
    /// Set by the server when the query ran into an error or timeout
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Node(OsmNode),
    Way(OsmWay),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsmNode {
    pub id: OsmNodeId,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsmWay {
    pub id: OsmWayId,
    #[serde(default)]
    pub nodes: Vec<OsmNodeId>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}
