//! Street network components - nodes, edges and tag values

use std::collections::BTreeMap;
use std::fmt;

use geo::{LineString, Point};
use itertools::Itertools;

use crate::{OsmNodeId, OsmWayId, TravelTime};

/// Street graph node (intersection, dead end or interstitial point)
#[derive(Debug, Clone, PartialEq)]
pub struct StreetNode {
    /// OSM ID of the node
    pub osmid: OsmNodeId,
    /// Node coordinates, x = longitude, y = latitude
    pub geometry: Point<f64>,
    /// `highway` tag of the node itself, e.g. `traffic_signals`
    pub highway: Option<String>,
    /// Number of physical streets meeting at this node
    pub street_count: Option<u32>,
    /// Betweenness centrality
    pub bc: Option<f64>,
}

impl StreetNode {
    pub fn new(osmid: OsmNodeId, geometry: Point<f64>) -> Self {
        Self {
            osmid,
            geometry,
            highway: None,
            street_count: None,
            bc: None,
        }
    }

    pub fn lat(&self) -> f64 {
        self.geometry.y()
    }

    pub fn lon(&self) -> f64 {
        self.geometry.x()
    }
}

/// Value of an OSM tag on an edge.
///
/// Simplification merges ways whose tags disagree, in which case
/// the value becomes a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Single(String),
    List(Vec<String>),
}

impl TagValue {
    pub fn as_slice(&self) -> &[String] {
        match self {
            TagValue::Single(value) => std::slice::from_ref(value),
            TagValue::List(values) => values,
        }
    }

    /// First value, used where a scalar is required (e.g. highway type)
    pub fn first(&self) -> &str {
        self.as_slice().first().map_or("", String::as_str)
    }

    /// Merges several values into one, deduplicating while keeping order
    pub fn merge<'a>(values: impl IntoIterator<Item = &'a TagValue>) -> Option<TagValue> {
        let mut merged: Vec<String> = values
            .into_iter()
            .flat_map(TagValue::as_slice)
            .unique()
            .cloned()
            .collect();

        match merged.len() {
            0 => None,
            1 => merged.pop().map(TagValue::Single),
            _ => Some(TagValue::List(merged)),
        }
    }

    /// Parses the textual form written by [`fmt::Display`]
    pub fn parse(text: &str) -> TagValue {
        let trimmed = text.trim();
        if trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']') {
            if let Some(values) = parse_list(&trimmed[1..trimmed.len() - 1]) {
                return TagValue::List(values);
            }
        }
        TagValue::Single(text.to_string())
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Single(value.to_string())
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Single(value) => f.write_str(value),
            TagValue::List(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, value)?;
                }
                f.write_str("]")
            }
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    write!(f, "{quote}")?;
    for c in value.chars() {
        if c == quote || c == '\\' {
            write!(f, "\\")?;
        }
        write!(f, "{c}")?;
    }
    write!(f, "{quote}")
}

/// Parses `'a', "b", 'c'` into its string items. Returns `None` if the text
/// is not a list of quoted strings.
fn parse_list(inner: &str) -> Option<Vec<String>> {
    let mut values = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let quote = match chars.next() {
            None => break,
            Some(q @ ('\'' | '"')) => q,
            Some(_) => return None,
        };

        let mut value = String::new();
        loop {
            match chars.next()? {
                '\\' => value.push(chars.next()?),
                c if c == quote => break,
                c => value.push(c),
            }
        }
        values.push(value);

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => break,
            Some(',') => {}
            Some(_) => return None,
        }
    }

    (values.len() > 1).then_some(values)
}

/// Street graph edge (street segment)
#[derive(Debug, Clone, PartialEq)]
pub struct StreetEdge {
    /// Multigraph key, distinguishes parallel edges between the same nodes
    pub key: u32,
    /// OSM ids of the ways this edge was built from
    pub osmid: Vec<OsmWayId>,
    /// Length in metres
    pub length: f64,
    pub oneway: bool,
    /// Edge runs against the digitisation direction of its way
    pub reversed: bool,
    /// Remaining OSM tags: highway, name, maxspeed, lanes, ...
    pub tags: BTreeMap<String, TagValue>,
    /// Geometry of simplified edges; straight edges have none
    pub geometry: Option<LineString<f64>>,
    /// Imputed driving speed in km/h
    pub speed_kph: Option<f64>,
    /// Travel time in seconds
    pub travel_time: Option<TravelTime>,
}

impl StreetEdge {
    pub fn new(osmid: OsmWayId, length: f64) -> Self {
        Self {
            key: 0,
            osmid: vec![osmid],
            length,
            oneway: false,
            reversed: false,
            tags: BTreeMap::new(),
            geometry: None,
            speed_kph: None,
            travel_time: None,
        }
    }

    pub fn tag(&self, name: &str) -> Option<&TagValue> {
        self.tags.get(name)
    }

    /// Highway type; the first one if simplification merged several
    pub fn highway(&self) -> Option<&str> {
        self.tag("highway").map(TagValue::first)
    }
}
