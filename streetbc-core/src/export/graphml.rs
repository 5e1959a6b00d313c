//! GraphML persistence of the street multigraph.
//!
//! All attribute values are written as strings. Booleans use the `True` /
//! `False` spelling, merged values use Python list syntax and edge geometry
//! is stored as WKT, so files can be read back by other OSM graph tooling.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{NaiveDateTime, Utc};
use geo::LineString;
use hashbrown::HashMap;
use itertools::Itertools;
use log::{debug, info};
use petgraph::visit::EdgeRef;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use wkt::{ToWkt, TryFromWkt};

use crate::{Error, GraphMeta, OsmNodeId, StreetEdge, StreetGraph, StreetNode, TagValue};

const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://graphml.graphdrawing.org/xmlns \
                               http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const GRAPH_ATTRS: [&str; 4] = ["created_date", "created_with", "crs", "simplified"];
const NODE_ATTRS: [&str; 5] = ["y", "x", "street_count", "highway", "bc"];
const EDGE_ATTRS: [&str; 7] = [
    "osmid",
    "oneway",
    "reversed",
    "length",
    "geometry",
    "speed_kph",
    "travel_time",
];

fn xml_error(err: impl std::fmt::Display) -> Error {
    Error::Xml(err.to_string())
}

fn python_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "True" | "true" | "1" => Some(true),
        "False" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn format_osmids(ids: &[i64]) -> String {
    match ids {
        [single] => single.to_string(),
        _ => format!("[{}]", ids.iter().join(", ")),
    }
}

fn parse_osmids(text: &str) -> Result<Vec<i64>, Error> {
    let trimmed = text.trim().trim_start_matches('[').trim_end_matches(']');
    trimmed
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| Error::InvalidData(format!("invalid osmid `{part}`")))
        })
        .collect()
}

fn parse_number<T: std::str::FromStr>(name: &str, text: &str) -> Result<T, Error> {
    text.trim()
        .parse()
        .map_err(|_| Error::InvalidData(format!("invalid {name} value `{text}`")))
}

fn node_attributes(node: &StreetNode) -> Vec<(&'static str, String)> {
    let mut attrs = vec![("y", node.lat().to_string()), ("x", node.lon().to_string())];
    if let Some(count) = node.street_count {
        attrs.push(("street_count", count.to_string()));
    }
    if let Some(highway) = &node.highway {
        attrs.push(("highway", highway.clone()));
    }
    if let Some(bc) = node.bc {
        attrs.push(("bc", bc.to_string()));
    }
    attrs
}

fn edge_attributes<'a>(edge: &'a StreetEdge) -> Vec<(&'a str, String)> {
    let mut attrs = vec![
        ("osmid", format_osmids(&edge.osmid)),
        ("oneway", python_bool(edge.oneway).to_string()),
        ("reversed", python_bool(edge.reversed).to_string()),
        ("length", edge.length.to_string()),
    ];
    if let Some(geometry) = &edge.geometry {
        attrs.push(("geometry", geometry.to_wkt().to_string()));
    }
    if let Some(speed) = edge.speed_kph {
        attrs.push(("speed_kph", speed.to_string()));
    }
    if let Some(time) = edge.travel_time {
        attrs.push(("travel_time", time.to_string()));
    }
    for (name, value) in &edge.tags {
        attrs.push((name.as_str(), value.to_string()));
    }
    attrs
}

struct KeyTable {
    ids: HashMap<(&'static str, String), String>,
    declarations: Vec<(String, &'static str, String)>,
}

impl KeyTable {
    fn new() -> Self {
        Self {
            ids: HashMap::new(),
            declarations: Vec::new(),
        }
    }

    fn declare(&mut self, domain: &'static str, name: &str) {
        let id = format!("d{}", self.declarations.len());
        if self.ids.insert((domain, name.to_string()), id.clone()).is_none() {
            self.declarations.push((id, domain, name.to_string()));
        }
    }

    fn id(&self, domain: &'static str, name: &str) -> Result<&str, Error> {
        self.ids
            .get(&(domain, name.to_string()))
            .map(String::as_str)
            .ok_or_else(|| Error::Xml(format!("undeclared {domain} attribute `{name}`")))
    }
}

fn write_data<W: Write>(writer: &mut Writer<W>, key: &str, value: &str) -> Result<(), Error> {
    writer
        .write_event(Event::Start(
            BytesStart::new("data").with_attributes([("key", key)]),
        ))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("data")))
        .map_err(xml_error)?;
    Ok(())
}

/// Writes the graph as GraphML, creating parent directories as needed
///
/// # Errors
///
/// Returns an error if the file can't be written
pub fn save_graphml(graph: &StreetGraph, path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut keys = KeyTable::new();
    for name in GRAPH_ATTRS {
        keys.declare("graph", name);
    }
    for name in NODE_ATTRS {
        keys.declare("node", name);
    }
    for name in EDGE_ATTRS {
        keys.declare("edge", name);
    }
    let tag_names: BTreeSet<&str> = graph
        .graph
        .edge_weights()
        .flat_map(|edge| edge.tags.keys().map(String::as_str))
        .collect();
    for name in tag_names {
        keys.declare("edge", name);
    }

    let file = fs::File::create(path)?;
    let mut writer = Writer::new_with_indent(BufWriter::new(file), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("graphml").with_attributes([
            ("xmlns", GRAPHML_NS),
            ("xmlns:xsi", XSI_NS),
            ("xsi:schemaLocation", SCHEMA_LOCATION),
        ])))
        .map_err(xml_error)?;

    for (id, domain, name) in &keys.declarations {
        writer
            .write_event(Event::Empty(BytesStart::new("key").with_attributes([
                ("id", id.as_str()),
                ("for", *domain),
                ("attr.name", name.as_str()),
                ("attr.type", "string"),
            ])))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::Start(
            BytesStart::new("graph").with_attributes([("edgedefault", "directed")]),
        ))
        .map_err(xml_error)?;

    let meta = &graph.meta;
    let graph_values = [
        meta.created_date.format(DATE_FORMAT).to_string(),
        meta.created_with.clone(),
        meta.crs.clone(),
        python_bool(meta.simplified).to_string(),
    ];
    for (name, value) in GRAPH_ATTRS.iter().zip(&graph_values) {
        write_data(&mut writer, keys.id("graph", name)?, value)?;
    }

    for node in graph.graph.node_weights() {
        let id = node.osmid.to_string();
        writer
            .write_event(Event::Start(
                BytesStart::new("node").with_attributes([("id", id.as_str())]),
            ))
            .map_err(xml_error)?;
        for (name, value) in node_attributes(node) {
            write_data(&mut writer, keys.id("node", name)?, &value)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("node")))
            .map_err(xml_error)?;
    }

    for edge in graph.graph.edge_references() {
        let source = graph.graph[edge.source()].osmid.to_string();
        let target = graph.graph[edge.target()].osmid.to_string();
        let key = edge.weight().key.to_string();
        writer
            .write_event(Event::Start(BytesStart::new("edge").with_attributes([
                ("source", source.as_str()),
                ("target", target.as_str()),
                ("id", key.as_str()),
            ])))
            .map_err(xml_error)?;
        for (name, value) in edge_attributes(edge.weight()) {
            write_data(&mut writer, keys.id("edge", name)?, &value)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("edge")))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("graph")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("graphml")))
        .map_err(xml_error)?;
    writer.into_inner().flush()?;

    info!(
        "Saved graph with {} nodes and {} edges to {}",
        graph.node_count(),
        graph.edge_count(),
        path.display()
    );
    Ok(())
}

/// Element currently being read, with its collected `data` values
enum Open {
    Graph(BTreeMap<String, String>),
    Node(OsmNodeId, BTreeMap<String, String>),
    Edge {
        source: OsmNodeId,
        target: OsmNodeId,
        key: u32,
        data: BTreeMap<String, String>,
    },
}

impl Open {
    fn data_mut(&mut self) -> &mut BTreeMap<String, String> {
        match self {
            Open::Graph(data) | Open::Node(_, data) | Open::Edge { data, .. } => data,
        }
    }
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, Error> {
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

fn required_attribute(element: &BytesStart<'_>, name: &str) -> Result<String, Error> {
    attribute(element, name)?.ok_or_else(|| {
        Error::Xml(format!(
            "<{}> is missing the `{name}` attribute",
            String::from_utf8_lossy(element.name().as_ref())
        ))
    })
}

fn build_meta(data: &BTreeMap<String, String>) -> GraphMeta {
    let mut meta = GraphMeta::default();
    if let Some(date) = data.get("created_date") {
        meta.created_date = NaiveDateTime::parse_from_str(date, DATE_FORMAT)
            .map_or_else(|_| Utc::now(), |date| date.and_utc());
    }
    if let Some(created_with) = data.get("created_with") {
        meta.created_with.clone_from(created_with);
    }
    if let Some(crs) = data.get("crs") {
        meta.crs.clone_from(crs);
    }
    meta.simplified = data
        .get("simplified")
        .and_then(|value| parse_bool(value))
        .unwrap_or(false);
    meta
}

fn build_node(osmid: OsmNodeId, data: &BTreeMap<String, String>) -> Result<StreetNode, Error> {
    let coordinate = |name: &str| -> Result<f64, Error> {
        let text = data
            .get(name)
            .ok_or_else(|| Error::InvalidData(format!("node {osmid} has no `{name}`")))?;
        parse_number(name, text)
    };
    let mut node = StreetNode::new(osmid, geo::Point::new(coordinate("x")?, coordinate("y")?));
    node.street_count = data
        .get("street_count")
        .map(|text| parse_number("street_count", text))
        .transpose()?;
    node.highway = data.get("highway").cloned();
    node.bc = data.get("bc").map(|text| parse_number("bc", text)).transpose()?;
    Ok(node)
}

fn build_edge(key: u32, data: BTreeMap<String, String>) -> Result<StreetEdge, Error> {
    let mut edge = StreetEdge::new(0, 0.0);
    edge.key = key;
    edge.osmid.clear();

    for (name, value) in data {
        match name.as_str() {
            "osmid" => edge.osmid = parse_osmids(&value)?,
            "length" => edge.length = parse_number("length", &value)?,
            "oneway" => edge.oneway = parse_bool(&value).unwrap_or(false),
            "reversed" => edge.reversed = parse_bool(&value).unwrap_or(false),
            "speed_kph" => edge.speed_kph = Some(parse_number("speed_kph", &value)?),
            "travel_time" => edge.travel_time = Some(parse_number("travel_time", &value)?),
            "geometry" => {
                let line = LineString::try_from_wkt_str(&value)
                    .map_err(|e| Error::InvalidData(format!("invalid edge geometry: {e}")))?;
                edge.geometry = Some(line);
            }
            _ => {
                edge.tags.insert(name, TagValue::parse(&value));
            }
        }
    }
    Ok(edge)
}

/// Records a `<key>` declaration
fn read_declaration(
    element: &BytesStart<'_>,
    key_names: &mut HashMap<String, String>,
) -> Result<(), Error> {
    if element.name().as_ref() == b"key" {
        let id = required_attribute(element, "id")?;
        let name = required_attribute(element, "attr.name")?;
        key_names.insert(id, name);
    }
    Ok(())
}

fn open_element(element: &BytesStart<'_>) -> Result<Option<Open>, Error> {
    let open = match element.name().as_ref() {
        b"graph" => Open::Graph(BTreeMap::new()),
        b"node" => {
            let id = required_attribute(element, "id")?;
            Open::Node(parse_number("node id", &id)?, BTreeMap::new())
        }
        b"edge" => {
            let source = required_attribute(element, "source")?;
            let target = required_attribute(element, "target")?;
            let key = attribute(element, "id")?.unwrap_or_else(|| "0".to_string());
            Open::Edge {
                source: parse_number("edge source", &source)?,
                target: parse_number("edge target", &target)?,
                key: parse_number("edge key", &key)?,
                data: BTreeMap::new(),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(open))
}

fn close_element(open: Open, graph: &mut StreetGraph) -> Result<(), Error> {
    match open {
        Open::Graph(data) => graph.meta = build_meta(&data),
        Open::Node(osmid, data) => {
            if graph.node_index(osmid).is_some() {
                return Err(Error::InvalidData(format!("node {osmid} is defined twice")));
            }
            graph.add_node(build_node(osmid, &data)?);
        }
        Open::Edge {
            source,
            target,
            key,
            data,
        } => {
            let (Some(u), Some(v)) = (graph.node_index(source), graph.node_index(target)) else {
                return Err(Error::InvalidData(format!(
                    "edge {source} -> {target} references an unknown node"
                )));
            };
            graph.graph.add_edge(u, v, build_edge(key, data)?);
        }
    }
    Ok(())
}

/// Reads a graph written by [`save_graphml`]
///
/// # Errors
///
/// Returns an error if the file can't be read, is not well-formed GraphML,
/// defines a node twice or references unknown nodes
pub fn load_graphml(path: &Path) -> Result<StreetGraph, Error> {
    let text = fs::read_to_string(path)?;
    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    // key id -> attribute name
    let mut key_names: HashMap<String, String> = HashMap::new();
    let mut graph = StreetGraph::new();
    let mut stack: Vec<Open> = Vec::new();
    let mut current_key: Option<String> = None;
    let mut current_text = String::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(element) => {
                if element.name().as_ref() == b"data" {
                    current_key = Some(required_attribute(&element, "key")?);
                    current_text.clear();
                } else {
                    read_declaration(&element, &mut key_names)?;
                    if let Some(open) = open_element(&element)? {
                        stack.push(open);
                    }
                }
            }
            Event::Empty(element) => {
                read_declaration(&element, &mut key_names)?;
                if let Some(open) = open_element(&element)? {
                    close_element(open, &mut graph)?;
                }
            }
            Event::Text(text) => {
                if current_key.is_some() {
                    current_text.push_str(&text.unescape().map_err(xml_error)?);
                }
            }
            Event::End(element) => match element.name().as_ref() {
                b"data" => {
                    if let (Some(key), Some(open)) = (current_key.take(), stack.last_mut()) {
                        let name = key_names.get(&key).cloned().unwrap_or(key);
                        open.data_mut().insert(name, std::mem::take(&mut current_text));
                    }
                }
                b"node" | b"edge" | b"graph" => {
                    let open = stack
                        .pop()
                        .ok_or_else(|| Error::Xml("unbalanced elements".to_string()))?;
                    close_element(open, &mut graph)?;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    graph.validate()?;
    debug!(
        "Loaded graph with {} nodes and {} edges from {}",
        graph.node_count(),
        graph.edge_count(),
        path.display()
    );
    Ok(graph)
}
