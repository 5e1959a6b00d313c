use std::io::{self, Write};

use streetbc_core::prelude::*;
use streetbc_core::petgraph::visit::EdgeRef;

/// Shortest round-trip digits as Python's `repr` prints them: exponent form
/// below 1e-4 and from 1e16 up, with a signed two-digit exponent
fn float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    let magnitude = value.abs();
    if magnitude.is_finite() && magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let scientific = format!("{value:e}");
        if let Some((mantissa, exponent)) = scientific.split_once('e') {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            return format!("{mantissa}e{sign}{digits:0>2}");
        }
    }
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn boolean(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

fn tag(value: &TagValue) -> String {
    match value {
        TagValue::Single(value) => quoted(value),
        TagValue::List(values) => {
            let items: Vec<String> = values.iter().map(|v| quoted(v)).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

/// Attributes of an edge in `{'name': value, ...}` form
pub fn edge_attributes(edge: &StreetEdge) -> String {
    let osmid = match edge.osmid.as_slice() {
        [single] => single.to_string(),
        ids => format!(
            "[{}]",
            ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        ),
    };

    let mut fields = vec![format!("'osmid': {osmid}")];
    fields.extend(
        edge.tags
            .iter()
            .map(|(name, value)| format!("{}: {}", quoted(name), tag(value))),
    );
    fields.push(format!("'oneway': {}", boolean(edge.oneway)));
    fields.push(format!("'reversed': {}", boolean(edge.reversed)));
    fields.push(format!("'length': {}", float(edge.length)));
    if let Some(geometry) = &edge.geometry {
        let coords: Vec<String> = geometry
            .coords()
            .map(|c| format!("{} {}", c.x, c.y))
            .collect();
        fields.push(format!("'geometry': <LINESTRING ({})>", coords.join(", ")));
    }
    if let Some(speed) = edge.speed_kph {
        fields.push(format!("'speed_kph': {}", float(speed)));
    }
    if let Some(time) = edge.travel_time {
        fields.push(format!("'travel_time': {}", float(time)));
    }
    format!("{{{}}}", fields.join(", "))
}

/// Writes the node and edge counts and, if `edges` is set, one line per edge
pub fn write_report<W: Write>(out: &mut W, graph: &StreetGraph, edges: bool) -> io::Result<()> {
    writeln!(out, "Number of nodes: {}", graph.node_count())?;
    writeln!(out, "Number of edges: {}", graph.edge_count())?;
    if !edges {
        return Ok(());
    }
    for edge in graph.graph.edge_references() {
        writeln!(
            out,
            "Edge: ({}, {}, {})",
            graph.graph[edge.source()].osmid,
            graph.graph[edge.target()].osmid,
            edge_attributes(edge.weight())
        )?;
    }
    Ok(())
}
