//! Speed imputation and travel times for street edges.
//!
//! Posted `maxspeed` values are used where they can be parsed. Every other
//! edge gets the mean posted speed of its highway type, unless the caller
//! supplies a speed for that type. Types without any posted speed fall back
//! to the caller's fallback, and finally to the mean over the whole graph.

use hashbrown::HashMap;
use log::{debug, info};
use petgraph::visit::EdgeRef;

use crate::{Error, StreetGraph, TagValue};

const KPH_PER_MPH: f64 = 1.609_344;
const KPH_PER_KNOT: f64 = 1.852;

/// Parses a posted speed such as `30`, `50 km/h`, `30 mph` or `40|60` into
/// km/h. Multiple values separated by `|` are averaged.
pub fn clean_maxspeed(value: &str) -> Option<f64> {
    let speeds = value
        .split('|')
        .map(parse_single_speed)
        .collect::<Option<Vec<f64>>>()?;
    mean(&speeds)
}

fn parse_single_speed(value: &str) -> Option<f64> {
    let value = value.trim();
    let lower = value.to_ascii_lowercase();

    let (number, factor) = ["km/h", "kmh", "kph", "mph", "knots"]
        .iter()
        .find_map(|unit| {
            lower.strip_suffix(unit).map(|rest| {
                let factor = match *unit {
                    "mph" => KPH_PER_MPH,
                    "knots" => KPH_PER_KNOT,
                    _ => 1.0,
                };
                (rest.strip_suffix(' ').unwrap_or(rest).to_string(), factor)
            })
        })
        .unwrap_or((lower.clone(), 1.0));

    if !number.starts_with(|c: char| c.is_ascii_digit())
        || !number.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    {
        return None;
    }

    number
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .map(|speed| speed * factor)
}

/// Posted speed of a `maxspeed` tag; lists are averaged and are unknown if
/// any item can't be parsed
fn tag_speed(tag: &TagValue) -> Option<f64> {
    let speeds = tag
        .as_slice()
        .iter()
        .map(|value| clean_maxspeed(value))
        .collect::<Option<Vec<f64>>>()?;
    mean(&speeds)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sets `speed_kph` on every edge.
///
/// `hwy_speeds` overrides the imputed speed for the given highway types,
/// `fallback` is used for types without any posted speed.
///
/// # Errors
///
/// Returns [`Error::InvalidData`] when an edge has no posted speed and no
/// value can be imputed for it.
pub fn add_edge_speeds(
    graph: &mut StreetGraph,
    hwy_speeds: &HashMap<String, f64>,
    fallback: Option<f64>,
) -> Result<(), Error> {
    let posted: Vec<Option<f64>> = graph
        .graph
        .edge_weights()
        .map(|edge| edge.tag("maxspeed").and_then(tag_speed))
        .collect();

    let mut by_highway: HashMap<String, Vec<f64>> = HashMap::new();
    for (edge, speed) in graph.graph.edge_weights().zip(&posted) {
        if let Some(speed) = speed {
            by_highway
                .entry(edge.highway().unwrap_or_default().to_string())
                .or_default()
                .push(*speed);
        }
    }

    let known: Vec<f64> = posted.iter().flatten().copied().collect();
    let global_mean = mean(&known);
    if known.is_empty() && fallback.is_none() && hwy_speeds.is_empty() {
        return Err(Error::InvalidData(
            "no edge has a posted maxspeed; provide highway speeds or a fallback".to_string(),
        ));
    }
    debug!(
        "{} of {} edges have a posted maxspeed",
        known.len(),
        posted.len()
    );

    let imputed_for = |highway: &str| -> Option<f64> {
        hwy_speeds
            .get(highway)
            .copied()
            .or_else(|| by_highway.get(highway).and_then(|speeds| mean(speeds)))
            .or(fallback)
            .or(global_mean)
    };

    let edges: Vec<_> = graph.graph.edge_indices().collect();
    for (edge, posted_speed) in edges.into_iter().zip(posted) {
        let weight = &mut graph.graph[edge];
        let speed = match posted_speed {
            Some(speed) => speed,
            None => imputed_for(weight.highway().unwrap_or_default()).ok_or_else(|| {
                Error::InvalidData(format!(
                    "cannot impute a speed for highway type {:?}",
                    weight.highway()
                ))
            })?,
        };
        weight.speed_kph = Some(speed);
    }

    info!("Imputed speeds for {} edges", graph.edge_count());
    Ok(())
}

/// Sets `travel_time` in seconds from `length` and `speed_kph`.
///
/// # Errors
///
/// Returns [`Error::MissingAttribute`] if an edge has no speed and
/// [`Error::InvalidData`] if a speed is not positive.
pub fn add_edge_travel_times(graph: &mut StreetGraph) -> Result<(), Error> {
    let mut times = Vec::with_capacity(graph.edge_count());
    for edge in graph.graph.edge_references() {
        let (u, v) = (
            graph.graph[edge.source()].osmid,
            graph.graph[edge.target()].osmid,
        );
        let speed = edge.weight().speed_kph.ok_or(Error::MissingAttribute {
            attribute: "speed_kph",
            u,
            v,
        })?;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(Error::InvalidData(format!(
                "edge {u} -> {v} has non-positive speed {speed}"
            )));
        }
        let metres_per_second = speed * 1000.0 / 3600.0;
        times.push((edge.id(), edge.weight().length / metres_per_second));
    }

    for (edge, time) in times {
        graph.graph[edge].travel_time = Some(time);
    }
    Ok(())
}
