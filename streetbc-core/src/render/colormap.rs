use plotters::style::RGBColor;

use crate::StreetGraph;

/// Anchors of the `plasma` palette at evenly spaced positions in [0, 1]
const PLASMA: [(u8, u8, u8); 9] = [
    (13, 8, 135),
    (75, 3, 161),
    (126, 3, 168),
    (168, 34, 150),
    (204, 71, 120),
    (230, 108, 92),
    (248, 149, 64),
    (253, 196, 39),
    (240, 249, 33),
];

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8
}

/// Samples the palette at `t`, clamped to [0, 1]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn plasma(t: f64) -> RGBColor {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let scaled = t * (PLASMA.len() - 1) as f64;
    let lower = (scaled.floor() as usize).min(PLASMA.len() - 2);
    let frac = scaled - lower as f64;

    let (r0, g0, b0) = PLASMA[lower];
    let (r1, g1, b1) = PLASMA[lower + 1];
    RGBColor(lerp(r0, r1, frac), lerp(g0, g1, frac), lerp(b0, b1, frac))
}

/// One colour per node, in node index order, from its betweenness score.
///
/// Scores are scaled by the minimum and maximum present score. Nodes
/// without a score get `missing`.
pub fn node_colors_by_centrality(graph: &StreetGraph, missing: RGBColor) -> Vec<RGBColor> {
    let scores = graph.graph.node_weights().filter_map(|node| node.bc);
    let (min, max) = scores.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), bc| {
        (min.min(bc), max.max(bc))
    });
    let range = max - min;

    graph
        .graph
        .node_weights()
        .map(|node| match node.bc {
            Some(bc) if range > 0.0 => plasma((bc - min) / range),
            Some(_) => plasma(0.0),
            None => missing,
        })
        .collect()
}
