//! PNG rendering of the street network with nodes coloured by score

mod colormap;

use std::fs;
use std::path::Path;

use geo::{BoundingRect, MultiPoint};
use log::info;
use petgraph::visit::EdgeRef;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{Error, StreetGraph};

pub use colormap::{node_colors_by_centrality, plasma};

/// Plot styling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotSettings {
    /// Background colour as `#rrggbb`
    pub bgcolor: String,
    pub edge_color: String,
    pub edge_linewidth: u32,
    /// Node marker radius in pixels
    pub node_size: u32,
    /// Length of the longer image side in pixels
    pub image_size: u32,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            bgcolor: "#000000".to_string(),
            edge_color: "#333333".to_string(),
            edge_linewidth: 2,
            node_size: 5,
            image_size: 2400,
        }
    }
}

impl PlotSettings {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the colour is not `#rrggbb`
    pub fn background(&self) -> Result<RGBColor, Error> {
        parse_hex_color(&self.bgcolor)
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] if the colour is not `#rrggbb`
    pub fn edge(&self) -> Result<RGBColor, Error> {
        parse_hex_color(&self.edge_color)
    }
}

/// Parses `#rrggbb` (the leading `#` is optional)
///
/// # Errors
///
/// Returns [`Error::Config`] for anything else
pub fn parse_hex_color(text: &str) -> Result<RGBColor, Error> {
    let hex = text.trim().trim_start_matches('#');
    let invalid = || Error::Config(format!("invalid colour `{text}`, expected #rrggbb"));
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
    };
    Ok(RGBColor(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Image dimensions keeping the aspect ratio of the projected extent
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn image_dimensions(width: f64, height: f64, longer_side: u32) -> (u32, u32) {
    let longer = f64::from(longer_side.max(1));
    if width <= 0.0 || height <= 0.0 {
        return (longer_side.max(1), longer_side.max(1));
    }
    if width >= height {
        (longer_side.max(1), ((longer * height / width).round() as u32).max(1))
    } else {
        (((longer * width / height).round() as u32).max(1), longer_side.max(1))
    }
}

/// Renders edges as lines and nodes as dots, `node_colors[i]` colouring node
/// index `i`, and writes a PNG to `path`
///
/// # Errors
///
/// Returns an error for an empty graph, a colour count that does not match
/// the node count, invalid colours or drawing failures
pub fn render_graph(
    graph: &StreetGraph,
    node_colors: &[RGBColor],
    settings: &PlotSettings,
    path: &Path,
) -> Result<(), Error> {
    if graph.is_empty() {
        return Err(Error::EmptyGraph("nothing to render".to_string()));
    }
    if node_colors.len() != graph.node_count() {
        return Err(Error::Render(format!(
            "{} colours given for {} nodes",
            node_colors.len(),
            graph.node_count()
        )));
    }
    let background = settings.background()?;
    let edge_color = settings.edge()?;

    let extent = graph
        .graph
        .node_weights()
        .map(|node| node.geometry)
        .collect::<MultiPoint<f64>>()
        .bounding_rect()
        .ok_or_else(|| Error::EmptyGraph("graph has no coordinates".to_string()))?;

    // Equirectangular projection around the mean latitude
    let x_scale = extent.center().y.to_radians().cos();
    let project = |lon: f64, lat: f64| (lon * x_scale, lat);
    let (min_x, min_y) = project(extent.min().x, extent.min().y);
    let (max_x, max_y) = project(extent.max().x, extent.max().y);
    let pad_x = ((max_x - min_x) * 0.02).max(1e-6);
    let pad_y = ((max_y - min_y) * 0.02).max(1e-6);

    let dimensions = image_dimensions(max_x - min_x, max_y - min_y, settings.image_size);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let root = BitMapBackend::new(path, dimensions).into_drawing_area();
    root.fill(&background)
        .map_err(|e| Error::Render(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .build_cartesian_2d(min_x - pad_x..max_x + pad_x, min_y - pad_y..max_y + pad_y)
        .map_err(|e| Error::Render(e.to_string()))?;

    let edge_style = edge_color.stroke_width(settings.edge_linewidth);
    chart
        .draw_series(graph.graph.edge_references().filter_map(|edge| {
            let line = graph.edge_line(edge.id())?;
            let points: Vec<(f64, f64)> = line.coords().map(|c| project(c.x, c.y)).collect();
            Some(PathElement::new(points, edge_style))
        }))
        .map_err(|e| Error::Render(e.to_string()))?;

    #[allow(clippy::cast_possible_wrap)]
    let radius = settings.node_size as i32;
    chart
        .draw_series(graph.graph.node_indices().map(|idx| {
            let node = &graph.graph[idx];
            Circle::new(
                project(node.lon(), node.lat()),
                radius,
                node_colors[idx.index()].filled(),
            )
        }))
        .map_err(|e| Error::Render(e.to_string()))?;

    root.present().map_err(|e| Error::Render(e.to_string()))?;

    info!(
        "Rendered {} nodes and {} edges to {} ({}x{} px)",
        graph.node_count(),
        graph.edge_count(),
        path.display(),
        dimensions.0,
        dimensions.1
    );
    Ok(())
}
