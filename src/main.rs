//! Street network betweenness: downloads the road network around a point,
//! scores intersections by travel-time weighted betweenness centrality and
//! writes a PNG map, a GeoPackage and a GraphML file.

mod config;
mod report;

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use streetbc_core::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file overriding the default point, radius and outputs
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print only the node and edge counts
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;

    let mut graph = create_street_graph(&config.network_config())?;

    let hwy_speeds = config.hwy_speeds.clone().into_iter().collect();
    add_edge_speeds(&mut graph, &hwy_speeds, config.fallback_speed)?;
    add_edge_travel_times(&mut graph)?;
    graph.validate()?;

    street_betweenness(&mut graph, EdgeWeight::TravelTime)?;

    let colors = node_colors_by_centrality(&graph, config.plot.background()?);
    render_graph(&graph, &colors, &config.plot, &config.output_path("png"))?;

    save_graph_geopackage(&graph, &config.output_path("gpkg"))?;
    save_graphml(&graph, &config.output_path("graphml"))?;
    info!(
        "Outputs written to {}",
        config.output_dir.join(config.network_type.as_str()).display()
    );

    let mut stdout = io::stdout().lock();
    report::write_report(&mut stdout, &graph, !args.quiet)?;
    stdout.flush()?;
    Ok(())
}
