//! GeoPackage export: a `nodes` point layer and an `edges` line layer in
//! EPSG:4326, written with SQLite.

use std::fs;
use std::path::Path;

use geo::{BoundingRect, Coord, LineString, Point, Rect};
use log::info;
use petgraph::visit::EdgeRef;
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};

use crate::{Error, StreetGraph};

/// `GPKG` in ASCII
const APPLICATION_ID: i32 = 0x4750_4B47;
const USER_VERSION: i32 = 10200;
const SRS_ID: i32 = 4326;

const WGS84_DEFINITION: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4326"]]"#;

const SCHEMA: &str = "
CREATE TABLE gpkg_spatial_ref_sys (
    srs_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL PRIMARY KEY,
    organization TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition TEXT NOT NULL,
    description TEXT
);
CREATE TABLE gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    min_x DOUBLE,
    min_y DOUBLE,
    max_x DOUBLE,
    max_y DOUBLE,
    srs_id INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
CREATE TABLE gpkg_geometry_columns (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL,
    z TINYINT NOT NULL,
    m TINYINT NOT NULL,
    CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
    CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
    CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
CREATE TABLE nodes (
    fid INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    geom POINT,
    osmid INTEGER,
    y REAL,
    x REAL,
    street_count INTEGER,
    highway TEXT,
    bc REAL
);
";

/// Columns of the edges layer that don't come from OSM tags
const EDGE_COLUMNS: [&str; 10] = [
    "u",
    "v",
    "key",
    "osmid",
    "oneway",
    "reversed",
    "length",
    "speed_kph",
    "travel_time",
    "geom",
];
const EDGE_COLUMN_TYPES: [&str; 10] = [
    "INTEGER",
    "INTEGER",
    "INTEGER",
    "TEXT",
    "BOOLEAN",
    "BOOLEAN",
    "REAL",
    "REAL",
    "REAL",
    "LINESTRING",
];

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// GeoPackage binary header followed by little-endian WKB
fn geometry_blob(wkb: &[u8], envelope: Option<Rect<f64>>) -> Vec<u8> {
    let mut blob = Vec::with_capacity(8 + 32 + wkb.len());
    blob.extend_from_slice(b"GP");
    blob.push(0);
    // bit 0: little endian, bits 1-3: envelope type (1 = xy)
    blob.push(if envelope.is_some() { 0b0000_0011 } else { 0b0000_0001 });
    blob.extend_from_slice(&SRS_ID.to_le_bytes());
    if let Some(rect) = envelope {
        for value in [rect.min().x, rect.max().x, rect.min().y, rect.max().y] {
            blob.extend_from_slice(&value.to_le_bytes());
        }
    }
    blob.extend_from_slice(wkb);
    blob
}

fn point_blob(point: Point<f64>) -> Vec<u8> {
    let mut wkb = Vec::with_capacity(21);
    wkb.push(1);
    wkb.extend_from_slice(&1u32.to_le_bytes());
    wkb.extend_from_slice(&point.x().to_le_bytes());
    wkb.extend_from_slice(&point.y().to_le_bytes());
    geometry_blob(&wkb, None)
}

fn linestring_blob(line: &LineString<f64>) -> Vec<u8> {
    let mut wkb = Vec::with_capacity(9 + 16 * line.0.len());
    wkb.push(1);
    wkb.extend_from_slice(&2u32.to_le_bytes());
    let count = u32::try_from(line.0.len()).unwrap_or(u32::MAX);
    wkb.extend_from_slice(&count.to_le_bytes());
    for Coord { x, y } in &line.0 {
        wkb.extend_from_slice(&x.to_le_bytes());
        wkb.extend_from_slice(&y.to_le_bytes());
    }
    geometry_blob(&wkb, line.bounding_rect())
}

fn register_layer(
    conn: &Connection,
    table: &str,
    geometry_type: &str,
    extent: Option<Rect<f64>>,
) -> Result<(), Error> {
    let (min_x, min_y, max_x, max_y) = extent.map_or((None, None, None, None), |rect| {
        (
            Some(rect.min().x),
            Some(rect.min().y),
            Some(rect.max().x),
            Some(rect.max().y),
        )
    });
    conn.execute(
        "INSERT INTO gpkg_contents
            (table_name, data_type, identifier, min_x, min_y, max_x, max_y, srs_id)
         VALUES (?1, 'features', ?1, ?2, ?3, ?4, ?5, ?6)",
        params![table, min_x, min_y, max_x, max_y, SRS_ID],
    )?;
    conn.execute(
        "INSERT INTO gpkg_geometry_columns
            (table_name, column_name, geometry_type_name, srs_id, z, m)
         VALUES (?1, 'geom', ?2, ?3, 0, 0)",
        params![table, geometry_type, SRS_ID],
    )?;
    Ok(())
}

fn write_metadata(conn: &Connection) -> Result<(), Error> {
    conn.pragma_update(None, "application_id", APPLICATION_ID)?;
    conn.pragma_update(None, "user_version", USER_VERSION)?;
    conn.execute_batch(SCHEMA)?;

    let mut insert = conn.prepare(
        "INSERT INTO gpkg_spatial_ref_sys
            (srs_name, srs_id, organization, organization_coordsys_id, definition, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    insert.execute(params![
        "Undefined cartesian SRS",
        -1,
        "NONE",
        -1,
        "undefined",
        "undefined cartesian coordinate reference system"
    ])?;
    insert.execute(params![
        "Undefined geographic SRS",
        0,
        "NONE",
        0,
        "undefined",
        "undefined geographic coordinate reference system"
    ])?;
    insert.execute(params![
        "WGS 84 geodetic",
        SRS_ID,
        "EPSG",
        SRS_ID,
        WGS84_DEFINITION,
        "longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid"
    ])?;
    Ok(())
}

fn write_nodes(conn: &Connection, graph: &StreetGraph) -> Result<(), Error> {
    let mut insert = conn.prepare(
        "INSERT INTO nodes (geom, osmid, y, x, street_count, highway, bc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for node in graph.graph.node_weights() {
        insert.execute(params![
            point_blob(node.geometry),
            node.osmid,
            node.lat(),
            node.lon(),
            node.street_count,
            node.highway,
            node.bc
        ])?;
    }

    let extent = graph
        .graph
        .node_weights()
        .map(|node| node.geometry)
        .collect::<geo::MultiPoint<f64>>()
        .bounding_rect();
    register_layer(conn, "nodes", "POINT", extent)
}

fn write_edges(conn: &Connection, graph: &StreetGraph) -> Result<(), Error> {
    let mut tag_names: Vec<&str> = graph
        .graph
        .edge_weights()
        .flat_map(|edge| edge.tags.keys().map(String::as_str))
        .filter(|name| !EDGE_COLUMNS.contains(name))
        .collect();
    tag_names.sort_unstable();
    tag_names.dedup();

    let mut columns = vec!["fid INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL".to_string()];
    columns.extend(
        EDGE_COLUMNS
            .iter()
            .zip(EDGE_COLUMN_TYPES)
            .map(|(name, ty)| format!("{} {ty}", quote_identifier(name))),
    );
    columns.extend(tag_names.iter().map(|name| format!("{} TEXT", quote_identifier(name))));
    conn.execute_batch(&format!("CREATE TABLE edges ({});", columns.join(", ")))?;

    let names: Vec<String> = EDGE_COLUMNS
        .iter()
        .map(|name| quote_identifier(name))
        .chain(tag_names.iter().map(|name| quote_identifier(name)))
        .collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    let mut insert = conn.prepare(&format!(
        "INSERT INTO edges ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    ))?;

    let mut extent: Option<Rect<f64>> = None;
    for edge in graph.graph.edge_references() {
        let weight = edge.weight();
        let line = graph
            .edge_line(edge.id())
            .ok_or_else(|| Error::InvalidData("edge without endpoints".to_string()))?;
        if let Some(rect) = line.bounding_rect() {
            extent = Some(match extent {
                Some(current) => Rect::new(
                    Coord {
                        x: current.min().x.min(rect.min().x),
                        y: current.min().y.min(rect.min().y),
                    },
                    Coord {
                        x: current.max().x.max(rect.max().x),
                        y: current.max().y.max(rect.max().y),
                    },
                ),
                None => rect,
            });
        }

        let osmid = match weight.osmid.as_slice() {
            [single] => single.to_string(),
            ids => format!(
                "[{}]",
                ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            ),
        };
        let optional_real = |value: Option<f64>| value.map_or(Value::Null, Value::Real);

        let mut values = vec![
            Value::Integer(graph.graph[edge.source()].osmid),
            Value::Integer(graph.graph[edge.target()].osmid),
            Value::Integer(i64::from(weight.key)),
            Value::Text(osmid),
            Value::Integer(i64::from(weight.oneway)),
            Value::Integer(i64::from(weight.reversed)),
            Value::Real(weight.length),
            optional_real(weight.speed_kph),
            optional_real(weight.travel_time),
            Value::Blob(linestring_blob(&line)),
        ];
        values.extend(tag_names.iter().map(|name| {
            weight
                .tag(name)
                .map_or(Value::Null, |value| Value::Text(value.to_string()))
        }));
        insert.execute(params_from_iter(values))?;
    }

    register_layer(conn, "edges", "LINESTRING", extent)
}

/// Saves nodes and edges as layers of a GeoPackage, replacing any existing
/// file at `path` and creating parent directories as needed
///
/// # Errors
///
/// Returns an error if the file can't be written
pub fn save_graph_geopackage(graph: &StreetGraph, path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if path.exists() {
        fs::remove_file(path)?;
    }

    let mut conn = Connection::open(path)?;
    let tx = conn.transaction()?;
    write_metadata(&tx)?;
    write_nodes(&tx, graph)?;
    write_edges(&tx, graph)?;
    tx.commit()?;

    info!(
        "Saved graph with {} nodes and {} edges to {}",
        graph.node_count(),
        graph.edge_count(),
        path.display()
    );
    Ok(())
}
