//! Overpass QL query construction

use geo::{Point, Rect, coord};

use crate::{EARTH_RADIUS_M, NetworkType};

const DEFAULT_ACCESS: &str = r#"["access"!~"private"]"#;

/// Extra margin downloaded and simplified around the requested area, metres
pub const PERIPHERY_BUFFER_M: f64 = 500.0;

/// Square bounding box extending `dist` metres north, south, east and west
/// of `center`
pub fn bbox_from_point(center: Point<f64>, dist: f64) -> Rect<f64> {
    let (lon, lat) = (center.x(), center.y());
    let delta_lat = (dist / EARTH_RADIUS_M).to_degrees();
    let delta_lon = delta_lat / lat.to_radians().cos();

    Rect::new(
        coord! { x: lon - delta_lon, y: lat - delta_lat },
        coord! { x: lon + delta_lon, y: lat + delta_lat },
    )
}

/// Overpass way filter selecting the streets of a network type
pub fn network_filter(network_type: NetworkType) -> String {
    let base = r#"["highway"]["area"!~"yes"]"#;
    match network_type {
        NetworkType::Drive => format!(
            "{base}{DEFAULT_ACCESS}{}{}",
            r#"["highway"!~"abandoned|bridleway|bus_guideway|construction|corridor|cycleway|elevator|escalator|footway|no|path|pedestrian|planned|platform|proposed|raceway|razed|service|steps|track"]"#,
            r#"["motor_vehicle"!~"no"]["motorcar"!~"no"]["service"!~"alley|driveway|emergency_access|parking|parking_aisle|private"]"#
        ),
        NetworkType::DriveService => format!(
            "{base}{DEFAULT_ACCESS}{}{}",
            r#"["highway"!~"abandoned|bridleway|bus_guideway|construction|corridor|cycleway|elevator|escalator|footway|no|path|pedestrian|planned|platform|proposed|raceway|razed|steps|track"]"#,
            r#"["motor_vehicle"!~"no"]["motorcar"!~"no"]["service"!~"emergency_access|parking|parking_aisle|private"]"#
        ),
        NetworkType::Walk => format!(
            "{base}{DEFAULT_ACCESS}{}{}",
            r#"["highway"!~"abandoned|bus_guideway|construction|cycleway|motor|no|planned|platform|proposed|raceway|razed"]"#,
            r#"["foot"!~"no"]["service"!~"private"]"#
        ),
        NetworkType::Bike => format!(
            "{base}{DEFAULT_ACCESS}{}{}",
            r#"["highway"!~"abandoned|bus_guideway|construction|corridor|elevator|escalator|footway|motor|no|planned|platform|proposed|raceway|razed|steps"]"#,
            r#"["bicycle"!~"no"]["service"!~"private"]"#
        ),
        NetworkType::AllPublic => format!(
            "{base}{DEFAULT_ACCESS}{}{}",
            r#"["highway"!~"abandoned|construction|no|planned|platform|proposed|raceway|razed"]"#,
            r#"["service"!~"private"]"#
        ),
        NetworkType::All => format!(
            "{base}{}",
            r#"["highway"!~"abandoned|construction|no|planned|platform|proposed|raceway|razed"]"#
        ),
    }
}

/// Full Overpass QL query for the ways of `network_type` inside `bbox` and
/// the nodes they reference
pub fn build_query(bbox: &Rect<f64>, network_type: NetworkType, timeout_secs: u64) -> String {
    let (min, max) = (bbox.min(), bbox.max());
    format!(
        "[out:json][timeout:{timeout_secs}];(way{}({:.7},{:.7},{:.7},{:.7});>;);out;",
        network_filter(network_type),
        min.y,
        min.x,
        max.y,
        max.x
    )
}
