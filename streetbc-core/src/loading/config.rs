use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use geo::Point;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Kind of street network to download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    /// Drivable public streets, no service roads
    Drive,
    /// Drivable public streets including service roads
    #[default]
    DriveService,
    /// Streets and paths pedestrians can use
    Walk,
    /// Streets and paths cyclists can use
    Bike,
    /// All non-private streets and paths
    All,
    /// All public streets and paths
    AllPublic,
}

impl NetworkType {
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkType::Drive => "drive",
            NetworkType::DriveService => "drive_service",
            NetworkType::Walk => "walk",
            NetworkType::Bike => "bike",
            NetworkType::All => "all",
            NetworkType::AllPublic => "all_public",
        }
    }

    /// Pedestrians may walk both ways along one-way streets
    pub fn is_bidirectional(self) -> bool {
        matches!(self, NetworkType::Walk)
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drive" => Ok(NetworkType::Drive),
            "drive_service" => Ok(NetworkType::DriveService),
            "walk" => Ok(NetworkType::Walk),
            "bike" => Ok(NetworkType::Bike),
            "all" => Ok(NetworkType::All),
            "all_public" => Ok(NetworkType::AllPublic),
            other => Err(Error::Config(format!("unknown network type `{other}`"))),
        }
    }
}

/// Overpass API endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverpassSettings {
    pub endpoint: String,
    /// Server-side query timeout, also used as the HTTP timeout
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for OverpassSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://overpass-api.de/api/interpreter".to_string(),
            timeout_secs: 180,
            user_agent: format!("streetbc/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// On-disk cache of Overpass responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("./cache"),
        }
    }
}

/// Configuration for downloading a street network around a point
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Center of the area, x = longitude, y = latitude
    pub center: Point<f64>,
    /// Half side of the square bounding box, metres
    pub dist: f64,
    pub network_type: NetworkType,
    /// Keep every connected component instead of only the largest one
    pub retain_all: bool,
    /// Merge interstitial nodes into edge geometries
    pub simplify: bool,
    pub overpass: OverpassSettings,
    pub cache: CacheSettings,
}

impl NetworkConfig {
    pub fn new(lat: f64, lon: f64, dist: f64, network_type: NetworkType) -> Self {
        Self {
            center: Point::new(lon, lat),
            dist,
            network_type,
            retain_all: false,
            simplify: true,
            overpass: OverpassSettings::default(),
            cache: CacheSettings::default(),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] for out-of-range coordinates or distance
    pub fn validate(&self) -> Result<(), Error> {
        let (lon, lat) = (self.center.x(), self.center.y());
        if !(-90.0..=90.0).contains(&lat) {
            return Err(Error::Config(format!("latitude {lat} out of range")));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(Error::Config(format!("longitude {lon} out of range")));
        }
        if !self.dist.is_finite() || self.dist <= 0.0 {
            return Err(Error::Config(format!(
                "distance must be positive, got {}",
                self.dist
            )));
        }
        if self.overpass.endpoint.is_empty() {
            return Err(Error::Config("Overpass endpoint is empty".to_string()));
        }
        Ok(())
    }
}
