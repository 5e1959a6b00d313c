use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use streetbc_core::prelude::*;

/// Run configuration, read from an optional TOML file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius around the point in metres
    pub dist: f64,
    pub network_type: NetworkType,
    /// Outputs go to `<output_dir>/<network_type>/`
    pub output_dir: PathBuf,
    pub retain_all: bool,
    pub simplify: bool,
    /// km/h for highway types without any known speed
    pub fallback_speed: Option<f64>,
    /// km/h overrides per highway type
    pub hwy_speeds: BTreeMap<String, f64>,
    pub cache: CacheSettings,
    pub overpass: OverpassSettings,
    pub plot: PlotSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            latitude: 52.772_385_9,
            longitude: -1.207_798_5,
            dist: 3500.0,
            network_type: NetworkType::DriveService,
            output_dir: PathBuf::from("./graph_models"),
            retain_all: false,
            simplify: true,
            fallback_speed: None,
            hwy_speeds: BTreeMap::new(),
            cache: CacheSettings::default(),
            overpass: OverpassSettings::default(),
            plot: PlotSettings::default(),
        }
    }
}

impl AppConfig {
    /// Reads `path`, or returns the defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.network_config().validate()?;
        config.plot.background()?;
        config.plot.edge()?;
        Ok(config)
    }

    pub fn network_config(&self) -> NetworkConfig {
        let mut config =
            NetworkConfig::new(self.latitude, self.longitude, self.dist, self.network_type);
        config.retain_all = self.retain_all;
        config.simplify = self.simplify;
        config.overpass = self.overpass.clone();
        config.cache = self.cache.clone();
        config
    }

    /// `<output_dir>/<network_type>/graph.<extension>`
    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.output_dir
            .join(self.network_type.as_str())
            .join(format!("graph.{extension}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(
            config.output_path("png"),
            PathBuf::from("./graph_models/drive_service/graph.png")
        );
    }

    #[test]
    fn reads_sections() {
        let config = AppConfig::from_toml(
            r##"
            latitude = 51.5
            longitude = -0.12
            dist = 800.0
            network_type = "walk"
            fallback_speed = 30.0

            [hwy_speeds]
            residential = 25.0

            [cache]
            enabled = false

            [plot]
            bgcolor = "#ffffff"
            node_size = 3
            "##,
        )
        .unwrap();

        assert_eq!(config.network_type, NetworkType::Walk);
        assert_eq!(config.hwy_speeds["residential"], 25.0);
        assert!(!config.cache.enabled);
        assert_eq!(config.plot.node_size, 3);
        assert_eq!(config.plot.edge_color, "#333333");

        let network = config.network_config();
        assert_eq!(network.center.y(), 51.5);
        assert_eq!(network.dist, 800.0);
        assert!(!network.cache.enabled);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(AppConfig::from_toml("dist = -5.0").is_err());
        assert!(AppConfig::from_toml(r#"network_type = "boat""#).is_err());
        assert!(AppConfig::from_toml("unknown_key = 1").is_err());
        assert!(AppConfig::from_toml("[plot]\nbgcolor = \"black\"").is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streetbc.toml");
        fs::write(&path, "dist = 1200.0\n").unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.dist, 1200.0);
        assert_eq!(AppConfig::load(None).unwrap(), AppConfig::default());
    }
}
