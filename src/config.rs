use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

pub const CONFIG_FILE: &str = "kira-sightings.json";
pub const DEFAULT_DATA_PATH: &str = "Data/base.csv";
pub const DEFAULT_REGION_PLACEHOLDER: &str = "Unknown";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub data_path: Option<Utf8PathBuf>,
    #[serde(default)]
    pub delimiter: Option<char>,
    #[serde(default)]
    pub region_placeholder: Option<String>,
    #[serde(default)]
    pub top_species: Option<usize>,
    #[serde(default)]
    pub top_regions: Option<usize>,
    #[serde(default)]
    pub histogram_top: Option<usize>,
    #[serde(default)]
    pub map: Option<MapConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MapConfig {
    #[serde(default)]
    pub point_radius: Option<f64>,
    #[serde(default)]
    pub zoom: Option<f64>,
    #[serde(default)]
    pub pitch: Option<f64>,
    /// `[latitude, longitude]` used when no points are visible.
    #[serde(default)]
    pub fallback_center: Option<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapSettings {
    pub point_radius: f64,
    pub zoom: f64,
    pub pitch: f64,
    pub fallback_latitude: f64,
    pub fallback_longitude: f64,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            point_radius: 5000.0,
            zoom: 4.0,
            pitch: 0.0,
            fallback_latitude: 23.6345,
            fallback_longitude: -102.5528,
        }
    }
}

/// Knobs of the filter-and-aggregate pipeline that do not depend on where
/// the data lives.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSettings {
    pub top_species: usize,
    pub top_regions: usize,
    pub histogram_top: usize,
    pub map: MapSettings,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            top_species: 10,
            top_regions: 10,
            histogram_top: 5,
            map: MapSettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_path: Utf8PathBuf,
    pub delimiter: Option<u8>,
    pub region_placeholder: String,
    pub dashboard: DashboardSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path` when given, otherwise `kira-sightings.json` in the current
    /// directory, then the per-user config directory. Absent default files
    /// resolve to built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::default_locations()
                .into_iter()
                .find(|candidate| candidate.exists()),
        };

        let Some(config_path) = config_path else {
            return Self::resolve_config(Config::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let delimiter = config
            .delimiter
            .map(|ch| {
                u8::try_from(ch)
                    .ok()
                    .filter(u8::is_ascii)
                    .ok_or_else(|| KiraError::InvalidConfig(format!("delimiter {ch:?}")))
            })
            .transpose()?;

        let region_placeholder = config
            .region_placeholder
            .unwrap_or_else(|| DEFAULT_REGION_PLACEHOLDER.to_string());
        if region_placeholder.trim().is_empty() {
            return Err(KiraError::InvalidConfig(
                "region_placeholder must not be empty".to_string(),
            ));
        }

        let defaults = DashboardSettings::default();
        let dashboard = DashboardSettings {
            top_species: positive(config.top_species, defaults.top_species, "top_species")?,
            top_regions: positive(config.top_regions, defaults.top_regions, "top_regions")?,
            histogram_top: positive(
                config.histogram_top,
                defaults.histogram_top,
                "histogram_top",
            )?,
            map: resolve_map(config.map.unwrap_or_default(), defaults.map)?,
        };

        Ok(ResolvedConfig {
            data_path: config
                .data_path
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATA_PATH)),
            delimiter,
            region_placeholder,
            dashboard,
        })
    }

    fn default_locations() -> Vec<PathBuf> {
        let mut locations = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dirs) = ProjectDirs::from("", "", "kira-sightings") {
            locations.push(dirs.config_dir().join(CONFIG_FILE));
        }
        locations
    }
}

fn positive(value: Option<usize>, default: usize, name: &str) -> Result<usize, KiraError> {
    match value {
        Some(0) => Err(KiraError::InvalidConfig(format!("{name} must be at least 1"))),
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

fn resolve_map(config: MapConfig, defaults: MapSettings) -> Result<MapSettings, KiraError> {
    let (fallback_latitude, fallback_longitude) = match config.fallback_center {
        Some([lat, lon]) => (lat, lon),
        None => (defaults.fallback_latitude, defaults.fallback_longitude),
    };
    if !(-90.0..=90.0).contains(&fallback_latitude)
        || !(-180.0..=180.0).contains(&fallback_longitude)
    {
        return Err(KiraError::InvalidConfig(format!(
            "fallback_center [{fallback_latitude}, {fallback_longitude}] is out of range"
        )));
    }
    let zoom = config.zoom.unwrap_or(defaults.zoom);
    if !(0.0..=22.0).contains(&zoom) {
        return Err(KiraError::InvalidConfig(format!("zoom {zoom} is out of range")));
    }
    Ok(MapSettings {
        point_radius: config.point_radius.unwrap_or(defaults.point_radius),
        zoom,
        pitch: config.pitch.unwrap_or(defaults.pitch),
        fallback_latitude,
        fallback_longitude,
    })
}
