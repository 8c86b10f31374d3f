// src/config.rs
//
// YAML loading for the engine config and the zone (ROI) file.
//
// Zone file layout:
//
//   tables:              # `mesas` is accepted as well
//     - id: "T1"
//       polygon: [[120, 340], [410, 330], [430, 520], [100, 530]]
//       y_band: [300, 560]   # optional
//       iop_thr: 0.12        # optional
//   exclusions:          # optional
//     - [[0, 0], [80, 0], [80, 720], [0, 720]]

use crate::analysis::ZoneConfig;
use crate::error::ConfigError;
use crate::geometry::Polygon;
use crate::types::Config;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = read(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ZoneFile {
    pub zones: Vec<ZoneConfig>,
    pub exclusions: Vec<Polygon>,
}

#[derive(Deserialize)]
struct RawZoneFile {
    tables: Option<Vec<ZoneConfig>>,
    mesas: Option<Vec<ZoneConfig>>,
    #[serde(default)]
    exclusions: Vec<Polygon>,
}

pub fn load_zones<P: AsRef<Path>>(path: P) -> Result<ZoneFile, ConfigError> {
    let path = path.as_ref();
    let contents = read(path)?;
    let file = parse_zones(&contents, &path.display().to_string())?;
    info!(
        "Loaded {} zones and {} exclusions from {}",
        file.zones.len(),
        file.exclusions.len(),
        path.display()
    );
    Ok(file)
}

/// Parse and validate zone YAML. `origin` is only used in error messages.
pub fn parse_zones(yaml: &str, origin: &str) -> Result<ZoneFile, ConfigError> {
    let raw: RawZoneFile = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
        path: origin.to_string(),
        source,
    })?;
    let zones = raw.tables.or(raw.mesas).ok_or(ConfigError::MissingZones)?;

    validate_zones(&zones)?;
    for (index, poly) in raw.exclusions.iter().enumerate() {
        if poly.len() < 3 || !poly.vertices().iter().all(|v| v.is_finite()) {
            return Err(ConfigError::InvalidExclusion { index });
        }
    }

    Ok(ZoneFile {
        zones,
        exclusions: raw.exclusions,
    })
}

pub fn validate_zones(zones: &[ZoneConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for zone in zones {
        if zone.polygon.len() < 3 {
            return Err(ConfigError::TooFewVertices {
                id: zone.id.clone(),
                count: zone.polygon.len(),
            });
        }
        if !zone.polygon.vertices().iter().all(|v| v.is_finite()) {
            return Err(ConfigError::NonFiniteVertex {
                id: zone.id.clone(),
            });
        }
        if let Some((min, max)) = zone.y_band {
            if min > max {
                return Err(ConfigError::InvertedBand {
                    id: zone.id.clone(),
                    min,
                    max,
                });
            }
        }
        if !seen.insert(zone.id.as_str()) {
            return Err(ConfigError::DuplicateZone(zone.id.clone()));
        }
    }
    Ok(())
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_zones_from_tables_key() {
        let file = write_temp(
            r#"
tables:
  - id: "T1"
    polygon: [[0, 0], [100, 0], [100, 100], [0, 100]]
    y_band: [10, 90]
  - id: "T2"
    polygon: [[200, 0], [300, 0], [250, 80]]
    iop_thr: 0.2
exclusions:
  - [[500, 500], [600, 500], [600, 600]]
"#,
        );
        let zones = load_zones(file.path()).unwrap();
        assert_eq!(zones.zones.len(), 2);
        assert_eq!(zones.zones[0].y_band, Some((10.0, 90.0)));
        assert_eq!(zones.zones[0].iop_thr, None);
        assert_eq!(zones.zones[1].iop_thr, Some(0.2));
        assert_eq!(zones.exclusions.len(), 1);
    }

    #[test]
    fn test_mesas_key_accepted() {
        let zones = parse_zones(
            "mesas:\n  - id: \"01\"\n    polygon: [[0, 0], [10, 0], [10, 10]]\n",
            "inline",
        )
        .unwrap();
        assert_eq!(zones.zones[0].id, "01");
        assert!(zones.exclusions.is_empty());
    }

    #[test]
    fn test_invalid_zone_files() {
        assert!(matches!(
            parse_zones("exclusions: []\n", "inline"),
            Err(ConfigError::MissingZones)
        ));
        assert!(matches!(
            parse_zones("tables:\n  - id: A\n    polygon: [[0, 0], [1, 1]]\n", "inline"),
            Err(ConfigError::TooFewVertices { count: 2, .. })
        ));
        assert!(matches!(
            parse_zones(
                "tables:\n  - id: A\n    polygon: [[0, 0], [9, 0], [9, 9]]\n    y_band: [50, 10]\n",
                "inline"
            ),
            Err(ConfigError::InvertedBand { .. })
        ));
        assert!(matches!(
            parse_zones(
                "tables:\n  - id: A\n    polygon: [[0, 0], [9, 0], [9, 9]]\n  - id: A\n    polygon: [[0, 0], [9, 0], [9, 9]]\n",
                "inline"
            ),
            Err(ConfigError::DuplicateZone(id)) if id == "A"
        ));
        assert!(matches!(
            parse_zones(
                "tables:\n  - id: A\n    polygon: [[0, 0], [9, 0], [9, 9]]\nexclusions:\n  - [[0, 0], [1, 1]]\n",
                "inline"
            ),
            Err(ConfigError::InvalidExclusion { index: 0 })
        ));
        assert!(matches!(
            parse_zones("tables: [", "inline"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            load_zones("/nonexistent/zones.yaml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let file = write_temp(
            r#"
tracker:
  max_dist: 120
seating:
  sit_seconds: 3.5
logging:
  level: "zone_occupancy=debug"
"#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.engine.tracker.max_dist, 120.0);
        assert_eq!(config.engine.tracker.max_misses, 30);
        assert_eq!(config.engine.seating.sit_seconds, 3.5);
        assert_eq!(config.engine.seating.ttl_lost, 11.0);
        assert_eq!(config.engine.filter.max_aspect_ratio, 3.2);
        assert_eq!(config.logging.level, "zone_occupancy=debug");
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.engine.event_capacity, 256);
        assert_eq!(config.engine.classifier.min_area_pct, 0.08);
    }
}
