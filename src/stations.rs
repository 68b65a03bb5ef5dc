/// Station registry for batch predictions and the HTTP endpoint.
///
/// Stations are listed in `stations.toml` so sites can be added without
/// recompiling the service:
///
/// ```toml
/// [[station]]
/// site_code = "08166250"
/// name = "Guadalupe Rv nr Hunt, TX"
/// state = "TX"
/// latitude = 30.0666
/// longitude = -99.3886
/// ```
///
/// Single-site predictions do not require a registry entry; any well-formed
/// USGS site code may be requested.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// USGS site numbers are 8 to 15 ASCII digits.
pub fn is_valid_site_code(site_code: &str) -> bool {
    (8..=15).contains(&site_code.len()) && site_code.chars().all(|c| c.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Station metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub site_code: String,
    pub name: String,
    /// Two-letter state abbreviation.
    pub state: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct StationFile {
    #[serde(default)]
    station: Vec<Station>,
}

#[derive(Debug, Error)]
pub enum StationError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse station registry: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid site code '{site_code}' for station '{name}'")]
    InvalidSiteCode { site_code: String, name: String },
    #[error("duplicate site code '{0}' in station registry")]
    Duplicate(String),
    #[error("coordinates out of range for station '{0}'")]
    InvalidCoordinates(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationRegistry {
    stations: Vec<Station>,
}

impl StationRegistry {
    pub fn from_toml(contents: &str) -> Result<Self, StationError> {
        let file: StationFile = toml::from_str(contents)?;
        let mut seen = HashSet::new();
        for station in &file.station {
            if !is_valid_site_code(&station.site_code) {
                return Err(StationError::InvalidSiteCode {
                    site_code: station.site_code.clone(),
                    name: station.name.clone(),
                });
            }
            if !seen.insert(station.site_code.clone()) {
                return Err(StationError::Duplicate(station.site_code.clone()));
            }
            if !(-90.0..=90.0).contains(&station.latitude)
                || !(-180.0..=180.0).contains(&station.longitude)
            {
                return Err(StationError::InvalidCoordinates(station.name.clone()));
            }
        }
        Ok(Self {
            stations: file.station,
        })
    }

    pub fn load(path: &Path) -> Result<Self, StationError> {
        let contents = fs::read_to_string(path).map_err(|source| StationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Site codes in registry order, ready for `pipeline::predict_batch`.
    pub fn site_codes(&self) -> Vec<String> {
        self.stations.iter().map(|s| s.site_code.clone()).collect()
    }

    pub fn find(&self, site_code: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.site_code == site_code)
    }

    pub fn in_state<'a>(&'a self, state: &'a str) -> impl Iterator<Item = &'a Station> + 'a {
        self.stations
            .iter()
            .filter(move |s| s.state.eq_ignore_ascii_case(state))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"
        [[station]]
        site_code = "08166250"
        name = "Guadalupe Rv nr Hunt, TX"
        state = "TX"
        latitude = 30.0666
        longitude = -99.3886

        [[station]]
        site_code = "08116650"
        name = "Brazos Rv nr Rosharon, TX"
        state = "TX"
        latitude = 29.3497
        longitude = -95.5822

        [[station]]
        site_code = "03431500"
        name = "Mill Creek at Nashville, TN"
        state = "TN"
        latitude = 36.1103
        longitude = -86.7142
    "#;

    #[test]
    fn test_site_code_format() {
        assert!(is_valid_site_code("08166250"));
        assert!(is_valid_site_code("301234095123401"));
        assert!(!is_valid_site_code("0816625"), "7 digits is too short");
        assert!(!is_valid_site_code("08166250a"));
        assert!(!is_valid_site_code(""));
    }

    #[test]
    fn test_registry_parses_and_keeps_order() {
        let registry = StationRegistry::from_toml(REGISTRY).expect("valid registry");
        assert_eq!(registry.site_codes(), vec!["08166250", "08116650", "03431500"]);
    }

    #[test]
    fn test_find_station() {
        let registry = StationRegistry::from_toml(REGISTRY).unwrap();
        let s = registry.find("08116650").expect("Rosharon should be present");
        assert!(s.name.contains("Rosharon"));
        assert!(registry.find("00000000").is_none());
    }

    #[test]
    fn test_filter_by_state_is_case_insensitive() {
        let registry = StationRegistry::from_toml(REGISTRY).unwrap();
        assert_eq!(registry.in_state("tx").count(), 2);
        assert_eq!(registry.in_state("TN").count(), 1);
    }

    #[test]
    fn test_duplicate_site_code_rejected() {
        let dup = format!(
            "{}\n[[station]]\nsite_code = \"08166250\"\nname = \"dup\"\nstate = \"TX\"\nlatitude = 30.0\nlongitude = -99.0\n",
            REGISTRY
        );
        assert!(matches!(
            StationRegistry::from_toml(&dup),
            Err(StationError::Duplicate(code)) if code == "08166250"
        ));
    }

    #[test]
    fn test_malformed_site_code_rejected() {
        let bad = r#"
            [[station]]
            site_code = "ABC"
            name = "bad"
            state = "TX"
            latitude = 30.0
            longitude = -99.0
        "#;
        assert!(matches!(
            StationRegistry::from_toml(bad),
            Err(StationError::InvalidSiteCode { .. })
        ));
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let bad = r#"
            [[station]]
            site_code = "08166250"
            name = "bad"
            state = "TX"
            latitude = 130.0
            longitude = -99.0
        "#;
        assert!(matches!(
            StationRegistry::from_toml(bad),
            Err(StationError::InvalidCoordinates(_))
        ));
    }

    #[test]
    fn test_empty_file_is_empty_registry() {
        let registry = StationRegistry::from_toml("").unwrap();
        assert!(registry.stations().is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = StationRegistry::load(Path::new("/definitely/not/here/stations.toml"));
        assert!(matches!(result, Err(StationError::Io { .. })));
    }
}
