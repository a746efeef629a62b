use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::LoadError;

/// A geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Linear interpolation towards `other`; `progress` 0 yields `self`, 1 yields `other`
    #[must_use]
    pub fn lerp(self, other: Self, progress: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * progress,
            lng: self.lng + (other.lng - self.lng) * progress,
        }
    }
}

/// Immutable station reference data. Coordinates are optional because
/// geocoding of the station list is sparse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Station {
    #[must_use]
    pub fn new(code: &str, name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// Coordinates, if both are present and finite
    #[must_use]
    pub fn coordinates(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }
}

/// Station dictionary keyed by station code
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationDirectory {
    stations: HashMap<String, Station>,
}

impl StationDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, station: Station) {
        self.stations.insert(station.code.clone(), station);
    }

    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Station> {
        self.stations.get(code)
    }

    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.stations.contains_key(code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Parse a `{ code: { name, latitude, longitude } }` dictionary
    ///
    /// The map key is authoritative for the station code.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a station map
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let raw: HashMap<String, Station> = serde_json::from_str(json)
            .map_err(|source| LoadError::Json { what: "station dictionary", source })?;

        Ok(raw.into_iter().collect())
    }
}

impl FromIterator<(String, Station)> for StationDirectory {
    fn from_iter<I: IntoIterator<Item = (String, Station)>>(iter: I) -> Self {
        let stations = iter
            .into_iter()
            .map(|(code, mut station)| {
                station.code.clone_from(&code);
                (code, station)
            })
            .collect();
        Self { stations }
    }
}

impl FromIterator<Station> for StationDirectory {
    fn from_iter<I: IntoIterator<Item = Station>>(iter: I) -> Self {
        iter.into_iter().map(|s| (s.code.clone(), s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_endpoints() {
        let a = GeoPoint::new(19.0, 72.8);
        let b = GeoPoint::new(19.2, 73.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
    }

    #[test]
    fn test_coordinates_missing() {
        let station = Station {
            code: "XYZ".to_string(),
            name: "Nowhere".to_string(),
            latitude: Some(10.0),
            longitude: None,
        };
        assert!(station.coordinates().is_none());
    }

    #[test]
    fn test_from_json_uses_key_as_code() {
        let json = r#"{
            "DR": { "name": "Dadar", "latitude": 19.0178, "longitude": 72.8478 },
            "TNA": { "name": "Thane" }
        }"#;
        let directory = StationDirectory::from_json(json).expect("valid json");

        assert_eq!(directory.len(), 2);
        let dadar = directory.get("DR").expect("station present");
        assert_eq!(dadar.code, "DR");
        assert!(dadar.coordinates().is_some());
        assert!(directory.get("TNA").and_then(Station::coordinates).is_none());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(StationDirectory::from_json("[1, 2, 3]").is_err());
    }
}
