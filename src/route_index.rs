//! Static lookup from route positions to geographic coordinates.

use crate::error::RouteError;
use crate::models::{GeoPoint, Route, StationDirectory};

/// Resolves station codes and route progress to coordinates
#[derive(Debug, Clone, Default)]
pub struct RouteIndex {
    stations: StationDirectory,
}

impl RouteIndex {
    #[must_use]
    pub fn new(stations: StationDirectory) -> Self {
        Self { stations }
    }

    #[must_use]
    pub fn stations(&self) -> &StationDirectory {
        &self.stations
    }

    /// Coordinates of a station, `None` when unknown or not geocoded
    #[must_use]
    pub fn coordinates(&self, station_code: &str) -> Option<GeoPoint> {
        self.stations.get(station_code)?.coordinates()
    }

    /// Linearly interpolate between two stations
    ///
    /// Returns `None` when either station lacks coordinates. Callers skip the
    /// train for that snapshot instead of emitting a fabricated position.
    #[must_use]
    pub fn position_at(&self, current_station: &str, next_station: &str, progress: f64) -> Option<GeoPoint> {
        let from = self.coordinates(current_station)?;
        let to = self.coordinates(next_station)?;
        Some(from.lerp(to, progress.clamp(0.0, 1.0)))
    }

    /// Interpolated position on the segment departing `segment_index` of `route`
    #[must_use]
    pub fn position_on_segment(&self, route: &Route, segment_index: usize, progress: f64) -> Option<GeoPoint> {
        let current = route.stop(segment_index)?;
        let next = route.stop(segment_index + 1)?;
        self.position_at(&current.station_code, &next.station_code, progress)
    }

    /// Structural route checks plus station existence in the dictionary
    ///
    /// # Errors
    ///
    /// Returns the first data-quality problem found
    pub fn validate_route(&self, route: &Route) -> Result<(), RouteError> {
        route.validate()?;
        if let Some(missing) = route.stops().iter().find(|s| !self.stations.contains(&s.station_code)) {
            return Err(RouteError::MissingStation { code: missing.station_code.clone() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RouteStop, Station};

    fn index() -> RouteIndex {
        let mut stations: StationDirectory = [
            Station::new("A", "Alpha", 19.0, 72.0),
            Station::new("B", "Bravo", 20.0, 74.0),
        ]
        .into_iter()
        .collect();
        stations.insert(Station {
            code: "C".to_string(),
            name: "Charlie".to_string(),
            latitude: None,
            longitude: None,
        });
        RouteIndex::new(stations)
    }

    #[test]
    fn test_position_at_endpoints() {
        let index = index();
        assert_eq!(index.position_at("A", "B", 0.0), Some(GeoPoint::new(19.0, 72.0)));
        assert_eq!(index.position_at("A", "B", 1.0), Some(GeoPoint::new(20.0, 74.0)));
    }

    #[test]
    fn test_position_stays_on_line() {
        let index = index();
        for step in 0..=20 {
            let progress = f64::from(step) / 20.0;
            let p = index.position_at("A", "B", progress).expect("both stations geocoded");
            // Line from (19, 72) to (20, 74): lng - 72 == 2 * (lat - 19)
            assert!(((p.lng - 72.0) - 2.0 * (p.lat - 19.0)).abs() < 1e-9);
            assert!((19.0..=20.0).contains(&p.lat));
        }
    }

    #[test]
    fn test_position_unknown_without_coordinates() {
        let index = index();
        assert!(index.position_at("A", "C", 0.5).is_none());
        assert!(index.position_at("A", "ZZZ", 0.5).is_none());
    }

    #[test]
    fn test_validate_route_missing_station() {
        let index = index();
        let route = Route::new(vec![
            RouteStop::new(1, "A", None, None, 0.0),
            RouteStop::new(2, "Q", None, None, 10.0),
        ]);
        assert_eq!(
            index.validate_route(&route),
            Err(RouteError::MissingStation { code: "Q".to_string() })
        );
    }

    #[test]
    fn test_position_on_segment() {
        let index = index();
        let route = Route::new(vec![
            RouteStop::new(1, "A", None, None, 0.0),
            RouteStop::new(2, "B", None, None, 10.0),
        ]);
        assert_eq!(index.position_on_segment(&route, 0, 0.5), Some(GeoPoint::new(19.5, 73.0)));
        assert!(index.position_on_segment(&route, 1, 0.5).is_none());
    }
}
