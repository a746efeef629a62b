use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::time::time_to_minutes;

/// One scheduled stop on a train's route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub seq: u32,
    pub station_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
    #[serde(rename = "arrival_time", default, with = "optional_time_serde")]
    pub arrival: Option<NaiveTime>,
    #[serde(rename = "departure_time", default, with = "optional_time_serde")]
    pub departure: Option<NaiveTime>,
    /// Cumulative distance from the route origin (km)
    #[serde(rename = "distance", default)]
    pub distance_km: f64,
}

impl RouteStop {
    #[must_use]
    pub fn new(seq: u32, station_code: &str, arrival: Option<NaiveTime>, departure: Option<NaiveTime>, distance_km: f64) -> Self {
        Self {
            seq,
            station_code: station_code.to_string(),
            station_name: None,
            arrival,
            departure,
            distance_km,
        }
    }

    #[must_use]
    pub fn arrival_minutes(&self) -> Option<f64> {
        self.arrival.map(time_to_minutes)
    }

    #[must_use]
    pub fn departure_minutes(&self) -> Option<f64> {
        self.departure.map(time_to_minutes)
    }
}

/// Ordered stops of a train. A route with fewer than two stops, or with
/// decreasing distances or times, is a data-quality error reported by
/// [`Route::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<RouteStop>", into = "Vec<RouteStop>")]
pub struct Route {
    stops: Vec<RouteStop>,
}

impl Route {
    /// Build a route, normalizing `00:00:00` placeholders at the origin
    /// arrival and terminus departure to "not scheduled"
    #[must_use]
    pub fn new(mut stops: Vec<RouteStop>) -> Self {
        let last = stops.len().saturating_sub(1);
        for (i, stop) in stops.iter_mut().enumerate() {
            if i == 0 && stop.arrival == Some(NaiveTime::MIN) {
                stop.arrival = None;
            }
            if i == last && i > 0 && stop.departure == Some(NaiveTime::MIN) {
                stop.departure = None;
            }
        }
        Self { stops }
    }

    #[must_use]
    pub fn stops(&self) -> &[RouteStop] {
        &self.stops
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    #[must_use]
    pub fn stop(&self, index: usize) -> Option<&RouteStop> {
        self.stops.get(index)
    }

    /// Number of segments (intervals between consecutive stops)
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.stops.len().saturating_sub(1)
    }

    #[must_use]
    pub fn last_index(&self) -> usize {
        self.stops.len().saturating_sub(1)
    }

    /// Distance in km of the segment departing stop `index`
    ///
    /// Returns `None` when the segment does not exist or the distance is not a
    /// positive finite number.
    #[must_use]
    pub fn segment_distance(&self, index: usize) -> Option<f64> {
        let from = self.stops.get(index)?;
        let to = self.stops.get(index + 1)?;
        let distance = (to.distance_km - from.distance_km).abs();
        (distance.is_finite() && distance > 0.0).then_some(distance)
    }

    /// Scheduled (departure, arrival) minutes of the segment departing stop `index`
    ///
    /// A stop without a departure time falls back to its arrival time and vice
    /// versa, so a segment is timed whenever both ends have any time at all.
    #[must_use]
    pub fn segment_times(&self, index: usize) -> Option<(f64, f64)> {
        let from = self.stops.get(index)?;
        let to = self.stops.get(index + 1)?;
        let departure = from.departure_minutes().or_else(|| from.arrival_minutes())?;
        let arrival = to.arrival_minutes().or_else(|| to.departure_minutes())?;
        Some((departure, arrival))
    }

    /// First stop whose station code matches
    #[must_use]
    pub fn find_stop(&self, station_code: &str) -> Option<&RouteStop> {
        self.stops.iter().find(|s| s.station_code == station_code)
    }

    #[must_use]
    pub fn first_departure_minutes(&self) -> Option<f64> {
        self.stops.first().and_then(RouteStop::departure_minutes)
    }

    #[must_use]
    pub fn last_arrival_minutes(&self) -> Option<f64> {
        self.stops.last().and_then(RouteStop::arrival_minutes)
    }

    /// Check the structural invariants: at least two stops, non-decreasing
    /// cumulative distance and non-decreasing scheduled times
    ///
    /// # Errors
    ///
    /// Returns the first violation found, in route order
    pub fn validate(&self) -> Result<(), RouteError> {
        if self.stops.len() < 2 {
            return Err(RouteError::TooShort(self.stops.len()));
        }

        for pair in self.stops.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if !next.distance_km.is_finite() || next.distance_km < prev.distance_km {
                return Err(RouteError::NonMonotonicDistance { seq: next.seq });
            }
        }

        // Walk every known time in order: arrival then departure of each stop
        let mut last_time: Option<f64> = None;
        for stop in &self.stops {
            for time in [stop.arrival_minutes(), stop.departure_minutes()].into_iter().flatten() {
                if last_time.is_some_and(|last| time < last) {
                    return Err(RouteError::NonMonotonicTime { seq: stop.seq });
                }
                last_time = Some(time);
            }
        }

        Ok(())
    }
}

impl From<Vec<RouteStop>> for Route {
    fn from(stops: Vec<RouteStop>) -> Self {
        Self::new(stops)
    }
}

impl From<Route> for Vec<RouteStop> {
    fn from(route: Route) -> Self {
        route.stops
    }
}

mod optional_time_serde {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => serializer.serialize_str(&t.format("%H:%M:%S").to_string()),
            None => serializer.serialize_none(),
        }
    }

    /// Unparseable placeholders (`""`, `"--"`, `"Source"`) are read as "not scheduled"
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        Ok(s.and_then(|s| {
            let s = s.trim();
            crate::time::parse_time_hms(s)
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .ok()
        }))
    }
}
