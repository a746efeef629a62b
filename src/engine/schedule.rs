//! Position derived purely from the timetable and a time of day.
//!
//! Used for trains that are not on the free-running clock (freight paths,
//! "where should this train be at 14:05" queries). Nothing here mutates
//! simulation state.

use serde::{Deserialize, Serialize};

use crate::models::TrainDefinition;
use crate::route_index::RouteIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// Before the first scheduled departure, at the origin
    Waiting,
    EnRoute,
    /// Dwelling between arrival and departure at an intermediate stop
    AtStation,
    /// After the last scheduled arrival, at the destination
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePosition {
    pub train_id: String,
    pub status: ScheduleStatus,
    pub lat: f64,
    pub lng: f64,
    pub current_station: String,
    pub next_station: Option<String>,
    pub segment_index: usize,
    pub progress_pct: f64,
    pub speed: f64,
    pub distance_traveled_km: f64,
    pub distance_remaining_km: f64,
}

/// Locate `train` on its route at `now_minutes` (minutes since midnight)
///
/// Returns `None` when the route is too short, the relevant stations have no
/// coordinates, or the timetable has no entry covering `now_minutes`.
#[must_use]
pub fn position_at_time(train: &TrainDefinition, index: &RouteIndex, now_minutes: f64) -> Option<SchedulePosition> {
    let route = &train.route;
    if route.len() < 2 || !now_minutes.is_finite() {
        return None;
    }
    let speed = train.effective_speed();
    let origin = route.stop(0)?;
    let destination = route.stop(route.last_index())?;
    let total_km = (destination.distance_km - origin.distance_km).max(0.0);

    let report = |status: ScheduleStatus, segment_index: usize, progress: f64, speed: f64| -> Option<SchedulePosition> {
        let current = route.stop(segment_index)?;
        let next = route.stop(segment_index + 1);
        let point = match next {
            Some(next) if status == ScheduleStatus::EnRoute => {
                index.position_at(&current.station_code, &next.station_code, progress)?
            }
            _ => index.coordinates(&current.station_code)?,
        };
        let traveled = match next {
            Some(next) => current.distance_km + (next.distance_km - current.distance_km) * progress,
            None => current.distance_km,
        } - origin.distance_km;
        Some(SchedulePosition {
            train_id: train.train_id.clone(),
            status,
            lat: point.lat,
            lng: point.lng,
            current_station: current.station_code.clone(),
            next_station: next.map(|s| s.station_code.clone()),
            segment_index,
            progress_pct: round_pct(progress),
            speed,
            distance_traveled_km: traveled.max(0.0),
            distance_remaining_km: (total_km - traveled).max(0.0),
        })
    };

    for segment in 0..route.segment_count() {
        let Some((departure, arrival)) = route.segment_times(segment) else {
            continue;
        };
        if departure <= now_minutes && now_minutes <= arrival {
            let elapsed = now_minutes - departure;
            let duration = arrival - departure;
            let distance = route.segment_distance(segment).unwrap_or(0.0);
            let progress = if speed > 0.0 && distance > 0.0 {
                (speed * elapsed / 60.0 / distance).min(1.0)
            } else if duration > 0.0 {
                elapsed / duration
            } else {
                0.0
            };
            // Unknown coordinates on one segment do not hide a later match
            if let Some(position) = report(ScheduleStatus::EnRoute, segment, progress, speed) {
                return Some(position);
            }
        }
    }

    if route.first_departure_minutes().is_some_and(|d| now_minutes < d) {
        return report(ScheduleStatus::Waiting, 0, 0.0, speed);
    }
    if route.last_arrival_minutes().is_some_and(|a| now_minutes > a) {
        return report(ScheduleStatus::Completed, route.last_index(), 0.0, 0.0);
    }

    // Dwell at an intermediate stop
    (1..route.last_index()).find_map(|i| {
        let stop = route.stop(i)?;
        let arrival = stop.arrival_minutes()?;
        let departure = stop.departure_minutes()?;
        if arrival <= now_minutes && now_minutes <= departure {
            report(ScheduleStatus::AtStation, i, 0.0, 0.0)
        } else {
            None
        }
    })
}

/// Percentage with one decimal place
pub(crate) fn round_pct(progress: f64) -> f64 {
    (progress.clamp(0.0, 1.0) * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Route, RouteStop, Station, StationDirectory, TrainCategory};
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    fn index() -> RouteIndex {
        let stations: StationDirectory = [
            Station::new("A", "Alpha", 19.0, 72.0),
            Station::new("B", "Bravo", 19.5, 72.5),
            Station::new("C", "Charlie", 20.0, 73.0),
        ]
        .into_iter()
        .collect();
        RouteIndex::new(stations)
    }

    fn freight() -> TrainDefinition {
        let route = Route::new(vec![
            RouteStop::new(1, "A", None, t(10, 0), 0.0),
            RouteStop::new(2, "B", t(10, 30), t(10, 40), 30.0),
            RouteStop::new(3, "C", t(11, 40), None, 90.0),
        ]);
        TrainDefinition::new("F1", "Goods", TrainCategory::Freight, route)
    }

    #[test]
    fn test_waiting_before_departure() {
        let pos = position_at_time(&freight(), &index(), 9.0 * 60.0).expect("position");
        assert_eq!(pos.status, ScheduleStatus::Waiting);
        assert_eq!((pos.lat, pos.lng), (19.0, 72.0));
        assert_eq!(pos.next_station.as_deref(), Some("B"));
        assert_eq!(pos.distance_traveled_km, 0.0);
        assert_eq!(pos.distance_remaining_km, 90.0);
    }

    #[test]
    fn test_en_route_speed_based() {
        // 60 km/h for 15 minutes = 15 km of a 30 km segment
        let pos = position_at_time(&freight(), &index(), 10.0 * 60.0 + 15.0).expect("position");
        assert_eq!(pos.status, ScheduleStatus::EnRoute);
        assert_eq!(pos.segment_index, 0);
        assert_eq!(pos.progress_pct, 50.0);
        assert_eq!(pos.speed, 60.0);
        assert_eq!(pos.distance_traveled_km, 15.0);
        assert_eq!(pos.distance_remaining_km, 75.0);
    }

    #[test]
    fn test_speed_progress_caps_at_one() {
        // A slow schedule: the speed model would overshoot the segment
        let train = freight().with_speed(200.0);
        let pos = position_at_time(&train, &index(), 10.0 * 60.0 + 25.0).expect("position");
        assert_eq!(pos.progress_pct, 100.0);
    }

    #[test]
    fn test_dwell_at_intermediate_stop() {
        let pos = position_at_time(&freight(), &index(), 10.0 * 60.0 + 35.0).expect("position");
        assert_eq!(pos.status, ScheduleStatus::AtStation);
        assert_eq!(pos.current_station, "B");
        assert_eq!(pos.distance_traveled_km, 30.0);
    }

    #[test]
    fn test_completed_after_last_arrival() {
        let pos = position_at_time(&freight(), &index(), 12.0 * 60.0).expect("position");
        assert_eq!(pos.status, ScheduleStatus::Completed);
        assert_eq!((pos.lat, pos.lng), (20.0, 73.0));
        assert_eq!(pos.speed, 0.0);
        assert_eq!(pos.next_station, None);
        assert_eq!(pos.distance_remaining_km, 0.0);
    }

    #[test]
    fn test_zero_distance_uses_time_ratio() {
        let route = Route::new(vec![
            RouteStop::new(1, "A", None, t(10, 0), 5.0),
            RouteStop::new(2, "B", t(10, 20), None, 5.0),
        ]);
        let train = TrainDefinition::new("X", "Zero", TrainCategory::Local, route);
        let pos = position_at_time(&train, &index(), 10.0 * 60.0 + 5.0).expect("position");

        assert!(pos.progress_pct.is_finite());
        assert_eq!(pos.progress_pct, 25.0);
        assert!(pos.lat.is_finite() && pos.lng.is_finite());
    }

    #[test]
    fn test_zero_duration_segment_is_finite() {
        let route = Route::new(vec![
            RouteStop::new(1, "A", None, t(10, 0), 5.0),
            RouteStop::new(2, "B", t(10, 0), None, 5.0),
        ]);
        let train = TrainDefinition::new("X", "Zero", TrainCategory::Local, route);
        let pos = position_at_time(&train, &index(), 600.0).expect("position");
        assert_eq!(pos.progress_pct, 0.0);
    }

    #[test]
    fn test_unknown_coordinates_yield_none() {
        let route = Route::new(vec![
            RouteStop::new(1, "A", None, t(10, 0), 0.0),
            RouteStop::new(2, "NOWHERE", t(10, 30), None, 30.0),
        ]);
        let train = TrainDefinition::new("X", "Lost", TrainCategory::Local, route);
        assert!(position_at_time(&train, &index(), 615.0).is_none());
    }
}
