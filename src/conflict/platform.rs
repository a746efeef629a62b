//! Platform conflicts: scheduled arrivals at the shared station overlap.

use super::{ConflictContext, ConflictResults};
use crate::conflict::types::{ConflictKind, TrainSnapshot};
use crate::constants::MINUTES_PER_DAY;

/// Distance between two times of day, the short way round midnight
fn circular_gap(a: f64, b: f64) -> f64 {
    let gap = (a - b).abs() % MINUTES_PER_DAY;
    gap.min(MINUTES_PER_DAY - gap)
}

pub(super) fn check_platform(
    a: &TrainSnapshot,
    b: &TrainSnapshot,
    ctx: &ConflictContext,
    results: &mut ConflictResults,
) {
    if a.station_code != b.station_code {
        return;
    }
    let station = &a.station_code;
    let scheduled = |s: &TrainSnapshot| s.route().find_stop(station).and_then(|stop| stop.arrival_minutes());
    let (Some(arrival_a), Some(arrival_b)) = (scheduled(a), scheduled(b)) else {
        return;
    };

    let gap = circular_gap(arrival_a, arrival_b);
    if gap >= ctx.thresholds.platform_window_minutes {
        return;
    }
    results.push(
        ConflictKind::Platform,
        a,
        b,
        station.clone(),
        format!("Scheduled arrivals at {station} are {gap:.0} minutes apart"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_gap_wraps_midnight() {
        assert_eq!(circular_gap(1435.0, 3.0), 8.0);
        assert_eq!(circular_gap(600.0, 610.0), 10.0);
        assert_eq!(circular_gap(0.0, 720.0), 720.0);
    }
}
