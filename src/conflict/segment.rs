//! Proximity on a shared route segment.

use super::{ConflictContext, ConflictResults};
use crate::conflict::types::{ConflictKind, TrainSnapshot};
use crate::models::Route;

/// Along-route distance between two stations, if the route serves both
fn gap_on_route(route: &Route, from: &str, to: &str) -> Option<f64> {
    let from = route.find_stop(from)?;
    let to = route.find_stop(to)?;
    let gap = (to.distance_km - from.distance_km).abs();
    gap.is_finite().then_some(gap)
}

/// Smallest along-route gap between the two trains' stations, measured on
/// whichever route serves both stations
fn shared_gap(a: &TrainSnapshot, b: &TrainSnapshot) -> Option<f64> {
    let on_a = gap_on_route(a.route(), &a.station_code, &b.station_code)?;
    let on_b = gap_on_route(b.route(), &a.station_code, &b.station_code)?;
    Some(on_a.min(on_b))
}

pub(super) fn check_proximity(
    a: &TrainSnapshot,
    b: &TrainSnapshot,
    ctx: &ConflictContext,
    results: &mut ConflictResults,
) {
    // Two trains at one station are the occupancy rule's concern
    if a.station_code == b.station_code {
        return;
    }
    let Some(gap) = shared_gap(a, b) else {
        return;
    };
    if gap >= ctx.thresholds.proximity_threshold_km {
        return;
    }
    let location = format!("{}-{}", a.station_code, b.station_code);
    results.push(
        ConflictKind::Proximity,
        a,
        b,
        location,
        format!("Trains {gap:.1} km apart on a shared segment"),
    );
}
