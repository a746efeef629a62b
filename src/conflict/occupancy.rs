//! Station occupancy: two trains reported at the same station close together in time.

use super::{ConflictContext, ConflictResults};
use crate::conflict::types::{ConflictKind, TrainSnapshot};

/// Gap between two arrival timestamps in minutes
// Millisecond gaps between live arrivals are far below f64's exact integer range
#[allow(clippy::cast_precision_loss)]
fn minutes_apart(a: &TrainSnapshot, b: &TrainSnapshot) -> f64 {
    let gap = a.timestamp.signed_duration_since(b.timestamp);
    gap.num_milliseconds().abs() as f64 / 60_000.0
}

pub(super) fn check_occupancy(
    a: &TrainSnapshot,
    b: &TrainSnapshot,
    ctx: &ConflictContext,
    results: &mut ConflictResults,
) {
    if a.station_code != b.station_code {
        return;
    }
    let gap = minutes_apart(a, b);
    if gap >= ctx.thresholds.occupancy_window_minutes {
        return;
    }
    results.push(
        ConflictKind::Occupancy,
        a,
        b,
        a.station_code.clone(),
        format!("Both trains at {} within {gap:.1} minutes", a.station_code),
    );
}
