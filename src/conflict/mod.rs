//! Pairwise conflict detection over the current arrival snapshot.
//!
//! Every unordered pair of trains is checked against the occupancy, platform
//! and proximity rules. The scan is O(n²) in the number of trains, which is
//! fine for tens to low hundreds of trains. Partitioning trains by station
//! before pairing is the next step if rosters grow beyond that.

mod occupancy;
mod platform;
mod segment;
mod store;
mod types;

pub use store::ConflictStore;
pub use types::{
    ActiveConflicts, ConflictKind, ConflictRecord, ConflictStatistics, ConflictThresholds, Severity,
    TrainSnapshot,
};

use ::log::warn;
use chrono::NaiveDateTime;

#[allow(unused_imports)]
use crate::logging::log;

const MAX_CONFLICTS: usize = 9999;

struct ConflictContext {
    thresholds: ConflictThresholds,
}

struct ConflictResults {
    conflicts: Vec<ConflictRecord>,
    detected_at: NaiveDateTime,
}

impl ConflictResults {
    fn is_full(&self) -> bool {
        self.conflicts.len() >= MAX_CONFLICTS
    }

    fn push(
        &mut self,
        kind: ConflictKind,
        a: &TrainSnapshot,
        b: &TrainSnapshot,
        location: String,
        description: String,
    ) {
        if self.is_full() {
            return;
        }
        self.conflicts.push(ConflictRecord::new(kind, a, b, location, self.detected_at, description));
    }
}

/// Evaluate every unordered pair in `snapshot`
///
/// The result is the complete conflict set for this snapshot. Records carry
/// fresh ids on every call; a pair may appear once per rule that fires.
#[must_use]
pub fn detect_conflicts(
    snapshot: &[TrainSnapshot],
    thresholds: &ConflictThresholds,
    detected_at: NaiveDateTime,
) -> Vec<ConflictRecord> {
    #[cfg(feature = "perf_timing")]
    let start = std::time::Instant::now();

    let ctx = ConflictContext { thresholds: *thresholds };
    let mut results = ConflictResults {
        conflicts: Vec::new(),
        detected_at,
    };

    'outer: for (i, a) in snapshot.iter().enumerate() {
        for b in &snapshot[i + 1..] {
            check_pair(a, b, &ctx, &mut results);
            if results.is_full() {
                warn!("Conflict limit of {MAX_CONFLICTS} reached, remaining pairs skipped");
                break 'outer;
            }
        }
    }

    #[cfg(feature = "perf_timing")]
    log!(
        "detect_conflicts: {} trains, {} pairs, {} conflicts in {:?}",
        snapshot.len(),
        snapshot.len() * snapshot.len().saturating_sub(1) / 2,
        results.conflicts.len(),
        start.elapsed()
    );

    results.conflicts
}

/// Run all rules on one pair, normalized so the outcome does not depend on
/// argument order
fn check_pair(a: &TrainSnapshot, b: &TrainSnapshot, ctx: &ConflictContext, results: &mut ConflictResults) {
    if a.train_id() == b.train_id() {
        return;
    }
    let (a, b) = if a.train_id() < b.train_id() { (a, b) } else { (b, a) };

    occupancy::check_occupancy(a, b, ctx, results);
    platform::check_platform(a, b, ctx, results);
    segment::check_proximity(a, b, ctx, results);
}

/// Detector bound to one set of thresholds
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector {
    thresholds: ConflictThresholds,
}

impl ConflictDetector {
    #[must_use]
    pub fn new(thresholds: ConflictThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn thresholds(&self) -> &ConflictThresholds {
        &self.thresholds
    }

    #[must_use]
    pub fn detect(&self, snapshot: &[TrainSnapshot], detected_at: NaiveDateTime) -> Vec<ConflictRecord> {
        detect_conflicts(snapshot, &self.thresholds, detected_at)
    }
}
