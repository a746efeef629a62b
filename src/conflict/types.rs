//! Core types for conflict detection.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::ConflictSettings;
use crate::models::{Route, TrainDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Occupancy, // Both trains reported at the same station within a short window
    Platform,  // Scheduled arrivals at the shared station overlap
    Proximity, // Along-route distance on a shared segment below the safety threshold
}

impl ConflictKind {
    /// Severity is a property of the kind, never set per record
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::Occupancy | Self::Proximity => Severity::High,
            Self::Platform => Severity::Medium,
        }
    }

    /// Get a short name for the conflict kind
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Occupancy => "Station Occupancy",
            Self::Platform => "Platform Conflict",
            Self::Proximity => "Proximity Warning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

/// What the detector knows about one train: where it last arrived and when
#[derive(Debug, Clone)]
pub struct TrainSnapshot {
    pub train: Arc<TrainDefinition>,
    pub station_code: String,
    pub timestamp: NaiveDateTime,
    pub speed_kmh: f64,
}

impl TrainSnapshot {
    #[must_use]
    pub fn train_id(&self) -> &str {
        &self.train.train_id
    }

    #[must_use]
    pub fn route(&self) -> &Route {
        &self.train.route
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub id: Uuid,
    pub kind: ConflictKind,
    pub severity: Severity,
    // The pair is always ordered by train id
    pub train1_id: String,
    pub train1_name: String,
    pub train2_id: String,
    pub train2_name: String,
    /// Station code, or `FROM-TO` for a segment
    pub location: String,
    pub detected_at: NaiveDateTime,
    pub description: String,
}

impl ConflictRecord {
    #[must_use]
    pub fn new(
        kind: ConflictKind,
        a: &TrainSnapshot,
        b: &TrainSnapshot,
        location: String,
        detected_at: NaiveDateTime,
        description: String,
    ) -> Self {
        let (first, second) = if a.train_id() <= b.train_id() { (a, b) } else { (b, a) };
        Self {
            id: Uuid::new_v4(),
            kind,
            severity: kind.severity(),
            train1_id: first.train.train_id.clone(),
            train1_name: first.train.train_name.clone(),
            train2_id: second.train.train_id.clone(),
            train2_name: second.train.train_name.clone(),
            location,
            detected_at,
            description,
        }
    }

    /// Identity across cycles: records get fresh ids each rebuild, so
    /// consumers tracking resolution compare on this instead
    #[must_use]
    pub fn identity(&self) -> (ConflictKind, &str, &str, &str) {
        (self.kind, &self.train1_id, &self.train2_id, &self.location)
    }

    /// Format a human-readable message describing the conflict
    #[must_use]
    pub fn format_message(&self) -> String {
        format!(
            "{}: {} ({}) and {} ({}) at {}: {}",
            self.kind.type_name(),
            self.train1_name,
            self.train1_id,
            self.train2_name,
            self.train2_id,
            self.location,
            self.description
        )
    }
}

/// Answer to `get_active_conflicts`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveConflicts {
    pub total_conflicts: usize,
    pub conflicts: Vec<ConflictRecord>,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictStatistics {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub by_kind: BTreeMap<ConflictKind, usize>,
}

/// Rule thresholds, taken from [`ConflictSettings`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictThresholds {
    pub occupancy_window_minutes: f64,
    pub platform_window_minutes: f64,
    pub proximity_threshold_km: f64,
}

impl Default for ConflictThresholds {
    fn default() -> Self {
        Self::from(&ConflictSettings::default())
    }
}

impl From<&ConflictSettings> for ConflictThresholds {
    fn from(settings: &ConflictSettings) -> Self {
        Self {
            occupancy_window_minutes: settings.occupancy_window_minutes,
            platform_window_minutes: settings.platform_window_minutes,
            proximity_threshold_km: settings.proximity_threshold_km,
        }
    }
}
