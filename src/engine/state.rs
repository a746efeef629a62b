//! Per-train mutable simulation state.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::RouteError;
use crate::models::TrainDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Simulated time is before the first scheduled departure
    #[default]
    Pending,
    EnRoute,
    /// Reached the last stop of a non-looping route; position is frozen
    Completed,
}

/// Schedule adherence derived from accumulated delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Adherence {
    OnTime,
    Delayed,
}

impl Adherence {
    #[must_use]
    pub fn from_delay(delay_minutes: u32, threshold_minutes: u32) -> Self {
        if delay_minutes > threshold_minutes {
            Self::Delayed
        } else {
            Self::OnTime
        }
    }
}

/// The most recent stop a train reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalRecord {
    pub station_code: String,
    pub arrived_at: NaiveDateTime,
    pub speed_kmh: f64,
}

/// Emitted by a tick when a train completes a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalEvent {
    pub train_id: String,
    pub station_code: String,
    pub arrived_at: NaiveDateTime,
    /// Index of the stop the train arrived at
    pub stop_index: usize,
    /// Random delay picked up on this arrival (minutes)
    pub delay_added: u32,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub run_state: RunState,
    /// Index of the stop the train is departing from
    pub segment_index: usize,
    /// Fraction of the current segment traversed, in [0, 1]
    pub progress: f64,
    pub accumulated_delay_minutes: u32,
    /// Simulated minutes still to be waited out before progress resumes
    pub hold_minutes: f64,
    pub last_tick: NaiveDateTime,
    pub current_station: String,
    pub next_station: Option<String>,
    pub last_arrival: Option<ArrivalRecord>,
    pub last_delay_cause: Option<String>,
    /// Completed passes over a looping route
    pub laps: u32,
    /// Set once a degenerate segment has been reported, cleared on arrival
    pub(crate) stall_reported: bool,
}

impl SimulationState {
    /// State of a train sitting at the start of `segment_index`
    #[must_use]
    pub fn at_segment(train: &TrainDefinition, segment_index: usize, run_state: RunState, now: NaiveDateTime) -> Self {
        let mut state = Self {
            run_state,
            segment_index,
            progress: 0.0,
            accumulated_delay_minutes: 0,
            hold_minutes: 0.0,
            last_tick: now,
            current_station: String::new(),
            next_station: None,
            last_arrival: None,
            last_delay_cause: None,
            laps: 0,
            stall_reported: false,
        };
        state.sync_stations(train);
        state
    }

    /// Refresh the denormalized station codes from `segment_index`
    pub fn sync_stations(&mut self, train: &TrainDefinition) {
        let route = &train.route;
        self.current_station = route
            .stop(self.segment_index)
            .map(|s| s.station_code.clone())
            .unwrap_or_default();
        self.next_station = if self.run_state == RunState::Completed {
            None
        } else {
            route.stop(self.segment_index + 1).map(|s| s.station_code.clone())
        };
    }

    /// Add delay minutes to both the running total and the hold budget
    pub fn add_delay(&mut self, minutes: u32) {
        self.accumulated_delay_minutes = self.accumulated_delay_minutes.saturating_add(minutes);
        self.hold_minutes += f64::from(minutes);
    }
}

/// A roster train together with its live state
#[derive(Debug, Clone)]
pub struct TrackedTrain {
    pub definition: Arc<TrainDefinition>,
    pub speed_kmh: f64,
    pub loops: bool,
    /// Data-quality problem that keeps this train out of positions and conflicts
    pub route_error: Option<RouteError>,
    pub state: SimulationState,
}

impl TrackedTrain {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.definition.train_id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.route_error.is_none() && self.state.run_state != RunState::Completed
    }
}
