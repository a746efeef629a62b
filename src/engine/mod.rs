//! Free-running position engine.
//!
//! Every tracked train advances along its route each tick according to its
//! speed and the simulated time elapsed since its last update. Arrivals at a
//! stop are reported back to the caller and are the only moments a train's
//! station/timestamp snapshot for conflict detection changes.

mod delay;
mod schedule;
mod state;

pub use delay::{DelayPolicy, RandomDelayPolicy};
pub use schedule::{position_at_time, SchedulePosition, ScheduleStatus};
pub use state::{Adherence, ArrivalEvent, ArrivalRecord, RunState, SimulationState, TrackedTrain};

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use ::log::{info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{SimulationConfig, StartPlacement};
use crate::conflict::TrainSnapshot;
use crate::error::DelayError;
#[allow(unused_imports)]
use crate::logging::log;
use crate::models::{Roster, Route, TrainCategory, TrainDefinition};
use crate::route_index::RouteIndex;
use crate::time::{elapsed_sim_minutes, minutes_of_day, wrap_minutes};
use schedule::round_pct;

/// One entry of a `position-update` push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainPosition {
    pub train_id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub current_station: String,
    pub next_station: Option<String>,
    pub progress_pct: f64,
    pub speed: f64,
    pub delay_min: u32,
    pub status: Adherence,
    pub state: RunState,
}

/// Full status of one train, including completed and excluded trains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainStatusReport {
    pub train_id: String,
    pub name: String,
    pub category: TrainCategory,
    pub state: RunState,
    pub segment_index: usize,
    pub current_station: String,
    pub next_station: Option<String>,
    pub progress_pct: f64,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub speed: f64,
    pub delay_min: u32,
    pub status: Adherence,
    pub laps: u32,
    pub last_arrival: Option<ArrivalRecord>,
    pub last_delay_cause: Option<String>,
    /// Data-quality problem excluding the train from the simulation
    pub route_error: Option<String>,
}

pub struct PositionEngine {
    trains: IndexMap<String, TrackedTrain>,
    index: RouteIndex,
    delay_policy: Box<dyn DelayPolicy>,
    placement_rng: ChaCha8Rng,
    config: SimulationConfig,
    /// Simulated minutes since midnight
    sim_minutes: f64,
    last_advance: NaiveDateTime,
}

impl std::fmt::Debug for PositionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionEngine")
            .field("trains", &self.trains.len())
            .field("sim_minutes", &self.sim_minutes)
            .field("last_advance", &self.last_advance)
            .finish_non_exhaustive()
    }
}

impl PositionEngine {
    /// Place every roster train at its starting segment
    ///
    /// Trains whose route fails validation against `index` are kept for status
    /// queries but never advanced, positioned or checked for conflicts.
    #[must_use]
    pub fn new(
        roster: &Roster,
        index: RouteIndex,
        config: &SimulationConfig,
        delay_policy: Box<dyn DelayPolicy>,
        now: NaiveDateTime,
    ) -> Self {
        let placement_rng = match config.seed {
            Some(seed) => {
                // Separate stream from the delay roll so both stay reproducible
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                rng.set_stream(1);
                rng
            }
            None => ChaCha8Rng::from_entropy(),
        };

        let mut engine = Self {
            trains: IndexMap::new(),
            index,
            delay_policy,
            placement_rng,
            config: config.clone(),
            sim_minutes: minutes_of_day(now),
            last_advance: now,
        };
        engine.load(roster.iter().cloned().map(Arc::new).collect(), now);
        engine
    }

    fn load(&mut self, definitions: Vec<Arc<TrainDefinition>>, now: NaiveDateTime) {
        self.trains.clear();
        let mut excluded = 0usize;

        for definition in definitions {
            let route_error = self.index.validate_route(&definition.route).err();
            if let Some(err) = &route_error {
                warn!("Train {} excluded from simulation: {err}", definition.train_id);
                excluded += 1;
            }
            let state = self.initial_state(&definition, now);
            let tracked = TrackedTrain {
                speed_kmh: definition.effective_speed(),
                loops: self.config.loops(definition.category),
                route_error,
                state,
                definition,
            };
            self.trains.insert(tracked.definition.train_id.clone(), tracked);
        }

        info!(
            "Position engine initialised: {} trains, {} excluded",
            self.trains.len(),
            excluded
        );
    }

    fn initial_state(&mut self, train: &TrainDefinition, now: NaiveDateTime) -> SimulationState {
        let segments = train.route.segment_count();
        match self.config.start_placement {
            StartPlacement::Randomized if segments > 0 => {
                let segment = self.placement_rng.gen_range(0..segments);
                SimulationState::at_segment(train, segment, RunState::EnRoute, now)
            }
            _ => {
                let pending = train
                    .route
                    .first_departure_minutes()
                    .is_some_and(|departure| self.sim_minutes < departure);
                let run_state = if pending { RunState::Pending } else { RunState::EnRoute };
                SimulationState::at_segment(train, 0, run_state, now)
            }
        }
    }

    /// Re-place every train from its definition, clearing all delays
    pub fn reset(&mut self, now: NaiveDateTime) {
        let definitions = self.trains.values().map(|t| Arc::clone(&t.definition)).collect();
        self.sim_minutes = minutes_of_day(now);
        self.last_advance = now;
        self.load(definitions, now);
    }

    /// Swap in a new roster and station dictionary, keeping the delay policy
    pub fn reload(&mut self, roster: &Roster, index: RouteIndex, now: NaiveDateTime) {
        self.index = index;
        self.sim_minutes = minutes_of_day(now);
        self.last_advance = now;
        self.load(roster.iter().cloned().map(Arc::new).collect(), now);
    }

    /// Advance every train to `now`, returning the arrivals that happened
    pub fn tick(&mut self, now: NaiveDateTime) -> Vec<ArrivalEvent> {
        let elapsed = elapsed_sim_minutes(self.last_advance, now, self.config.time_acceleration);
        self.sim_minutes = wrap_minutes(self.sim_minutes + elapsed);
        self.last_advance = now;

        let mut arrivals = Vec::new();
        for train in self.trains.values_mut() {
            let elapsed = elapsed_sim_minutes(train.state.last_tick, now, self.config.time_acceleration);
            train.state.last_tick = now;
            if let Some(event) = advance_train(train, elapsed, self.sim_minutes, now, self.delay_policy.as_mut()) {
                arrivals.push(event);
            }
        }
        arrivals
    }

    /// Add `minutes` of delay to a train
    ///
    /// The delay is held out of the next ticks' elapsed time before the train
    /// moves again. Returns the train's new accumulated delay.
    ///
    /// # Errors
    ///
    /// Rejects negative minutes and unknown train ids without changing state
    pub fn inject_delay(&mut self, train_id: &str, minutes: i64, cause: &str) -> Result<u32, DelayError> {
        if minutes < 0 {
            return Err(DelayError::Negative(minutes));
        }
        let train = self
            .trains
            .get_mut(train_id)
            .ok_or_else(|| DelayError::UnknownTrain(train_id.to_string()))?;

        let minutes = u32::try_from(minutes).unwrap_or(u32::MAX);
        train.state.add_delay(minutes);
        let cause = cause.trim();
        if !cause.is_empty() {
            train.state.last_delay_cause = Some(cause.to_string());
        }
        info!(
            "Delay of {minutes} min injected into train {train_id} ({}), total {} min",
            if cause.is_empty() { "no cause given" } else { cause },
            train.state.accumulated_delay_minutes
        );
        Ok(train.state.accumulated_delay_minutes)
    }

    /// Positions of every active train with known coordinates
    #[must_use]
    pub fn positions(&self) -> Vec<TrainPosition> {
        self.trains
            .values()
            .filter(|t| t.is_active())
            .filter_map(|t| self.position_of(t))
            .collect()
    }

    fn position_of(&self, train: &TrackedTrain) -> Option<TrainPosition> {
        let state = &train.state;
        let point = match &state.next_station {
            Some(next) => self.index.position_at(&state.current_station, next, state.progress)?,
            None => self.index.coordinates(&state.current_station)?,
        };
        Some(TrainPosition {
            train_id: train.definition.train_id.clone(),
            name: train.definition.train_name.clone(),
            lat: point.lat,
            lng: point.lng,
            current_station: state.current_station.clone(),
            next_station: state.next_station.clone(),
            progress_pct: round_pct(state.progress),
            speed: self.running_speed(train),
            delay_min: state.accumulated_delay_minutes,
            status: Adherence::from_delay(state.accumulated_delay_minutes, self.config.delayed_threshold_minutes),
            state: state.run_state,
        })
    }

    fn running_speed(&self, train: &TrackedTrain) -> f64 {
        match train.state.run_state {
            RunState::EnRoute if train.route_error.is_none() => train.speed_kmh,
            _ => 0.0,
        }
    }

    /// Status of any roster train, whether active, completed or excluded
    #[must_use]
    pub fn train_status(&self, train_id: &str) -> Option<TrainStatusReport> {
        let train = self.trains.get(train_id)?;
        let state = &train.state;
        let point = match &state.next_station {
            Some(next) => self.index.position_at(&state.current_station, next, state.progress),
            None => self.index.coordinates(&state.current_station),
        };
        Some(TrainStatusReport {
            train_id: train.definition.train_id.clone(),
            name: train.definition.train_name.clone(),
            category: train.definition.category,
            state: state.run_state,
            segment_index: state.segment_index,
            current_station: state.current_station.clone(),
            next_station: state.next_station.clone(),
            progress_pct: round_pct(state.progress),
            lat: point.map(|p| p.lat),
            lng: point.map(|p| p.lng),
            speed: self.running_speed(train),
            delay_min: state.accumulated_delay_minutes,
            status: Adherence::from_delay(state.accumulated_delay_minutes, self.config.delayed_threshold_minutes),
            laps: state.laps,
            last_arrival: state.last_arrival.clone(),
            last_delay_cause: state.last_delay_cause.clone(),
            route_error: train.route_error.as_ref().map(ToString::to_string),
        })
    }

    /// Station/timestamp snapshot of every active train that has reached a stop
    ///
    /// The station is the one the train last arrived at, which for a looping
    /// train just back at its terminus differs from its new current station.
    #[must_use]
    pub fn conflict_snapshot(&self) -> Vec<TrainSnapshot> {
        self.trains
            .values()
            .filter(|t| t.is_active())
            .filter_map(|t| {
                let arrival = t.state.last_arrival.as_ref()?;
                Some(TrainSnapshot {
                    train: Arc::clone(&t.definition),
                    station_code: arrival.station_code.clone(),
                    timestamp: arrival.arrived_at,
                    speed_kmh: arrival.speed_kmh,
                })
            })
            .collect()
    }

    /// Timetable-driven position of a roster train at `minutes` past midnight
    #[must_use]
    pub fn position_at_time(&self, train_id: &str, minutes: f64) -> Option<SchedulePosition> {
        let train = self.trains.get(train_id)?;
        position_at_time(&train.definition, &self.index, minutes)
    }

    /// Timetable-driven position of any train against this engine's stations
    #[must_use]
    pub fn schedule_position(&self, train: &TrainDefinition, minutes: f64) -> Option<SchedulePosition> {
        position_at_time(train, &self.index, minutes)
    }

    #[must_use]
    pub fn train(&self, train_id: &str) -> Option<&TrackedTrain> {
        self.trains.get(train_id)
    }

    pub fn trains(&self) -> impl Iterator<Item = &TrackedTrain> {
        self.trains.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trains.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trains.is_empty()
    }

    #[must_use]
    pub fn index(&self) -> &RouteIndex {
        &self.index
    }

    #[must_use]
    pub fn sim_minutes(&self) -> f64 {
        self.sim_minutes
    }
}

/// Scheduled-time progress through a segment, `None` when the segment has no
/// usable (positive) scheduled duration
fn time_ratio(route: &Route, segment: usize, now_minutes: f64) -> Option<f64> {
    let (departure, arrival) = route.segment_times(segment)?;
    let duration = arrival - departure;
    (duration > 0.0).then(|| ((now_minutes - departure) / duration).clamp(0.0, 1.0))
}

fn advance_train(
    train: &mut TrackedTrain,
    mut elapsed: f64,
    sim_minutes: f64,
    now: NaiveDateTime,
    policy: &mut dyn DelayPolicy,
) -> Option<ArrivalEvent> {
    if train.route_error.is_some() {
        return None;
    }
    let route = &train.definition.route;
    let state = &mut train.state;

    match state.run_state {
        RunState::Completed => return None,
        RunState::Pending => {
            let departure = route.first_departure_minutes();
            if departure.is_some_and(|d| sim_minutes < d) {
                return None;
            }
            // Time spent waiting for the departure does not move the train
            if let Some(departure) = departure {
                elapsed = elapsed.min(sim_minutes - departure);
            }
            state.run_state = RunState::EnRoute;
            log!("Train {} departed {}", train.definition.train_id, state.current_station);
        }
        RunState::EnRoute => {}
    }

    // Delay is served before the train moves again
    let usable = (elapsed - state.hold_minutes).max(0.0);
    state.hold_minutes = (state.hold_minutes - elapsed).max(0.0);
    if usable <= 0.0 {
        return None;
    }

    if let Some(distance) = route.segment_distance(state.segment_index) {
        state.progress += train.speed_kmh * usable / 60.0 / distance;
    } else if let Some(ratio) = time_ratio(route, state.segment_index, sim_minutes) {
        state.progress = state.progress.max(ratio);
    } else {
        if !state.stall_reported {
            warn!(
                "Train {} holding between {} and {}: segment has neither distance nor scheduled duration",
                train.definition.train_id,
                state.current_station,
                state.next_station.as_deref().unwrap_or("?")
            );
            state.stall_reported = true;
        }
        return None;
    }

    if state.progress < 1.0 {
        return None;
    }
    Some(arrive(train, now, policy))
}

fn arrive(train: &mut TrackedTrain, now: NaiveDateTime, policy: &mut dyn DelayPolicy) -> ArrivalEvent {
    let definition = Arc::clone(&train.definition);
    let route = &definition.route;
    let state = &mut train.state;

    state.progress = 0.0;
    state.segment_index += 1;
    state.stall_reported = false;
    let stop_index = state.segment_index;
    let station_code = route
        .stop(stop_index)
        .map(|s| s.station_code.clone())
        .unwrap_or_default();

    state.last_arrival = Some(ArrivalRecord {
        station_code: station_code.clone(),
        arrived_at: now,
        speed_kmh: train.speed_kmh,
    });

    let delay_added = policy.on_arrival(&definition.train_id);
    if delay_added > 0 {
        state.add_delay(delay_added);
    }

    let mut completed = false;
    if stop_index >= route.last_index() {
        if train.loops {
            state.segment_index = 0;
            state.laps += 1;
        } else {
            state.run_state = RunState::Completed;
            completed = true;
        }
    }
    state.sync_stations(&definition);

    log!(
        "Train {} arrived at {station_code} (+{delay_added} min, total {} min){}",
        definition.train_id,
        state.accumulated_delay_minutes,
        if completed { ", route completed" } else { "" }
    );

    ArrivalEvent {
        train_id: definition.train_id.clone(),
        station_code,
        arrived_at: now,
        stop_index,
        delay_added,
        completed,
    }
}
