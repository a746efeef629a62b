//! The simulation service: one clock, one engine, one conflict set.
//!
//! A [`Simulator`] is an ordinary value. Construct as many as needed; each
//! owns its trains, its conflict store and its subscribers. The tick loop
//! runs on the ambient tokio runtime between [`Simulator::start`] and
//! [`Simulator::stop`].

use ::log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::broadcast::{Broadcaster, SimulationEvent, Subscription};
use crate::clock::{ClockSource, SystemClock};
use crate::config::SimulationConfig;
use crate::conflict::{ActiveConflicts, ConflictDetector, ConflictStatistics, ConflictStore, ConflictThresholds};
use crate::engine::{
    ArrivalEvent, DelayPolicy, PositionEngine, RandomDelayPolicy, SchedulePosition, TrainPosition,
    TrainStatusReport,
};
use crate::error::LoadError;
use crate::models::{Roster, StationDirectory, TrainDefinition};
use crate::route_index::RouteIndex;

/// Outcome of one completed tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    pub arrivals: Vec<ArrivalEvent>,
    pub positions: usize,
    pub conflicts: usize,
    pub subscribers: usize,
}

struct Shared {
    config: SimulationConfig,
    clock: Arc<dyn ClockSource>,
    engine: Mutex<PositionEngine>,
    conflicts: Mutex<ConflictStore>,
    detector: ConflictDetector,
    broadcaster: Broadcaster,
    tick_in_progress: AtomicBool,
}

/// Clears the in-progress flag when a tick ends, including by panic
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Shared {
    fn engine(&self) -> MutexGuard<'_, PositionEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn conflicts(&self) -> MutexGuard<'_, ConflictStore> {
        self.conflicts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self) -> Option<TickSummary> {
        if self
            .tick_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous tick still in progress, skipping this one");
            return None;
        }
        let _guard = TickGuard(&self.tick_in_progress);
        let now = self.clock.now();

        // Advance and snapshot under one lock so detection sees a consistent state
        let (arrivals, positions, snapshot) = {
            let mut engine = self.engine();
            let arrivals = engine.tick(now);
            (arrivals, engine.positions(), engine.conflict_snapshot())
        };

        let records = self.detector.detect(&snapshot, now);
        for record in &records {
            debug!("Conflict: {}", record.format_message());
        }
        let active = {
            let mut store = self.conflicts();
            store.replace(records, now);
            store.active(now)
        };

        let position_count = positions.len();
        let conflict_count = active.total_conflicts;
        let subscribers = self.broadcaster.publish(vec![
            SimulationEvent::PositionUpdate(positions),
            SimulationEvent::ConflictUpdate(active),
        ]);

        Some(TickSummary {
            arrivals,
            positions: position_count,
            conflicts: conflict_count,
            subscribers,
        })
    }

    fn housekeeping(&self) -> usize {
        let now = self.clock.now();
        let pruned = self.conflicts().prune(now, self.config.conflict.retention_minutes);
        debug!("Housekeeping pruned {pruned} conflict record(s)");
        pruned
    }

    fn snapshot_events(&self) -> Vec<SimulationEvent> {
        let positions = self.engine().positions();
        let active = self.conflicts().active(self.clock.now());
        vec![
            SimulationEvent::PositionUpdate(positions),
            SimulationEvent::ConflictUpdate(active),
        ]
    }
}

/// Whole ticks missed when a tick fires `late` after its scheduled instant
fn missed_ticks(late: Duration, period: Duration) -> u128 {
    late.as_millis() / period.as_millis().max(1)
}

async fn run(shared: Arc<Shared>, mut shutdown: oneshot::Receiver<()>) {
    let period = Duration::from_millis(shared.config.tick_interval_ms);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut housekeeping = interval(Duration::from_millis(shared.config.conflict.housekeeping_interval_ms));
    housekeeping.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Nothing to prune yet: consume the immediate first tick
    housekeeping.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            scheduled = ticker.tick() => {
                let missed = missed_ticks(scheduled.elapsed(), period);
                if missed > 0 {
                    warn!("Tick loop fell behind, skipped {missed} tick(s)");
                }
                shared.tick();
            }
            _ = housekeeping.tick() => {
                shared.housekeeping();
            }
        }
    }
}

struct Runner {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Injectable simulation service with an explicit `start`/`stop`/`reset` lifecycle
pub struct Simulator {
    shared: Arc<Shared>,
    runner: Mutex<Option<Runner>>,
}

impl Simulator {
    /// Build a simulator on the system clock with the configured random delay policy
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the roster is empty
    pub fn new(config: SimulationConfig, roster: &Roster, stations: StationDirectory) -> Result<Self, LoadError> {
        let delay_policy: Box<dyn DelayPolicy> = match config.seed {
            Some(seed) => Box::new(RandomDelayPolicy::seeded(&config.delay_policy, seed)),
            None => Box::new(RandomDelayPolicy::from_entropy(&config.delay_policy)),
        };
        Self::with_parts(config, roster, stations, Arc::new(SystemClock), delay_policy)
    }

    /// Build a simulator with an explicit clock and delay policy
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the roster is empty
    pub fn with_parts(
        config: SimulationConfig,
        roster: &Roster,
        stations: StationDirectory,
        clock: Arc<dyn ClockSource>,
        delay_policy: Box<dyn DelayPolicy>,
    ) -> Result<Self, LoadError> {
        config.validate()?;
        if roster.is_empty() {
            return Err(LoadError::EmptyRoster);
        }

        let station_count = stations.len();
        let engine = PositionEngine::new(roster, RouteIndex::new(stations), &config, delay_policy, clock.now());
        info!(
            "Simulator initialised with {} trains and {station_count} stations",
            engine.len()
        );

        let shared = Shared {
            detector: ConflictDetector::new(ConflictThresholds::from(&config.conflict)),
            broadcaster: Broadcaster::new(config.subscriber_queue_capacity),
            engine: Mutex::new(engine),
            conflicts: Mutex::new(ConflictStore::new()),
            tick_in_progress: AtomicBool::new(false),
            clock,
            config,
        };
        Ok(Self {
            shared: Arc::new(shared),
            runner: Mutex::new(None),
        })
    }

    fn runner(&self) -> MutexGuard<'_, Option<Runner>> {
        self.runner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the tick loop on the current tokio runtime
    ///
    /// Returns `false` if the loop is already running.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&self) -> bool {
        let mut runner = self.runner();
        if runner.is_some() {
            warn!("Simulator already running");
            return false;
        }
        let (shutdown, receiver) = oneshot::channel();
        let handle = tokio::spawn(run(Arc::clone(&self.shared), receiver));
        *runner = Some(Runner { shutdown, handle });
        info!(
            "Simulator started: tick every {} ms, acceleration x{}",
            self.shared.config.tick_interval_ms, self.shared.config.time_acceleration
        );
        true
    }

    /// Stop the tick loop and close every subscriber channel
    ///
    /// Returns whether the loop was running.
    pub async fn stop(&self) -> bool {
        let runner = self.runner().take();
        let was_running = runner.is_some();
        if let Some(Runner { shutdown, handle }) = runner {
            // The loop may already have ended; either way it is done after the join
            let _ = shutdown.send(());
            if let Err(err) = handle.await {
                warn!("Tick loop ended abnormally: {err}");
            }
        }
        let closed = self.shared.broadcaster.close_all();
        info!("Simulator stopped, {closed} subscriber(s) closed");
        was_running
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.runner().is_some()
    }

    /// Re-place every train and clear all delays and conflicts
    pub fn reset(&self) {
        let now = self.shared.clock.now();
        self.shared.engine().reset(now);
        self.shared.conflicts().clear();
        info!("Simulator reset");
    }

    /// Replace the roster and station dictionary, then re-initialise
    ///
    /// # Errors
    ///
    /// Returns `LoadError::EmptyRoster` without changing anything if `roster` is empty
    pub fn reload(&self, roster: &Roster, stations: StationDirectory) -> Result<(), LoadError> {
        if roster.is_empty() {
            return Err(LoadError::EmptyRoster);
        }
        let now = self.shared.clock.now();
        self.shared.engine().reload(roster, RouteIndex::new(stations), now);
        self.shared.conflicts().clear();
        info!("Simulator reloaded with {} trains", roster.len());
        Ok(())
    }

    /// Run one tick immediately; `None` if another tick is in progress
    pub fn tick_now(&self) -> Option<TickSummary> {
        self.shared.tick()
    }

    /// Prune conflict records past retention; returns how many were removed
    pub fn prune_conflicts(&self) -> usize {
        self.shared.housekeeping()
    }

    #[must_use]
    pub fn get_positions(&self) -> Vec<TrainPosition> {
        self.shared.engine().positions()
    }

    #[must_use]
    pub fn get_active_conflicts(&self) -> ActiveConflicts {
        self.shared.conflicts().active(self.shared.clock.now())
    }

    #[must_use]
    pub fn conflict_statistics(&self) -> ConflictStatistics {
        self.shared.conflicts().statistics()
    }

    /// Add delay to a train; `false` for unknown trains and negative minutes
    ///
    /// Subscribers receive a position update straight away.
    pub fn inject_delay(&self, train_id: &str, minutes: i64, cause: &str) -> bool {
        let result = self.shared.engine().inject_delay(train_id, minutes, cause);
        match result {
            Ok(_) => {
                let positions = self.get_positions();
                self.shared
                    .broadcaster
                    .publish(vec![SimulationEvent::PositionUpdate(positions)]);
                true
            }
            Err(err) => {
                warn!("Delay for train {train_id} rejected: {err}");
                false
            }
        }
    }

    /// Timetable-driven position of a roster train at `minutes` past midnight
    #[must_use]
    pub fn position_at_time(&self, train_id: &str, minutes: f64) -> Option<SchedulePosition> {
        self.shared.engine().position_at_time(train_id, minutes)
    }

    /// Timetable-driven position of any train, on the roster or not, placed
    /// against the loaded station dictionary
    #[must_use]
    pub fn position_of_definition(&self, train: &TrainDefinition, minutes: f64) -> Option<SchedulePosition> {
        self.shared.engine().schedule_position(train, minutes)
    }

    #[must_use]
    pub fn train_status(&self, train_id: &str) -> Option<TrainStatusReport> {
        self.shared.engine().train_status(train_id)
    }

    /// Open a subscriber channel, primed with the current snapshot
    pub fn subscribe(&self) -> Subscription {
        let initial = self.shared.snapshot_events();
        self.shared.broadcaster.subscribe(initial)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.broadcaster.subscriber_count()
    }

    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.shared.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::StartPlacement;
    use crate::conflict::ConflictKind;
    use crate::engine::{RunState, ScheduleStatus};
    use crate::models::{Route, RouteStop, Station, TrainCategory};
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    fn t(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    fn start_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 10)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .expect("valid time")
    }

    fn stations() -> StationDirectory {
        [
            Station::new("A", "Alpha", 19.0, 72.8),
            Station::new("B", "Bravo", 19.1, 72.9),
            Station::new("C", "Charlie", 19.3, 73.1),
        ]
        .into_iter()
        .collect()
    }

    /// Two trains on A-B-C, both reaching B on the first 10-minute tick
    fn roster() -> Roster {
        let express = TrainDefinition::new(
            "T1",
            "Morning Express",
            TrainCategory::Express,
            Route::new(vec![
                RouteStop::new(1, "A", None, t(8, 0), 0.0),
                RouteStop::new(2, "B", t(8, 10), t(8, 11), 10.0),
                RouteStop::new(3, "C", t(8, 30), None, 30.0),
            ]),
        );
        let superfast = TrainDefinition::new(
            "T2",
            "Coastal Superfast",
            TrainCategory::Superfast,
            Route::new(vec![
                RouteStop::new(1, "A", None, t(8, 0), 0.0),
                RouteStop::new(2, "B", t(8, 40), t(8, 41), 10.0),
                RouteStop::new(3, "C", t(9, 0), None, 30.0),
            ]),
        );
        [express, superfast].into_iter().collect()
    }

    fn simulator(clock: &ManualClock) -> Simulator {
        let config = SimulationConfig {
            start_placement: StartPlacement::Origin,
            seed: Some(5),
            ..SimulationConfig::default()
        };
        Simulator::with_parts(
            config,
            &roster(),
            stations(),
            Arc::new(clock.clone()),
            Box::new(|_: &str| 0u32),
        )
        .expect("valid simulator")
    }

    #[test]
    fn test_empty_roster_rejected() {
        let result = Simulator::new(SimulationConfig::default(), &Roster::new(), stations());
        assert!(matches!(result, Err(LoadError::EmptyRoster)));
    }

    #[test]
    fn test_tick_detects_occupancy() {
        let clock = ManualClock::new(start_time());
        let sim = simulator(&clock);

        clock.advance(chrono::Duration::seconds(10));
        let summary = sim.tick_now().expect("no overlapping tick");

        assert_eq!(summary.arrivals.len(), 2);
        assert_eq!(summary.positions, 2);
        let active = sim.get_active_conflicts();
        assert_eq!(active.total_conflicts, 1);
        assert_eq!(active.conflicts[0].kind, ConflictKind::Occupancy);
        assert_eq!(active.conflicts[0].location, "B");
        assert_eq!(sim.conflict_statistics().high, 1);
    }

    #[test]
    fn test_housekeeping_prunes_after_retention() {
        let clock = ManualClock::new(start_time());
        let sim = simulator(&clock);
        clock.advance(chrono::Duration::seconds(10));
        sim.tick_now();

        clock.advance(chrono::Duration::minutes(2));
        assert_eq!(sim.prune_conflicts(), 0);
        clock.advance(chrono::Duration::minutes(4));
        assert_eq!(sim.prune_conflicts(), 1);
        assert_eq!(sim.get_active_conflicts().total_conflicts, 0);
    }

    #[test]
    fn test_overlapping_tick_skipped() {
        let clock = ManualClock::new(start_time());
        let sim = simulator(&clock);
        sim.shared.tick_in_progress.store(true, Ordering::Release);
        assert!(sim.tick_now().is_none());

        sim.shared.tick_in_progress.store(false, Ordering::Release);
        assert!(sim.tick_now().is_some());
    }

    #[test]
    fn test_inject_delay_surface() {
        let clock = ManualClock::new(start_time());
        let sim = simulator(&clock);

        assert!(!sim.inject_delay("T1", -1, "bad input"));
        assert!(!sim.inject_delay("NOPE", 5, "unknown"));
        assert!(sim.inject_delay("T1", 6, "signal failure"));
        assert!(sim.inject_delay("T1", 2, "crew"));

        let status = sim.train_status("T1").expect("status available");
        assert_eq!(status.delay_min, 8);
        let positions = sim.get_positions();
        let t1 = positions.iter().find(|p| p.train_id == "T1").expect("T1 positioned");
        assert_eq!(t1.delay_min, 8);
        assert_eq!(t1.status, crate::engine::Adherence::Delayed);
    }

    #[tokio::test]
    async fn test_subscriber_receives_snapshot_and_updates() {
        let clock = ManualClock::new(start_time());
        let sim = simulator(&clock);
        let mut sub = sim.subscribe();

        assert_eq!(sub.recv().await.map(|e| e.name()), Some("position-update"));
        assert_eq!(sub.recv().await.map(|e| e.name()), Some("conflict-update"));

        assert!(sim.inject_delay("T2", 3, "platform change"));
        assert_eq!(sub.recv().await.map(|e| e.name()), Some("position-update"));

        clock.advance(chrono::Duration::seconds(10));
        sim.tick_now();
        assert_eq!(sub.recv().await.map(|e| e.name()), Some("position-update"));
        let conflicts = sub.recv().await.expect("conflict update");
        match conflicts.as_ref() {
            SimulationEvent::ConflictUpdate(active) => assert_eq!(active.total_conflicts, 1),
            SimulationEvent::PositionUpdate(_) => panic!("expected conflict update"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_closes_subscribers() {
        let clock = ManualClock::new(start_time());
        let sim = simulator(&clock);
        let mut sub = sim.subscribe();

        assert!(sim.start());
        assert!(!sim.start());
        assert!(sim.is_running());
        tokio::time::sleep(Duration::from_millis(12_000)).await;

        assert!(sim.stop().await);
        assert!(!sim.is_running());
        assert_eq!(sim.subscriber_count(), 0);

        // Initial snapshot plus at least the immediate tick, then closed
        let mut received = 0;
        while sub.recv().await.is_some() {
            received += 1;
        }
        assert!(received >= 4);
        assert!(sub.is_closed());
    }

    #[test]
    fn test_reset_clears_conflicts_and_delay() {
        let clock = ManualClock::new(start_time());
        let sim = simulator(&clock);
        clock.advance(chrono::Duration::seconds(10));
        sim.tick_now();
        assert!(sim.inject_delay("T1", 4, "test"));

        sim.reset();
        assert_eq!(sim.get_active_conflicts().total_conflicts, 0);
        assert_eq!(sim.train_status("T1").map(|s| s.delay_min), Some(0));
    }

    #[test]
    fn test_reload_replaces_roster() {
        let clock = ManualClock::new(start_time());
        let sim = simulator(&clock);

        assert!(matches!(sim.reload(&Roster::new(), stations()), Err(LoadError::EmptyRoster)));
        assert!(sim.train_status("T2").is_some());

        let only_t1: Roster = roster().iter().filter(|t| t.train_id == "T1").cloned().collect();
        sim.reload(&only_t1, stations()).expect("non-empty roster");
        assert!(sim.train_status("T2").is_none());
        assert_eq!(sim.get_positions().len(), 1);
    }

    #[test]
    fn test_position_at_time_query() {
        let clock = ManualClock::new(start_time());
        let sim = simulator(&clock);
        let position = sim.position_at_time("T1", 8.0 * 60.0 + 5.0).expect("en route at 08:05");
        assert_eq!(position.current_station, "A");
        assert!(sim.position_at_time("MISSING", 500.0).is_none());
    }

    #[test]
    fn test_position_of_off_roster_train() {
        let clock = ManualClock::new(start_time());
        let sim = simulator(&clock);
        let freight = TrainDefinition::new(
            "F9",
            "Container Freight",
            TrainCategory::Freight,
            Route::new(vec![
                RouteStop::new(1, "B", None, t(10, 0), 0.0),
                RouteStop::new(2, "C", t(10, 30), None, 20.0),
            ]),
        );
        assert!(sim.train_status("F9").is_none());

        let position = sim.position_of_definition(&freight, 10.0 * 60.0 + 10.0).expect("en route at 10:10");
        assert_eq!(position.status, ScheduleStatus::EnRoute);
        assert_eq!(position.current_station, "B");
        assert_eq!(position.next_station.as_deref(), Some("C"));
        // 60 km/h for 10 minutes over 20 km
        assert_eq!(position.progress_pct, 50.0);

        let waiting = sim.position_of_definition(&freight, 9.0 * 60.0).expect("waiting at origin");
        assert_eq!(waiting.status, ScheduleStatus::Waiting);
    }

    #[test]
    fn test_pending_follows_clock_time_of_day() {
        let early = NaiveDate::from_ymd_opt(2024, 5, 10)
            .and_then(|d| d.and_hms_opt(7, 50, 0))
            .expect("valid time");
        let clock = ManualClock::new(early);
        let sim = simulator(&clock);
        assert_eq!(sim.train_status("T1").map(|s| s.state), Some(RunState::Pending));

        // 15 s at the default acceleration is 15 simulated minutes: 08:05
        clock.advance(chrono::Duration::seconds(15));
        sim.tick_now();
        let status = sim.train_status("T1").expect("status available");
        assert_eq!(status.state, RunState::EnRoute);
        // Only the 5 minutes since the 08:00 departure count: 80 km/h over 10 km
        assert_eq!(status.progress_pct, 66.7);
    }

    #[test]
    fn test_missed_ticks() {
        let period = Duration::from_millis(5_000);
        assert_eq!(missed_ticks(Duration::from_millis(20), period), 0);
        assert_eq!(missed_ticks(Duration::from_millis(5_000), period), 1);
        assert_eq!(missed_ticks(Duration::from_millis(12_400), period), 2);
    }
}
