use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{
    DEFAULT_CONFLICT_RETENTION_MINUTES, DEFAULT_DELAYED_THRESHOLD_MINUTES, DEFAULT_DELAY_MAX_MINUTES,
    DEFAULT_DELAY_MIN_MINUTES, DEFAULT_DELAY_PROBABILITY, DEFAULT_HOUSEKEEPING_INTERVAL_MS,
    DEFAULT_OCCUPANCY_WINDOW_MINUTES, DEFAULT_PLATFORM_WINDOW_MINUTES, DEFAULT_PROXIMITY_THRESHOLD_KM,
    DEFAULT_SUBSCRIBER_QUEUE_CAPACITY, DEFAULT_TICK_INTERVAL_MS, DEFAULT_TIME_ACCELERATION,
};
use crate::error::LoadError;
use crate::models::TrainCategory;

/// Where each train is placed when the simulator initializes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPlacement {
    /// Uniformly random segment per train
    #[default]
    Randomized,
    /// Segment 0, pending until the first scheduled departure
    Origin,
}

/// Random on-arrival delay roll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayPolicyConfig {
    pub probability: f64,
    pub min_minutes: u32,
    pub max_minutes: u32,
}

impl Default for DelayPolicyConfig {
    fn default() -> Self {
        Self {
            probability: DEFAULT_DELAY_PROBABILITY,
            min_minutes: DEFAULT_DELAY_MIN_MINUTES,
            max_minutes: DEFAULT_DELAY_MAX_MINUTES,
        }
    }
}

/// Thresholds for the conflict rules and retention of detected records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictSettings {
    pub occupancy_window_minutes: f64,
    pub platform_window_minutes: f64,
    pub proximity_threshold_km: f64,
    pub retention_minutes: i64,
    pub housekeeping_interval_ms: u64,
}

impl Default for ConflictSettings {
    fn default() -> Self {
        Self {
            occupancy_window_minutes: DEFAULT_OCCUPANCY_WINDOW_MINUTES,
            platform_window_minutes: DEFAULT_PLATFORM_WINDOW_MINUTES,
            proximity_threshold_km: DEFAULT_PROXIMITY_THRESHOLD_KM,
            retention_minutes: DEFAULT_CONFLICT_RETENTION_MINUTES,
            housekeeping_interval_ms: DEFAULT_HOUSEKEEPING_INTERVAL_MS,
        }
    }
}

/// Simulator configuration, loadable from a JSON file where every field is optional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub tick_interval_ms: u64,
    /// Simulated minutes per real second
    pub time_acceleration: f64,
    pub delay_policy: DelayPolicyConfig,
    /// Seed for the delay roll and randomized placement; entropy when absent
    pub seed: Option<u64>,
    pub start_placement: StartPlacement,
    /// Categories whose routes wrap to the first stop instead of completing
    pub looping_categories: Vec<TrainCategory>,
    pub conflict: ConflictSettings,
    pub delayed_threshold_minutes: u32,
    pub subscriber_queue_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            time_acceleration: DEFAULT_TIME_ACCELERATION,
            delay_policy: DelayPolicyConfig::default(),
            seed: None,
            start_placement: StartPlacement::default(),
            looping_categories: Vec::new(),
            conflict: ConflictSettings::default(),
            delayed_threshold_minutes: DEFAULT_DELAYED_THRESHOLD_MINUTES,
            subscriber_queue_capacity: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
        }
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether trains of `category` wrap around at the end of their route
    #[must_use]
    pub fn loops(&self, category: TrainCategory) -> bool {
        self.looping_categories.contains(&category)
    }

    /// Parse and validate a JSON configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|source| LoadError::Json { what: "simulation config", source })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let json = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Reject values the engine cannot run with
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidConfig` naming the offending field
    pub fn validate(&self) -> Result<(), LoadError> {
        let invalid = |msg: &str| -> Result<(), LoadError> { Err(LoadError::InvalidConfig(msg.to_string())) };

        if self.tick_interval_ms == 0 {
            return invalid("tick_interval_ms must be positive");
        }
        if !self.time_acceleration.is_finite() || self.time_acceleration < 0.0 {
            return invalid("time_acceleration must be a non-negative number");
        }
        if !(0.0..=1.0).contains(&self.delay_policy.probability) {
            return invalid("delay_policy.probability must be within [0, 1]");
        }
        if self.delay_policy.min_minutes > self.delay_policy.max_minutes {
            return invalid("delay_policy.min_minutes must not exceed max_minutes");
        }
        if self.conflict.retention_minutes < 0 {
            return invalid("conflict.retention_minutes must be non-negative");
        }
        if self.conflict.housekeeping_interval_ms == 0 {
            return invalid("conflict.housekeeping_interval_ms must be positive");
        }
        if self.subscriber_queue_capacity == 0 {
            return invalid("subscriber_queue_capacity must be positive");
        }
        Ok(())
    }
}
