/// Minutes in one day, used to wrap simulated time-of-day
pub const MINUTES_PER_DAY: f64 = 1440.0;

/// Default wall-clock tick cadence (5 seconds)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 5_000;

/// Default time acceleration: 1 real second == 1 simulated minute
pub const DEFAULT_TIME_ACCELERATION: f64 = 1.0;

/// Speed used when a train category has no better default (km/h)
pub const FALLBACK_SPEED_KMH: f64 = 60.0;

// Random on-arrival delay policy
pub const DEFAULT_DELAY_PROBABILITY: f64 = 0.1;
pub const DEFAULT_DELAY_MIN_MINUTES: u32 = 2;
pub const DEFAULT_DELAY_MAX_MINUTES: u32 = 10;

// Conflict detection windows
pub const DEFAULT_OCCUPANCY_WINDOW_MINUTES: f64 = 5.0;
pub const DEFAULT_PLATFORM_WINDOW_MINUTES: f64 = 10.0;
pub const DEFAULT_PROXIMITY_THRESHOLD_KM: f64 = 20.0;

/// Conflict records older than this are pruned by housekeeping
pub const DEFAULT_CONFLICT_RETENTION_MINUTES: i64 = 5;

/// Housekeeping (pruning) cadence, independent of the tick cadence
pub const DEFAULT_HOUSEKEEPING_INTERVAL_MS: u64 = 60_000;

/// A train is reported as delayed once its accumulated delay exceeds this
pub const DEFAULT_DELAYED_THRESHOLD_MINUTES: u32 = 5;

/// Bounded per-subscriber queue length; the oldest event is dropped on overflow
pub const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 32;

