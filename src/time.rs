use chrono::{NaiveDateTime, NaiveTime, Timelike};
use crate::constants::MINUTES_PER_DAY;

/// Convert a `NaiveTime` to fractional minutes since midnight
#[must_use]
pub fn time_to_minutes(time: NaiveTime) -> f64 {
    // Split into whole minutes and seconds to avoid accumulating rounding error
    let whole_minutes = f64::from(time.hour() * 60 + time.minute());
    let seconds = f64::from(time.second()) + f64::from(time.nanosecond()) / 1_000_000_000.0;
    whole_minutes + seconds / 60.0
}

/// Minutes since midnight of a wall-clock timestamp
#[must_use]
pub fn minutes_of_day(datetime: NaiveDateTime) -> f64 {
    time_to_minutes(datetime.time())
}

/// Wrap a minute count into `[0, 1440)`
#[must_use]
pub fn wrap_minutes(minutes: f64) -> f64 {
    minutes.rem_euclid(MINUTES_PER_DAY)
}

/// Parse a time string in HH:MM:SS format
///
/// # Errors
///
/// Returns an error if the string cannot be parsed as a valid time in HH:MM:SS format.
pub fn parse_time_hms(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
}

/// Parse `HH:MM:SS` (or `HH:MM`) into minutes since midnight
///
/// Returns `None` for empty or malformed strings.
#[must_use]
pub fn parse_time_to_minutes(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_time_hms(trimmed)
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .ok()
        .map(time_to_minutes)
}

/// Format minutes since midnight as `HH:MM:00`, wrapping past midnight
#[must_use]
pub fn format_minutes_to_time(minutes: f64) -> String {
    // Bounded to [0, 1440) by wrap_minutes, so the cast cannot truncate
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = wrap_minutes(minutes).floor() as u32;
    format!("{:02}:{:02}:00", total / 60, total % 60)
}

/// Simulated minutes elapsed between two wall-clock instants
///
/// `acceleration` is simulated minutes per real second. Clock regressions
/// yield zero rather than negative time.
#[must_use]
pub fn elapsed_sim_minutes(from: NaiveDateTime, to: NaiveDateTime, acceleration: f64) -> f64 {
    let elapsed = to.signed_duration_since(from);
    // Millisecond counts of realistic tick gaps fit comfortably in f64
    #[allow(clippy::cast_precision_loss)]
    let seconds = elapsed.num_milliseconds() as f64 / 1000.0;
    (seconds * acceleration).max(0.0)
}
