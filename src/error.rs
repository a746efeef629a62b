//! Error types for loading input data and for route data-quality checks.
//!
//! Only [`LoadError`] is ever returned to the host. Route and delay errors are
//! recovered locally: a train with a [`RouteError`] is excluded from positions
//! and conflicts, and a rejected delay surfaces as `false`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {what}: {source}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("roster contains no trains")]
    EmptyRoster,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Data-quality problems in a train's route
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route has {0} stop(s), at least 2 are required")]
    TooShort(usize),
    #[error("cumulative distance decreases at stop {seq}")]
    NonMonotonicDistance { seq: u32 },
    #[error("scheduled time decreases at stop {seq}")]
    NonMonotonicTime { seq: u32 },
    #[error("station {code} is not in the station dictionary")]
    MissingStation { code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelayError {
    #[error("delay must be non-negative, got {0} minutes")]
    Negative(i64),
    #[error("unknown train {0}")]
    UnknownTrain(String),
}
