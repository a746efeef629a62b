use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::route::Route;
use crate::constants::FALLBACK_SPEED_KMH;
use crate::error::LoadError;

/// Train category, used for default speed and route-end policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainCategory {
    Express,
    Superfast,
    Local,
    Passenger,
    Mail,
    Freight,
    #[default]
    #[serde(other)]
    Unknown,
}

impl TrainCategory {
    /// Default running speed in km/h
    #[must_use]
    pub fn default_speed_kmh(self) -> f64 {
        match self {
            Self::Express => 80.0,
            Self::Superfast => 100.0,
            Self::Passenger => 50.0,
            Self::Mail => 70.0,
            Self::Local | Self::Freight | Self::Unknown => FALLBACK_SPEED_KMH,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Express => "express",
            Self::Superfast => "superfast",
            Self::Local => "local",
            Self::Passenger => "passenger",
            Self::Mail => "mail",
            Self::Freight => "freight",
            Self::Unknown => "unknown",
        }
    }
}

/// Static definition of a train as delivered by the roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainDefinition {
    #[serde(default)]
    pub train_id: String,
    #[serde(default)]
    pub train_name: String,
    #[serde(rename = "train_type", default)]
    pub category: TrainCategory,
    /// Explicit per-train speed override (km/h)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default)]
    pub route: Route,
}

impl TrainDefinition {
    #[must_use]
    pub fn new(train_id: &str, train_name: &str, category: TrainCategory, route: Route) -> Self {
        Self {
            train_id: train_id.to_string(),
            train_name: train_name.to_string(),
            category,
            speed: None,
            route,
        }
    }

    #[must_use]
    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed = Some(speed_kmh);
        self
    }

    /// The override if it is a positive finite number, otherwise the category default
    #[must_use]
    pub fn effective_speed(&self) -> f64 {
        self.speed
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or_else(|| self.category.default_speed_kmh())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RosterFile {
    Map(IndexMap<String, TrainDefinition>),
    List(Vec<TrainDefinition>),
}

/// Ordered collection of train definitions keyed by train id
///
/// Insertion order is preserved so that pairwise scans and snapshots are
/// deterministic for a given roster file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    trains: IndexMap<String, TrainDefinition>,
}

impl Roster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a train, replacing any existing definition with the same id
    pub fn insert(&mut self, train: TrainDefinition) {
        self.trains.insert(train.train_id.clone(), train);
    }

    #[must_use]
    pub fn get(&self, train_id: &str) -> Option<&TrainDefinition> {
        self.trains.get(train_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrainDefinition> {
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

    /// Parse a roster from either a `{ train_id: train }` map or a list of trains
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON matches neither shape or contains no trains
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let file: RosterFile = serde_json::from_str(json)
            .map_err(|source| LoadError::Json { what: "train roster", source })?;

        let roster: Self = match file {
            RosterFile::Map(map) => map
                .into_iter()
                .map(|(id, mut train)| {
                    if train.train_id.is_empty() {
                        train.train_id = id;
                    }
                    train
                })
                .collect(),
            RosterFile::List(list) => list.into_iter().collect(),
        };

        if roster.is_empty() {
            return Err(LoadError::EmptyRoster);
        }
        Ok(roster)
    }
}

impl FromIterator<TrainDefinition> for Roster {
    fn from_iter<I: IntoIterator<Item = TrainDefinition>>(iter: I) -> Self {
        let mut roster = Self::new();
        for train in iter {
            roster.insert(train);
        }
        roster
    }
}
