//! The retained conflict set between detection cycles.

use chrono::{Duration, NaiveDateTime};

use super::types::{ActiveConflicts, ConflictRecord, ConflictStatistics, Severity};

/// Holds the most recent detection result
///
/// Each cycle replaces the set wholesale. Pruning drops records older than
/// the retention window for consumers that poll between cycles.
#[derive(Debug, Clone, Default)]
pub struct ConflictStore {
    records: Vec<ConflictRecord>,
    updated_at: Option<NaiveDateTime>,
}

impl ConflictStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, records: Vec<ConflictRecord>, now: NaiveDateTime) {
        self.records = records;
        self.updated_at = Some(now);
    }

    /// Drop records detected more than `retention_minutes` before `now`
    ///
    /// Returns the number of records removed.
    pub fn prune(&mut self, now: NaiveDateTime, retention_minutes: i64) -> usize {
        let cutoff = now - Duration::minutes(retention_minutes);
        let before = self.records.len();
        self.records.retain(|record| record.detected_at > cutoff);
        before - self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.updated_at = None;
    }

    #[must_use]
    pub fn records(&self) -> &[ConflictRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn updated_at(&self) -> Option<NaiveDateTime> {
        self.updated_at
    }

    #[must_use]
    pub fn active(&self, now: NaiveDateTime) -> ActiveConflicts {
        ActiveConflicts {
            total_conflicts: self.records.len(),
            conflicts: self.records.clone(),
            timestamp: now,
        }
    }

    #[must_use]
    pub fn statistics(&self) -> ConflictStatistics {
        let mut stats = ConflictStatistics {
            total: self.records.len(),
            ..ConflictStatistics::default()
        };
        for record in &self.records {
            match record.severity {
                Severity::High => stats.high += 1,
                Severity::Medium => stats.medium += 1,
            }
            *stats.by_kind.entry(record.kind).or_insert(0) += 1;
        }
        stats
    }
}
