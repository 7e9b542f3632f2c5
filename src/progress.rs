//! Shared scrape progress, mutated by workers and read by the status endpoint.
//!
//! One `ProgressTracker` lives for the whole process. Every mutation takes the
//! lock for a handful of field writes; readers get a value copy, never a view
//! of a half-applied update.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub running: bool,
    pub total_units: usize,
    pub completed_units: usize,
    pub total_records: usize,
    pub percentage: f64,
    pub last_run_started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct ProgressTracker {
    state: Mutex<ProgressSnapshot>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle -> Running. Resets the per-run counters.
    pub fn begin_run(&self, total_units: usize) {
        let mut s = self.lock();
        s.running = true;
        s.total_units = total_units;
        s.completed_units = 0;
        s.total_records = 0;
        s.percentage = 0.0;
        s.last_run_started_at = Some(Utc::now());
    }

    /// Count one finished unit and its records. Returns false, leaving the
    /// state untouched, if every unit of the run is already accounted for.
    pub fn record_unit_completion(&self, record_count: usize) -> bool {
        let mut s = self.lock();
        if s.completed_units >= s.total_units {
            warn!(
                completed = s.completed_units,
                total = s.total_units,
                "completion beyond unit total ignored"
            );
            return false;
        }
        s.completed_units += 1;
        s.total_records += record_count;
        s.percentage = percentage(s.completed_units, s.total_units);
        true
    }

    /// Running -> Idle. Safe to call when already idle.
    pub fn end_run(&self) {
        self.lock().running = false;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().clone()
    }

    // A panicking holder cannot leave a torn snapshot behind (each method
    // writes plain fields), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, ProgressSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `completed / total * 100` rounded to two decimals; 0 for an empty run.
pub fn percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = completed as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}
