//! Clock and timing utilities.
//!
//! Every time-dependent decision (availability windows, countdown deadlines,
//! audit timestamps) reads an injected [`Clock`] instead of calling
//! `Utc::now()` directly. This module provides:
//! - The [`Clock`] trait with system and manually driven implementations
//! - Drift measurement for late timer ticks

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// The host's real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += to_chrono(by);
    }

    /// Jump to an absolute time (may move backwards).
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Convert a std duration to a chrono delta, saturating at the chrono range.
pub fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

/// Time left until `deadline`, zero once it has passed.
pub fn remaining_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}

/// How late an observed tick was relative to its schedule.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Interval the tick was scheduled for.
    pub expected: Duration,
    /// Interval actually observed since the previous tick.
    pub observed: Duration,
}

impl DriftMeasurement {
    /// Drift in milliseconds (positive = tick arrived late).
    pub fn drift_ms(&self) -> f64 {
        (self.observed.as_secs_f64() - self.expected.as_secs_f64()) * 1000.0
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}
