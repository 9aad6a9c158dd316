//! Health tracking for a monitoring session.
//!
//! Counts polling cycles and detects sessions where every status request
//! keeps failing, which usually means the connection has gone stale.

use std::time::{Duration, Instant};

use crate::status::{JobResolution, SkipReason};

/// Tracks polling health within one session.
#[derive(Debug)]
pub struct SessionMonitor {
    /// Completed polling cycles.
    cycles: u64,
    /// Consecutive cycles in which every polled job failed.
    failed_streak: u32,
    /// Status requests that failed over the whole session.
    failed_lookups: u64,
    /// Time when the session started.
    start_time: Instant,
    /// Cycles in a failure streak before the session is considered stale.
    /// 0 disables.
    stale_after: u32,
}

impl SessionMonitor {
    /// Creates a monitor. `stale_after == 0` never reports staleness.
    pub fn new(stale_after: u32) -> Self {
        Self {
            cycles: 0,
            failed_streak: 0,
            failed_lookups: 0,
            start_time: Instant::now(),
            stale_after,
        }
    }

    /// Records the lookups of one completed cycle.
    ///
    /// A cycle counts as failed when at least one job was polled and every
    /// polled job failed. Jobs skipped because the server never listed them
    /// were not polled.
    pub fn record_cycle<'a, I>(&mut self, resolutions: I)
    where
        I: IntoIterator<Item = &'a JobResolution>,
    {
        let mut polled = 0u32;
        let mut failed = 0u32;
        for resolution in resolutions {
            if *resolution == JobResolution::Skipped(SkipReason::NotListed) {
                continue;
            }
            polled += 1;
            if resolution.is_failure() {
                failed += 1;
            }
        }

        self.cycles += 1;
        self.failed_lookups += u64::from(failed);
        if polled > 0 && failed == polled {
            self.failed_streak += 1;
        } else {
            self.failed_streak = 0;
        }
    }

    /// Returns completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Returns the current failure streak.
    pub fn failed_streak(&self) -> u32 {
        self.failed_streak
    }

    /// Returns time since the session started.
    pub fn age(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns true once the failure streak reaches the configured limit.
    pub fn is_stale(&self) -> bool {
        self.stale_after > 0 && self.failed_streak >= self.stale_after
    }
}

/// Summary of a session for logging.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub cycles: u64,
    pub failed_lookups: u64,
    pub duration_secs: f64,
}

impl From<&SessionMonitor> for SessionSummary {
    fn from(monitor: &SessionMonitor) -> Self {
        Self {
            cycles: monitor.cycles,
            failed_lookups: monitor.failed_lookups,
            duration_secs: monitor.age().as_secs_f64(),
        }
    }
}
