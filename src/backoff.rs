//! Cooldown between monitoring sessions.

use std::time::Duration;

/// Exponential cooldown with configurable base and cap.
///
/// With `base == max` this is a fixed delay, which is the default.
#[derive(Debug, Clone)]
pub struct Cooldown {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Cooldown {
    /// Creates a cooldown starting at `base`, capping at `max`.
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
        }
    }

    /// Returns the delay to wait before the next session.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Records a session that never reached steady polling.
    /// Doubles the delay, capped at max.
    pub fn failed(&mut self) {
        self.current = self.current.saturating_mul(2).min(self.max);
    }

    /// Records a session that polled at least once; resets to base.
    pub fn succeeded(&mut self) {
        self.current = self.base;
    }

    /// Applies bounds from a freshly loaded configuration.
    ///
    /// A changed base restarts from that base; otherwise the current delay
    /// is kept within the new bounds.
    pub fn rebound(&mut self, base: Duration, max: Duration) {
        if base != self.base {
            self.current = base;
        }
        self.base = base;
        self.max = max.max(base);
        self.current = self.current.clamp(self.base, self.max);
    }
}
