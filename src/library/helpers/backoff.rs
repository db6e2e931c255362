//! Exponential backoff implementations

use rand::Rng;
use std::{iter::Iterator, time::Duration};

/// Exponential backoff iterator
///
/// This struct implements the iterator trait and returns monotonically increasing values until a specified limit of iterations,
/// specified by the `limit` field, is reached. Each element in the Iterator is the previous element multiplied by the `multiplier`
/// property, capped at `max`. Optionally, each value is randomly spread by a relative `jitter` so that multiple instances
/// failing at the same time do not retry in lockstep.
#[derive(Debug, Clone)]
pub struct Backoff {
    retries: u32,
    limit: Option<u32>,
    multiplier: u32,
    initial: Duration,
    current: Duration,
    max: Duration,
    jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            retries: 0,
            limit: Some(13),
            multiplier: 2,
            initial: Duration::from_millis(25),
            current: Duration::from_millis(25),
            max: Duration::from_secs(15 * 60),
            jitter: 0.0,
        }
    }
}

impl Backoff {
    /// Never ending backoff used between failed polls against the event log
    ///
    /// Starts at 500ms, doubles on every failure up to 30s and spreads each value by ±20%.
    pub fn polling() -> Self {
        Self {
            retries: 0,
            limit: None,
            multiplier: 2,
            initial: Duration::from_millis(500),
            current: Duration::from_millis(500),
            max: Duration::from_secs(30),
            jitter: 0.2,
        }
    }

    /// Number of values handed out since the last reset
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Starts over from the initial duration, usually after an operation succeeded
    pub fn reset(&mut self) {
        self.retries = 0;
        self.current = self.initial;
    }

    fn spread(&self, duration: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return duration;
        }

        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        duration.mul_f64(factor)
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        self.retries = self.retries.saturating_add(1);

        if let Some(limit) = self.limit {
            if self.retries > limit {
                return None;
            }
        }

        let delay = self.current;
        self.current = self
            .current
            .checked_mul(self.multiplier)
            .unwrap_or(self.max)
            .min(self.max);

        Some(self.spread(delay))
    }
}
