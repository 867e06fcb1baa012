//! Adaptive capture interval.
//!
//! A neutral face rarely changes quickly, so the scheduler backs off. Any
//! expressed emotion shortens the interval to follow the change.

use crate::analysis::Emotion;

pub const DEFAULT_NEUTRAL_INTERVAL_MS: u64 = 4000;
pub const DEFAULT_ACTIVE_INTERVAL_MS: u64 = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalPolicy {
    /// Interval after a neutral result
    pub neutral_interval_ms: u64,
    /// Interval after any other result
    pub active_interval_ms: u64,
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self {
            neutral_interval_ms: DEFAULT_NEUTRAL_INTERVAL_MS,
            active_interval_ms: DEFAULT_ACTIVE_INTERVAL_MS,
        }
    }
}

impl IntervalPolicy {
    pub fn next_interval_ms(&self, emotion: Emotion) -> u64 {
        match emotion {
            Emotion::Neutral => self.neutral_interval_ms,
            _ => self.active_interval_ms,
        }
    }
}
