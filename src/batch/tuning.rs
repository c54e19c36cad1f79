//! Error-rate driven round sizing.
//!
//! The round size behaves like a congestion window: a stressed resolver
//! (high error rate) shrinks it quickly, a healthy one lets it grow slowly.

use crate::config::BatchConfig;
use tokio::time::Instant;

/// The outcome of a tuning step that was allowed to run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningDecision {
    pub error_rate: f64,
    pub previous: usize,
    pub current: usize,
}

impl TuningDecision {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Per-run feedback state of the adaptive scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerState {
    current_round_size: usize,
    recent_successes: usize,
    recent_failures: usize,
    last_tune_time: Instant,
    config: BatchConfig,
}

impl SchedulerState {
    pub fn new(config: &BatchConfig, now: Instant) -> Self {
        Self {
            current_round_size: config
                .initial_round_size
                .clamp(config.min_round_size, config.max_round_size),
            recent_successes: 0,
            recent_failures: 0,
            last_tune_time: now,
            config: config.clone(),
        }
    }

    pub fn current_round_size(&self) -> usize {
        self.current_round_size
    }

    /// Outcomes recorded since the last tuning decision.
    pub fn window_len(&self) -> usize {
        self.recent_successes + self.recent_failures
    }

    pub fn record(&mut self, success: bool) {
        if success {
            self.recent_successes += 1;
        } else {
            self.recent_failures += 1;
        }
    }

    /// Re-evaluates the round size.
    ///
    /// Does nothing (returns `None`) until both the outcome window is full
    /// and the tuning interval has elapsed since the last decision. Every
    /// decision, including "unchanged", starts a fresh window.
    pub fn tune(&mut self, now: Instant) -> Option<TuningDecision> {
        let samples = self.window_len();
        if samples < self.config.tuning_window {
            return None;
        }
        if now.saturating_duration_since(self.last_tune_time) < self.config.tuning_interval {
            return None;
        }

        let error_rate = self.recent_failures as f64 / samples as f64;
        let previous = self.current_round_size;
        self.current_round_size = if error_rate > self.config.high_error_rate {
            previous
                .saturating_sub(self.config.decrease_step)
                .max(self.config.min_round_size)
        } else if error_rate < self.config.low_error_rate {
            (previous + self.config.increase_step).min(self.config.max_round_size)
        } else {
            previous
        };

        self.recent_successes = 0;
        self.recent_failures = 0;
        self.last_tune_time = now;

        Some(TuningDecision {
            error_rate,
            previous,
            current: self.current_round_size,
        })
    }
}
