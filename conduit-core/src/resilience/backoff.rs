//! Exponential backoff for parked events
//!
//! A stage that returns `Park` has its slot retried after a growing delay,
//! up to a bounded number of attempts. Jitter keeps several stalled
//! pipelines from hammering a recovering gateway in lockstep.

use crate::config::StageConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth factor per attempt (typically 2.0)
    pub multiplier: f64,
    /// Attempts allowed before giving up
    pub max_retries: u32,
    /// Randomization in `0.0..=1.0`, applied symmetrically around the delay
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_micros(50),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            max_retries: 3,
            jitter_factor: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Park pacing for `stage` from the stage section of the configuration
    pub fn for_stage(config: &StageConfig, stage: &str) -> Self {
        Self {
            initial_delay: Duration::from_micros(config.park_initial_delay_us),
            max_delay: Duration::from_micros(config.park_max_delay_us),
            max_retries: config.retries_for(stage),
            ..Default::default()
        }
    }

    /// No waiting between attempts (tests)
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            max_retries,
            jitter_factor: 0.0,
        }
    }
}

/// Retry pacing state for one parked slot
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    attempt: u32,
    current_delay: Duration,
}

impl ExponentialBackoff {
    pub fn with_config(config: BackoffConfig) -> Self {
        Self {
            current_delay: config.initial_delay,
            attempt: 0,
            config,
        }
    }

    /// Next delay, or `None` once `max_retries` delays have been handed out
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.config.max_retries {
            return None;
        }

        let delay = self.with_jitter(self.current_delay);

        self.attempt += 1;
        self.current_delay = std::cmp::min(
            self.current_delay.mul_f64(self.config.multiplier),
            self.config.max_delay,
        );

        Some(delay)
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor == 0.0 || delay.is_zero() {
            return delay;
        }

        let jitter = rand::thread_rng().gen::<f64>() * self.config.jitter_factor;
        delay.mul_f64(1.0 + jitter - self.config.jitter_factor / 2.0)
    }

    /// Start over for the next parked slot
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_delay = self.config.initial_delay;
    }

    /// Retries handed out so far
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn can_retry(&self) -> bool {
        self.attempt < self.config.max_retries
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}
