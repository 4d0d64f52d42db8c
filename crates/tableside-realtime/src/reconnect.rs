//! Reconnection policy: attempt budget and backoff schedule.
//!
//! [`RetryPolicy`] is a pure state transformer over [`RetryState`]; the
//! channel owns the state and sleeps for the computed delay.

use std::time::Duration;

use serde::Serialize;
use tableside_core::retry::{RetryConfig, apply_jitter, calculate_backoff_delay};

/// Reconnection bookkeeping for one logical channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryState {
    /// Reconnects scheduled since the last successful open.
    pub attempt_count: u32,
    /// Delay of the most recently scheduled reconnect, in milliseconds.
    pub next_delay_ms: u64,
    /// Attempt budget.
    pub max_attempts: u32,
    /// Set once the budget is spent. Terminal until a manual connect.
    pub exhausted: bool,
}

impl RetryState {
    /// Attempts left before exhaustion.
    pub fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt_count)
    }
}

/// Outcome of [`RetryPolicy::schedule_retry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Reconnect after `delay`; this is attempt number `attempt` (1-based).
    Retry {
        /// 1-based attempt number.
        attempt: u32,
        /// Wait before connecting.
        delay: Duration,
    },
    /// Budget spent; stop reconnecting.
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
}

/// Computes whether and when to reconnect.
#[derive(Clone, Debug, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Policy with the given parameters.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Policy parameters.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// State for a channel that has not failed yet.
    pub fn initial_state(&self) -> RetryState {
        RetryState {
            max_attempts: self.config.max_attempts,
            ..RetryState::default()
        }
    }

    /// Delay before retry number `attempt_count + 1`, without jitter.
    pub fn base_delay_for(&self, attempt_count: u32) -> Duration {
        Duration::from_millis(calculate_backoff_delay(
            attempt_count,
            self.config.base_delay_ms,
            self.config.backoff_factor,
            self.config.max_delay_ms,
        ))
    }

    /// Delay before retry number `attempt_count + 1`, with jitter when
    /// configured.
    pub fn delay_for(&self, attempt_count: u32) -> Duration {
        let base = calculate_backoff_delay(
            attempt_count,
            self.config.base_delay_ms,
            self.config.backoff_factor,
            self.config.max_delay_ms,
        );
        if self.config.jitter_factor <= 0.0 {
            return Duration::from_millis(base);
        }
        Duration::from_millis(apply_jitter(base, self.config.jitter_factor, rand::random::<f64>()))
    }

    /// Advance the state after a failure.
    ///
    /// With attempts left: compute the delay from the current count, then
    /// increment. Otherwise flag the state exhausted and leave the counters
    /// alone. Exhaustion is idempotent.
    pub fn schedule_retry(&self, state: RetryState) -> (RetryState, RetryDecision) {
        if state.exhausted || state.attempt_count >= state.max_attempts {
            let next = RetryState {
                exhausted: true,
                ..state
            };
            return (
                next,
                RetryDecision::Exhausted {
                    attempts: state.attempt_count,
                },
            );
        }

        let delay = self.delay_for(state.attempt_count);
        let next = RetryState {
            attempt_count: state.attempt_count + 1,
            next_delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            ..state
        };
        (
            next,
            RetryDecision::Retry {
                attempt: next.attempt_count,
                delay,
            },
        )
    }

    /// State after a successful open.
    pub fn reset(&self, state: RetryState) -> RetryState {
        RetryState {
            attempt_count: 0,
            next_delay_ms: 0,
            max_attempts: state.max_attempts,
            exhausted: false,
        }
    }
}
