//! Retry configuration and backoff calculation.
//!
//! Portable, sync-only building blocks. The reconnection state machine that
//! consumes them lives in `tableside-realtime`:
//!
//! - [`RetryConfig`]: attempt budget and backoff parameters
//! - [`calculate_backoff_delay`]: `min(base * factor^attempt, cap)`
//! - [`apply_jitter`]: optional symmetric jitter on top of a delay

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default reconnect attempt budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default multiplier applied per attempt.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default jitter factor. Zero keeps reconnect timing deterministic.
pub const DEFAULT_JITTER_FACTOR: f64 = 0.0;

/// Reconnection backoff parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Consecutive failed reconnects allowed before giving up (default: 10).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in ms (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Multiplier applied per attempt (default: 2.0).
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Upper bound on any single delay in ms (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter factor 0.0–1.0 (default: 0.0, no jitter).
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_backoff_factor() -> f64 {
    DEFAULT_BACKOFF_FACTOR
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Exponential backoff without jitter.
///
/// Formula: `min(base_delay * backoff_factor^attempt, max_delay)`.
/// Factors below 1.0 are treated as 1.0 so delays never shrink.
///
/// # Arguments
///
/// * `attempt`: zero-based attempt index (0 for the first retry)
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
pub fn calculate_backoff_delay(
    attempt: u32,
    base_delay_ms: u64,
    backoff_factor: f64,
    max_delay_ms: u64,
) -> u64 {
    let factor = if backoff_factor.is_finite() {
        backoff_factor.max(1.0)
    } else {
        1.0
    };
    let exponential = (base_delay_ms as f64) * factor.powi(attempt.min(1024) as i32);

    if !exponential.is_finite() || exponential >= max_delay_ms as f64 {
        return max_delay_ms;
    }
    exponential.round() as u64
}

/// Apply symmetric jitter to a delay.
///
/// `random` should be a value in `[0.0, 1.0]` from a PRNG; it maps to a
/// multiplier in `[1 - jitter, 1 + jitter]`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn apply_jitter(delay_ms: u64, jitter_factor: f64, random: f64) -> u64 {
    if jitter_factor <= 0.0 || !jitter_factor.is_finite() {
        return delay_ms;
    }
    let jitter = jitter_factor.min(1.0);
    let multiplier = 1.0 + (random.clamp(0.0, 1.0) * 2.0 - 1.0) * jitter;
    ((delay_ms as f64) * multiplier).round().max(0.0) as u64
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
