//! Range clamping for numeric configuration fields.
//!
//! Applied on every load and save so out-of-range values from a
//! hand-edited file never reach the engine.

use super::types::Config;
use tracing::warn;

/// Polling interval bounds in milliseconds.
pub const POLLING_INTERVAL_MS: (u64, u64) = (300, 800);
pub const AUTO_CANCEL_MINUTES: (u64, u64) = (1, 240);
pub const UNLOCK_MINUTES: (u64, u64) = (1, 480);
pub const FAILED_UNLOCK_THRESHOLD: (u32, u32) = (1, 10);
pub const MAX_FAILED_ATTEMPTS: (u32, u32) = (1, 10);
pub const LOCKOUT_SECONDS: (u64, u64) = (5, 3600);
pub const PBKDF2_ITERATIONS: (u32, u32) = (10_000, 1_000_000);

fn clamp_u64(value: u64, (lo, hi): (u64, u64), field: &str) -> u64 {
    let clamped = value.clamp(lo, hi);
    if clamped != value {
        warn!(field, value, clamped, "config value out of range, clamped");
    }
    clamped
}

fn clamp_u32(value: u32, (lo, hi): (u32, u32), field: &str) -> u32 {
    let clamped = value.clamp(lo, hi);
    if clamped != value {
        warn!(field, value, clamped, "config value out of range, clamped");
    }
    clamped
}

impl Config {
    /// Clamp every numeric field to its documented range.
    pub fn clamp_ranges(&mut self) {
        self.detection.polling_interval_ms = clamp_u64(
            self.detection.polling_interval_ms,
            POLLING_INTERVAL_MS,
            "detection.polling_interval_ms",
        );
        self.policy.auto_cancel_minutes = clamp_u64(
            self.policy.auto_cancel_minutes,
            AUTO_CANCEL_MINUTES,
            "policy.auto_cancel_minutes",
        );
        self.policy.unlock_minutes = clamp_u64(
            self.policy.unlock_minutes,
            UNLOCK_MINUTES,
            "policy.unlock_minutes",
        );
        self.policy.failed_unlock_threshold = clamp_u32(
            self.policy.failed_unlock_threshold,
            FAILED_UNLOCK_THRESHOLD,
            "policy.failed_unlock_threshold",
        );
        self.auth.max_failed_attempts = clamp_u32(
            self.auth.max_failed_attempts,
            MAX_FAILED_ATTEMPTS,
            "auth.max_failed_attempts",
        );
        self.auth.lockout_seconds = clamp_u64(
            self.auth.lockout_seconds,
            LOCKOUT_SECONDS,
            "auth.lockout_seconds",
        );
        self.auth.pbkdf2_iterations = clamp_u32(
            self.auth.pbkdf2_iterations,
            PBKDF2_ITERATIONS,
            "auth.pbkdf2_iterations",
        );
    }
}
