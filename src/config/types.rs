//! Core configuration types.

use crate::auth::PasswordRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// What to protect.
    #[serde(default)]
    pub protection: ProtectionConfig,
    /// Job detection sources.
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Hold/release policy knobs.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Password and lockout settings.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Which printers are guarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// Master switch. When off, observations are ignored and everything
    /// held is released.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Protect every printer; when false only `printers` are guarded.
    #[serde(default = "default_true")]
    pub protect_all: bool,
    /// Explicit printer list used when `protect_all` is false.
    #[serde(default)]
    pub printers: Vec<String>,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            protect_all: true,
            printers: Vec::new(),
        }
    }
}

/// Detection source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Polling scan interval in milliseconds (clamped to 300..=800).
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// Optional FIFO that a spooler notifier writes `printer,jobid` lines
    /// to. When unset, only the polling source runs.
    #[serde(default)]
    pub notify_pipe: Option<PathBuf>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: default_polling_interval_ms(),
            notify_pipe: None,
        }
    }
}

/// Hold strategy and escalation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Re-secure jobs already in the spooler on startup.
    #[serde(default = "default_true")]
    pub reassert_on_startup: bool,
    /// When neither per-job nor queue pause works, cancel the job and
    /// pre-authorize its resubmission.
    #[serde(default)]
    pub cancel_on_pause_failure: bool,
    /// Auto-cancel held jobs older than `auto_cancel_minutes`.
    #[serde(default)]
    pub auto_cancel_enabled: bool,
    /// Age threshold for auto-cancel (clamped to 1..=240).
    #[serde(default = "default_auto_cancel_minutes")]
    pub auto_cancel_minutes: u64,
    /// Cancel a held job after too many wrong passwords against it.
    #[serde(default)]
    pub cancel_after_failed_unlocks: bool,
    /// Wrong-password threshold for the above (clamped to 1..=10).
    #[serde(default = "default_failed_unlock_threshold")]
    pub failed_unlock_threshold: u32,
    /// Default duration of the global unlock window in minutes
    /// (clamped to 1..=480).
    #[serde(default = "default_unlock_minutes")]
    pub unlock_minutes: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            reassert_on_startup: true,
            cancel_on_pause_failure: false,
            auto_cancel_enabled: false,
            auto_cancel_minutes: default_auto_cancel_minutes(),
            cancel_after_failed_unlocks: false,
            failed_unlock_threshold: default_failed_unlock_threshold(),
            unlock_minutes: default_unlock_minutes(),
        }
    }
}

/// Password verification and lockout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Consecutive failures before lockout (clamped to 1..=10).
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,
    /// Lockout duration in seconds (clamped to 5..=3600).
    #[serde(default = "default_lockout_seconds")]
    pub lockout_seconds: u64,
    /// PBKDF2 iteration count for newly derived passwords
    /// (clamped to 10_000..=1_000_000).
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,
    /// Stored password record. No plaintext is ever persisted.
    #[serde(default)]
    pub password: Option<PasswordRecord>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: default_max_failed_attempts(),
            lockout_seconds: default_lockout_seconds(),
            pbkdf2_iterations: default_pbkdf2_iterations(),
            password: None,
        }
    }
}

pub(crate) fn default_true() -> bool {
    true
}

fn default_polling_interval_ms() -> u64 {
    500
}

fn default_auto_cancel_minutes() -> u64 {
    10
}

fn default_failed_unlock_threshold() -> u32 {
    3
}

fn default_unlock_minutes() -> u64 {
    5
}

fn default_max_failed_attempts() -> u32 {
    5
}

fn default_lockout_seconds() -> u64 {
    30
}

fn default_pbkdf2_iterations() -> u32 {
    200_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protection_defaults() {
        let config = ProtectionConfig::default();
        assert!(config.enabled);
        assert!(config.protect_all);
        assert!(config.printers.is_empty());
    }

    #[test]
    fn detection_defaults() {
        let config = DetectionConfig::default();
        assert_eq!(config.polling_interval_ms, 500);
        assert!(config.notify_pipe.is_none());
    }

    #[test]
    fn policy_defaults() {
        let config = PolicyConfig::default();
        assert!(config.reassert_on_startup);
        assert!(!config.cancel_on_pause_failure);
        assert!(!config.auto_cancel_enabled);
        assert_eq!(config.auto_cancel_minutes, 10);
        assert_eq!(config.failed_unlock_threshold, 3);
        assert_eq!(config.unlock_minutes, 5);
    }

    #[test]
    fn auth_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.max_failed_attempts, 5);
        assert_eq!(config.lockout_seconds, 30);
        assert_eq!(config.pbkdf2_iterations, 200_000);
        assert!(config.password.is_none());
    }

    #[test]
    fn empty_toml_parses_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.protection.enabled);
        assert_eq!(config.detection.polling_interval_ms, 500);
    }
}
