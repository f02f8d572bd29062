//! Configuration loading, validation, and persistence.
//!
//! Split into logical submodules:
//! - [`types`]: config struct definitions and serde defaults
//! - [`validation`]: numeric range clamping applied on load and save
//!
//! A missing or corrupt file never stops the daemon: it falls back to
//! defaults and persists them so the next start is clean.

mod types;
mod validation;

pub use types::{
    AuthConfig, Config, ConfigError, DetectionConfig, PolicyConfig, ProtectionConfig,
};

use std::path::Path;
use tracing::warn;

impl Config {
    /// Load and clamp configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.clamp_ranges();
        Ok(config)
    }

    /// Persist configuration as TOML, clamping first.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let mut clamped = self.clone();
        clamped.clamp_ranges();
        let content = toml::to_string_pretty(&clamped)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration, falling back to defaults on a missing or
    /// corrupt file. The fallback is persisted so the operator has a
    /// valid file to edit.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                let config = Config::default();
                if let Err(e) = config.save(path) {
                    warn!(path = %path.display(), error = %e, "failed to persist default config");
                }
                config
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.protection.protect_all = false;
        config.protection.printers = vec!["HP-01".into()];
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert!(!loaded.protection.protect_all);
        assert_eq!(loaded.protection.printers, vec!["HP-01".to_string()]);
    }

    #[test]
    fn save_clamps_out_of_range_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.detection.polling_interval_ms = 5;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.detection.polling_interval_ms, 300);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is { not toml").unwrap();

        let config = Config::load_or_default(&path);
        assert!(config.protection.enabled);

        // The corrupt file was replaced with a parseable one.
        let reloaded = Config::load(&path).unwrap();
        assert!(reloaded.protection.enabled);
    }

    #[test]
    fn missing_file_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let _ = Config::load_or_default(&path);
        assert!(path.exists());
    }
}
