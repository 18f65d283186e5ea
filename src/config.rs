//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Serial link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Substring matched against enumerated port descriptions
    #[serde(default = "default_device_hint")]
    pub device_hint: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Acquisition pipeline configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    /// Per-channel series capacity in samples
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_fast_tick_ms")]
    pub fast_tick_ms: u64,

    #[serde(default = "default_mean_tick_ms")]
    pub mean_tick_ms: u64,

    #[serde(default = "default_slow_tick_ms")]
    pub slow_tick_ms: u64,

    #[serde(default = "default_passive_tick_ms")]
    pub passive_tick_ms: u64,
}

/// Record store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_enabled")]
    pub enabled: bool,

    /// Directory the versioned database file is created in
    #[serde(default = "default_db_dir")]
    pub db_dir: String,
}

// Default value functions
fn default_device_hint() -> String { "Arduino Leonardo".to_string() }
fn default_baud_rate() -> u32 { 9600 }

fn default_chunk_size() -> usize { 150_000 }
fn default_fast_tick_ms() -> u64 { 100 }
fn default_mean_tick_ms() -> u64 { 2000 }
fn default_slow_tick_ms() -> u64 { 1000 }
fn default_passive_tick_ms() -> u64 { 3000 }

fn default_storage_enabled() -> bool { true }
fn default_db_dir() -> String { ".".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device_hint: default_device_hint(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            fast_tick_ms: default_fast_tick_ms(),
            mean_tick_ms: default_mean_tick_ms(),
            slow_tick_ms: default_slow_tick_ms(),
            passive_tick_ms: default_passive_tick_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: default_storage_enabled(),
            db_dir: default_db_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, TOML parsing fails, or
    /// validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to built-in
    /// defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.serial.device_hint.trim().is_empty() {
            return Err(crate::error::StationError::Config(
                toml::de::Error::custom("device_hint cannot be empty")
            ));
        }

        if self.serial.baud_rate == 0 {
            return Err(crate::error::StationError::Config(
                toml::de::Error::custom("baud_rate must be greater than 0")
            ));
        }

        if self.acquisition.chunk_size == 0 {
            return Err(crate::error::StationError::Config(
                toml::de::Error::custom("chunk_size must be greater than 0")
            ));
        }

        // Validate timing fields
        for (name, value) in [
            ("fast_tick_ms", self.acquisition.fast_tick_ms),
            ("mean_tick_ms", self.acquisition.mean_tick_ms),
            ("slow_tick_ms", self.acquisition.slow_tick_ms),
            ("passive_tick_ms", self.acquisition.passive_tick_ms),
        ] {
            if value == 0 || value > 60000 {
                return Err(crate::error::StationError::Config(
                    toml::de::Error::custom(format!("{} must be between 1 and 60000", name))
                ));
            }
        }

        if self.storage.enabled && self.storage.db_dir.is_empty() {
            return Err(crate::error::StationError::Config(
                toml::de::Error::custom("db_dir cannot be empty when storage is enabled")
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.serial.device_hint, "Arduino Leonardo");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.acquisition.chunk_size, 150_000);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.acquisition.fast_tick_ms, 100);
        assert_eq!(config.acquisition.mean_tick_ms, 2000);
        assert_eq!(config.acquisition.slow_tick_ms, 1000);
        assert_eq!(config.acquisition.passive_tick_ms, 3000);
        assert!(config.storage.enabled);
    }

    #[test]
    fn test_partial_section_overrides() {
        let config: Config = toml::from_str(
            "[serial]\ndevice_hint = \"Feather M0\"\n\n[acquisition]\nchunk_size = 64\n"
        ).unwrap();
        assert_eq!(config.serial.device_hint, "Feather M0");
        assert_eq!(config.serial.baud_rate, 9600, "unset fields keep defaults");
        assert_eq!(config.acquisition.chunk_size, 64);
    }

    #[test]
    fn test_empty_device_hint_rejected() {
        let mut config = Config::default();
        config.serial.device_hint = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_baud_rate_rejected() {
        let mut config = Config::default();
        config.serial.baud_rate = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_tick_rejected() {
        let mut config = Config::default();
        config.acquisition.fast_tick_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.acquisition.passive_tick_ms = 70_000; // > 60s
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = Config::default();
        config.acquisition.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/config/path.toml").unwrap();
        assert_eq!(config.serial.baud_rate, 9600);
    }
}
