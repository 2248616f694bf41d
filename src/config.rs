//! Configuration for the calibration engine.
//!
//! Runtime configuration loads from a JSON file so hosts can adjust
//! display units and channel sizing without recompiling. Missing or
//! malformed files fall back to defaults with a logged warning.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::calibration::GlucoseUnits;

/// Complete engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Units used when values are presented to the user
    #[serde(default)]
    pub units: GlucoseUnits,
    #[serde(default)]
    pub channels: ChannelConfig,
}

/// Broadcast channel sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for the calibration update broadcast channel.
    /// Mutations are user-driven and rare; 50 leaves generous headroom
    /// for slow subscribers before they lag.
    pub update_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { update_buffer: 50 }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            units: GlucoseUnits::default(),
            channels: ChannelConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file.
    ///
    /// Returns defaults (with a logged warning) when the file is missing
    /// or does not parse; a bad config file must never keep the engine
    /// from starting.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location.
    pub fn load() -> Self {
        Self::load_from_file("assets/calibration_config.json")
    }
}
