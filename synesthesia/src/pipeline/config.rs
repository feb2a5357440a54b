// Tuning constants for column extraction. Every field has a default so a
// config file only needs the keys it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanConfig {
    pub brightness_threshold: f32,
    pub bass_region_multiplier: f32,
    pub bass_interval: usize,
    pub harmony_interval: usize,
    pub harmony_brightness_threshold: f32,
    pub melody_region_multiplier: f32,
    pub melody_interval: usize,
    pub pitch_difference_threshold: f32,
    pub percussion_spike_threshold: f32,
    pub columns_per_beat: u32,
    pub harmony_duration: usize, // in columns
    pub percussion_duration: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            brightness_threshold: 0.2,
            bass_region_multiplier: 0.25,
            bass_interval: 8,
            harmony_interval: 16,
            harmony_brightness_threshold: 0.1,
            melody_region_multiplier: 0.25,
            melody_interval: 4,
            pitch_difference_threshold: 0.05,
            percussion_spike_threshold: 0.25,
            columns_per_beat: 8,
            harmony_duration: 16,
            percussion_duration: 2,
        }
    }
}

impl ScanConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&data)?;
        log::info!("loaded scan config from {}", path.display());
        Ok(config)
    }
}
