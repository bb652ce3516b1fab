use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{MediaEditError, Result};

/// Top-level configuration structure for the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub playback: PlaybackConfig,
    pub waveform: WaveformConfig,
    pub display: DisplayConfig,
}

impl EditorConfig {
    /// Parses a configuration document. Missing sections and fields fall back
    /// to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| MediaEditError::invalid_input(format!("config: {err}")))
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Configuration specific to the playback scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Samples written to the output sink per tick.
    pub chunk_size: usize,
    /// Delay between two scheduler ticks.
    pub tick_interval_ms: u64,
}

impl PlaybackConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            tick_interval_ms: 10,
        }
    }
}

/// Size of the waveform view in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    pub width: u32,
    pub height: u32,
    /// Vertical padding kept free above and below the peaks.
    pub margin: f32,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 200,
            margin: 10.0,
        }
    }
}

/// Size of the image canvas the presentation layer paints into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            canvas_width: 800,
            canvas_height: 600,
        }
    }
}
