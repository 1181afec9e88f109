use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub audio: AudioConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Describes the audio pipeline the bin arrays were produced by.
///
/// Bin `i` is assumed to be centred on `i * sample_rate / fft_size` Hz, and
/// incoming amplitudes are the analyser's decibel range mapped onto `0..=1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub fft_size: usize,
    pub analyser_min_decibels: f32,
    pub analyser_max_decibels: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fft_size: 2048,
            analyser_min_decibels: -100.0,
            analyser_max_decibels: -30.0,
        }
    }
}

impl AudioConfig {
    /// Width of a single FFT bin in Hz.
    pub fn bin_hz(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size.max(1) as f32
    }

    pub fn bin_frequency(&self, index: usize) -> f32 {
        index as f32 * self.bin_hz()
    }
}

/// Constants used by the layer renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// Level that maps to 0.0 after decibel normalisation.
    pub noise_floor_decibels: f32,
    /// Distance from the eye to the projection plane for 3D layers.
    pub focal_distance: f32,
    pub envelope_decay: f32,
    pub envelope_epsilon: f32,
    /// Fixed seed for particle placement. Random when unset.
    pub particle_seed: Option<u64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            noise_floor_decibels: -100.0,
            focal_distance: 400.0,
            envelope_decay: 0.92,
            envelope_epsilon: 0.001,
            particle_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"audio": {"sampleRate": 44100}}"#).unwrap();

        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.fft_size, 2048);
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn bin_frequency_follows_fft_layout() {
        let audio = AudioConfig {
            sample_rate: 48_000,
            fft_size: 1024,
            ..Default::default()
        };
        assert_eq!(audio.bin_frequency(0), 0.0);
        assert_eq!(audio.bin_frequency(10), 468.75);
    }
}
