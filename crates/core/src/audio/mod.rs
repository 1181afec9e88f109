use std::path::Path;

use hound::{SampleFormat, WavReader};
use serde::{Deserialize, Serialize};

use crate::{config::AudioConfig, Result, VisualiserError};

const BASS_CUTOFF_HZ: f32 = 250.0;
const MID_CUTOFF_HZ: f32 = 4_000.0;

/// Aggregate band energies in `0..=1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beat {
    pub is_beat: bool,
    pub intensity: f32,
    /// Position within the current beat, `0..1`.
    pub phase: f32,
    pub bpm: f32,
}

/// Audio features for a single animation frame. Treated as read-only by the
/// renderers; the newest frame simply replaces the previous one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFrame {
    /// Normalised frequency-bin amplitudes in `0..=1`.
    pub bins: Vec<f32>,
    /// Time-domain samples in `-1..=1`. Empty when the provider has none.
    #[serde(default)]
    pub waveform: Vec<f32>,
    #[serde(default)]
    pub bands: Option<Bands>,
    #[serde(default)]
    pub beat: Option<Beat>,
}

impl AudioFrame {
    /// A frame with no audio data at all.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn from_bins(bins: Vec<f32>) -> Self {
        Self {
            bins,
            ..Default::default()
        }
    }

    /// Mean bin amplitude, 0 for an empty frame.
    pub fn level(&self) -> f32 {
        mean(&self.bins)
    }

    /// The provider's band summary, or one derived from the bins when absent.
    pub fn bands_or_derived(&self, audio: &AudioConfig) -> Bands {
        if let Some(bands) = self.bands {
            return bands;
        }

        let mut sums = [0.0_f32; 3];
        let mut counts = [0_usize; 3];
        for (index, value) in self.bins.iter().enumerate() {
            let frequency = audio.bin_frequency(index);
            let band = if frequency < BASS_CUTOFF_HZ {
                0
            } else if frequency < MID_CUTOFF_HZ {
                1
            } else {
                2
            };
            sums[band] += value.clamp(0.0, 1.0);
            counts[band] += 1;
        }
        let average = |band: usize| {
            if counts[band] == 0 {
                0.0
            } else {
                sums[band] / counts[band] as f32
            }
        };

        Bands {
            bass: average(0),
            mid: average(1),
            high: average(2),
        }
    }
}

pub(crate) fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

/// Mono PCM clip decoded from a WAV file.
#[derive(Debug, Clone)]
pub struct AudioClip {
    sample_rate: u32,
    samples: Vec<f32>,
}

impl AudioClip {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// Decodes a WAV file, averaging all channels down to mono.
    pub fn from_wav(path: impl AsRef<Path>) -> Result<Self> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
            SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(Self::new(spec.sample_rate, samples))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate.max(1) as f32
    }

    /// Number of video frames covering the clip at `fps`.
    pub fn frame_count(&self, fps: u32) -> usize {
        (self.duration_seconds() * fps as f32).ceil() as usize
    }

    /// The `len` samples ending at the video frame's timestamp, zero padded
    /// before the start of the clip.
    pub fn window_at(&self, frame: usize, fps: u32, len: usize, out: &mut Vec<f32>) -> Result<()> {
        if fps == 0 {
            return Err(VisualiserError::InvalidInput("fps must be positive"));
        }
        let end = ((frame + 1) as u64 * self.sample_rate as u64 / fps as u64) as usize;
        let end = end.min(self.samples.len());
        let start = end.saturating_sub(len);

        out.clear();
        out.resize(len - (end - start), 0.0);
        out.extend_from_slice(&self.samples[start..end]);
        Ok(())
    }
}
