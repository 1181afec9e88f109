//! Reference audio feature provider.
//!
//! Turns blocks of mono samples into [`AudioFrame`]s the way a browser
//! analyser would: Hann-windowed FFT magnitudes expressed in decibels and
//! mapped onto `0..=1` over the configured analyser range. Band averages and a
//! simple energy-rise beat tracker fill in the summary fields.

use std::{collections::VecDeque, f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{
    audio::{AudioFrame, Beat},
    config::AudioConfig,
    Result, VisualiserError,
};

const ONSET_GAIN: f32 = 12.0;
const ONSET_THRESHOLD: f32 = 0.6;
const ONSET_REFRACTORY: f32 = 0.2;
const ONSET_HISTORY: usize = 32;

pub struct SpectrumAnalyser {
    audio: AudioConfig,
    clock_samples: usize,
    onsets: OnsetTracker,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl SpectrumAnalyser {
    pub fn new(audio: AudioConfig) -> Self {
        Self {
            audio,
            clock_samples: 0,
            onsets: OnsetTracker::default(),
            fft_planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    pub fn tempo_bpm(&self) -> Option<f32> {
        self.onsets.bpm
    }

    /// Rewinds the beat clock. The FFT plan is kept.
    pub fn reset(&mut self) {
        self.clock_samples = 0;
        self.onsets = OnsetTracker::default();
    }

    /// Analyses one window of samples. `advance` is the number of new samples
    /// since the previous call and drives the beat clock.
    pub fn process_block(&mut self, samples: &[f32], advance: usize) -> Result<AudioFrame> {
        if samples.len() < 2 {
            return Err(VisualiserError::InvalidInput(
                "a block needs at least two samples",
            ));
        }

        self.clock_samples += advance;
        let seconds = self.clock_samples as f32 / self.audio.sample_rate.max(1) as f32;

        let beat = self.onsets.observe(seconds, rms(samples));
        let bins = self.compute_bins(samples)?;

        let mut frame = AudioFrame {
            bins,
            waveform: samples.iter().map(|s| s.clamp(-1.0, 1.0)).collect(),
            bands: None,
            beat: Some(beat),
        };
        frame.bands = Some(frame.bands_or_derived(&self.audio));
        Ok(frame)
    }

    fn compute_bins(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let len = samples.len();
        let min_db = self.audio.analyser_min_decibels;
        let range_db = (self.audio.analyser_max_decibels - min_db).max(f32::EPSILON);
        let fft = self.prepare_fft(len);

        for (index, (slot, sample)) in fft.input.iter_mut().zip(samples).enumerate() {
            *slot = sample * hann(index, len);
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        // The last complex bin is Nyquist; browsers report fft_size / 2 bins.
        let bin_count = len / 2;
        let norm = 1.0 / len as f32;
        Ok(fft
            .spectrum
            .iter()
            .take(bin_count)
            .map(|bin| {
                let magnitude = bin.norm() * norm;
                let decibels = 20.0 * magnitude.max(1e-12).log10();
                ((decibels - min_db) / range_db).clamp(0.0, 1.0)
            })
            .collect())
    }

    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        if self.fft.as_ref().is_some_and(|fft| fft.size != size) {
            self.fft = None;
        }

        let planner = &mut self.fft_planner;
        self.fft.get_or_insert_with(|| {
            let plan = planner.plan_fft_forward(size);
            FftResources {
                size,
                scratch: plan.make_scratch_vec(),
                spectrum: plan.make_output_vec(),
                input: plan.make_input_vec(),
                plan,
            }
        })
    }
}

/// Energy-rise onset detector with a running tempo estimate.
#[derive(Debug, Default)]
struct OnsetTracker {
    previous_rms: f32,
    times: VecDeque<f32>,
    bpm: Option<f32>,
}

impl OnsetTracker {
    fn observe(&mut self, seconds: f32, level: f32) -> Beat {
        let rise = (level - self.previous_rms).max(0.0);
        self.previous_rms = level;
        let intensity = (rise * ONSET_GAIN).clamp(0.0, 1.0);

        let settled = self
            .times
            .back()
            .map_or(true, |last| seconds - last >= ONSET_REFRACTORY);
        let is_beat = intensity >= ONSET_THRESHOLD && settled;
        if is_beat {
            if self.times.len() == ONSET_HISTORY {
                self.times.pop_front();
            }
            self.times.push_back(seconds);
            self.bpm = self.mean_interval().map(|interval| 60.0 / interval);
        }

        let phase = match (self.bpm, self.times.back()) {
            (Some(bpm), Some(last)) => ((seconds - last) * bpm / 60.0).fract(),
            _ => 0.0,
        };

        Beat {
            is_beat,
            intensity,
            phase,
            bpm: self.bpm.unwrap_or(0.0),
        }
    }

    fn mean_interval(&self) -> Option<f32> {
        let intervals: Vec<f32> = self
            .times
            .iter()
            .zip(self.times.iter().skip(1))
            .map(|(a, b)| b - a)
            .filter(|gap| *gap > f32::EPSILON)
            .collect();
        if intervals.is_empty() {
            return None;
        }
        Some(intervals.iter().sum::<f32>() / intervals.len() as f32)
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("audio", &self.audio)
            .field("clock_samples", &self.clock_samples)
            .field("onsets", &self.onsets)
            .field("fft_size", &self.fft.as_ref().map(|fft| fft.size))
            .finish()
    }
}

fn rms(samples: &[f32]) -> f32 {
    let energy: f32 = samples.iter().map(|sample| sample * sample).sum();
    (energy / samples.len() as f32).sqrt()
}

/// Hann window coefficient for `index` in a window of `len` samples.
fn hann(index: usize, len: usize) -> f32 {
    if len < 2 {
        return 1.0;
    }
    let t = index as f32 / (len - 1) as f32;
    (PI * t).sin().powi(2)
}
